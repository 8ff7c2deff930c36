use std::fmt::Write as _;
use std::io::Write;

use rust_decimal::Decimal;

use crate::book::DepthView;
use crate::depth::{fill_fraction, AggregatedRow, BookSide};
use crate::error::ViewerError;

/// Write up to `levels` rows per side of `view`, bids first.
///
/// TSV columns: `updated_ms coin side price size cumulative fill`. JSON mode
/// writes one object per row with the same fields; decimals are quoted
/// strings so no precision is lost.
pub fn write_depth<W: Write>(
    view: &DepthView,
    levels: usize,
    json_mode: bool,
    buf: &mut String,
    writer: &mut W,
) -> Result<(), ViewerError> {
    buf.clear();

    let sides = [
        (BookSide::Bid, &view.book.bids),
        (BookSide::Ask, &view.book.asks),
    ];
    for (side, rows) in sides {
        for row in rows.iter().take(levels) {
            let fill = fill_fraction(row, view.max);
            if json_mode {
                push_json_row(buf, view, side, row, fill);
            } else {
                push_tsv_row(buf, view, side, row, fill);
            }
            buf.push('\n');
        }
    }

    writer.write_all(buf.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn push_tsv_row(buf: &mut String, view: &DepthView, side: BookSide, row: &AggregatedRow, fill: f64) {
    let _ = write!(buf, "{}\t", view.updated_ms);
    buf.push_str(&view.coin);
    buf.push('\t');
    buf.push_str(side.as_str());
    buf.push('\t');
    push_decimal(buf, row.price);
    buf.push('\t');
    push_decimal(buf, row.size);
    buf.push('\t');
    push_decimal(buf, row.cumulative);
    buf.push('\t');
    format_f64(buf, fill);
}

fn push_json_row(buf: &mut String, view: &DepthView, side: BookSide, row: &AggregatedRow, fill: f64) {
    // Manual JSON construction; coin and side never need escaping.
    let _ = write!(buf, "{{\"updated_ms\":{}", view.updated_ms);
    buf.push_str(",\"coin\":\"");
    buf.push_str(&view.coin);
    buf.push_str("\",\"side\":\"");
    buf.push_str(side.as_str());
    buf.push_str("\",\"price\":\"");
    push_decimal(buf, row.price);
    buf.push_str("\",\"size\":\"");
    push_decimal(buf, row.size);
    buf.push_str("\",\"cumulative\":\"");
    push_decimal(buf, row.cumulative);
    buf.push_str("\",\"fill\":");
    format_f64(buf, fill);
    buf.push('}');
}

fn push_decimal(buf: &mut String, val: Decimal) {
    let _ = write!(buf, "{}", val.normalize());
}

/// Fast f64 formatting via `ryu`.
fn format_f64(buf: &mut String, val: f64) {
    let mut b = ryu::Buffer::new();
    buf.push_str(b.format(val));
}

//! Price-bucketed cumulative depth.
//!
//! Turns the raw, unordered levels of one book side into rows keyed by a
//! bucket price, merged, ordered best to worst and cumulated. Bids round
//! down to their bucket (`floor`), asks round up (`ceil`), so a bucket never
//! advertises a better price than any level it contains.
//!
//! All price and size arithmetic is exact [`Decimal`] arithmetic; only the
//! bar fill fraction leaves the decimal domain.

use std::collections::BTreeMap;

use hyperliquid::{parse_decimal, L2Book, RawLevel};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::trace;

use crate::error::ViewerError;

/// Floor for the normalization max so an empty book never divides by zero.
pub const EPSILON: Decimal = dec!(0.000000001);

/// Which side of the book a level sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    pub fn as_str(self) -> &'static str {
        match self {
            BookSide::Bid => "bid",
            BookSide::Ask => "ask",
        }
    }
}

/// One bucket of aggregated depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRow {
    /// Bucket key: a multiple of the bucket size.
    pub price: Decimal,
    /// Sum of the sizes of all levels in this bucket.
    pub size: Decimal,
    /// Running total of `size` from the best bucket up to this one.
    pub cumulative: Decimal,
}

/// Both aggregated sides of a book, each ordered best to worst.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedBook {
    pub bids: Vec<AggregatedRow>,
    pub asks: Vec<AggregatedRow>,
}

impl AggregatedBook {
    /// Shared scale for both sides' bars.
    pub fn normalization_max(&self) -> Decimal {
        normalization_max(&self.bids, &self.asks)
    }

    /// Row count of the longer side; the shorter side is padded to this.
    pub fn depth(&self) -> usize {
        self.bids.len().max(self.asks.len())
    }
}

/// Aggregate one side of the book into bucketed cumulative rows.
///
/// Levels whose price or size does not parse to a decimal are skipped, as
/// are asks whose bucket key would exceed the decimal range.
///
/// # Errors
///
/// [`ViewerError::InvalidArgument`] when `bucket <= 0`.
pub fn aggregate(
    levels: &[RawLevel],
    bucket: Decimal,
    side: BookSide,
) -> Result<Vec<AggregatedRow>, ViewerError> {
    if bucket <= Decimal::ZERO {
        return Err(ViewerError::InvalidArgument(format!(
            "bucket size must be positive, got {bucket}"
        )));
    }

    let mut buckets: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for level in levels {
        let Some((price, size)) = parse_level(level) else {
            trace!(px = %level.px, sz = %level.sz, "dropping malformed level");
            continue;
        };
        let Some(key) = bucket_key(price, bucket, side) else {
            trace!(%price, %bucket, "dropping level outside bucket range");
            continue;
        };
        let total = buckets.entry(key).or_insert(Decimal::ZERO);
        *total = total.saturating_add(size);
    }

    // BTreeMap iterates ascending: best-first for asks, worst-first for bids.
    let mut ordered: Vec<(Decimal, Decimal)> = buckets.into_iter().collect();
    if side == BookSide::Bid {
        ordered.reverse();
    }

    let mut running = Decimal::ZERO;
    Ok(ordered
        .into_iter()
        .map(|(price, size)| {
            running = running.saturating_add(size);
            AggregatedRow {
                price,
                size,
                cumulative: running,
            }
        })
        .collect())
}

/// Aggregate both sides of a raw book snapshot.
pub fn aggregate_book(book: &L2Book, bucket: Decimal) -> Result<AggregatedBook, ViewerError> {
    Ok(AggregatedBook {
        bids: aggregate(book.bids(), bucket, BookSide::Bid)?,
        asks: aggregate(book.asks(), bucket, BookSide::Ask)?,
    })
}

/// Largest final cumulative of either side, floored at [`EPSILON`].
pub fn normalization_max(bids: &[AggregatedRow], asks: &[AggregatedRow]) -> Decimal {
    let total = |rows: &[AggregatedRow]| rows.last().map_or(Decimal::ZERO, |r| r.cumulative);
    total(bids).max(total(asks)).max(EPSILON)
}

/// Share of the bar a row fills, clamped to `[0, 1]`.
pub fn fill_fraction(row: &AggregatedRow, max: Decimal) -> f64 {
    let ratio = row
        .cumulative
        .checked_div(max.max(EPSILON))
        .unwrap_or(Decimal::ONE)
        .clamp(Decimal::ZERO, Decimal::ONE);
    ratio.to_f64().unwrap_or(0.0)
}

/// Mid between the first raw bid and first raw ask as delivered.
///
/// The exchange sends each side already sorted best first, so the first
/// entries are the top of book. `None` unless both parse and are non-zero.
pub fn mid_price(book: &L2Book) -> Option<Decimal> {
    let first = |levels: &[RawLevel]| {
        levels
            .first()
            .and_then(|l| parse_decimal(&l.px))
            .filter(|px| !px.is_zero())
    };
    let bid = first(book.bids())?;
    let ask = first(book.asks())?;
    bid.checked_add(ask)?.checked_div(Decimal::TWO)
}

fn parse_level(level: &RawLevel) -> Option<(Decimal, Decimal)> {
    Some((parse_decimal(&level.px)?, parse_decimal(&level.sz)?))
}

/// Nearest multiple of `bucket` at or below (bids) or at or above (asks)
/// `price`. Derived from the exact remainder; `None` only when an ask key
/// would exceed the decimal range.
fn bucket_key(price: Decimal, bucket: Decimal, side: BookSide) -> Option<Decimal> {
    let rem = price.checked_rem(bucket)?;
    // Remainder takes the sign of the price, so `base` truncates toward zero.
    let base = price.checked_sub(rem)?;
    match side {
        BookSide::Bid if rem < Decimal::ZERO => base.checked_sub(bucket),
        BookSide::Ask if rem > Decimal::ZERO => base.checked_add(bucket),
        _ => Some(base),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn level(px: &str, sz: &str) -> RawLevel {
        RawLevel::new(px, sz, 1)
    }

    fn prices(rows: &[AggregatedRow]) -> Vec<Decimal> {
        rows.iter().map(|r| r.price).collect()
    }

    /// Deterministic pseudo-random levels around 64000.
    fn sample_levels(seed: u64, count: usize) -> Vec<RawLevel> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let cents = 6_400_000 + (state >> 33) % 50_000;
                let lots = 1 + (state >> 17) % 5_000;
                let px = Decimal::new(cents as i64, 2);
                let sz = Decimal::new(lots as i64, 3);
                level(&px.to_string(), &sz.to_string())
            })
            .collect()
    }

    // -- bucketing --------------------------------------------------------

    #[test]
    fn bids_floor_into_bucket() {
        let rows = aggregate(&[level("101", "1"), level("105", "2")], dec!(10), BookSide::Bid)
            .unwrap();
        assert_eq!(
            rows,
            vec![AggregatedRow {
                price: dec!(100),
                size: dec!(3),
                cumulative: dec!(3),
            }]
        );
    }

    #[test]
    fn asks_ceil_into_bucket() {
        let rows = aggregate(&[level("101", "1")], dec!(10), BookSide::Ask).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, dec!(110));
    }

    #[test]
    fn exact_multiple_keeps_its_price_on_both_sides() {
        let bids = aggregate(&[level("100", "1")], dec!(10), BookSide::Bid).unwrap();
        let asks = aggregate(&[level("100", "1")], dec!(10), BookSide::Ask).unwrap();
        assert_eq!(bids[0].price, dec!(100));
        assert_eq!(asks[0].price, dec!(100));
    }

    #[test]
    fn fractional_bucket_is_exact() {
        let rows = aggregate(
            &[level("64000.35", "1"), level("64000.3", "2"), level("64000.29", "4")],
            dec!(0.1),
            BookSide::Bid,
        )
        .unwrap();
        assert_eq!(prices(&rows), vec![dec!(64000.3), dec!(64000.2)]);
        assert_eq!(rows[0].size, dec!(3));
        assert_eq!(rows[1].size, dec!(4));
    }

    #[test]
    fn bid_just_below_boundary_stays_below() {
        let rows = aggregate(
            &[level("4.9999999999999999999999999999", "1")],
            dec!(5),
            BookSide::Bid,
        )
        .unwrap();
        assert_eq!(prices(&rows), vec![Decimal::ZERO]);
    }

    #[test]
    fn ask_just_above_boundary_rounds_up() {
        let rows = aggregate(
            &[level("5.0000000000000000000000000001", "1")],
            dec!(5),
            BookSide::Ask,
        )
        .unwrap();
        assert_eq!(prices(&rows), vec![dec!(10)]);
    }

    #[test]
    fn very_large_price_is_kept() {
        let rows = aggregate(
            &[level("10000000000000000000000000000", "1"), level("100", "2")],
            dec!(0.1),
            BookSide::Ask,
        )
        .unwrap();
        assert_eq!(
            prices(&rows),
            vec![dec!(100), Decimal::from_str_exact("10000000000000000000000000000").unwrap()]
        );
        assert_eq!(rows.last().unwrap().cumulative, dec!(3));
    }

    #[test]
    fn negative_prices_still_floor_and_ceil() {
        let bids = aggregate(&[level("-101", "1")], dec!(10), BookSide::Bid).unwrap();
        let asks = aggregate(&[level("-101", "1")], dec!(10), BookSide::Ask).unwrap();
        assert_eq!(bids[0].price, dec!(-110));
        assert_eq!(asks[0].price, dec!(-100));
    }

    // -- ordering and cumulation -------------------------------------------

    #[test]
    fn bids_order_descending_asks_ascending() {
        let levels = [level("95", "1"), level("120", "1"), level("101", "1")];
        let bids = aggregate(&levels, dec!(5), BookSide::Bid).unwrap();
        let asks = aggregate(&levels, dec!(5), BookSide::Ask).unwrap();
        assert_eq!(prices(&bids), vec![dec!(120), dec!(100), dec!(95)]);
        assert_eq!(prices(&asks), vec![dec!(95), dec!(105), dec!(120)]);
    }

    #[test]
    fn cumulative_runs_best_to_worst() {
        let asks = aggregate(
            &[level("3", "0.5"), level("1", "2"), level("2", "1.25")],
            dec!(1),
            BookSide::Ask,
        )
        .unwrap();
        let cumulative: Vec<Decimal> = asks.iter().map(|r| r.cumulative).collect();
        assert_eq!(cumulative, vec![dec!(2), dec!(3.25), dec!(3.75)]);
    }

    #[test]
    fn random_book_holds_ordering_and_conservation() {
        let levels = sample_levels(7, 400);
        let expected: Decimal = levels
            .iter()
            .map(|l| parse_decimal(&l.sz).unwrap())
            .sum();

        for bucket in [dec!(0.1), dec!(1), dec!(5), dec!(100)] {
            for side in [BookSide::Bid, BookSide::Ask] {
                let rows = aggregate(&levels, bucket, side).unwrap();
                assert_eq!(rows.last().unwrap().cumulative, expected);
                assert!(rows.windows(2).all(|w| w[0].cumulative <= w[1].cumulative));
                assert!(rows.windows(2).all(|w| match side {
                    BookSide::Bid => w[0].price > w[1].price,
                    BookSide::Ask => w[0].price < w[1].price,
                }));
                assert!(rows.iter().all(|r| (r.price / bucket).fract().is_zero()));
            }
        }
    }

    #[test]
    fn reaggregation_is_idempotent() {
        let levels = sample_levels(42, 200);
        for side in [BookSide::Bid, BookSide::Ask] {
            let once = aggregate(&levels, dec!(5), side).unwrap();
            let as_levels: Vec<RawLevel> = once
                .iter()
                .map(|r| level(&r.price.to_string(), &r.size.to_string()))
                .collect();
            let twice = aggregate(&as_levels, dec!(5), side).unwrap();
            assert_eq!(once, twice);
        }
    }

    // -- edge cases ---------------------------------------------------------

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate(&[], dec!(1), BookSide::Bid).unwrap().is_empty());
        let book = aggregate_book(&L2Book::default(), dec!(1)).unwrap();
        assert_eq!(book, AggregatedBook::default());
        assert_eq!(book.normalization_max(), EPSILON);
    }

    #[test]
    fn malformed_levels_are_dropped() {
        let levels = [
            level("NaN", "1"),
            level("100", "abc"),
            level("", "1"),
            level("inf", "2"),
            level("100", "2"),
        ];
        let rows = aggregate(&levels, dec!(1), BookSide::Bid).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].size, dec!(2));
        assert_eq!(rows[0].cumulative, dec!(2));
    }

    #[test]
    fn non_positive_bucket_is_rejected() {
        for bucket in [Decimal::ZERO, dec!(-1)] {
            let err = aggregate(&[level("1", "1")], bucket, BookSide::Ask).unwrap_err();
            assert!(matches!(err, ViewerError::InvalidArgument(_)));
        }
    }

    #[test]
    fn scientific_notation_is_accepted() {
        let rows = aggregate(&[level("1e2", "2.5e-1")], dec!(10), BookSide::Bid).unwrap();
        assert_eq!(rows[0].price, dec!(100));
        assert_eq!(rows[0].size, dec!(0.25));
    }

    // -- normalization and fill ---------------------------------------------

    #[test]
    fn normalization_max_takes_larger_side() {
        let book = aggregate_book(
            &L2Book::new(
                "BTC",
                vec![level("100", "1"), level("99", "2")],
                vec![level("101", "10")],
            ),
            dec!(1),
        )
        .unwrap();
        assert_eq!(book.normalization_max(), dec!(10));
        assert_eq!(book.depth(), 2);
    }

    #[test]
    fn normalization_max_floors_at_epsilon() {
        let zero = AggregatedRow {
            price: dec!(1),
            size: Decimal::ZERO,
            cumulative: Decimal::ZERO,
        };
        assert_eq!(normalization_max(&[zero.clone()], &[]), EPSILON);
        assert_eq!(fill_fraction(&zero, EPSILON), 0.0);
    }

    #[test]
    fn fill_fraction_scales_and_clamps() {
        let row = AggregatedRow {
            price: dec!(100),
            size: dec!(1),
            cumulative: dec!(2.5),
        };
        assert_eq!(fill_fraction(&row, dec!(10)), 0.25);
        assert_eq!(fill_fraction(&row, dec!(2)), 1.0);
        assert_eq!(fill_fraction(&row, Decimal::ZERO), 1.0);
    }

    // -- mid price ----------------------------------------------------------

    #[test]
    fn mid_uses_first_raw_levels() {
        let book = L2Book::new(
            "BTC",
            vec![level("99", "1"), level("100", "1")],
            vec![level("101", "1")],
        );
        assert_eq!(mid_price(&book), Some(dec!(100)));
    }

    #[test]
    fn mid_requires_both_sides() {
        let one_sided = L2Book::new("BTC", vec![level("99", "1")], vec![]);
        assert_eq!(mid_price(&one_sided), None);
        let zero_bid = L2Book::new("BTC", vec![level("0", "1")], vec![level("1", "1")]);
        assert_eq!(mid_price(&zero_bid), None);
    }
}

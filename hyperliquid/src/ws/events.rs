use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{Candle, CandleInterval, L2Book, TradeBatch};

/// A subscription as named on the wire.
///
/// Serializes to the `subscription` object of a request, e.g.
/// `{"type":"l2Book","coin":"BTC"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubscriptionKey {
    L2Book { coin: String },
    Trades { coin: String },
    Candle { coin: String, interval: CandleInterval },
}

/// Outbound request frame.
#[derive(Debug, Serialize)]
pub struct WsRequest<'a> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<&'a SubscriptionKey>,
}

impl<'a> WsRequest<'a> {
    pub fn subscribe(key: &'a SubscriptionKey) -> Self {
        Self {
            method: "subscribe",
            subscription: Some(key),
        }
    }

    pub fn unsubscribe(key: &'a SubscriptionKey) -> Self {
        Self {
            method: "unsubscribe",
            subscription: Some(key),
        }
    }

    pub fn ping() -> Self {
        Self {
            method: "ping",
            subscription: None,
        }
    }

    pub fn to_text(&self) -> String {
        // A struct of &str and a derive-serialized enum cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Inbound envelope: every server frame is tagged with `channel`.
#[derive(Debug, Deserialize)]
struct WsFrame {
    channel: String,
    #[serde(default)]
    data: Value,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    Book(L2Book),
    Trades(TradeBatch),
    Candle(Candle),
    Pong,
    /// Acknowledgement of a subscribe/unsubscribe request.
    Ack,
}

/// Decode a text frame. Unknown channels and payloads that fail to decode
/// return `None` and are logged at debug level.
pub fn parse_frame(text: &str) -> Option<WsEvent> {
    let frame: WsFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            debug!(error = %e, "unparseable WebSocket frame");
            return None;
        }
    };

    let event = match frame.channel.as_str() {
        "l2Book" => serde_json::from_value(frame.data).ok().map(WsEvent::Book),
        "trades" => TradeBatch::from_value(&frame.data).map(WsEvent::Trades),
        "candle" => serde_json::from_value(frame.data).ok().map(WsEvent::Candle),
        "pong" => Some(WsEvent::Pong),
        "subscriptionResponse" => Some(WsEvent::Ack),
        other => {
            debug!(channel = other, "unhandled WebSocket channel");
            None
        }
    };
    if event.is_none() {
        debug!(channel = %frame.channel, "dropped WebSocket frame");
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_shape() {
        let key = SubscriptionKey::L2Book { coin: "BTC".into() };
        let text = WsRequest::subscribe(&key).to_text();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["method"], "subscribe");
        assert_eq!(v["subscription"]["type"], "l2Book");
        assert_eq!(v["subscription"]["coin"], "BTC");
    }

    #[test]
    fn candle_subscription_carries_interval() {
        let key = SubscriptionKey::Candle {
            coin: "ETH".into(),
            interval: CandleInterval::FiveMinutes,
        };
        let v: Value = serde_json::from_str(&WsRequest::unsubscribe(&key).to_text()).unwrap();
        assert_eq!(v["method"], "unsubscribe");
        assert_eq!(v["subscription"]["type"], "candle");
        assert_eq!(v["subscription"]["interval"], "5m");
    }

    #[test]
    fn ping_has_no_subscription() {
        assert_eq!(WsRequest::ping().to_text(), r#"{"method":"ping"}"#);
    }

    #[test]
    fn parses_book_frame() {
        let text = r#"{"channel":"l2Book","data":{"coin":"BTC","time":5,
            "levels":[[{"px":"100.5","sz":"1","n":2}],[{"px":"101","sz":"3","n":1}]]}}"#;
        match parse_frame(text) {
            Some(WsEvent::Book(book)) => {
                assert_eq!(book.coin, "BTC");
                assert_eq!(book.bids()[0].px, "100.5");
                assert_eq!(book.asks()[0].sz, "3");
            }
            other => panic!("expected book, got {other:?}"),
        }
    }

    #[test]
    fn parses_trades_frame() {
        let text = r#"{"channel":"trades","data":[
            {"coin":"SOL","side":"A","px":"150.1","sz":"4","time":9,"hash":"0x0","tid":1}]}"#;
        match parse_frame(text) {
            Some(WsEvent::Trades(batch)) => {
                assert_eq!(batch.coin, "SOL");
                assert_eq!(batch.trades.len(), 1);
            }
            other => panic!("expected trades, got {other:?}"),
        }
    }

    #[test]
    fn parses_control_frames() {
        assert_eq!(parse_frame(r#"{"channel":"pong"}"#), Some(WsEvent::Pong));
        assert_eq!(
            parse_frame(r#"{"channel":"subscriptionResponse","data":{"method":"subscribe"}}"#),
            Some(WsEvent::Ack)
        );
    }

    #[test]
    fn skips_unknown_and_garbage() {
        assert_eq!(parse_frame(r#"{"channel":"notification","data":{}}"#), None);
        assert_eq!(parse_frame("not json"), None);
        assert_eq!(parse_frame(r#"{"channel":"l2Book","data":"oops"}"#), None);
    }
}

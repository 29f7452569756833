//! OHLCV bars and the Binance kline wire formats they are decoded from.

use crate::error::DataFeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One OHLCV bar as consumed by the chart.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default, Deserialize, Serialize)]
pub struct Bar {
    /// Bar open time in milliseconds since the unix epoch
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Bar open time as a UTC timestamp.
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time)
    }

    /// Map one REST kline row `[openTime, open, high, low, close, volume, ...]`.
    ///
    /// At least five elements are required. Price fields may be strings or numbers, and a
    /// missing volume is treated as zero.
    ///
    /// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints#klinecandlestick-data>
    pub fn from_kline_row(row: &[Value]) -> Result<Self, DataFeedError> {
        if row.len() < 5 {
            return Err(DataFeedError::MalformedKline(format!(
                "row has {} elements, expected at least 5",
                row.len()
            )));
        }

        let time = row[0].as_i64().ok_or_else(|| {
            DataFeedError::MalformedKline(format!("open time is not an integer: {}", row[0]))
        })?;

        Ok(Self {
            time,
            open: number_field(&row[1], "open")?,
            high: number_field(&row[2], "high")?,
            low: number_field(&row[3], "low")?,
            close: number_field(&row[4], "close")?,
            volume: match row.get(5) {
                Some(volume) => number_field(volume, "volume")?,
                None => 0.0,
            },
        })
    }
}

fn number_field(value: &Value, field: &str) -> Result<f64, DataFeedError> {
    let parsed = match value {
        Value::String(text) => text.parse::<f64>().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    };

    parsed.ok_or_else(|| DataFeedError::MalformedKline(format!("{field} is not a number: {value}")))
}

/// Binance raw stream name for a symbol's klines, eg/ "btcusdt@kline_1m".
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#klinecandlestick-streams-for-utc>
pub fn kline_stream_name(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{interval}", symbol.to_lowercase())
}

/// Live kline update decoded from the shared socket.
#[derive(Clone, PartialEq, Debug)]
pub struct KlineTick {
    /// Uppercase exchange symbol, eg/ "BTCUSDT"
    pub symbol: String,
    /// Binance kline interval, eg/ "1m"
    pub interval: String,
    pub bar: Bar,
    /// Whether this bar is final
    pub is_closed: bool,
}

/// Messages received on the Binance raw stream socket.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Event(StreamEvent),
    Response(ControlResponse),
}

/// Market data events, tagged by the Binance `e` field.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(tag = "e")]
pub enum StreamEvent {
    #[serde(rename = "kline")]
    Kline(BinanceKlineEvent),
}

/// Acknowledgement of a SUBSCRIBE / UNSUBSCRIBE request, eg/ `{"result":null,"id":1}`.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct ControlResponse {
    pub result: Option<Value>,
    pub id: u64,
}

/// Binance kline event payload.
///
/// ### Raw Payload Example
/// ```json
/// {
///   "e": "kline",
///   "E": 1672515782136,
///   "s": "BNBBTC",
///   "k": {
///     "t": 1672515780000, "T": 1672515839999, "s": "BNBBTC", "i": "1m",
///     "o": "0.0010", "c": "0.0020", "h": "0.0025", "l": "0.0015", "v": "1000",
///     "x": false
///   }
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct BinanceKlineEvent {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinanceKline,
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct BinanceKline {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o", deserialize_with = "de_str_f64")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "de_str_f64")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "de_str_f64")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "de_str_f64")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "de_str_f64")]
    pub volume: f64,
    #[serde(rename = "x", default)]
    pub is_closed: bool,
}

impl From<BinanceKlineEvent> for KlineTick {
    fn from(event: BinanceKlineEvent) -> Self {
        let kline = event.kline;
        Self {
            symbol: event.symbol,
            interval: kline.interval,
            bar: Bar {
                time: kline.open_time,
                open: kline.open,
                high: kline.high,
                low: kline.low,
                close: kline.close,
                volume: kline.volume,
            },
            is_closed: kline.is_closed,
        }
    }
}

fn de_str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    number_field(&value, "kline").map_err(serde::de::Error::custom)
}

/// Outgoing control frame on the raw stream socket.
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#live-subscribingunsubscribing-to-streams>
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ControlRequest {
    pub method: ControlMethod,
    pub params: Vec<String>,
    pub id: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMethod {
    Subscribe,
    Unsubscribe,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bar_from_six_element_row() {
        let row = json!([1_700_000_000_000_i64, "36000.10", "36100.00", "35900.50", "36050.25", "12.5"]);
        let bar = Bar::from_kline_row(row.as_array().unwrap()).unwrap();

        assert_eq!(
            bar,
            Bar {
                time: 1_700_000_000_000,
                open: 36000.10,
                high: 36100.00,
                low: 35900.50,
                close: 36050.25,
                volume: 12.5,
            }
        );
    }

    #[test]
    fn test_bar_from_full_binance_row_ignores_trailing_fields() {
        let row = json!([
            1499040000000_i64, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
            "148976.11427815", 1499644799999_i64, "2434.19055334", 308, "1756.87402397",
            "28.46694368", "0"
        ]);
        let bar = Bar::from_kline_row(row.as_array().unwrap()).unwrap();

        assert_eq!(bar.time, 1499040000000);
        assert_eq!(bar.close, 0.01577100);
        assert_eq!(bar.volume, 148976.11427815);
    }

    #[test]
    fn test_bar_from_five_element_row_has_zero_volume() {
        let row = json!([60_000, 1.0, 2.0, 0.5, 1.5]);
        let bar = Bar::from_kline_row(row.as_array().unwrap()).unwrap();
        assert_eq!(bar.volume, 0.0);
        assert_eq!(bar.high, 2.0);
    }

    #[test]
    fn test_bar_from_malformed_rows() {
        struct TestCase {
            input: Value,
        }

        let tests = vec![
            TestCase {
                // TC0: too short
                input: json!([60_000, "1", "2"]),
            },
            TestCase {
                // TC1: open time not an integer
                input: json!(["60000", "1", "2", "0.5", "1.5"]),
            },
            TestCase {
                // TC2: price not numeric
                input: json!([60_000, "one", "2", "0.5", "1.5"]),
            },
            TestCase {
                // TC3: volume is null
                input: json!([60_000, "1", "2", "0.5", "1.5", null]),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Bar::from_kline_row(test.input.as_array().unwrap());
            assert!(
                matches!(actual, Err(DataFeedError::MalformedKline(_))),
                "TC{} failed: {:?}",
                index,
                actual
            );
        }
    }

    #[test]
    fn test_bar_open_time() {
        let bar = Bar {
            time: 1_700_000_000_000,
            ..Default::default()
        };
        assert_eq!(
            bar.open_time().map(|time| time.to_rfc3339()),
            Some("2023-11-14T22:13:20+00:00".to_string())
        );
    }

    #[test]
    fn test_kline_stream_name_lowercases_symbol() {
        assert_eq!(kline_stream_name("BTCUSDT", "1m"), "btcusdt@kline_1m");
        assert_eq!(kline_stream_name("neousdt", "1M"), "neousdt@kline_1M");
    }

    #[test]
    fn test_decode_kline_event() {
        let raw = r#"{
            "e": "kline", "E": 1672515782136, "s": "BNBBTC",
            "k": {
                "t": 1672515780000, "T": 1672515839999, "s": "BNBBTC", "i": "1m",
                "f": 100, "L": 200, "o": "0.0010", "c": "0.0020", "h": "0.0025",
                "l": "0.0015", "v": "1000", "n": 100, "x": false, "q": "1.0000",
                "V": "500", "Q": "0.500", "B": "123456"
            }
        }"#;

        let message: StreamMessage = serde_json::from_str(raw).unwrap();
        let StreamMessage::Event(StreamEvent::Kline(event)) = message else {
            panic!("expected kline event, got {message:?}");
        };
        let tick = KlineTick::from(event);

        assert_eq!(tick.symbol, "BNBBTC");
        assert_eq!(tick.interval, "1m");
        assert!(!tick.is_closed);
        assert_eq!(
            tick.bar,
            Bar {
                time: 1672515780000,
                open: 0.0010,
                high: 0.0025,
                low: 0.0015,
                close: 0.0020,
                volume: 1000.0,
            }
        );
    }

    #[test]
    fn test_decode_control_response() {
        let message: StreamMessage = serde_json::from_str(r#"{"result":null,"id":7}"#).unwrap();
        assert_eq!(
            message,
            StreamMessage::Response(ControlResponse { result: None, id: 7 })
        );
    }

    #[test]
    fn test_decode_unknown_event_fails() {
        let raw = r#"{"e":"trade","E":1,"s":"BTCUSDT","t":1,"p":"1","q":"1"}"#;
        assert!(serde_json::from_str::<StreamMessage>(raw).is_err());
    }

    #[test]
    fn test_control_request_serialisation() {
        let request = ControlRequest {
            method: ControlMethod::Subscribe,
            params: vec!["btcusdt@kline_1m".to_string()],
            id: 3,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"method": "SUBSCRIBE", "params": ["btcusdt@kline_1m"], "id": 3})
        );
    }
}

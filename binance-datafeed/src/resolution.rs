//! Chart resolution codes and their Binance kline interval equivalents.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Resolution codes advertised to the chart, in display order.
pub const SUPPORTED_RESOLUTIONS: [&str; 11] = [
    "1", "3", "5", "15", "30", "60", "120", "240", "1D", "1W", "1M",
];

/// Kline interval used for any resolution code missing from [`RESOLUTION_INTERVALS`].
pub const FALLBACK_INTERVAL: &str = "1h";

/// Chart resolution code to Binance kline interval.
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints#klinecandlestick-data>
const RESOLUTION_INTERVALS: [(&str, &str); 11] = [
    ("1", "1m"),
    ("3", "3m"),
    ("5", "5m"),
    ("15", "15m"),
    ("30", "30m"),
    ("60", "1h"),
    ("120", "2h"),
    ("240", "4h"),
    ("1D", "1d"),
    ("1W", "1w"),
    ("1M", "1M"),
];

/// Binance kline interval to bar length in seconds. Months are counted as 30 days.
const INTERVAL_SECONDS: [(&str, i64); 11] = [
    ("1m", 60),
    ("3m", 180),
    ("5m", 300),
    ("15m", 900),
    ("30m", 1_800),
    ("1h", 3_600),
    ("2h", 7_200),
    ("4h", 14_400),
    ("1d", 86_400),
    ("1w", 604_800),
    ("1M", 2_592_000),
];

/// Resolution code as understood by the charting widget (eg/ "1", "240", "1D").
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
pub struct Resolution(pub SmolStr);

impl Resolution {
    pub fn new<S: Into<SmolStr>>(code: S) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// All advertised resolutions, in display order.
    pub fn supported() -> Vec<Resolution> {
        SUPPORTED_RESOLUTIONS.iter().map(|code| Resolution::new(*code)).collect()
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_RESOLUTIONS.contains(&self.as_str())
    }

    /// Binance kline interval for this resolution, falling back to [`FALLBACK_INTERVAL`].
    pub fn interval(&self) -> &'static str {
        RESOLUTION_INTERVALS
            .iter()
            .find(|(code, _)| *code == self.as_str())
            .map(|(_, interval)| *interval)
            .unwrap_or(FALLBACK_INTERVAL)
    }

    /// Length of one bar at this resolution, in seconds.
    pub fn duration_secs(&self) -> i64 {
        interval_seconds(self.interval())
    }

    /// Next advertised resolution, wrapping around. Unknown codes restart at the first.
    pub fn next(&self) -> Resolution {
        let index = SUPPORTED_RESOLUTIONS
            .iter()
            .position(|code| *code == self.as_str())
            .map(|index| (index + 1) % SUPPORTED_RESOLUTIONS.len())
            .unwrap_or(0);
        Resolution::new(SUPPORTED_RESOLUTIONS[index])
    }

    /// Previous advertised resolution, wrapping around.
    pub fn prev(&self) -> Resolution {
        let len = SUPPORTED_RESOLUTIONS.len();
        let index = SUPPORTED_RESOLUTIONS
            .iter()
            .position(|code| *code == self.as_str())
            .map(|index| (index + len - 1) % len)
            .unwrap_or(0);
        Resolution::new(SUPPORTED_RESOLUTIONS[index])
    }
}

impl From<&str> for Resolution {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

fn interval_seconds(interval: &str) -> i64 {
    INTERVAL_SECONDS
        .iter()
        .find(|(candidate, _)| *candidate == interval)
        .map(|(_, secs)| *secs)
        .unwrap_or(3_600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_resolution_has_an_interval() {
        for code in SUPPORTED_RESOLUTIONS {
            assert!(
                RESOLUTION_INTERVALS.iter().any(|(mapped, _)| *mapped == code),
                "resolution {code} missing from interval table"
            );
        }
    }

    #[test]
    fn test_resolution_interval_mapping() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase { input: "1", expected: "1m" },
            TestCase { input: "3", expected: "3m" },
            TestCase { input: "5", expected: "5m" },
            TestCase { input: "15", expected: "15m" },
            TestCase { input: "30", expected: "30m" },
            TestCase { input: "60", expected: "1h" },
            TestCase { input: "120", expected: "2h" },
            TestCase { input: "240", expected: "4h" },
            TestCase { input: "1D", expected: "1d" },
            TestCase { input: "1W", expected: "1w" },
            TestCase { input: "1M", expected: "1M" },
            // unknown codes fall back to 1h
            TestCase { input: "2", expected: "1h" },
            TestCase { input: "1d", expected: "1h" },
            TestCase { input: "", expected: "1h" },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Resolution::new(test.input).interval();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_duration_secs() {
        assert_eq!(Resolution::new("1").duration_secs(), 60);
        assert_eq!(Resolution::new("240").duration_secs(), 14_400);
        assert_eq!(Resolution::new("1W").duration_secs(), 604_800);
        assert_eq!(Resolution::new("unknown").duration_secs(), 3_600);
    }

    #[test]
    fn test_next_and_prev_wrap() {
        assert_eq!(Resolution::new("1M").next(), Resolution::new("1"));
        assert_eq!(Resolution::new("1").prev(), Resolution::new("1M"));
        assert_eq!(Resolution::new("60").next(), Resolution::new("120"));
        assert_eq!(Resolution::new("bogus").next(), Resolution::new("1"));
    }

    #[test]
    fn test_supported_resolutions_in_order() {
        let supported: Vec<String> = Resolution::supported()
            .into_iter()
            .map(|resolution| resolution.to_string())
            .collect();
        assert_eq!(supported, SUPPORTED_RESOLUTIONS);
        assert!(Resolution::new("1D").is_supported());
        assert!(!Resolution::new("2D").is_supported());
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `binance-datafeed`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataFeedError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error status: {0}")]
    Status(u16),

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("malformed kline row: {0}")]
    MalformedKline(String),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("data feed has been shut down")]
    Shutdown,
}

impl DataFeedError {
    /// Determine if an error means the shared socket is gone and must be re-established.
    ///
    /// Decode failures on a single message are not terminal, the message is skipped.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            DataFeedError::Socket(_) | DataFeedError::Shutdown => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DataFeedError {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Http(value.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataFeedError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DataFeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_feed_error_is_terminal() {
        struct TestCase {
            input: DataFeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: socket failure requires reconnection
                input: DataFeedError::Socket("Connection reset without closing handshake".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: shutdown stops the socket task
                input: DataFeedError::Shutdown,
                expected: true,
            },
            TestCase {
                // TC2: single undecodable message is skipped
                input: DataFeedError::Decode("expected value at line 1 column 1".to_string()),
                expected: false,
            },
            TestCase {
                // TC3: REST failures never touch the socket
                input: DataFeedError::Status(429),
                expected: false,
            },
            TestCase {
                // TC4: malformed candle row
                input: DataFeedError::MalformedKline("row has 3 elements".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_websocket_error_converts_to_socket_variant() {
        let error = DataFeedError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(matches!(error, DataFeedError::Socket(_)));
        assert!(error.is_terminal());
    }
}

//! Watchlist persistence as one JSON file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use super::watchlist::{default_item, WatchlistItem};

/// Storage key of the watchlist; the file is `<key>.json` in the data directory.
pub const WATCHLIST_STORAGE_KEY: &str = "crypto_watchlist";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("watchlist io error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode watchlist: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reads and writes the watchlist file.
#[derive(Debug, Clone)]
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir
                .as_ref()
                .join(format!("{WATCHLIST_STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored items in order.
    ///
    /// A missing, unreadable, or invalid file, or an empty stored list, yields the single
    /// default NEO item.
    pub fn load(&self) -> Vec<WatchlistItem> {
        let fallback = || vec![default_item(Utc::now().timestamp_millis())];

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored watchlist");
                return fallback();
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read watchlist");
                return fallback();
            }
        };

        match serde_json::from_str::<Vec<WatchlistItem>>(&contents) {
            Ok(items) if items.is_empty() => fallback(),
            Ok(items) => items,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "error parsing watchlist");
                fallback()
            }
        }
    }

    /// Write `items` as a JSON array, creating the data directory if needed.
    pub fn save(&self, items: &[WatchlistItem]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(items)?;

        // Write-then-rename keeps the previous list intact if the write fails
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = items.len(), "saved watchlist");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::watchlist::{DEFAULT_NAME, DEFAULT_SYMBOL};

    fn temp_store(name: &str) -> (WatchlistStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "crypto_charts_{}_{}_{}",
            name,
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        (WatchlistStore::new(&dir), dir)
    }

    fn item(symbol: &str, name: &str, added_at: i64) -> WatchlistItem {
        WatchlistItem {
            symbol: symbol.to_string(),
            name: name.to_string(),
            added_at,
        }
    }

    fn assert_default(items: &[WatchlistItem]) {
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].symbol, DEFAULT_SYMBOL);
        assert_eq!(items[0].name, DEFAULT_NAME);
        assert!(items[0].added_at > 0);
    }

    #[test]
    fn test_store_path_uses_storage_key() {
        let store = WatchlistStore::new("/data");
        assert_eq!(store.path(), Path::new("/data/crypto_watchlist.json"));
    }

    #[test]
    fn test_save_then_load_round_trips_in_order() {
        let (store, dir) = temp_store("round_trip");
        let items = vec![
            item("SOLUSDT", "Solana", 3),
            item("NEOUSDT", "NEO", 1),
            item("BTCUSDT", "BTC/USDT", 2),
        ];

        // Creates the missing directory
        store.save(&items).unwrap();
        assert_eq!(store.load(), items);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_falls_back_to_default_item() {
        struct TestCase {
            name: &'static str,
            contents: Option<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: no file
                name: "missing",
                contents: None,
            },
            TestCase {
                // TC1: empty stored list
                name: "empty",
                contents: Some("[]"),
            },
            TestCase {
                // TC2: invalid json
                name: "invalid",
                contents: Some("{not json"),
            },
            TestCase {
                // TC3: valid json of the wrong shape
                name: "shape",
                contents: Some(r#"{"symbol":"BTCUSDT"}"#),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let (store, dir) = temp_store(test.name);
            if let Some(contents) = test.contents {
                fs::create_dir_all(&dir).unwrap();
                fs::write(store.path(), contents).unwrap();
            }

            let items = store.load();
            assert_eq!(items.len(), 1, "TC{} failed", index);
            assert_default(&items);

            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_load_reads_camel_case_file() {
        let (store, dir) = temp_store("camel");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            store.path(),
            r#"[{"symbol":"ETHUSDT","name":"Ethereum","addedAt":1700000000000}]"#,
        )
        .unwrap();

        assert_eq!(store.load(), vec![item("ETHUSDT", "Ethereum", 1_700_000_000_000)]);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_saving_empty_list_loads_default() {
        let (store, dir) = temp_store("cleared");
        store.save(&[]).unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
        assert_default(&store.load());

        let _ = fs::remove_dir_all(dir);
    }
}

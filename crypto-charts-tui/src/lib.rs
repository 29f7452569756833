/// Crypto Charts - Terminal Dashboard Library
///
/// Backs the `crypto-charts` binary: one or two candlestick panels fed by the Binance data
/// feed, next to a watchlist persisted between runs.
///
/// The library includes:
/// - Watchlist model, popular symbol catalog and JSON file persistence
/// - Dashboard state machine driven by key presses
/// - Chart panels merging history and live bars
/// - Ratatui rendering of the whole screen
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::app::App;
pub use shared::chart::{BarBuffer, ChartPanel, PanelStatus, TickOutcome};
pub use shared::dashboard::{Dashboard, DashboardAction, Focus, PanelSlot, ViewMode};
pub use shared::feed::{mount_panel, unmount_panel, PanelEvent};
pub use shared::logging::init_logging;
pub use shared::persistence::{StoreError, WatchlistStore, WATCHLIST_STORAGE_KEY};
pub use shared::settings::AppSettings;
pub use shared::watchlist::{CatalogEntry, Watchlist, WatchlistItem, POPULAR_CRYPTOS};
pub use shared::widget::{render_dashboard, CandleChart};

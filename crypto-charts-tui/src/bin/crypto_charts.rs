/// Crypto Charts - Terminal Dashboard
///
/// Candlestick charts of Binance spot pairs with a persisted watchlist:
/// - Watchlist sidebar with a searchable catalog of popular pairs
/// - Single or split chart view, symbol and resolution per panel
/// - History over REST, live bars over one shared kline socket
use std::{
    error::Error,
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use binance_datafeed::BinanceDatafeed;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use crypto_charts_tui::{init_logging, App, AppSettings, WatchlistStore};
use ratatui::{backend::CrosstermBackend, Terminal};
use rustls::crypto::ring::default_provider;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    let settings = AppSettings::from_env();
    if let Err(error) = init_logging(&settings.log_file) {
        eprintln!("failed to initialise logging: {error}");
    }
    info!(
        rest_url = %settings.datafeed.rest_url,
        ws_url = %settings.datafeed.ws_url,
        "starting crypto charts"
    );

    let datafeed = Arc::new(BinanceDatafeed::new(settings.datafeed.clone()));
    let mut status_rx = datafeed.status();
    let store = WatchlistStore::new(&settings.watchlist_dir);
    let (mut app, mut events_rx) = App::new(Arc::clone(&datafeed), store, &settings);

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        default_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.mount_visible();

    let mut last_draw = Instant::now();
    let draw_interval = Duration::from_millis(50);
    let mut dirty = true;

    let result: Result<(), Box<dyn Error>> = loop {
        if event::poll(Duration::from_millis(5))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !app.handle_key(key.code) {
                        break Ok(());
                    }
                    dirty = true;
                }
                Event::Resize(..) => dirty = true,
                _ => {}
            }
        }

        while let Ok(panel_event) = events_rx.try_recv() {
            dirty |= app.apply_event(panel_event);
        }

        dirty |= status_rx.has_changed().unwrap_or(false);

        if dirty && last_draw.elapsed() >= draw_interval {
            let status = *status_rx.borrow_and_update();
            terminal.draw(|f| app.draw(f, status))?;
            last_draw = Instant::now();
            dirty = false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    app.unmount_all();
    datafeed.shutdown();
    info!("stopped crypto charts");

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

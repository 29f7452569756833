/// Shared modules of the crypto charts dashboard
pub mod app;
pub mod chart;
pub mod dashboard;
pub mod feed;
pub mod logging;
pub mod persistence;
pub mod settings;
pub mod watchlist;
pub mod widget;

#[cfg(test)]
mod testing;

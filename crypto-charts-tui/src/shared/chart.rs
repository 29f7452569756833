//! Chart panel state: the charted pair, its resolution, and a bounded buffer of bars kept
//! current by live ticks.

use std::collections::{vec_deque, VecDeque};

use binance_datafeed::{
    symbol::display_name, Bar, DataFeedError, History, ListenerGuid, PeriodParams, Resolution,
};

use super::dashboard::PanelSlot;

/// Resolution every panel starts at (1 hour)
pub const DEFAULT_RESOLUTION: &str = "60";

/// Bar lengths of history requested when a panel mounts.
pub const HISTORY_BARS: i64 = 300;

/// Bars kept per panel
pub const MAX_BARS: usize = 1_000;

/// Ring buffer of the N most recent bars, ascending by open time.
#[derive(Debug, Clone)]
pub struct BarBuffer {
    bars: VecDeque<Bar>,
    max_size: usize,
}

impl BarBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(max_size.min(MAX_BARS)),
            max_size,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() >= self.max_size {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// Replace the buffer contents, keeping the newest bars that fit.
    pub fn reset(&mut self, bars: Vec<Bar>) {
        self.bars.clear();
        let skip = bars.len().saturating_sub(self.max_size);
        self.bars.extend(bars.into_iter().skip(skip));
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Bar> {
        self.bars.iter()
    }

    /// Last N bars as references
    pub fn last_n(&self, n: usize) -> Vec<&Bar> {
        let start = self.bars.len().saturating_sub(n);
        self.bars.range(start..).collect()
    }

    /// Lowest low and highest high of the last N bars
    pub fn price_range(&self, n: usize) -> Option<(f64, f64)> {
        self.last_n(n).into_iter().fold(None, |range, bar| match range {
            None => Some((bar.low, bar.high)),
            Some((low, high)) => Some((low.min(bar.low), high.max(bar.high))),
        })
    }

    fn last_mut(&mut self) -> Option<&mut Bar> {
        self.bars.back_mut()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelStatus {
    /// Waiting for history
    Loading,
    Ready,
    /// The exchange returned no bars for the requested period
    NoData,
    Failed(String),
}

/// How a live bar changed the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Update of the bar still forming
    Replaced,
    /// First tick of a new bar
    Appended,
    /// Older than the last bar
    Ignored,
}

/// One chart panel of the dashboard.
///
/// Each (re)target to a new symbol or resolution bumps the panel generation, which is part
/// of the listener guid. Data feed events carrying an older guid are stale and dropped.
#[derive(Debug, Clone)]
pub struct ChartPanel {
    slot: PanelSlot,
    symbol: String,
    resolution: Resolution,
    generation: u64,
    listener_guid: ListenerGuid,
    bars: BarBuffer,
    status: PanelStatus,
}

impl ChartPanel {
    pub fn new(slot: PanelSlot, symbol: &str, resolution: Resolution) -> Self {
        let listener_guid = listener_guid(slot, symbol, &resolution, 0);
        Self {
            slot,
            symbol: symbol.to_string(),
            resolution,
            generation: 0,
            listener_guid,
            bars: BarBuffer::new(MAX_BARS),
            status: PanelStatus::Loading,
        }
    }

    pub fn slot(&self) -> PanelSlot {
        self.slot
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn listener_guid(&self) -> &ListenerGuid {
        &self.listener_guid
    }

    pub fn bars(&self) -> &BarBuffer {
        &self.bars
    }

    pub fn status(&self) -> &PanelStatus {
        &self.status
    }

    /// Panel title, eg/ "BTC/USDT"
    pub fn title(&self) -> String {
        display_name(&self.symbol)
    }

    pub fn last_price(&self) -> Option<f64> {
        self.bars.last().map(|bar| bar.close)
    }

    /// Change of the last close against the first loaded open, in percent.
    pub fn change_pct(&self) -> Option<f64> {
        let first = self.bars.iter().next()?;
        let last = self.bars.last()?;
        (first.open > 0.0).then(|| (last.close - first.open) / first.open * 100.0)
    }

    /// Period of the history request made on mount: the last [`HISTORY_BARS`] bar lengths.
    pub fn history_period(&self, now_secs: i64) -> PeriodParams {
        PeriodParams {
            from: now_secs - HISTORY_BARS * self.resolution.duration_secs(),
            to: now_secs,
            first_data_request: true,
        }
    }

    /// Point the panel at another symbol and/or resolution. Clears the bars and returns the
    /// listener guid that must be unsubscribed.
    pub fn retarget(&mut self, symbol: &str, resolution: Resolution) -> ListenerGuid {
        self.generation += 1;
        self.symbol = symbol.to_string();
        self.resolution = resolution;
        self.bars.clear();
        self.status = PanelStatus::Loading;

        let guid = listener_guid(self.slot, &self.symbol, &self.resolution, self.generation);
        std::mem::replace(&mut self.listener_guid, guid)
    }

    /// Step the resolution through the advertised list. See [`ChartPanel::retarget`].
    pub fn cycle_resolution(&mut self, forward: bool) -> ListenerGuid {
        let resolution = if forward {
            self.resolution.next()
        } else {
            self.resolution.prev()
        };
        let symbol = self.symbol.clone();
        self.retarget(&symbol, resolution)
    }

    pub fn apply_history(&mut self, history: History) {
        match history {
            History::Bars(bars) => {
                self.bars.reset(bars);
                self.status = PanelStatus::Ready;
            }
            History::NoData => {
                self.bars.clear();
                self.status = PanelStatus::NoData;
            }
        }
    }

    pub fn apply_error(&mut self, error: &DataFeedError) {
        self.status = PanelStatus::Failed(error.to_string());
    }

    /// Merge a live bar: same open time replaces the last bar, a later one appends.
    pub fn apply_tick(&mut self, bar: Bar) -> TickOutcome {
        let outcome = match self.bars.last_mut() {
            Some(last) if bar.time == last.time => {
                *last = bar;
                TickOutcome::Replaced
            }
            Some(last) if bar.time < last.time => return TickOutcome::Ignored,
            _ => {
                self.bars.push(bar);
                TickOutcome::Appended
            }
        };

        if self.status != PanelStatus::Ready {
            self.status = PanelStatus::Ready;
        }
        outcome
    }
}

fn listener_guid(
    slot: PanelSlot,
    symbol: &str,
    resolution: &Resolution,
    generation: u64,
) -> ListenerGuid {
    ListenerGuid::new(format!(
        "{}_{}_{}#{}",
        slot.label(),
        symbol,
        resolution,
        generation
    ))
}

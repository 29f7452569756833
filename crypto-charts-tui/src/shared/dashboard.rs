//! Dashboard state: which pairs are charted, the view mode, focus, and the watchlist sidebar.
//!
//! Key input is mapped to [`DashboardAction`]s. The state here never talks to the data feed;
//! the main loop executes the actions (re-mounting chart panels, persisting the watchlist).

use crossterm::event::KeyCode;
use serde::{Deserialize, Serialize};

use super::watchlist::{filter_catalog, CatalogEntry, Watchlist};

/// Pairs offered by each chart panel's symbol selector, in selector order.
pub const CHART_SYMBOLS: [&str; 9] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT", "MATICUSDT",
    "NEOUSDT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Primary chart only
    Single,
    /// Primary and secondary charts side by side
    #[default]
    Split,
}

impl ViewMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "split" => Some(Self::Split),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Split => "SPLIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelSlot {
    Primary,
    Secondary,
}

impl PanelSlot {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Panel(PanelSlot),
}

/// Add menu of the watchlist sidebar
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddMenu {
    pub open: bool,
    pub search_term: String,
    pub cursor: usize,
}

/// Side effect the main loop performs after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardAction {
    None,
    Quit,
    /// A panel now charts `symbol`
    ShowSymbol { slot: PanelSlot, symbol: String },
    /// Step a panel's resolution forward or back
    CycleResolution { slot: PanelSlot, forward: bool },
    /// The secondary panel appears or disappears
    ViewModeChanged(ViewMode),
    /// Watchlist items changed and should be persisted
    WatchlistChanged,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    primary_symbol: String,
    secondary_symbol: String,
    view_mode: ViewMode,
    focus: Focus,
    watchlist: Watchlist,
    selected: usize,
    add_menu: AddMenu,
}

impl Dashboard {
    pub fn new(
        primary_symbol: impl Into<String>,
        secondary_symbol: impl Into<String>,
        view_mode: ViewMode,
        watchlist: Watchlist,
    ) -> Self {
        Self {
            primary_symbol: primary_symbol.into(),
            secondary_symbol: secondary_symbol.into(),
            view_mode,
            focus: Focus::Sidebar,
            watchlist,
            selected: 0,
            add_menu: AddMenu::default(),
        }
    }

    pub fn symbol(&self, slot: PanelSlot) -> &str {
        match slot {
            PanelSlot::Primary => &self.primary_symbol,
            PanelSlot::Secondary => &self.secondary_symbol,
        }
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    /// Sidebar cursor position
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn add_menu(&self) -> &AddMenu {
        &self.add_menu
    }

    /// Panels shown in the current view mode.
    pub fn visible_slots(&self) -> Vec<PanelSlot> {
        match self.view_mode {
            ViewMode::Single => vec![PanelSlot::Primary],
            ViewMode::Split => vec![PanelSlot::Primary, PanelSlot::Secondary],
        }
    }

    pub fn set_symbol(&mut self, slot: PanelSlot, symbol: &str) -> DashboardAction {
        let current = match slot {
            PanelSlot::Primary => &mut self.primary_symbol,
            PanelSlot::Secondary => &mut self.secondary_symbol,
        };

        if current.as_str() == symbol {
            return DashboardAction::None;
        }

        *current = symbol.to_string();
        DashboardAction::ShowSymbol {
            slot,
            symbol: symbol.to_string(),
        }
    }

    /// Chart the watchlist item at `index` in the primary panel.
    pub fn select_watchlist_item(&mut self, index: usize) -> DashboardAction {
        let Some(symbol) = self.watchlist.get(index).map(|item| item.symbol.clone()) else {
            return DashboardAction::None;
        };
        self.selected = index;
        self.set_symbol(PanelSlot::Primary, &symbol)
    }

    /// Step a panel through [`CHART_SYMBOLS`]. A symbol outside the selector list starts
    /// from either end.
    pub fn cycle_symbol(&mut self, slot: PanelSlot, forward: bool) -> DashboardAction {
        let count = CHART_SYMBOLS.len();
        let position = CHART_SYMBOLS
            .iter()
            .position(|symbol| *symbol == self.symbol(slot));

        let next = match (position, forward) {
            (Some(index), true) => (index + 1) % count,
            (Some(index), false) => (index + count - 1) % count,
            (None, true) => 0,
            (None, false) => count - 1,
        };

        self.set_symbol(slot, CHART_SYMBOLS[next])
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) -> DashboardAction {
        if self.view_mode == view_mode {
            return DashboardAction::None;
        }

        self.view_mode = view_mode;
        if view_mode == ViewMode::Single && self.focus == Focus::Panel(PanelSlot::Secondary) {
            self.focus = Focus::Panel(PanelSlot::Primary);
        }
        DashboardAction::ViewModeChanged(view_mode)
    }

    pub fn focus_next(&mut self) {
        self.focus = match (self.focus, self.view_mode) {
            (Focus::Sidebar, _) => Focus::Panel(PanelSlot::Primary),
            (Focus::Panel(PanelSlot::Primary), ViewMode::Split) => {
                Focus::Panel(PanelSlot::Secondary)
            }
            (Focus::Panel(_), _) => Focus::Sidebar,
        };
    }

    pub fn focus_prev(&mut self) {
        self.focus = match (self.focus, self.view_mode) {
            (Focus::Sidebar, ViewMode::Split) => Focus::Panel(PanelSlot::Secondary),
            (Focus::Sidebar, ViewMode::Single) => Focus::Panel(PanelSlot::Primary),
            (Focus::Panel(PanelSlot::Secondary), _) => Focus::Panel(PanelSlot::Primary),
            (Focus::Panel(PanelSlot::Primary), _) => Focus::Sidebar,
        };
    }

    pub fn toggle_add_menu(&mut self) {
        self.add_menu = AddMenu {
            open: !self.add_menu.open,
            ..AddMenu::default()
        };
        self.focus = Focus::Sidebar;
    }

    /// Catalog entries matching the search term, each flagged if already watched.
    pub fn add_menu_entries(&self) -> Vec<(&'static CatalogEntry, bool)> {
        filter_catalog(&self.add_menu.search_term)
            .into_iter()
            .map(|entry| (entry, self.watchlist.contains(entry.symbol)))
            .collect()
    }

    /// Add the matching catalog entry at `index`, then close the menu and clear the search.
    pub fn choose_catalog_entry(&mut self, index: usize) -> DashboardAction {
        let Some(entry) = filter_catalog(&self.add_menu.search_term).get(index).copied() else {
            return DashboardAction::None;
        };

        let added = self.watchlist.add(entry.symbol, Some(entry.name));
        self.add_menu = AddMenu::default();

        if added {
            DashboardAction::WatchlistChanged
        } else {
            DashboardAction::None
        }
    }

    /// Remove the watchlist item under the sidebar cursor.
    pub fn remove_selected(&mut self) -> DashboardAction {
        let Some(symbol) = self.watchlist.get(self.selected).map(|item| item.symbol.clone())
        else {
            return DashboardAction::None;
        };

        self.watchlist.remove(&symbol);
        self.selected = self.selected.min(self.watchlist.len().saturating_sub(1));
        DashboardAction::WatchlistChanged
    }

    /// Map one key press to state changes and the resulting action.
    pub fn handle_key(&mut self, code: KeyCode) -> DashboardAction {
        if self.add_menu.open {
            return self.handle_add_menu_key(code);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => DashboardAction::Quit,
            KeyCode::Tab => {
                self.focus_next();
                DashboardAction::None
            }
            KeyCode::BackTab => {
                self.focus_prev();
                DashboardAction::None
            }
            KeyCode::Char('1') => self.set_view_mode(ViewMode::Single),
            KeyCode::Char('2') => self.set_view_mode(ViewMode::Split),
            KeyCode::Char('a') | KeyCode::Char('+') => {
                self.toggle_add_menu();
                DashboardAction::None
            }
            code => match self.focus {
                Focus::Sidebar => self.handle_sidebar_key(code),
                Focus::Panel(slot) => self.handle_panel_key(slot, code),
            },
        }
    }

    fn handle_sidebar_key(&mut self, code: KeyCode) -> DashboardAction {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                DashboardAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.watchlist.len() {
                    self.selected += 1;
                }
                DashboardAction::None
            }
            KeyCode::Enter => self.select_watchlist_item(self.selected),
            KeyCode::Delete | KeyCode::Char('d') | KeyCode::Char('x') => self.remove_selected(),
            _ => DashboardAction::None,
        }
    }

    fn handle_panel_key(&mut self, slot: PanelSlot, code: KeyCode) -> DashboardAction {
        match code {
            KeyCode::Left | KeyCode::Char('h') => self.cycle_symbol(slot, false),
            KeyCode::Right | KeyCode::Char('l') => self.cycle_symbol(slot, true),
            KeyCode::Char('-') | KeyCode::Char('[') => DashboardAction::CycleResolution {
                slot,
                forward: false,
            },
            KeyCode::Char('=') | KeyCode::Char(']') => DashboardAction::CycleResolution {
                slot,
                forward: true,
            },
            _ => DashboardAction::None,
        }
    }

    fn handle_add_menu_key(&mut self, code: KeyCode) -> DashboardAction {
        match code {
            KeyCode::Esc => {
                self.add_menu = AddMenu::default();
                DashboardAction::None
            }
            KeyCode::Enter => self.choose_catalog_entry(self.add_menu.cursor),
            KeyCode::Up => {
                self.add_menu.cursor = self.add_menu.cursor.saturating_sub(1);
                DashboardAction::None
            }
            KeyCode::Down => {
                let matches = filter_catalog(&self.add_menu.search_term).len();
                if self.add_menu.cursor + 1 < matches {
                    self.add_menu.cursor += 1;
                }
                DashboardAction::None
            }
            KeyCode::Backspace => {
                self.add_menu.search_term.pop();
                self.add_menu.cursor = 0;
                DashboardAction::None
            }
            KeyCode::Char(c) => {
                self.add_menu.search_term.push(c);
                self.add_menu.cursor = 0;
                DashboardAction::None
            }
            _ => DashboardAction::None,
        }
    }
}

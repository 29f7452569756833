//! Application state of the dashboard binary: the dashboard, its chart panels and the side
//! effects of each [`DashboardAction`].

use std::sync::Arc;

use binance_datafeed::{ChartDatafeed, ConnectionStatus, Resolution};
use chrono::Utc;
use crossterm::event::KeyCode;
use ratatui::Frame;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use super::{
    chart::{ChartPanel, DEFAULT_RESOLUTION},
    dashboard::{Dashboard, DashboardAction, PanelSlot},
    feed::{mount_panel, unmount_panel, PanelEvent},
    persistence::WatchlistStore,
    settings::AppSettings,
    watchlist::Watchlist,
    widget::render_dashboard,
};

pub struct App<D> {
    datafeed: Arc<D>,
    store: WatchlistStore,
    dashboard: Dashboard,
    primary: ChartPanel,
    secondary: ChartPanel,
    primary_mount: Option<JoinHandle<()>>,
    secondary_mount: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<PanelEvent>,
}

impl<D> App<D>
where
    D: ChartDatafeed + 'static,
{
    /// Build the app from `settings`, loading the stored watchlist. Nothing is mounted until
    /// [`App::mount_visible`].
    pub fn new(
        datafeed: Arc<D>,
        store: WatchlistStore,
        settings: &AppSettings,
    ) -> (Self, mpsc::UnboundedReceiver<PanelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watchlist = Watchlist::new(store.load());
        info!(
            path = %store.path().display(),
            count = watchlist.len(),
            "loaded watchlist"
        );

        let dashboard = Dashboard::new(
            settings.primary_symbol.as_str(),
            settings.secondary_symbol.as_str(),
            settings.view_mode,
            watchlist,
        );
        let primary = ChartPanel::new(
            PanelSlot::Primary,
            dashboard.symbol(PanelSlot::Primary),
            Resolution::new(DEFAULT_RESOLUTION),
        );
        let secondary = ChartPanel::new(
            PanelSlot::Secondary,
            dashboard.symbol(PanelSlot::Secondary),
            Resolution::new(DEFAULT_RESOLUTION),
        );

        let app = Self {
            datafeed,
            store,
            dashboard,
            primary,
            secondary,
            primary_mount: None,
            secondary_mount: None,
            events_tx,
        };
        (app, events_rx)
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn panel(&self, slot: PanelSlot) -> &ChartPanel {
        match slot {
            PanelSlot::Primary => &self.primary,
            PanelSlot::Secondary => &self.secondary,
        }
    }

    fn is_visible(&self, slot: PanelSlot) -> bool {
        self.dashboard.visible_slots().contains(&slot)
    }

    pub fn mount_visible(&mut self) {
        for slot in self.dashboard.visible_slots() {
            self.mount(slot);
        }
    }

    fn mount(&mut self, slot: PanelSlot) {
        let now_secs = Utc::now().timestamp();
        let (panel, mount) = match slot {
            PanelSlot::Primary => (&self.primary, &mut self.primary_mount),
            PanelSlot::Secondary => (&self.secondary, &mut self.secondary_mount),
        };

        let handle = mount_panel(
            Arc::clone(&self.datafeed),
            panel,
            now_secs,
            self.events_tx.clone(),
        );
        if let Some(previous) = mount.replace(handle) {
            previous.abort();
        }
    }

    /// Stop a pending mount of `slot` and release `guid`.
    fn unmount(&mut self, slot: PanelSlot, guid: &binance_datafeed::ListenerGuid) {
        let mount = match slot {
            PanelSlot::Primary => &mut self.primary_mount,
            PanelSlot::Secondary => &mut self.secondary_mount,
        };
        if let Some(handle) = mount.take() {
            handle.abort();
        }
        unmount_panel(self.datafeed.as_ref(), guid);
    }

    /// Retarget `slot`, releasing the old listener and mounting the new one when visible.
    fn remount<F>(&mut self, slot: PanelSlot, retarget: F)
    where
        F: FnOnce(&mut ChartPanel) -> binance_datafeed::ListenerGuid,
    {
        let panel = match slot {
            PanelSlot::Primary => &mut self.primary,
            PanelSlot::Secondary => &mut self.secondary,
        };
        let released = retarget(panel);
        let visible = self.is_visible(slot);

        self.unmount(slot, &released);
        if visible {
            self.mount(slot);
        }
    }

    /// Feed one key press to the dashboard and perform its action. Returns `false` on quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        let action = self.dashboard.handle_key(code);
        self.perform(action)
    }

    /// Perform the side effect of `action`. Returns `false` on quit.
    pub fn perform(&mut self, action: DashboardAction) -> bool {
        match action {
            DashboardAction::None => {}
            DashboardAction::Quit => return false,
            DashboardAction::ShowSymbol { slot, symbol } => {
                info!(slot = slot.label(), %symbol, "show symbol");
                self.remount(slot, |panel| {
                    let resolution = panel.resolution().clone();
                    panel.retarget(&symbol, resolution)
                });
            }
            DashboardAction::CycleResolution { slot, forward } => {
                self.remount(slot, |panel| panel.cycle_resolution(forward));
                info!(
                    slot = slot.label(),
                    resolution = %self.panel(slot).resolution(),
                    "changed resolution"
                );
            }
            DashboardAction::ViewModeChanged(view_mode) => {
                info!(view_mode = view_mode.label(), "changed view mode");
                // Fresh generation so events of an earlier secondary mount are stale
                self.remount(PanelSlot::Secondary, |panel| {
                    let symbol = panel.symbol().to_string();
                    let resolution = panel.resolution().clone();
                    panel.retarget(&symbol, resolution)
                });
            }
            DashboardAction::WatchlistChanged => {
                if let Err(error) = self.store.save(self.dashboard.watchlist().items()) {
                    warn!(path = %self.store.path().display(), %error, "failed to save watchlist");
                }
            }
        }
        true
    }

    /// Route a data feed event to the panel owning its guid. Events of released listeners
    /// are dropped, and a live bar for one releases that listener again.
    pub fn apply_event(&mut self, event: PanelEvent) -> bool {
        let panel = [&mut self.primary, &mut self.secondary]
            .into_iter()
            .find(|panel| panel.listener_guid() == event.guid());

        let Some(panel) = panel else {
            debug!(guid = %event.guid(), "dropping stale panel event");
            if let PanelEvent::Tick { guid, .. } = &event {
                unmount_panel(self.datafeed.as_ref(), guid);
            }
            return false;
        };

        match event {
            PanelEvent::History { result: Ok(history), .. } => panel.apply_history(history),
            PanelEvent::History { result: Err(error), .. } => panel.apply_error(&error),
            PanelEvent::Tick { bar, .. } => {
                panel.apply_tick(bar);
            }
        }
        true
    }

    pub fn draw(&self, f: &mut Frame, status: ConnectionStatus) {
        let secondary = self
            .is_visible(PanelSlot::Secondary)
            .then_some(&self.secondary);
        render_dashboard(f, &self.dashboard, &self.primary, secondary, status);
    }

    /// Release every visible panel's listener.
    pub fn unmount_all(&mut self) {
        for slot in self.dashboard.visible_slots() {
            let guid = self.panel(slot).listener_guid().clone();
            self.unmount(slot, &guid);
        }
    }
}

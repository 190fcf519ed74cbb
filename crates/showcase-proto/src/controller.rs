//! Controller: single owner of tile load state, the load queue and the
//! playback slot.
//!
//! The controller is sans-IO: it reacts to visibility edges, load completions
//! and play settlements, and tells a [`MediaHost`] what to do.  All of its
//! entry points run on one cooperative thread (the browser event loop, or the
//! simulator's core task), so the in-flight counter and the queue are the only
//! coordination it needs.  Completions arrive in any order.
//!
//! Per-tile failures never leave the controller: a load error marks the tile
//! and shows its indicator, an autoplay rejection leaves it paused.
use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ClickMode, Config, ExitPolicy};
use crate::error::{Result, ShowcaseError};
use crate::host::MediaHost;
use crate::manifest::ensure_unique;
use crate::tile::{
    LoadRequest, LoadState, LoadTicket, PlayOutcome, PlaybackAttributes, Preload, TileId,
    TileKey, TileSpec, VisibilityChange,
};

// ── Settings ──────────────────────────────────────────────────────────────────

/// The slice of [`Config`] the controller acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub max_concurrent: usize,
    pub preload: Preload,
    pub on_exit: ExitPolicy,
    pub cancel_in_flight: bool,
    pub threshold: f64,
    pub click: ClickMode,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.loader.max_concurrent,
            preload: config.loader.preload,
            on_exit: config.loader.on_exit,
            cancel_in_flight: config.loader.cancel_in_flight,
            threshold: config.observer.threshold,
            click: config.interaction.click,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Created,
    Running,
    TornDown,
}

#[derive(Debug, Clone)]
struct TileSlot {
    spec: TileSpec,
    state: LoadState,
    /// Last visibility edge seen for the tile.
    visible: bool,
    /// Ticket of the load currently owned by the host, if any.
    ticket: Option<LoadTicket>,
    /// A user asked to play this tile before it finished loading.
    play_when_ready: bool,
}

/// Serialisable view for reports and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub lifecycle: Lifecycle,
    pub in_flight: usize,
    pub queued: Vec<TileId>,
    pub playing: Option<TileId>,
    pub pending_play: Option<TileId>,
    pub tiles: Vec<TileSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileSnapshot {
    pub id: TileId,
    pub key: String,
    pub state: LoadState,
    pub visible: bool,
}

pub struct Controller {
    settings: ControllerSettings,
    tiles: Vec<TileSlot>,
    keys: HashMap<TileKey, TileId>,
    queue: VecDeque<TileId>,
    in_flight: usize,
    /// The playback slot.
    playing: Option<TileId>,
    /// Tile whose play request has not settled yet.
    pending_play: Option<TileId>,
    next_ticket: u64,
    lifecycle: Lifecycle,
}

impl Controller {
    pub fn new(settings: ControllerSettings, tiles: Vec<TileSpec>) -> Result<Self> {
        if settings.max_concurrent == 0 {
            return Err(ShowcaseError::InvalidConfig(
                "max_concurrent must be at least 1".into(),
            ));
        }
        ensure_unique(&tiles)?;

        let keys = tiles
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.key(), TileId(idx)))
            .collect();
        let tiles = tiles
            .into_iter()
            .map(|spec| TileSlot {
                spec,
                state: LoadState::Unloaded,
                visible: false,
                ticket: None,
                play_when_ready: false,
            })
            .collect();

        Ok(Self {
            settings,
            tiles,
            keys,
            queue: VecDeque::new(),
            in_flight: 0,
            playing: None,
            pending_play: None,
            next_ticket: 1,
            lifecycle: Lifecycle::Created,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Start observing every tile.  Tiles without a source are marked as
    /// failed right away.
    pub fn initialize(&mut self, host: &mut impl MediaHost) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Running => return Err(ShowcaseError::AlreadyInitialized),
            Lifecycle::TornDown => return Err(ShowcaseError::TornDown),
        }
        self.lifecycle = Lifecycle::Running;
        info!(
            "Controller: initialising {} tiles (max_concurrent={}, preload={:?}, on_exit={:?})",
            self.tiles.len(),
            self.settings.max_concurrent,
            self.settings.preload,
            self.settings.on_exit
        );

        for idx in 0..self.tiles.len() {
            let tile = TileId(idx);
            if self.tiles[idx].spec.src.trim().is_empty() {
                warn!(
                    "Controller: tile {} ({}) has no source",
                    tile,
                    self.tiles[idx].spec.key()
                );
                self.tiles[idx].state = LoadState::Error;
                host.show_error(tile);
            }
            host.observe(tile);
        }
        Ok(())
    }

    /// Stop observing and release every media element.  Must run exactly
    /// once before the page goes away; every event after it is ignored.
    pub fn teardown(&mut self, host: &mut impl MediaHost) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Running => {}
            Lifecycle::Created => return Err(ShowcaseError::NotInitialized),
            Lifecycle::TornDown => return Err(ShowcaseError::TornDown),
        }
        info!("Controller: teardown");
        self.lifecycle = Lifecycle::TornDown;
        host.disconnect();

        for idx in 0..self.tiles.len() {
            host.release(TileId(idx));
            let slot = &mut self.tiles[idx];
            slot.ticket = None;
            slot.visible = false;
            slot.play_when_ready = false;
            if slot.state != LoadState::Error {
                slot.state = LoadState::Unloaded;
            }
        }
        self.queue.clear();
        self.in_flight = 0;
        self.playing = None;
        self.pending_play = None;
        Ok(())
    }

    // ── Visibility ────────────────────────────────────────────────────────────

    /// Process one throttled batch in delivery order.
    pub fn on_visibility_batch(&mut self, host: &mut impl MediaHost, changes: &[VisibilityChange]) {
        for change in changes {
            let visible = change.is_visible(self.settings.threshold);
            self.on_visibility_change(host, change.tile, visible);
        }
    }

    pub fn on_visibility_change(
        &mut self,
        host: &mut impl MediaHost,
        tile: TileId,
        is_intersecting: bool,
    ) {
        if !self.accepts_events("visibility") {
            return;
        }
        let Some(slot) = self.tiles.get_mut(tile.0) else {
            warn!("Controller: visibility for unknown tile {}", tile);
            return;
        };
        if slot.visible == is_intersecting {
            return;
        }
        slot.visible = is_intersecting;
        host.set_active(tile, is_intersecting);

        if is_intersecting {
            self.on_enter(host, tile);
        } else {
            self.on_exit(host, tile);
        }
    }

    fn on_enter(&mut self, host: &mut impl MediaHost, tile: TileId) {
        let state = self.tiles[tile.0].state;
        debug!("Controller: {} entered ({})", tile, state.label());
        match state {
            LoadState::Unloaded => {
                self.enqueue(host, tile);
            }
            LoadState::Loaded => self.attempt_playback(host, tile),
            // Queued / Loading play once ready; Error stays put.
            LoadState::Queued | LoadState::Loading | LoadState::Error => {}
        }
    }

    fn on_exit(&mut self, host: &mut impl MediaHost, tile: TileId) {
        let state = self.tiles[tile.0].state;
        debug!("Controller: {} exited ({})", tile, state.label());
        self.tiles[tile.0].play_when_ready = false;

        if self.playing == Some(tile) {
            host.pause(tile);
            host.set_placeholder_visible(tile, true);
            self.playing = None;
        }
        if self.pending_play == Some(tile) {
            // The settlement will find the slot taken by nobody and back off.
            host.pause(tile);
            self.pending_play = None;
        }

        match state {
            LoadState::Loaded if self.settings.on_exit == ExitPolicy::Release => {
                debug!("Controller: releasing {}", tile);
                host.release(tile);
                let slot = &mut self.tiles[tile.0];
                slot.state = LoadState::Unloaded;
                slot.ticket = None;
            }
            LoadState::Loading if self.settings.cancel_in_flight => {
                debug!("Controller: cancelling in-flight load of {}", tile);
                host.release(tile);
                let slot = &mut self.tiles[tile.0];
                slot.state = LoadState::Unloaded;
                slot.ticket = None;
                self.finish_in_flight();
                self.drain_queue(host);
            }
            LoadState::Queued if self.settings.cancel_in_flight => {
                self.queue.retain(|t| *t != tile);
                self.tiles[tile.0].state = LoadState::Unloaded;
            }
            _ => {}
        }
    }

    // ── Admission control ─────────────────────────────────────────────────────

    /// Append `tile` to the load queue.  Anything but an unloaded tile is a
    /// no-op.  Returns whether the tile was queued.
    pub fn enqueue(&mut self, host: &mut impl MediaHost, tile: TileId) -> bool {
        if !self.accepts_events("enqueue") {
            return false;
        }
        let Some(slot) = self.tiles.get_mut(tile.0) else {
            warn!("Controller: enqueue for unknown tile {}", tile);
            return false;
        };
        if slot.state != LoadState::Unloaded {
            debug!(
                "Controller: enqueue {} ignored, already {}",
                tile,
                slot.state.label()
            );
            return false;
        }
        slot.state = LoadState::Queued;
        self.queue.push_back(tile);
        self.drain_queue(host);
        true
    }

    /// Start loads from the head of the queue until the cap is reached.
    pub fn drain_queue(&mut self, host: &mut impl MediaHost) {
        while self.in_flight < self.settings.max_concurrent {
            let Some(tile) = self.queue.pop_front() else {
                break;
            };
            self.begin_load(host, tile);
        }
    }

    fn begin_load(&mut self, host: &mut impl MediaHost, tile: TileId) {
        let slot = &mut self.tiles[tile.0];
        if slot.state != LoadState::Queued {
            debug!(
                "Controller: skip load of {}, state is {}",
                tile,
                slot.state.label()
            );
            return;
        }
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        slot.state = LoadState::Loading;
        slot.ticket = Some(ticket);
        self.in_flight += 1;

        debug!(
            "Controller: loading {} ({} in flight): {}",
            tile, self.in_flight, slot.spec.src
        );
        let request = LoadRequest {
            ticket,
            src: &slot.spec.src,
            preload: self.settings.preload,
            attributes: PlaybackAttributes::TILE,
        };
        host.begin_load(tile, &request);
    }

    fn finish_in_flight(&mut self) {
        debug_assert!(self.in_flight > 0, "in-flight count underflow");
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Whether a completion for `tile` matches the load the host currently
    /// owns.  Late events from released sources fail this check.
    fn owns_load(&self, tile: TileId, ticket: LoadTicket) -> bool {
        match self.tiles.get(tile.0) {
            Some(slot) => slot.state == LoadState::Loading && slot.ticket == Some(ticket),
            None => false,
        }
    }

    // ── Load completion ───────────────────────────────────────────────────────

    pub fn on_load_ready(&mut self, host: &mut impl MediaHost, tile: TileId, ticket: LoadTicket) {
        if !self.accepts_events("load-ready") {
            return;
        }
        if !self.owns_load(tile, ticket) {
            debug!("Controller: stale load-ready for {} ({:?})", tile, ticket);
            return;
        }
        let slot = &mut self.tiles[tile.0];
        slot.state = LoadState::Loaded;
        let wants_play = slot.visible || slot.play_when_ready;
        slot.play_when_ready = false;
        self.finish_in_flight();
        debug!("Controller: {} loaded ({} in flight)", tile, self.in_flight);

        // Scrolled away while fetching: the exit policy never saw it loaded.
        if !wants_play && self.settings.on_exit == ExitPolicy::Release {
            debug!("Controller: releasing {}, loaded off-screen", tile);
            host.release(tile);
            let slot = &mut self.tiles[tile.0];
            slot.state = LoadState::Unloaded;
            slot.ticket = None;
        }

        self.drain_queue(host);
        if wants_play {
            self.attempt_playback(host, tile);
        }
    }

    pub fn on_load_failed(
        &mut self,
        host: &mut impl MediaHost,
        tile: TileId,
        ticket: LoadTicket,
        reason: &str,
    ) {
        if !self.accepts_events("load-failed") {
            return;
        }
        if !self.owns_load(tile, ticket) {
            debug!("Controller: stale load error for {} ({:?})", tile, ticket);
            return;
        }
        let slot = &mut self.tiles[tile.0];
        warn!(
            "Controller: video {} ({}) failed to load: {}",
            tile,
            slot.spec.key(),
            reason
        );
        slot.state = LoadState::Error;
        slot.ticket = None;
        slot.play_when_ready = false;
        self.finish_in_flight();
        host.show_error(tile);
        self.drain_queue(host);
    }

    // ── Playback ──────────────────────────────────────────────────────────────

    /// Request playback of a loaded tile.  Whoever holds (or is about to
    /// hold) the slot is paused first.
    pub fn attempt_playback(&mut self, host: &mut impl MediaHost, tile: TileId) {
        if !self.accepts_events("playback") {
            return;
        }
        match self.tiles.get(tile.0) {
            Some(slot) if slot.state == LoadState::Loaded => {}
            Some(slot) => {
                debug!(
                    "Controller: playback of {} skipped, state is {}",
                    tile,
                    slot.state.label()
                );
                return;
            }
            None => {
                warn!("Controller: playback for unknown tile {}", tile);
                return;
            }
        }
        if self.playing == Some(tile) || self.pending_play == Some(tile) {
            return;
        }

        if let Some(prev) = self.playing.take() {
            debug!("Controller: pausing {} for {}", prev, tile);
            host.pause(prev);
            host.set_placeholder_visible(prev, true);
        }
        if let Some(prev) = self.pending_play.take() {
            host.pause(prev);
        }

        self.pending_play = Some(tile);
        host.request_play(tile);
    }

    pub fn on_play_settled(&mut self, host: &mut impl MediaHost, tile: TileId, outcome: PlayOutcome) {
        if !self.accepts_events("play-settled") {
            return;
        }
        if self.pending_play != Some(tile) {
            // Superseded or scrolled away while the request was pending.
            if outcome == PlayOutcome::Started {
                debug!("Controller: {} started after being superseded, pausing", tile);
                host.pause(tile);
            }
            return;
        }
        self.pending_play = None;

        match outcome {
            PlayOutcome::Started => {
                if self.tiles[tile.0].state != LoadState::Loaded {
                    host.pause(tile);
                    return;
                }
                self.playing = Some(tile);
                host.set_placeholder_visible(tile, false);
                debug!("Controller: {} playing", tile);
            }
            PlayOutcome::Rejected => {
                debug!(
                    "Controller: autoplay of video {} blocked by the browser, waiting for a gesture",
                    tile
                );
            }
        }
    }

    // ── User input ────────────────────────────────────────────────────────────

    /// Dedicated play affordance (a user gesture).
    pub fn on_play_request(&mut self, host: &mut impl MediaHost, tile: TileId) {
        if !self.accepts_events("play-request") {
            return;
        }
        let Some(state) = self.load_state(tile) else {
            warn!("Controller: play request for unknown tile {}", tile);
            return;
        };
        match state {
            LoadState::Loaded => self.attempt_playback(host, tile),
            LoadState::Unloaded => {
                self.tiles[tile.0].play_when_ready = true;
                self.enqueue(host, tile);
            }
            LoadState::Queued | LoadState::Loading => self.tiles[tile.0].play_when_ready = true,
            LoadState::Error => debug!("Controller: play request for failed tile {}", tile),
        }
    }

    /// Dedicated "view details" affordance.
    pub fn on_details_request(&mut self, host: &mut impl MediaHost, tile: TileId) {
        if !self.accepts_events("details-request") {
            return;
        }
        let Some(slot) = self.tiles.get(tile.0) else {
            warn!("Controller: details request for unknown tile {}", tile);
            return;
        };
        let route = slot.spec.detail_route();
        info!("Controller: opening {}", route);
        host.navigate(&route);
    }

    /// Click on the tile body.  Dispatch depends on the configured
    /// [`ClickMode`].
    pub fn on_tile_click(&mut self, host: &mut impl MediaHost, tile: TileId) {
        self.on_tile_click_as(host, tile, self.settings.click);
    }

    /// Click on the tile body with an explicit dispatch mode, for tiles whose
    /// markup cannot support the configured one.
    pub fn on_tile_click_as(&mut self, host: &mut impl MediaHost, tile: TileId, mode: ClickMode) {
        match mode {
            ClickMode::Split => self.on_play_request(host, tile),
            ClickMode::Legacy => {
                if self.playing == Some(tile) {
                    self.on_details_request(host, tile);
                } else {
                    self.on_play_request(host, tile);
                }
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    fn accepts_events(&self, what: &str) -> bool {
        if self.lifecycle == Lifecycle::Running {
            return true;
        }
        debug!("Controller: {} ignored while {:?}", what, self.lifecycle);
        false
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_id(&self, key: &TileKey) -> Option<TileId> {
        self.keys.get(key).copied()
    }

    pub fn load_state(&self, tile: TileId) -> Option<LoadState> {
        self.tiles.get(tile.0).map(|s| s.state)
    }

    pub fn is_visible(&self, tile: TileId) -> bool {
        self.tiles.get(tile.0).is_some_and(|s| s.visible)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn queued(&self) -> impl Iterator<Item = TileId> + '_ {
        self.queue.iter().copied()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn playing(&self) -> Option<TileId> {
        self.playing
    }

    pub fn pending_play(&self) -> Option<TileId> {
        self.pending_play
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            lifecycle: self.lifecycle,
            in_flight: self.in_flight,
            queued: self.queue.iter().copied().collect(),
            playing: self.playing,
            pending_play: self.pending_play,
            tiles: self
                .tiles
                .iter()
                .enumerate()
                .map(|(idx, slot)| TileSnapshot {
                    id: TileId(idx),
                    key: slot.spec.key().to_string(),
                    state: slot.state,
                    visible: slot.visible,
                })
                .collect(),
        }
    }
}

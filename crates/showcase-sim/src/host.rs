//! SimHost: a `MediaHost` whose media elements live in memory and whose
//! network and autoplay policy are driven by a seeded RNG.
//!
//! Every load and play request spawns a tokio task that sleeps a random
//! latency and then posts the outcome back into the `SimCore` loop.  The
//! host never calls the controller itself; all completions arrive as
//! `SimEvent`s so the controller is only touched from the loop.
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use showcase_proto::host::MediaHost;
use showcase_proto::tile::{DetailRoute, LoadRequest, LoadTicket, PlayOutcome, TileId};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::core::SimEvent;
use crate::scenario::MediaProfile;

// ── SimMedia ──────────────────────────────────────────────────────────────────

/// What one simulated `<video>` element looks like right now.
#[derive(Debug, Clone)]
pub struct SimMedia {
    pub src: Option<String>,
    /// Ticket of the fetch the element is running, if any.
    pub fetching: Option<LoadTicket>,
    pub playing: bool,
    pub active: bool,
    pub error_shown: bool,
    pub placeholder_visible: bool,
    /// Bumped on every pause/release so in-flight play requests can tell
    /// they were aborted.
    play_epoch: u64,
}

impl Default for SimMedia {
    fn default() -> Self {
        Self {
            src: None,
            fetching: None,
            playing: false,
            active: false,
            error_shown: false,
            placeholder_visible: true,
            play_epoch: 0,
        }
    }
}

/// Counters the report is built from.
#[derive(Debug, Clone, Default)]
pub struct HostStats {
    pub loads_started: usize,
    pub loads_failed: usize,
    pub plays_requested: usize,
    pub plays_started: usize,
    pub plays_rejected: usize,
    pub releases: usize,
    pub navigations: Vec<String>,
}

// ── SimHost ───────────────────────────────────────────────────────────────────

pub struct SimHost {
    media: Vec<SimMedia>,
    observing: Vec<TileId>,
    profile: MediaProfile,
    rng: StdRng,
    event_tx: mpsc::Sender<SimEvent>,
    stats: HostStats,
}

impl SimHost {
    pub fn new(
        tiles: usize,
        profile: MediaProfile,
        seed: u64,
        event_tx: mpsc::Sender<SimEvent>,
    ) -> Self {
        Self {
            media: vec![SimMedia::default(); tiles],
            observing: Vec::new(),
            profile,
            rng: StdRng::seed_from_u64(seed),
            event_tx,
            stats: HostStats::default(),
        }
    }

    pub fn media(&self, tile: TileId) -> Option<&SimMedia> {
        self.media.get(tile.0)
    }

    pub fn observing(&self) -> &[TileId] {
        &self.observing
    }

    pub fn stats(&self) -> &HostStats {
        &self.stats
    }

    pub fn playing_count(&self) -> usize {
        self.media.iter().filter(|m| m.playing).count()
    }

    pub fn fetching_count(&self) -> usize {
        self.media.iter().filter(|m| m.fetching.is_some()).count()
    }

    /// A load task finished.  Returns true when the element was still
    /// running that fetch; the controller decides separately whether the
    /// ticket is current.
    pub fn finish_load(&mut self, tile: TileId, ticket: LoadTicket, ok: bool) -> bool {
        let Some(media) = self.media.get_mut(tile.0) else {
            return false;
        };
        if media.fetching != Some(ticket) {
            trace!("host: {} dropped completion for {:?}", tile, ticket);
            return false;
        }
        media.fetching = None;
        if !ok {
            self.stats.loads_failed += 1;
        }
        true
    }

    /// A play task finished.  A request is rejected when the autoplay policy
    /// said no, when the element was paused or released in the meantime, or
    /// when it has no source.
    pub fn finish_play(&mut self, tile: TileId, epoch: u64, allowed: bool) -> PlayOutcome {
        let Some(media) = self.media.get_mut(tile.0) else {
            return PlayOutcome::Rejected;
        };
        let started = allowed && media.play_epoch == epoch && media.src.is_some();
        if started {
            media.playing = true;
            self.stats.plays_started += 1;
            PlayOutcome::Started
        } else {
            self.stats.plays_rejected += 1;
            PlayOutcome::Rejected
        }
    }

    fn sample_ms(&mut self, range: [u64; 2]) -> Duration {
        let (lo, hi) = (range[0].min(range[1]), range[0].max(range[1]));
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }

    fn sample_bool(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn post_later(&self, delay: Duration, event: SimEvent) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Loop already gone after teardown; nothing left to tell.
            let _ = tx.send(event).await;
        });
    }

    fn interrupt(&mut self, tile: TileId) {
        let media = &mut self.media[tile.0];
        media.playing = false;
        media.play_epoch += 1;
    }
}

impl MediaHost for SimHost {
    fn observe(&mut self, tile: TileId) {
        self.observing.push(tile);
    }

    fn disconnect(&mut self) {
        self.observing.clear();
    }

    fn set_active(&mut self, tile: TileId, active: bool) {
        self.media[tile.0].active = active;
    }

    fn begin_load(&mut self, tile: TileId, request: &LoadRequest<'_>) {
        if let Some(previous) = self.media[tile.0].fetching {
            warn!("host: {} restarted while {:?} was in flight", tile, previous);
        }
        let delay = self.sample_ms(self.profile.load_ms);
        let ok = !self.sample_bool(self.profile.fail_rate);

        let media = &mut self.media[tile.0];
        media.src = Some(request.src.to_string());
        media.fetching = Some(request.ticket);
        self.stats.loads_started += 1;
        debug!(
            "host: {} fetching {} ({}, {}ms)",
            tile,
            request.src,
            request.preload.attribute(),
            delay.as_millis()
        );

        self.post_later(
            delay,
            SimEvent::LoadSettled {
                tile,
                ticket: request.ticket,
                ok,
            },
        );
    }

    fn release(&mut self, tile: TileId) {
        self.interrupt(tile);
        let media = &mut self.media[tile.0];
        media.src = None;
        media.fetching = None;
        self.stats.releases += 1;
    }

    fn request_play(&mut self, tile: TileId) {
        let delay = self.sample_ms(self.profile.play_ms);
        let allowed = !self.sample_bool(self.profile.autoplay_reject_rate);
        let epoch = self.media[tile.0].play_epoch;
        self.stats.plays_requested += 1;
        self.post_later(
            delay,
            SimEvent::PlaySettled {
                tile,
                epoch,
                allowed,
            },
        );
    }

    fn pause(&mut self, tile: TileId) {
        self.interrupt(tile);
    }

    fn set_placeholder_visible(&mut self, tile: TileId, visible: bool) {
        self.media[tile.0].placeholder_visible = visible;
    }

    fn show_error(&mut self, tile: TileId) {
        self.media[tile.0].error_shown = true;
    }

    fn navigate(&mut self, route: &DetailRoute) {
        debug!("host: navigate to {}", route);
        self.stats.navigations.push(route.path());
    }
}

//! A small model of a page full of media elements, for driving the
//! controller from integration tests.
#![allow(dead_code)]

use showcase_proto::controller::Controller;
use showcase_proto::host::MediaHost;
use showcase_proto::tile::{DetailRoute, LoadRequest, LoadState, LoadTicket, TileId};

#[derive(Debug, Clone, Default)]
pub struct Media {
    pub src: Option<String>,
    pub fetching: bool,
    /// Ticket of the fetch the element is currently running.
    pub current: Option<LoadTicket>,
    pub playing: bool,
    pub active: bool,
    pub error_shown: bool,
    pub placeholder_visible: bool,
}

#[derive(Debug, Clone)]
pub struct PendingPlay {
    pub tile: TileId,
    /// `pause()` ran before the request settled; the browser rejects it.
    pub aborted: bool,
}

#[derive(Debug, Default)]
pub struct ModelHost {
    pub media: Vec<Media>,
    pub observing: Vec<TileId>,
    pub pending_loads: Vec<(TileId, LoadTicket)>,
    pub pending_plays: Vec<PendingPlay>,
    pub navigations: Vec<String>,
}

impl ModelHost {
    pub fn new(tiles: usize) -> Self {
        Self {
            media: (0..tiles)
                .map(|_| Media {
                    placeholder_visible: true,
                    ..Media::default()
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn playing_count(&self) -> usize {
        self.media.iter().filter(|m| m.playing).count()
    }

    pub fn fetching_count(&self) -> usize {
        self.media.iter().filter(|m| m.fetching).count()
    }

    /// Resolve the pending load at `idx`.
    pub fn complete_load(&mut self, controller: &mut Controller, idx: usize, ok: bool) {
        let (tile, ticket) = self.pending_loads.remove(idx);
        let media = &mut self.media[tile.0];
        if media.current == Some(ticket) {
            media.fetching = false;
            media.current = None;
        }
        if ok {
            controller.on_load_ready(self, tile, ticket);
        } else {
            controller.on_load_failed(self, tile, ticket, "decode error");
        }
    }

    /// Resolve the pending play request at `idx`.
    pub fn settle_play(&mut self, controller: &mut Controller, idx: usize, allowed: bool) {
        use showcase_proto::tile::PlayOutcome;

        let pending = self.pending_plays.remove(idx);
        let media = &mut self.media[pending.tile.0];
        let started = allowed && !pending.aborted && media.src.is_some();
        if started {
            media.playing = true;
        }
        let outcome = if started {
            PlayOutcome::Started
        } else {
            PlayOutcome::Rejected
        };
        controller.on_play_settled(self, pending.tile, outcome);
    }
}

impl MediaHost for ModelHost {
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
        let media = &mut self.media[tile.0];
        assert!(!media.fetching, "double load of {}", tile);
        media.src = Some(request.src.to_string());
        media.fetching = true;
        media.current = Some(request.ticket);
        self.pending_loads.push((tile, request.ticket));
    }

    fn release(&mut self, tile: TileId) {
        let media = &mut self.media[tile.0];
        media.src = None;
        media.playing = false;
        // A released element stops fetching; its events may still trickle in,
        // which the ticket check must absorb, so the pending entry stays.
        media.fetching = false;
        media.current = None;
        for p in self.pending_plays.iter_mut().filter(|p| p.tile == tile) {
            p.aborted = true;
        }
    }

    fn request_play(&mut self, tile: TileId) {
        self.pending_plays.push(PendingPlay {
            tile,
            aborted: false,
        });
    }

    fn pause(&mut self, tile: TileId) {
        self.media[tile.0].playing = false;
        for p in self.pending_plays.iter_mut().filter(|p| p.tile == tile) {
            p.aborted = true;
        }
    }

    fn set_placeholder_visible(&mut self, tile: TileId, visible: bool) {
        self.media[tile.0].placeholder_visible = visible;
    }

    fn show_error(&mut self, tile: TileId) {
        self.media[tile.0].error_shown = true;
    }

    fn navigate(&mut self, route: &DetailRoute) {
        self.navigations.push(route.path());
    }
}

/// Whether `from -> to` is a legal load-state step.
pub fn legal_transition(
    from: LoadState,
    to: LoadState,
    cancel_in_flight: bool,
    release_on_exit: bool,
) -> bool {
    use LoadState::*;
    if from == to {
        return true;
    }
    match (from, to) {
        (Unloaded, Queued) | (Queued, Loading) | (Loading, Loaded) | (Loading, Error) => true,
        // enqueue drains synchronously, so a single step may skip Queued
        (Unloaded, Loading) => true,
        (Loaded, Unloaded) => true,
        (Queued, Unloaded) => cancel_in_flight,
        // cancelled, or finished off-screen and released in the same step
        (Loading, Unloaded) => cancel_in_flight || release_on_exit,
        _ => false,
    }
}

//! The seam between the controller and whatever owns the media elements.
//!
//! The controller never touches a media element directly.  It tells the host
//! what to do and the host reports back asynchronously through
//! `Controller::on_load_ready`, `on_load_failed` and `on_play_settled`.
//! Host methods must not call back into the controller synchronously.

use crate::tile::{DetailRoute, LoadRequest, TileId};

pub trait MediaHost {
    /// Start delivering visibility edges for `tile`.
    fn observe(&mut self, tile: TileId);

    /// Stop delivering visibility edges for every tile.
    fn disconnect(&mut self);

    /// Toggle the tile's "active" visual state.
    fn set_active(&mut self, tile: TileId, active: bool);

    /// Assign the source and playback attributes, then start fetching.
    /// Completion must be reported with `request.ticket`.
    fn begin_load(&mut self, tile: TileId, request: &LoadRequest<'_>);

    /// Pause and drop the source so the decoder and buffers are reclaimed.
    fn release(&mut self, tile: TileId);

    /// Ask the media element to start playing.  Settles later with
    /// `Controller::on_play_settled`.
    fn request_play(&mut self, tile: TileId);

    fn pause(&mut self, tile: TileId);

    fn set_placeholder_visible(&mut self, tile: TileId, visible: bool);

    /// Replace the media with the tile's inline error indicator.
    fn show_error(&mut self, tile: TileId);

    fn navigate(&mut self, route: &DetailRoute);
}

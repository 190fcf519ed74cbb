//! DomHost: `MediaHost` over the page's `<video>` elements.
//!
//! Every call is a plain synchronous DOM mutation.  Completion comes back
//! later: load events through the listeners `page` installs, play promises
//! through `spawn_local`.  Both re-enter via the shared `Page` cell, never
//! from inside a host call.
use std::cell::RefCell;
use std::rc::Weak;

use showcase_proto::host::MediaHost;
use showcase_proto::tile::{DetailRoute, LoadRequest, LoadTicket, PlayOutcome, TileId};
use tracing::{debug, warn};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{HtmlElement, HtmlVideoElement, IntersectionObserver, Location};

use crate::markup::ACTIVE_CLASS;
use crate::page::Page;

/// DOM handles for one tile.
pub struct TileDom {
    pub container: HtmlElement,
    pub video: HtmlVideoElement,
    pub error: Option<HtmlElement>,
    pub placeholder: Option<HtmlElement>,
}

pub struct DomHost {
    tiles: Vec<TileDom>,
    /// Ticket of the fetch each element is running.
    tickets: Vec<Option<LoadTicket>>,
    observer: Option<IntersectionObserver>,
    location: Location,
    page: Weak<RefCell<Page>>,
}

impl DomHost {
    pub fn new(tiles: Vec<TileDom>, location: Location) -> Self {
        let count = tiles.len();
        Self {
            tiles,
            tickets: vec![None; count],
            observer: None,
            location,
            page: Weak::new(),
        }
    }

    pub fn attach(&mut self, page: Weak<RefCell<Page>>, observer: IntersectionObserver) {
        self.page = page;
        self.observer = Some(observer);
    }

    pub fn tile(&self, tile: TileId) -> Option<&TileDom> {
        self.tiles.get(tile.0)
    }

    /// Hand out the ticket for a finished fetch, once.
    pub fn take_ticket(&mut self, tile: TileId) -> Option<LoadTicket> {
        self.tickets.get_mut(tile.0)?.take()
    }

    fn video(&self, tile: TileId) -> Option<&HtmlVideoElement> {
        self.tiles.get(tile.0).map(|t| &t.video)
    }
}

fn set_display(el: &HtmlElement, value: &str) {
    if let Err(e) = el.style().set_property("display", value) {
        debug!("dom: could not set display: {:?}", e);
    }
}

impl MediaHost for DomHost {
    fn observe(&mut self, tile: TileId) {
        if let (Some(observer), Some(dom)) = (&self.observer, self.tiles.get(tile.0)) {
            observer.observe(&dom.container);
        }
    }

    fn disconnect(&mut self) {
        if let Some(observer) = &self.observer {
            observer.disconnect();
        }
    }

    fn set_active(&mut self, tile: TileId, active: bool) {
        if let Some(dom) = self.tiles.get(tile.0) {
            let _ = dom
                .container
                .class_list()
                .toggle_with_force(ACTIVE_CLASS, active);
        }
    }

    fn begin_load(&mut self, tile: TileId, request: &LoadRequest<'_>) {
        let Some(video) = self.video(tile) else {
            return;
        };
        let attrs = request.attributes;
        video.set_preload(request.preload.attribute());
        video.set_muted(attrs.muted);
        video.set_loop(attrs.looped);
        video.set_autoplay(attrs.autoplay);
        if attrs.inline {
            let _ = video.set_attribute("playsinline", "");
        }
        video.set_src(request.src);
        video.load();
        self.tickets[tile.0] = Some(request.ticket);
    }

    fn release(&mut self, tile: TileId) {
        let Some(video) = self.video(tile) else {
            return;
        };
        let _ = video.pause();
        let _ = video.remove_attribute("src");
        // Reset the element so the browser drops the decoder and buffers.
        video.load();
        self.tickets[tile.0] = None;
    }

    fn request_play(&mut self, tile: TileId) {
        let Some(video) = self.video(tile) else {
            return;
        };
        let promise = video.play();
        let page = self.page.clone();
        spawn_local(async move {
            let outcome = match promise {
                Ok(promise) => match JsFuture::from(promise).await {
                    Ok(_) => PlayOutcome::Started,
                    Err(reason) => {
                        debug!("dom: play of {} refused: {}", tile, describe(&reason));
                        PlayOutcome::Rejected
                    }
                },
                Err(reason) => {
                    debug!("dom: play of {} threw: {}", tile, describe(&reason));
                    PlayOutcome::Rejected
                }
            };
            Page::with(&page, |page| page.on_play_settled(tile, outcome));
        });
    }

    fn pause(&mut self, tile: TileId) {
        if let Some(video) = self.video(tile) {
            let _ = video.pause();
        }
    }

    fn set_placeholder_visible(&mut self, tile: TileId, visible: bool) {
        if let Some(el) = self.tiles.get(tile.0).and_then(|t| t.placeholder.as_ref()) {
            set_display(el, if visible { "" } else { "none" });
        }
    }

    fn show_error(&mut self, tile: TileId) {
        match self.tiles.get(tile.0).and_then(|t| t.error.as_ref()) {
            Some(el) => set_display(el, "flex"),
            None => warn!("dom: {} failed and has no error indicator", tile),
        }
    }

    fn navigate(&mut self, route: &DetailRoute) {
        if let Err(e) = self.location.set_href(&route.path()) {
            warn!("dom: navigation to {} failed: {}", route, describe(&e));
        }
    }
}

/// Best-effort text for a thrown JS value.
pub fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("name"))
                .ok()
                .and_then(|name| name.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

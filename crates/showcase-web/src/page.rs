//! Page: the controller, its DOM host and the browser wiring around them.
//!
//! One `Page` per document, shared as `Rc<RefCell<Page>>`.  Every browser
//! callback (observer, media events, clicks, timers, play promises) holds a
//! `Weak` to it and borrows it exactly once per callback.
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use showcase_proto::config::{ClickMode, Config};
use showcase_proto::controller::{Controller, ControllerSettings};
use showcase_proto::diagnostics::Diagnostics;
use showcase_proto::platform::HostEnv;
use showcase_proto::sources::SourceResolver;
use showcase_proto::throttle::VisibilityBatcher;
use showcase_proto::tile::{PlayOutcome, TileId, VisibilityChange};
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Event, EventTarget, HtmlElement, HtmlVideoElement, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverInit, PageTransitionEvent, Window,
};

use crate::dom_host::{describe, DomHost, TileDom};
use crate::markup::{self, RawTile};

thread_local! {
    static PAGE: RefCell<Option<Rc<RefCell<Page>>>> = const { RefCell::new(None) };
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// An installed event listener.  Dropping the closure while it is still
/// registered would leave a dangling callback, so removal goes through here.
struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn install(
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            closure,
        })
    }

    fn remove(&self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref());
    }
}

// ── Page ──────────────────────────────────────────────────────────────────────

pub struct Page {
    controller: Controller,
    host: DomHost,
    batcher: VisibilityBatcher,
    window: Window,
    verbose: bool,
    /// Pending throttle timer handle.
    flush_timer: Option<i32>,
    flush_closure: Option<Closure<dyn FnMut()>>,
    /// Held so the observer's callback outlives `mount`.
    #[allow(dead_code)]
    observer_closure: Option<Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>>,
    listeners: Vec<Listener>,
}

impl Page {
    /// Run `f` against the page behind `weak`, if it is still alive and not
    /// already borrowed.
    pub fn with(weak: &Weak<RefCell<Page>>, f: impl FnOnce(&mut Page)) {
        let Some(page) = weak.upgrade() else {
            return;
        };
        let Ok(mut page) = page.try_borrow_mut() else {
            warn!("page: callback re-entered while busy, dropped");
            return;
        };
        f(&mut page);
    }

    fn now(&self) -> Duration {
        let ms = self
            .window
            .performance()
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now);
        crate::since_origin(ms)
    }

    // ── Visibility ────────────────────────────────────────────────────────────

    fn on_intersections(&mut self, entries: js_sys::Array) {
        let changes: Vec<VisibilityChange> = entries
            .iter()
            .filter_map(|value| value.dyn_into::<IntersectionObserverEntry>().ok())
            .filter_map(|entry| {
                let index = entry
                    .target()
                    .get_attribute(markup::INDEX_ATTR)?
                    .parse::<usize>()
                    .ok()?;
                Some(VisibilityChange {
                    tile: TileId(index),
                    is_intersecting: entry.is_intersecting(),
                    ratio: entry.intersection_ratio(),
                })
            })
            .collect();
        self.batcher.extend(changes);
        self.flush_visibility();
    }

    fn on_flush_timer(&mut self) {
        self.flush_timer = None;
        self.flush_visibility();
    }

    fn flush_visibility(&mut self) {
        let now = self.now();
        if let Some(batch) = self.batcher.take_due(now) {
            debug!("page: flushing {} visibility edges", batch.len());
            self.controller.on_visibility_batch(&mut self.host, &batch);
        }

        let Some(delay) = self.batcher.next_due(now) else {
            return;
        };
        if self.flush_timer.is_some() {
            return;
        }
        let Some(closure) = &self.flush_closure else {
            return;
        };
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                delay.as_millis() as i32,
            ) {
            Ok(handle) => self.flush_timer = Some(handle),
            Err(e) => warn!("page: could not arm throttle timer: {}", describe(&e)),
        }
    }

    // ── Media + input ─────────────────────────────────────────────────────────

    fn on_media_ready(&mut self, tile: TileId) {
        let Some(ticket) = self.host.take_ticket(tile) else {
            debug!("page: ready event for {} with no fetch running", tile);
            return;
        };
        self.controller.on_load_ready(&mut self.host, tile, ticket);
    }

    fn on_media_error(&mut self, tile: TileId) {
        let Some(ticket) = self.host.take_ticket(tile) else {
            return;
        };
        let reason = self
            .host
            .tile(tile)
            .and_then(|t| t.video.error())
            .map(|e| format!("media error {}", e.code()))
            .unwrap_or_else(|| "media error".to_string());
        self.controller
            .on_load_failed(&mut self.host, tile, ticket, &reason);
    }

    pub fn on_play_settled(&mut self, tile: TileId, outcome: PlayOutcome) {
        self.controller.on_play_settled(&mut self.host, tile, outcome);
    }

    fn on_click(&mut self, tile: TileId, mode: ClickMode) {
        self.controller.on_tile_click_as(&mut self.host, tile, mode);
    }

    fn on_details(&mut self, tile: TileId) {
        self.controller.on_details_request(&mut self.host, tile);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    fn teardown(&mut self) {
        if let Some(handle) = self.flush_timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        self.batcher.clear();
        for listener in &self.listeners {
            listener.remove();
        }
        match self.controller.teardown(&mut self.host) {
            Ok(()) => info!("page: torn down"),
            Err(e) => debug!("page: teardown skipped: {}", e),
        }
    }

    fn snapshot_json(&self) -> Option<String> {
        if !self.verbose {
            return None;
        }
        serde_json::to_string(&self.controller.snapshot()).ok()
    }
}

// ── Mount ─────────────────────────────────────────────────────────────────────

/// Read the markup, build the controller and wire every callback.
pub fn mount() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let config = markup::config_from_attr(
        document
            .body()
            .and_then(|b| b.get_attribute(markup::CONFIG_ATTR))
            .as_deref(),
    );
    let hostname = window.location().hostname().unwrap_or_default();
    let env = HostEnv::detect(&hostname, &config.sources.local_hosts);
    let diagnostics = Diagnostics::for_host(&env, &config.diagnostics);
    crate::init_logging(&diagnostics);

    let (doms, mut specs) = read_tiles(&document)?;
    if doms.is_empty() {
        debug!("page: no video tiles on this page");
        return Ok(());
    }
    let rewritten = SourceResolver::new(&config.sources, &env).apply(&mut specs);
    info!(
        "page: {} tiles on {} ({} cloud sources)",
        specs.len(),
        env.hostname,
        rewritten
    );

    let settings = ControllerSettings::from_config(&config);
    let controller =
        Controller::new(settings, specs).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let page = Rc::new(RefCell::new(Page {
        controller,
        host: DomHost::new(doms, window.location()),
        batcher: VisibilityBatcher::new(config.observer.throttle()),
        window: window.clone(),
        verbose: diagnostics.verbose,
        flush_timer: None,
        flush_closure: None,
        observer_closure: None,
        listeners: Vec::new(),
    }));

    wire(&page, &config, &window)?;

    {
        let page = &mut *page.borrow_mut();
        page.controller
            .initialize(&mut page.host)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
    }

    PAGE.with(|slot| *slot.borrow_mut() = Some(page));
    Ok(())
}

/// Collect managed containers.  Containers without a player are skipped;
/// the rest are numbered in page order and tagged with their tile index.
fn read_tiles(
    document: &Document,
) -> Result<(Vec<TileDom>, Vec<showcase_proto::tile::TileSpec>), JsValue> {
    let nodes = document.query_selector_all(markup::CONTAINER_SELECTOR)?;
    let mut candidates = Vec::new();
    for i in 0..nodes.length() {
        let Some(container) = nodes.item(i).and_then(|n| n.dyn_into::<HtmlElement>().ok()) else {
            continue;
        };
        let Some(video) = container
            .query_selector(markup::PLAYER_SELECTOR)?
            .and_then(|v| v.dyn_into::<HtmlVideoElement>().ok())
        else {
            warn!("page: container {} has no {}", i + 1, markup::PLAYER_SELECTOR);
            continue;
        };
        candidates.push((container, video));
    }

    let raw = candidates
        .iter()
        .map(|(container, _)| RawTile {
            category: container.get_attribute(markup::CATEGORY_ATTR),
            id: container.get_attribute(markup::ID_ATTR),
            src: container.get_attribute(markup::SRC_ATTR),
        })
        .collect();

    let mut doms = Vec::new();
    let mut specs = Vec::new();
    for (index, spec) in markup::collect_tiles(raw) {
        let (container, video) = candidates[index].clone();
        let find = |selector: &str| -> Option<HtmlElement> {
            container
                .query_selector(selector)
                .ok()
                .flatten()
                .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        };
        container.set_attribute(markup::INDEX_ATTR, &doms.len().to_string())?;
        doms.push(TileDom {
            error: find(markup::ERROR_SELECTOR),
            placeholder: find(markup::PLACEHOLDER_SELECTOR),
            container,
            video,
        });
        specs.push(spec);
    }
    Ok((doms, specs))
}

/// Create the observer, throttle timer and listeners, and hand them to
/// the page.
fn wire(page: &Rc<RefCell<Page>>, config: &Config, window: &Window) -> Result<(), JsValue> {
    let weak = Rc::downgrade(page);

    let observer_closure = {
        let weak = weak.clone();
        Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                Page::with(&weak, |page| page.on_intersections(entries));
            },
        )
    };
    let init = IntersectionObserverInit::new();
    init.set_root_margin(&config.observer.root_margin());
    init.set_threshold(&JsValue::from_f64(config.observer.threshold));
    let observer =
        IntersectionObserver::new_with_options(observer_closure.as_ref().unchecked_ref(), &init)?;

    let flush_closure = {
        let weak = weak.clone();
        Closure::<dyn FnMut()>::new(move || Page::with(&weak, Page::on_flush_timer))
    };

    let ready_event = config.loader.preload.ready_event();
    let mut listeners = Vec::new();
    {
        let page_ref = page.borrow();
        for idx in 0..page_ref.controller.len() {
            let tile = TileId(idx);
            let Some(dom) = page_ref.host.tile(tile) else {
                continue;
            };

            let w = weak.clone();
            listeners.push(Listener::install(&dom.video, ready_event, move |_| {
                Page::with(&w, |page| page.on_media_ready(tile))
            })?);

            let w = weak.clone();
            listeners.push(Listener::install(&dom.video, "error", move |_| {
                Page::with(&w, |page| page.on_media_error(tile))
            })?);

            let details = dom
                .container
                .query_selector(markup::DETAILS_SELECTOR)
                .ok()
                .flatten();
            let mode = markup::click_mode_for(config.interaction.click, details.is_some());
            if mode != config.interaction.click {
                info!(
                    "page: {} has no {}, body clicks open details while playing",
                    tile,
                    markup::DETAILS_SELECTOR
                );
            }

            let w = weak.clone();
            listeners.push(Listener::install(&dom.container, "click", move |_| {
                Page::with(&w, |page| page.on_click(tile, mode))
            })?);

            if let Some(details) = details {
                let w = weak.clone();
                listeners.push(Listener::install(&details, "click", move |event: Event| {
                    event.prevent_default();
                    event.stop_propagation();
                    Page::with(&w, |page| page.on_details(tile))
                })?);
            }
        }
    }

    let w = weak.clone();
    listeners.push(Listener::install(window, "pagehide", move |event: Event| {
        let persisted = event
            .dyn_ref::<PageTransitionEvent>()
            .is_some_and(|e| e.persisted());
        if crate::teardown_on_pagehide(persisted) {
            Page::with(&w, Page::teardown);
        } else {
            debug!("page: entering back/forward cache, keeping state");
        }
    })?);

    let mut page = page.borrow_mut();
    page.host.attach(weak, observer);
    page.observer_closure = Some(observer_closure);
    page.flush_closure = Some(flush_closure);
    page.listeners = listeners;
    Ok(())
}

/// JSON snapshot of the controller, on development hosts only.
#[wasm_bindgen(js_name = showcaseSnapshot)]
pub fn showcase_snapshot() -> Option<String> {
    PAGE.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|page| page.try_borrow().ok().and_then(|p| p.snapshot_json()))
    })
}

//! Browser binding for the showcase controller.
//!
//! On `wasm32` the module start hook reads the product grid out of the page,
//! implements `MediaHost` over its `<video>` elements and drives the
//! controller from `IntersectionObserver`, media events and clicks.  The
//! markup rules and console logging are plain Rust and build everywhere.

pub mod console_layer;
pub mod markup;

#[cfg(target_arch = "wasm32")]
mod dom_host;
#[cfg(target_arch = "wasm32")]
mod page;

use std::time::Duration;

use showcase_proto::diagnostics::Diagnostics;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::console_layer::ConsoleLayer;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    console_error_panic_hook::set_once();
    page::mount()
}

/// Install the console subscriber at the level `Diagnostics` picked.
/// A second call (or a subscriber installed by the embedding page) wins.
pub fn init_logging(diagnostics: &Diagnostics) {
    let filter = LevelFilter::from_level(diagnostics.level());
    let _ = tracing_subscriber::registry()
        .with(ConsoleLayer.with_filter(filter))
        .try_init();
}

/// Page clock reading (`performance.now()`, milliseconds) as time since
/// origin.  Negative or non-finite readings clamp to zero.
pub fn since_origin(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Whether a `pagehide` discards the page.  A persisted page goes into the
/// back/forward cache and comes back live, so it keeps its controller.
pub fn teardown_on_pagehide(persisted: bool) -> bool {
    !persisted
}

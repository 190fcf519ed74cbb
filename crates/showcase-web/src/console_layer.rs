//! A tracing layer that forwards events to the browser console.
//!
//! Level filtering happens in the subscriber stack (`LevelFilter` from
//! `Diagnostics`); this layer only formats and routes to the matching
//! `console.*` method so DevTools can filter by severity.
use tracing::Level;

pub struct ConsoleLayer;

impl<S> tracing_subscriber::Layer<S> for ConsoleLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let meta = event.metadata();
        let mut message = format!("[{}] {}: ", meta.level(), meta.target());
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);
        emit(*meta.level(), &message);
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        } else {
            self.0.push_str(&format!(" {}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, message: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let value = JsValue::from_str(message);
    match level {
        Level::ERROR => console::error_1(&value),
        Level::WARN => console::warn_1(&value),
        Level::INFO => console::info_1(&value),
        Level::DEBUG => console::log_1(&value),
        Level::TRACE => console::debug_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: Level, message: &str) {
    eprintln!("{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    /// Same formatting as `ConsoleLayer`, captured instead of emitted.
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Capture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.0.lock().unwrap().push(message);
        }
    }

    #[test]
    fn test_visitor_puts_message_first() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(lines.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(tile = 3, "video failed to load");
        });
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("video failed to load"));
        assert!(lines[0].contains("tile=3"));
    }
}

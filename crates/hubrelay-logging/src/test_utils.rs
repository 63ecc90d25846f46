//! In-memory capture of tracing output for assertions.
//!
//! [`capture_logs`] installs a thread-local subscriber, so tests running on a
//! current-thread runtime see every event emitted by tasks they spawn.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// One event, or one span's recorded fields.
#[derive(Clone, Debug, Default)]
struct Captured {
    /// Event message, or the span name.
    message: String,
    fields: Vec<(String, String)>,
}

impl Captured {
    fn mentions(&self, needle: &str) -> bool {
        self.message.contains(needle)
            || self
                .fields
                .iter()
                .any(|(k, v)| k.contains(needle) || v.contains(needle))
    }
}

/// Shared handle to everything captured so far.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<Captured>>>,
    spans: Arc<Mutex<Vec<Captured>>>,
}

impl CapturedLogs {
    /// True if any event message contains `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.events.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Value of `key` on the first event whose message contains `message`.
    pub fn field(&self, message: &str, key: &str) -> Option<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.message.contains(message))
            .find_map(|e| {
                e.fields
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            })
    }

    /// True if `needle` occurs anywhere in captured output: event messages,
    /// event fields, span names or span fields.
    pub fn contains_anywhere(&self, needle: &str) -> bool {
        self.events.lock().iter().any(|e| e.mentions(needle))
            || self.spans.lock().iter().any(|s| s.mentions(needle))
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

#[derive(Default)]
struct FieldVisitor(Captured);

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.0.message = value;
        } else {
            self.0.fields.push((field.name().to_owned(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.logs.events.lock().push(visitor.0);
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        visitor.0.message = attrs.metadata().name().to_owned();
        self.logs.spans.lock().push(visitor.0);
    }

    fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        if !visitor.0.fields.is_empty() {
            self.logs.spans.lock().push(visitor.0);
        }
    }
}

/// Install a thread-local subscriber that records every event and span.
///
/// Keep the returned guard alive for the duration of the test.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };

    let subscriber = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE);

    let guard = subscriber.set_default();
    (logs, guard)
}

#![forbid(unsafe_code)]

//! Tracing setup for tests.
//!
//! [`init_test_tracing`] installs a global fmt subscriber honoring
//! `RUST_LOG`. [`with_capture`] runs a closure under a thread-local
//! subscriber that records spans and events for assertions:
//!
//! ```text
//! let (_, capture) = with_capture(|| tree.commit(..));
//! assert!(!capture.spans_named("fabrik.commit").is_empty());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// Install the global test subscriber once. Later calls are no-ops.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Capture
// ============================================================================

/// A span seen by a [`Capture`].
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub name: String,
    pub level: Level,
    pub fields: BTreeMap<String, String>,
    pub parent: Option<String>,
}

impl CapturedSpan {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// An event seen by a [`Capture`].
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub span: Option<String>,
}

struct FieldVisitor(Vec<(String, String)>);

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

/// Layer recording spans and events into shared buffers.
#[derive(Clone, Default)]
pub struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    index: Arc<Mutex<AHashMap<u64, usize>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().clone()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans
            .lock()
            .iter()
            .filter(|span| span.name == name)
            .cloned()
            .collect()
    }

    /// Events whose message contains `needle`.
    pub fn events_matching(&self, needle: &str) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.message.as_deref().is_some_and(|m| m.contains(needle)))
            .cloned()
            .collect()
    }
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);

        let mut fields: BTreeMap<String, String> = attrs
            .metadata()
            .fields()
            .iter()
            .map(|field| (field.name().to_string(), String::new()))
            .collect();
        fields.extend(visitor.0);

        let parent = ctx.span_scope(id).and_then(|mut scope| {
            scope.next();
            scope.next().map(|parent| parent.name().to_string())
        });

        let mut spans = self.spans.lock();
        self.index.lock().insert(id.into_u64(), spans.len());
        spans.push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            level: *attrs.metadata().level(),
            fields,
            parent,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        let Some(&index) = self.index.lock().get(&id.into_u64()) else {
            return;
        };
        if let Some(span) = self.spans.lock().get_mut(index) {
            span.fields.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: BTreeMap<String, String> = visitor.0.into_iter().collect();
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: fields.get("message").cloned(),
            span: ctx.event_span(event).map(|span| span.name().to_string()),
            fields,
        });
    }
}

/// Run `f` with a capturing subscriber installed on this thread.
pub fn with_capture<R>(f: impl FnOnce() -> R) -> (R, Capture) {
    let capture = Capture::new();
    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::TRACE)
        .with(capture.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}

//! Tracing integration layer.
//!
//! [`LogPipelineLayer`] turns every `tracing` event into an [`Entry`] and
//! hands it to a [`LogPipeline`], so `[L:...]` directives in event messages
//! are honored and records reach the configured writers.

use crate::application::pipeline::LogPipeline;
use crate::domain::entry::{CallerFrame, Entry, Fields};
use crate::domain::level::Level;
use crate::infrastructure::visitor::FieldVisitor;
use serde_json::Value;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Field lifted into [`Entry::trace_id`].
pub const TRACE_ID_FIELD: &str = "trace_id";

// Diagnostics of this crate are never fed back into a pipeline; they can be
// emitted while a writer lock is held.
const OWN_TARGET: &str = "tracing_logroll";

/// Fields recorded on a span, stored in its extensions.
#[derive(Debug, Default)]
struct SpanFields(Fields);

/// A `tracing_subscriber::Layer` writing events through a [`LogPipeline`].
///
/// Span fields are merged into each event's fields, outermost span first,
/// and event fields win over span fields with the same name.
///
/// # Examples
///
/// ```
/// use tracing_logroll::{LogPipeline, LogPipelineLayer};
/// use tracing_logroll::infrastructure::mocks::MemoryWriter;
/// use tracing_subscriber::layer::SubscriberExt;
/// use std::sync::Arc;
///
/// let memory = MemoryWriter::new();
/// let pipeline = LogPipeline::builder()
///     .with_layout("%l %fields %msg")
///     .with_writer(Arc::new(memory.clone()))
///     .build()
///     .unwrap();
///
/// let subscriber = tracing_subscriber::registry().with(LogPipelineLayer::new(pipeline));
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::warn!(user = 7, "slow request");
/// });
///
/// assert_eq!(memory.lines(), vec![" WARN {\"user\":7} slow request"]);
/// ```
#[derive(Debug, Clone)]
pub struct LogPipelineLayer {
    pipeline: LogPipeline,
}

impl LogPipelineLayer {
    pub fn new(pipeline: LogPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &LogPipeline {
        &self.pipeline
    }

    fn entry_for<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> Entry
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        let metadata = event.metadata();

        let mut fields = Fields::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(stored) = span.extensions().get::<SpanFields>() {
                    fields.extend(stored.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let (message, event_fields) = visitor.into_parts();
        fields.extend(event_fields);

        let mut entry = Entry::new(
            Level::from(*metadata.level()),
            message.unwrap_or_else(|| metadata.name().to_string()),
        );
        if let Some(trace_id) = fields.remove(TRACE_ID_FIELD) {
            entry.trace_id = match trace_id {
                Value::String(id) => id,
                other => other.to_string(),
            };
        }
        entry.fields = fields;

        if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
            let function = metadata.module_path().map(str::to_string);
            entry.callers.push(CallerFrame::new(function, file, line));
        }
        entry
    }
}

impl<S> Layer<S> for LogPipelineLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        attrs.record(&mut visitor);
        let (_, fields) = visitor.into_parts();

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        values.record(&mut visitor);
        let (_, fields) = visitor.into_parts();

        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            match extensions.get_mut::<SpanFields>() {
                Some(stored) => stored.0.extend(fields),
                None => extensions.insert(SpanFields(fields)),
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if event.metadata().target().starts_with(OWN_TARGET) {
            return;
        }
        let entry = self.entry_for(event, &ctx);
        // Write failures are counted and reported by the pipeline.
        let _ = self.pipeline.log_entry(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MemoryWriter;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    fn setup(layout: &str) -> (MemoryWriter, LogPipeline) {
        let memory = MemoryWriter::new();
        let pipeline = LogPipeline::builder()
            .with_layout(layout)
            .with_level(Level::Trace)
            .with_writer(Arc::new(memory.clone()))
            .build()
            .unwrap();
        (memory, pipeline)
    }

    // Events from this crate's own modules are skipped, so tests use an
    // explicit target.
    fn with_layer(pipeline: &LogPipeline, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(LogPipelineLayer::new(pipeline.clone()));
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_levels_are_mapped() {
        let (memory, pipeline) = setup("%l|");
        with_layer(&pipeline, || {
            tracing::trace!(target: "app", "t");
            tracing::debug!(target: "app", "d");
            tracing::info!(target: "app", "i");
            tracing::warn!(target: "app", "w");
            tracing::error!(target: "app", "e");
        });
        assert_eq!(memory.contents(), "TRACE|DEBUG| INFO| WARN|ERROR|");
    }

    #[test]
    fn test_trace_id_is_lifted() {
        let (memory, pipeline) = setup("%trace %fields %msg");
        with_layer(&pipeline, || {
            tracing::info!(target: "app", trace_id = "abc123", n = 1, "hello");
        });
        assert_eq!(memory.contents(), "abc123 {\"n\":1} hello");
    }

    #[test]
    fn test_span_fields_are_merged() {
        let (memory, pipeline) = setup("%fields");
        with_layer(&pipeline, || {
            let outer = tracing::info_span!(target: "app", "outer", user = "ann", shard = 1);
            let _outer = outer.enter();
            let inner = tracing::info_span!(target: "app", "inner", shard = 2);
            let _inner = inner.enter();
            tracing::info!(target: "app", shard = 3, "x");
            tracing::info!(target: "app", "y");
        });
        assert_eq!(
            memory.lines(),
            vec!["{\"shard\":3,\"user\":\"ann\"}", "{\"shard\":2,\"user\":\"ann\"}"]
        );
    }

    #[test]
    fn test_directives_apply_to_events() {
        let (memory, pipeline) = setup("%msg");
        with_layer(&pipeline, || {
            tracing::info!(target: "app", "[L:off] gone");
            tracing::info!(target: "app", "kept");
        });
        assert_eq!(memory.lines(), vec!["kept"]);
    }

    #[test]
    fn test_own_diagnostics_are_skipped() {
        let (memory, pipeline) = setup("%msg");
        with_layer(&pipeline, || {
            tracing::error!(target: "tracing_logroll::rotate", "internal");
        });
        assert!(memory.is_empty());
    }

    #[test]
    fn test_caller_from_metadata() {
        let (memory, pipeline) = setup("%caller{level=trace}");
        with_layer(&pipeline, || {
            tracing::info!(target: "app", "where");
        });
        let contents = memory.contents();
        assert!(contents.starts_with("tracing_logroll::infrastructure::layer::tests layer.rs:"));
    }
}

//! Worker tracing output, sent to the orchestrator as log frames

use linthost_ipc::{LogFrame, LogLevel};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::frames::FrameSink;

/// Filter used unless `LINTHOST_WORKER_LOG` says otherwise
pub const DEFAULT_FILTER: &str = "info,linthost_worker=debug,linthost_engine=debug";

/// Turns every event into a `{"log": [level, message]}` frame
pub struct FrameLayer {
    sink: FrameSink,
}

impl FrameLayer {
    pub fn new(sink: FrameSink) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for FrameLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let level = frame_level(event.metadata().level());
        self.sink.send(&LogFrame::new(level, visitor.finish()));
    }
}

fn frame_level(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Install the frame layer as the global subscriber
pub fn init_worker_tracing(sink: FrameSink) {
    let filter = EnvFilter::try_from_env("LINTHOST_WORKER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A subscriber may already be set when running inside the CLI's tests
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(FrameLayer::new(sink))
        .try_init();
}

//! Host-facing evaluation context: the opaque data record and the tracing
//! sink.

use core::fmt;

/// Receiver of evaluation trace lines.
pub trait TraceSink {
    /// Records one trace message.
    fn put_trace(&self, msg: &str);
}

/// Default sink forwarding to the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn put_trace(&self, msg: &str) {
        tracing::trace!(target: "covenant", "{msg}");
    }
}

static TRACING_SINK: TracingSink = TracingSink;

/// Read-only host state shared by one or more evaluations: the opaque data
/// record `T` handed to embedded implementations, the trace enable flag and
/// the trace sink.
pub struct GlobalData<'a, T> {
    data: &'a T,
    trace_enabled: bool,
    sink: &'a dyn TraceSink,
}

impl<'a, T> GlobalData<'a, T> {
    /// Context over `data` with tracing disabled.
    pub fn new(data: &'a T) -> Self {
        Self {
            data,
            trace_enabled: false,
            sink: &TRACING_SINK,
        }
    }

    /// Enables tracing through the default `tracing` sink.
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// Enables tracing through a custom sink.
    pub fn with_sink(mut self, sink: &'a dyn TraceSink) -> Self {
        self.trace_enabled = true;
        self.sink = sink;
        self
    }

    /// The opaque host data.
    pub fn data(&self) -> &T {
        self.data
    }

    /// Whether trace messages are recorded at all.
    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// Records a trace message when tracing is enabled.
    pub fn put_trace(&self, msg: &str) {
        if self.trace_enabled {
            self.sink.put_trace(msg);
        }
    }
}

impl GlobalData<'static, ()> {
    /// Context with no host data, for evaluating closed expressions.
    pub fn unit() -> Self {
        Self::new(&())
    }
}

impl<T: fmt::Debug> fmt::Debug for GlobalData<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalData")
            .field("data", &self.data)
            .field("trace_enabled", &self.trace_enabled)
            .finish()
    }
}

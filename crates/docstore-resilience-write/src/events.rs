use docstore_resilience_core::events::DocstoreEvent;
use std::fmt;
use std::time::{Duration, Instant};

/// The kind of write an executor call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOperation {
    /// Single document insert.
    Insert,
    /// Multi-document insert.
    BatchInsert,
    /// Update of existing documents.
    Update,
}

impl WriteOperation {
    /// Stable lowercase name, used as a log field and metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOperation::Insert => "insert",
            WriteOperation::BatchInsert => "batch_insert",
            WriteOperation::Update => "update",
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the write executor.
#[derive(Debug, Clone)]
pub enum WriteRetryEvent {
    /// A failed attempt is about to be retried.
    Retry {
        writer_name: String,
        timestamp: Instant,
        operation: WriteOperation,
        /// Retry number, 1 for the first retry.
        attempt: usize,
        delay: Duration,
    },
    /// The transport acknowledged the write.
    Success {
        writer_name: String,
        timestamp: Instant,
        operation: WriteOperation,
        attempts: usize,
    },
    /// A retried insert hit a duplicate key on the identifier index and was
    /// accepted as already applied.
    PresumedApplied {
        writer_name: String,
        timestamp: Instant,
        operation: WriteOperation,
        attempts: usize,
    },
    /// Every allowed attempt failed with a retryable failure.
    Exhausted {
        writer_name: String,
        timestamp: Instant,
        operation: WriteOperation,
        attempts: usize,
    },
    /// A failure was returned without retrying.
    Fatal {
        writer_name: String,
        timestamp: Instant,
        operation: WriteOperation,
        attempts: usize,
    },
    /// An update was limited to one attempt because of a non-idempotent
    /// modifier.
    NotIdempotent {
        writer_name: String,
        timestamp: Instant,
        operator: String,
    },
}

impl WriteRetryEvent {
    /// The operation this event belongs to.
    pub fn operation(&self) -> WriteOperation {
        match self {
            WriteRetryEvent::Retry { operation, .. }
            | WriteRetryEvent::Success { operation, .. }
            | WriteRetryEvent::PresumedApplied { operation, .. }
            | WriteRetryEvent::Exhausted { operation, .. }
            | WriteRetryEvent::Fatal { operation, .. } => *operation,
            WriteRetryEvent::NotIdempotent { .. } => WriteOperation::Update,
        }
    }
}

impl DocstoreEvent for WriteRetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WriteRetryEvent::Retry { .. } => "Retry",
            WriteRetryEvent::Success { .. } => "Success",
            WriteRetryEvent::PresumedApplied { .. } => "PresumedApplied",
            WriteRetryEvent::Exhausted { .. } => "Exhausted",
            WriteRetryEvent::Fatal { .. } => "Fatal",
            WriteRetryEvent::NotIdempotent { .. } => "NotIdempotent",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            WriteRetryEvent::Retry { timestamp, .. }
            | WriteRetryEvent::Success { timestamp, .. }
            | WriteRetryEvent::PresumedApplied { timestamp, .. }
            | WriteRetryEvent::Exhausted { timestamp, .. }
            | WriteRetryEvent::Fatal { timestamp, .. }
            | WriteRetryEvent::NotIdempotent { timestamp, .. } => *timestamp,
        }
    }

    fn writer_name(&self) -> &str {
        match self {
            WriteRetryEvent::Retry { writer_name, .. }
            | WriteRetryEvent::Success { writer_name, .. }
            | WriteRetryEvent::PresumedApplied { writer_name, .. }
            | WriteRetryEvent::Exhausted { writer_name, .. }
            | WriteRetryEvent::Fatal { writer_name, .. }
            | WriteRetryEvent::NotIdempotent { writer_name, .. } => writer_name,
        }
    }
}

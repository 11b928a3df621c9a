//! Safe write retries for document-store drivers.
//!
//! Retrying a write is only safe when a second attempt cannot double-apply
//! the first. This crate wraps single-attempt transport calls in a bounded
//! retry loop that knows when that holds:
//!
//! - **Inserts** get a client-side identifier before the first attempt, so a
//!   duplicate key on the identifier index after a lost acknowledgement
//!   proves the document landed.
//! - **Batch inserts** are retried with continue-on-error forced on, and the
//!   caller's option is put back afterwards.
//! - **Updates** are retried only when every modifier is idempotent.
//!
//! Failures that cannot be recovered are returned unchanged, in the
//! transport's own error type.
//!
//! # Examples
//!
//! ```
//! use docstore_resilience_core::failure::DriverFailure;
//! use docstore_resilience_core::sleep::NoopSleeper;
//! use docstore_resilience_write::{identity::ID_FIELD, WriteOutcome, WriteRetry};
//! use serde_json::{json, Map, Value};
//!
//! let writer = WriteRetry::builder()
//!     .name("orders")
//!     .write_retries(2)
//!     .sleeper(NoopSleeper)
//!     .build();
//!
//! let mut order: Map<String, Value> = json!({ "sku": "A-1" }).as_object().cloned().unwrap();
//! let mut calls = 0;
//!
//! let outcome: Result<WriteOutcome<()>, _> = writer.execute_insert(&mut order, |_doc| {
//!     calls += 1;
//!     match calls {
//!         1 => Err(DriverFailure::connection("socket closed")),
//!         _ => Err(DriverFailure::duplicate_key("E11000 index: _id_ dup key: { : 1 }")),
//!     }
//! });
//!
//! assert_eq!(outcome, Ok(WriteOutcome::PresumedApplied));
//! assert!(order.contains_key(ID_FIELD));
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: structured log events for retries and terminal outcomes
//! - `metrics`: call, retry, and attempt metrics via the `metrics` crate
//! - `serde`: (de)serialization for [`RetryPolicy`]

mod attempt;
pub mod classifier;
mod config;
mod events;
pub mod identity;
pub mod idempotency;
pub mod options;

pub use attempt::AttemptContext;
pub use classifier::Classification;
pub use config::{RetryPolicy, WriteRetryConfig, WriteRetryConfigBuilder};
pub use events::{WriteOperation, WriteRetryEvent};
pub use identity::{DocumentIdentity, ObjectId};
pub use idempotency::{UpdateSafety, UpdateSpec};
pub use options::BatchInsertOptions;

use docstore_resilience_core::failure::TransportFailure;
use identity::assign_identifier;
use idempotency::analyze_update;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use options::ContinueOnErrorGuard;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Result of a write that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome<T> {
    /// The transport acknowledged the write and returned `T`.
    Acknowledged(T),
    /// The acknowledgement was lost, but a later attempt proved the write
    /// had been applied.
    PresumedApplied,
}

impl<T> WriteOutcome<T> {
    /// Returns true when the transport acknowledged the write.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, WriteOutcome::Acknowledged(_))
    }

    /// Returns true when success was inferred.
    pub fn is_presumed_applied(&self) -> bool {
        matches!(self, WriteOutcome::PresumedApplied)
    }

    /// The transport's response, if there was one.
    pub fn acknowledged(self) -> Option<T> {
        match self {
            WriteOutcome::Acknowledged(value) => Some(value),
            WriteOutcome::PresumedApplied => None,
        }
    }

    /// Maps the acknowledged value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> WriteOutcome<U> {
        match self {
            WriteOutcome::Acknowledged(value) => WriteOutcome::Acknowledged(f(value)),
            WriteOutcome::PresumedApplied => WriteOutcome::PresumedApplied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Success,
    PresumedApplied,
    Exhausted,
    Fatal,
}

impl Verdict {
    #[cfg(feature = "metrics")]
    fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::PresumedApplied => "presumed_applied",
            Verdict::Exhausted => "exhausted",
            Verdict::Fatal => "fatal",
        }
    }
}

/// Executes writes through single-attempt transport closures, retrying
/// when it is safe to do so.
///
/// Cheap to clone; clones share configuration and listeners.
#[derive(Debug, Clone)]
pub struct WriteRetry {
    config: Arc<WriteRetryConfig>,
}

impl WriteRetry {
    /// Returns a new builder.
    pub fn builder() -> WriteRetryConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "docstore_write_calls_total",
                    "Total number of write calls by terminal result"
                );
                describe_counter!(
                    "docstore_write_retries_total",
                    "Total number of write retries"
                );
                describe_histogram!(
                    "docstore_write_attempts",
                    "Number of attempts made per write call"
                );
                describe_counter!(
                    "docstore_write_updates_not_idempotent_total",
                    "Total number of updates limited to one attempt"
                );
            });
        }

        WriteRetryConfigBuilder::new()
    }

    /// Creates an executor from a finished configuration.
    pub fn new(config: WriteRetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.config.policy
    }

    /// The writer's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Inserts one document.
    ///
    /// The document gets an identifier before the first attempt if it has
    /// none, and keeps it afterwards. `attempt` performs one network attempt
    /// and is called once per try with the same document.
    pub fn execute_insert<D, T, E, F>(
        &self,
        document: &mut D,
        mut attempt: F,
    ) -> Result<WriteOutcome<T>, E>
    where
        D: DocumentIdentity + ?Sized,
        E: TransportFailure,
        F: FnMut(&D) -> Result<T, E>,
    {
        assign_identifier(document);
        let document = &*document;

        self.drive(
            WriteOperation::Insert,
            self.config.policy.max_write_attempts(),
            |_| attempt(document),
        )
    }

    /// Inserts several documents.
    ///
    /// Every document without an identifier gets one before the first
    /// attempt. From the second attempt on the transport sees
    /// `continueOnError: true`; when the call returns, `options` holds the
    /// caller's original value again (or no value, if there was none).
    pub fn execute_batch_insert<D, T, E, F>(
        &self,
        documents: &mut [D],
        options: &mut BatchInsertOptions,
        mut attempt: F,
    ) -> Result<WriteOutcome<T>, E>
    where
        D: DocumentIdentity,
        E: TransportFailure,
        F: FnMut(&[D], &BatchInsertOptions) -> Result<T, E>,
    {
        for document in documents.iter_mut() {
            assign_identifier(document);
        }
        let documents = &*documents;
        let mut guard = ContinueOnErrorGuard::new(options);

        self.drive(
            WriteOperation::BatchInsert,
            self.config.policy.max_write_attempts(),
            |context| {
                if !context.is_first() && !guard.is_forced() {
                    guard.force();
                }
                attempt(documents, guard.options())
            },
        )
    }

    /// Applies an update, retrying only if it is idempotent.
    ///
    /// Updates containing a modifier outside the retryable set are attempted
    /// exactly once, whatever the policy says.
    pub fn execute_idempotent_update<T, E, F>(
        &self,
        update: &UpdateSpec,
        mut attempt: F,
    ) -> Result<WriteOutcome<T>, E>
    where
        E: TransportFailure,
        F: FnMut(&UpdateSpec) -> Result<T, E>,
    {
        let max_attempts = match analyze_update(update) {
            UpdateSafety::Safe => self.config.policy.max_write_attempts(),
            UpdateSafety::Unsafe { operator } => {
                if self.config.policy.retries_writes() {
                    self.report_not_idempotent(&operator);
                }
                1
            }
        };

        self.drive(WriteOperation::Update, max_attempts, |_| attempt(update))
    }

    fn drive<T, E, A>(
        &self,
        operation: WriteOperation,
        max_attempts: usize,
        mut attempt: A,
    ) -> Result<WriteOutcome<T>, E>
    where
        E: TransportFailure,
        A: FnMut(AttemptContext) -> Result<T, E>,
    {
        let mut context = AttemptContext::first(max_attempts);

        loop {
            let failure = match attempt(context) {
                Ok(value) => {
                    self.report(operation, Verdict::Success, context);
                    return Ok(WriteOutcome::Acknowledged(value));
                }
                Err(failure) => failure,
            };

            // Single-attempt calls skip classification entirely.
            if context.max_attempts() == 1 {
                self.report(operation, Verdict::Fatal, context);
                return Err(failure);
            }

            match classifier::classify(operation, &failure, context) {
                Classification::Retry => match context.next() {
                    Some(next) => {
                        self.report_retry(operation, next);
                        self.config.sleeper.sleep(self.config.policy.write_delay());
                        context = next;
                    }
                    None => {
                        self.report(operation, Verdict::Exhausted, context);
                        return Err(failure);
                    }
                },
                Classification::IgnoreAsSuccess => {
                    self.report(operation, Verdict::PresumedApplied, context);
                    return Ok(WriteOutcome::PresumedApplied);
                }
                Classification::Fatal => {
                    self.report(operation, Verdict::Fatal, context);
                    return Err(failure);
                }
            }
        }
    }

    fn report_retry(&self, operation: WriteOperation, next: AttemptContext) {
        let delay = self.config.policy.write_delay();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            writer = %self.config.name,
            operation = operation.as_str(),
            attempt = next.index(),
            max_attempts = next.max_attempts(),
            delay_ms = self.config.policy.write_delay_ms,
            "retrying write after transient failure"
        );

        #[cfg(feature = "metrics")]
        counter!(
            "docstore_write_retries_total",
            "writer" => self.config.name.clone(),
            "operation" => operation.as_str()
        )
        .increment(1);

        self.config.event_listeners.emit(&WriteRetryEvent::Retry {
            writer_name: self.config.name.clone(),
            timestamp: Instant::now(),
            operation,
            attempt: next.index(),
            delay,
        });
    }

    fn report(&self, operation: WriteOperation, verdict: Verdict, context: AttemptContext) {
        let writer_name = self.config.name.clone();
        let timestamp = Instant::now();
        let attempts = context.attempts();

        #[cfg(feature = "tracing")]
        match verdict {
            Verdict::Success => tracing::trace!(
                writer = %self.config.name,
                operation = operation.as_str(),
                attempts,
                "write acknowledged"
            ),
            Verdict::PresumedApplied => tracing::info!(
                writer = %self.config.name,
                operation = operation.as_str(),
                attempts,
                "duplicate identifier after retry, write presumed applied"
            ),
            Verdict::Exhausted => tracing::warn!(
                writer = %self.config.name,
                operation = operation.as_str(),
                attempts,
                "write retries exhausted"
            ),
            Verdict::Fatal => tracing::debug!(
                writer = %self.config.name,
                operation = operation.as_str(),
                attempts,
                "write failed without retry"
            ),
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "docstore_write_calls_total",
                "writer" => self.config.name.clone(),
                "operation" => operation.as_str(),
                "result" => verdict.as_str()
            )
            .increment(1);
            histogram!(
                "docstore_write_attempts",
                "writer" => self.config.name.clone(),
                "operation" => operation.as_str()
            )
            .record(attempts as f64);
        }

        let event = match verdict {
            Verdict::Success => WriteRetryEvent::Success {
                writer_name,
                timestamp,
                operation,
                attempts,
            },
            Verdict::PresumedApplied => WriteRetryEvent::PresumedApplied {
                writer_name,
                timestamp,
                operation,
                attempts,
            },
            Verdict::Exhausted => WriteRetryEvent::Exhausted {
                writer_name,
                timestamp,
                operation,
                attempts,
            },
            Verdict::Fatal => WriteRetryEvent::Fatal {
                writer_name,
                timestamp,
                operation,
                attempts,
            },
        };
        self.config.event_listeners.emit(&event);
    }

    fn report_not_idempotent(&self, operator: &str) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            writer = %self.config.name,
            operator,
            "update is not idempotent, retries disabled for this call"
        );

        #[cfg(feature = "metrics")]
        counter!(
            "docstore_write_updates_not_idempotent_total",
            "writer" => self.config.name.clone(),
            "operator" => operator.to_owned()
        )
        .increment(1);

        self.config
            .event_listeners
            .emit(&WriteRetryEvent::NotIdempotent {
                writer_name: self.config.name.clone(),
                timestamp: Instant::now(),
                operator: operator.to_owned(),
            });
    }
}

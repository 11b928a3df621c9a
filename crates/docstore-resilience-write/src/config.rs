use crate::events::WriteRetryEvent;
use crate::WriteRetry;
use docstore_resilience_core::events::{EventListener, EventListeners, FnListener};
use docstore_resilience_core::sleep::{Sleeper, ThreadSleeper};
use std::sync::Arc;
use std::time::Duration;

/// Retry limits and pauses per operation class.
///
/// Only the write fields drive this crate. The connect and read fields are
/// carried so one value can hold a driver's whole retry configuration.
///
/// All fields default to zero: no retries and no pause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    /// Retries after a failed connection attempt.
    pub connect_retries: i64,
    /// Retries after a failed read.
    pub read_retries: i64,
    /// Pause between read attempts, in milliseconds.
    pub read_delay_ms: u64,
    /// Retries after a failed write. Values below one disable write retries.
    pub write_retries: i64,
    /// Pause between write attempts, in milliseconds.
    pub write_delay_ms: u64,
}

impl RetryPolicy {
    /// Creates a policy with every limit at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of write retries.
    pub fn with_write_retries(mut self, retries: i64) -> Self {
        self.write_retries = retries;
        self
    }

    /// Sets the pause between write attempts.
    pub fn with_write_delay_ms(mut self, delay_ms: u64) -> Self {
        self.write_delay_ms = delay_ms;
        self
    }

    /// Sets the number of read retries.
    pub fn with_read_retries(mut self, retries: i64) -> Self {
        self.read_retries = retries;
        self
    }

    /// Sets the pause between read attempts.
    pub fn with_read_delay_ms(mut self, delay_ms: u64) -> Self {
        self.read_delay_ms = delay_ms;
        self
    }

    /// Sets the number of connection retries.
    pub fn with_connect_retries(mut self, retries: i64) -> Self {
        self.connect_retries = retries;
        self
    }

    /// Total attempts a write may make, including the first one.
    ///
    /// `write_retries < 1` yields exactly one attempt.
    pub fn max_write_attempts(&self) -> usize {
        if self.write_retries < 1 {
            return 1;
        }
        usize::try_from(self.write_retries).map_or(usize::MAX, |retries| retries.saturating_add(1))
    }

    /// Returns true when writes may be attempted more than once.
    pub fn retries_writes(&self) -> bool {
        self.max_write_attempts() > 1
    }

    /// Pause between write attempts.
    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    /// Pause between read attempts.
    pub fn read_delay(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms)
    }
}

/// Configuration for a [`WriteRetry`] executor.
pub struct WriteRetryConfig {
    pub(crate) policy: RetryPolicy,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) event_listeners: EventListeners<WriteRetryEvent>,
    pub(crate) name: String,
}

impl std::fmt::Debug for WriteRetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteRetryConfig")
            .field("policy", &self.policy)
            .field("event_listeners", &self.event_listeners)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WriteRetryConfig`].
pub struct WriteRetryConfigBuilder {
    policy: RetryPolicy,
    sleeper: Option<Arc<dyn Sleeper>>,
    event_listeners: EventListeners<WriteRetryEvent>,
    name: String,
}

impl Default for WriteRetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteRetryConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - policy: [`RetryPolicy::default`] (no write retries)
    /// - sleeper: [`ThreadSleeper`]
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            sleeper: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Replaces the whole retry policy.
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the number of write retries.
    ///
    /// `write_retries(2)` allows 1 initial attempt + 2 retries. Zero or a
    /// negative value disables retries entirely.
    pub fn write_retries(mut self, retries: i64) -> Self {
        self.policy.write_retries = retries;
        self
    }

    /// Sets the pause between write attempts.
    ///
    /// Sub-millisecond precision is dropped.
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.policy.write_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets how the executor pauses between attempts.
    ///
    /// Use [`NoopSleeper`](docstore_resilience_core::sleep::NoopSleeper) or a
    /// recording closure in tests.
    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Some(Arc::new(sleeper));
        self
    }

    /// Sets the name for this writer (used in events, logs, and metrics).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a listener for every event.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<WriteRetryEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when a retry is about to be made.
    ///
    /// # Callback Signature
    /// `Fn(usize, Duration)`: the retry number (1 = first retry) and the
    /// pause that precedes it.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let WriteRetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when a write is acknowledged.
    ///
    /// # Callback Signature
    /// `Fn(usize)`: total attempts made, including the successful one.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let WriteRetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when an insert is presumed applied.
    ///
    /// This fires when a retried insert hits a duplicate key on the
    /// identifier index, which means an earlier unacknowledged attempt
    /// already stored the document.
    ///
    /// # Callback Signature
    /// `Fn(usize)`: total attempts made.
    pub fn on_presumed_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let WriteRetryEvent::PresumedApplied { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when every allowed attempt failed transiently.
    ///
    /// # Callback Signature
    /// `Fn(usize)`: total attempts made.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let WriteRetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when a failure is returned without retrying.
    ///
    /// # Callback Signature
    /// `Fn(usize)`: total attempts made.
    pub fn on_fatal<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let WriteRetryEvent::Fatal { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when an update is refused retries because one of
    /// its modifiers is not idempotent.
    ///
    /// # Callback Signature
    /// `Fn(&str)`: the offending modifier, e.g. `"$inc"`.
    pub fn on_not_idempotent<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let WriteRetryEvent::NotIdempotent { operator, .. } = event {
                f(operator.as_str());
            }
        }));
        self
    }

    /// Builds the executor.
    pub fn build(self) -> WriteRetry {
        let config = WriteRetryConfig {
            policy: self.policy,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper)),
            event_listeners: self.event_listeners,
            name: self.name,
        };

        WriteRetry::new(config)
    }
}

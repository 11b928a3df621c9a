//! Batch insert options and the continue-on-error guard.

use serde_json::{Map, Value};

/// Option key that lets a batch insert carry on past per-document errors.
pub const CONTINUE_ON_ERROR: &str = "continueOnError";

/// Options passed to the transport with every batch insert attempt.
///
/// Values are kept verbatim, so whatever the caller supplied for
/// [`CONTINUE_ON_ERROR`] is exactly what they get back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchInsertOptions {
    options: Map<String, Value>,
}

impl BatchInsertOptions {
    /// Creates an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Sets `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.options.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.options.remove(key)
    }

    /// The raw continue-on-error value, if any.
    pub fn continue_on_error(&self) -> Option<&Value> {
        self.get(CONTINUE_ON_ERROR)
    }

    /// Returns true only when continue-on-error is the boolean `true`.
    pub fn continues_on_error(&self) -> bool {
        matches!(self.continue_on_error(), Some(Value::Bool(true)))
    }

    /// Sets continue-on-error.
    pub fn set_continue_on_error(&mut self, enabled: bool) {
        self.insert(CONTINUE_ON_ERROR, enabled);
    }

    /// Borrows the options as a JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Returns the options as a JSON map.
    pub fn into_map(self) -> Map<String, Value> {
        self.options
    }
}

impl From<Map<String, Value>> for BatchInsertOptions {
    fn from(options: Map<String, Value>) -> Self {
        Self { options }
    }
}

impl From<BatchInsertOptions> for Map<String, Value> {
    fn from(options: BatchInsertOptions) -> Self {
        options.options
    }
}

/// Forces continue-on-error for retries and puts the caller's value back.
///
/// The original value (or its absence) is recorded on creation. Once
/// [`force`](Self::force) has been called, dropping the guard restores it,
/// whether the call succeeded, ran out of attempts, failed fatally, or
/// unwound.
#[derive(Debug)]
pub struct ContinueOnErrorGuard<'a> {
    options: &'a mut BatchInsertOptions,
    original: Option<Value>,
    forced: bool,
}

impl<'a> ContinueOnErrorGuard<'a> {
    /// Records the current continue-on-error state of `options`.
    pub fn new(options: &'a mut BatchInsertOptions) -> Self {
        let original = options.continue_on_error().cloned();
        Self {
            options,
            original,
            forced: false,
        }
    }

    /// Sets continue-on-error to `true`.
    pub fn force(&mut self) {
        self.options.set_continue_on_error(true);
        self.forced = true;
    }

    /// Returns true once [`force`](Self::force) has been called.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// The options as the transport should see them right now.
    pub fn options(&self) -> &BatchInsertOptions {
        &*self.options
    }
}

impl Drop for ContinueOnErrorGuard<'_> {
    fn drop(&mut self) {
        if !self.forced {
            return;
        }
        match self.original.take() {
            Some(value) => {
                self.options.insert(CONTINUE_ON_ERROR, value);
            }
            None => {
                self.options.remove(CONTINUE_ON_ERROR);
            }
        }
    }
}

/// Position of one attempt within a write call.
///
/// Threaded by value through the retry loop; each retry gets a fresh
/// context from [`AttemptContext::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    index: usize,
    max_attempts: usize,
}

impl AttemptContext {
    /// Context for the first attempt of a call allowed `max_attempts` tries.
    ///
    /// A call always gets at least one attempt.
    pub fn first(max_attempts: usize) -> Self {
        Self {
            index: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Zero-based attempt index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Attempts this call may make in total.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Attempts made so far, counting this one.
    pub fn attempts(&self) -> usize {
        self.index + 1
    }

    /// Returns true for the initial attempt.
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Returns true when no further attempt is allowed after this one.
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.max_attempts
    }

    /// Context for the following attempt, or `None` when the limit is reached.
    pub fn next(&self) -> Option<Self> {
        (!self.is_last()).then(|| Self {
            index: self.index + 1,
            max_attempts: self.max_attempts,
        })
    }
}

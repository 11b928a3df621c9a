//! Retry safety analysis for update specifications.
//!
//! An update may be resent only if applying it twice leaves the same
//! document as applying it once. Whole-document replacement and the
//! field-assignment modifiers qualify; counters, array appends, timestamps,
//! and bit operations do not.
//!
//! Bitwise updates are also recognized in their raw form, a field whose
//! value names a bitwise operation (`{ "flags": { "and": 1 } }`).

use serde_json::{Map, Value};

/// An update specification: replacement fields or modifier keys mapped to
/// their arguments.
pub type UpdateSpec = Map<String, Value>;

/// Prefix that marks a key as an update modifier.
pub const MODIFIER_PREFIX: char = '$';

/// Modifiers that can be applied repeatedly with the same result.
pub const RETRYABLE_MODIFIERS: [&str; 4] = ["$set", "$setOnInsert", "$unset", "$rename"];

/// Modifier reported for bitwise updates, including the raw field form.
pub const BITWISE_MODIFIER: &str = "$bit";

/// Operation names that make a field value a raw bitwise update.
pub const BITWISE_OPERATIONS: [&str; 3] = ["and", "or", "xor"];

/// Whether an update may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSafety {
    /// Every modifier is idempotent.
    Safe,
    /// `operator` changes the outcome when applied twice.
    Unsafe {
        /// First offending modifier in key order.
        operator: String,
    },
}

impl UpdateSafety {
    /// Returns true when the update may be retried.
    pub fn is_safe(&self) -> bool {
        matches!(self, UpdateSafety::Safe)
    }
}

/// Returns true when `key` names a modifier rather than a replacement field.
pub fn is_modifier(key: &str) -> bool {
    key.starts_with(MODIFIER_PREFIX)
}

/// Returns true when `value` is a raw bitwise operation such as
/// `{ "and": 1 }`.
pub fn is_raw_bitwise(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|ops| BITWISE_OPERATIONS.iter().any(|op| ops.contains_key(*op)))
}

fn offending_operator<'a>(key: &'a str, value: &Value) -> Option<&'a str> {
    if is_modifier(key) {
        (!RETRYABLE_MODIFIERS.contains(&key)).then_some(key)
    } else {
        is_raw_bitwise(value).then_some(BITWISE_MODIFIER)
    }
}

/// Inspects `update` and decides whether it may be retried.
///
/// Modifiers are checked against [`RETRYABLE_MODIFIERS`]; anything else,
/// including modifiers this crate does not know, is unsafe. Keys without the
/// modifier prefix are replacement fields and safe, unless their value is a
/// raw bitwise operation, which is reported as [`BITWISE_MODIFIER`].
///
/// ```rust
/// use docstore_resilience_write::idempotency::{analyze_update, UpdateSafety};
/// use serde_json::json;
///
/// let set = json!({ "$set": { "status": "shipped" } });
/// assert!(analyze_update(set.as_object().unwrap()).is_safe());
///
/// let inc = json!({ "$set": { "status": "shipped" }, "$inc": { "version": 1 } });
/// assert_eq!(
///     analyze_update(inc.as_object().unwrap()),
///     UpdateSafety::Unsafe { operator: "$inc".to_string() }
/// );
/// ```
pub fn analyze_update(update: &UpdateSpec) -> UpdateSafety {
    update
        .iter()
        .find_map(|(key, value)| offending_operator(key, value))
        .map_or(UpdateSafety::Safe, |operator| UpdateSafety::Unsafe {
            operator: operator.to_string(),
        })
}

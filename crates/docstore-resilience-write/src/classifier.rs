//! Failure classification for write retry decisions.
//!
//! Each write operation has its own rule for what a failed attempt means:
//!
//! | Failure | Insert | Batch insert | Update |
//! |---------|--------|--------------|--------|
//! | transient connection | retry | retry | retry |
//! | duplicate key on `_id_`, first attempt | fatal | fatal | fatal |
//! | duplicate key on `_id_`, later attempt | presumed applied | retry | fatal |
//! | duplicate key on another index | fatal | retry after the first attempt | fatal |
//! | other | fatal | fatal | fatal |
//!
//! Whether a retry is still allowed is decided by the executor, not here.

use crate::attempt::AttemptContext;
use crate::events::WriteOperation;
use crate::identity::ID_INDEX;
use docstore_resilience_core::failure::{FailureKind, TransportFailure};

/// What the executor should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Try again if attempts remain.
    Retry,
    /// Treat the write as applied and return normally.
    IgnoreAsSuccess,
    /// Return the failure to the caller now.
    Fatal,
}

/// Classifies a failed single-document insert.
///
/// A duplicate key on the identifier index after the first attempt means an
/// earlier attempt stored the document but its acknowledgement was lost: the
/// identifier was generated once and resent unchanged, so nothing else could
/// hold it.
pub fn classify_insert<E>(failure: &E, attempt: AttemptContext) -> Classification
where
    E: TransportFailure + ?Sized,
{
    match failure.kind() {
        FailureKind::TransientConnection => Classification::Retry,
        FailureKind::DuplicateKey {
            index_name: Some(ID_INDEX),
        } if !attempt.is_first() => Classification::IgnoreAsSuccess,
        FailureKind::DuplicateKey { .. } | FailureKind::Other => Classification::Fatal,
    }
}

/// Classifies a failed batch insert.
///
/// Retries run with continue-on-error forced on, so documents that did not
/// collide still get written; a duplicate key after the first attempt is
/// therefore retried on any index. On the first attempt no earlier write
/// could have landed and the conflict is genuine.
pub fn classify_batch<E>(failure: &E, attempt: AttemptContext) -> Classification
where
    E: TransportFailure + ?Sized,
{
    match failure.kind() {
        FailureKind::TransientConnection => Classification::Retry,
        FailureKind::DuplicateKey { .. } if !attempt.is_first() => Classification::Retry,
        FailureKind::DuplicateKey { .. } | FailureKind::Other => Classification::Fatal,
    }
}

/// Classifies a failed idempotent update. Only connectivity is retried.
pub fn classify_update<E>(failure: &E, _attempt: AttemptContext) -> Classification
where
    E: TransportFailure + ?Sized,
{
    match failure.kind() {
        FailureKind::TransientConnection => Classification::Retry,
        FailureKind::DuplicateKey { .. } | FailureKind::Other => Classification::Fatal,
    }
}

/// Classifies a failure with the rule for `operation`.
pub fn classify<E>(
    operation: WriteOperation,
    failure: &E,
    attempt: AttemptContext,
) -> Classification
where
    E: TransportFailure + ?Sized,
{
    match operation {
        WriteOperation::Insert => classify_insert(failure, attempt),
        WriteOperation::BatchInsert => classify_batch(failure, attempt),
        WriteOperation::Update => classify_update(failure, attempt),
    }
}

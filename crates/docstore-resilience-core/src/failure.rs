//! Failure taxonomy for single write attempts.
//!
//! A transport performs one network attempt and either succeeds or returns
//! its own error type. Retry decisions only need to know which of three
//! kinds that error belongs to, so transports expose their errors through
//! [`TransportFailure`] and keep their native types intact for callers.
//!
//! # Example
//!
//! ```rust
//! use docstore_resilience_core::failure::{DriverFailure, FailureKind, TransportFailure};
//!
//! let failure = DriverFailure::duplicate_key(
//!     "E11000 duplicate key error index: test.users.$_id_  dup key: { : 1 }",
//! );
//! assert_eq!(failure.kind(), FailureKind::DuplicateKey { index_name: Some("_id_") });
//! ```

use thiserror::Error;

/// The kind of failure a single write attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind<'a> {
    /// A connectivity hiccup; says nothing about whether the write applied.
    TransientConnection,
    /// A unique index rejected the write. `index_name` is `None` when the
    /// transport could not tell which index it was.
    DuplicateKey {
        /// Name of the violated unique index.
        index_name: Option<&'a str>,
    },
    /// Anything else.
    Other,
}

impl FailureKind<'_> {
    /// Returns true for transient connection failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::TransientConnection)
    }

    /// Returns true for duplicate key failures on any index.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, FailureKind::DuplicateKey { .. })
    }
}

/// Implemented by transport error types so write executors can classify them.
pub trait TransportFailure {
    /// Reports which kind of failure this is.
    fn kind(&self) -> FailureKind<'_>;
}

impl<T: TransportFailure + ?Sized> TransportFailure for &T {
    fn kind(&self) -> FailureKind<'_> {
        (**self).kind()
    }
}

impl<T: TransportFailure + ?Sized> TransportFailure for Box<T> {
    fn kind(&self) -> FailureKind<'_> {
        (**self).kind()
    }
}

/// A ready-made transport failure for drivers that report errors as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverFailure {
    /// The connection dropped or could not be used for this attempt.
    #[error("connection failure: {message}")]
    Connection {
        /// Driver-provided description.
        message: String,
    },

    /// A unique index rejected the write.
    #[error("duplicate key: {message}")]
    DuplicateKey {
        /// Violated index, when the driver reports it as data.
        index_name: Option<String>,
        /// Server message, e.g. `E11000 duplicate key error ...`.
        message: String,
    },

    /// Any other server or driver error.
    #[error("write failed: {message}")]
    Other {
        /// Driver-provided description.
        message: String,
    },
}

impl DriverFailure {
    /// Creates a connection failure.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a duplicate key failure whose index is parsed from `message`.
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::DuplicateKey {
            index_name: None,
            message: message.into(),
        }
    }

    /// Creates a duplicate key failure with a known index name.
    pub fn duplicate_key_on(index_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DuplicateKey {
            index_name: Some(index_name.into()),
            message: message.into(),
        }
    }

    /// Creates a failure of any other kind.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// The violated index for duplicate key failures.
    pub fn index_name(&self) -> Option<&str> {
        match self {
            Self::DuplicateKey {
                index_name: Some(name),
                ..
            } => Some(name),
            Self::DuplicateKey {
                index_name: None,
                message,
            } => parse_duplicate_key_index(message),
            _ => None,
        }
    }
}

impl TransportFailure for DriverFailure {
    fn kind(&self) -> FailureKind<'_> {
        match self {
            Self::Connection { .. } => FailureKind::TransientConnection,
            Self::DuplicateKey { .. } => FailureKind::DuplicateKey {
                index_name: self.index_name(),
            },
            Self::Other { .. } => FailureKind::Other,
        }
    }
}

const DUP_KEY_MARKER: &str = " dup key";

/// Extracts the violated index name from a server duplicate key message.
///
/// The name is the whitespace-delimited token right before ` dup key`.
/// Older servers qualify it with the namespace (`db.coll.$name`); that
/// prefix is stripped.
///
/// ```rust
/// use docstore_resilience_core::failure::parse_duplicate_key_index;
///
/// let msg = "E11000 duplicate key error collection: app.users \
///            index: email_1 dup key: { email: \"a\" }";
/// assert_eq!(parse_duplicate_key_index(msg), Some("email_1"));
/// assert_eq!(parse_duplicate_key_index("E11000 duplicate key error"), None);
/// ```
pub fn parse_duplicate_key_index(message: &str) -> Option<&str> {
    let end = message.find(DUP_KEY_MARKER)?;
    let token = message[..end].split_whitespace().next_back()?;
    let name = match token.rfind(".$") {
        Some(pos) => &token[pos + 2..],
        None => token,
    };
    (!name.is_empty()).then_some(name)
}

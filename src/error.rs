//! Core error types with stable, machine-checkable error kinds.
//!
//! [`CoreError`] is the central error type for the ledger core. Each variant
//! maps to a stable numeric code so the surrounding transport layer can
//! translate failures into protocol-specific status codes without inspecting
//! message text.

use serde::Serialize;

/// Structured error payload handed to the surrounding transport layer.
///
/// All failures reduce to this shape:
/// ```json
/// {
///   "code": 4001,
///   "message": "insufficient balance: wallet holds 50, operation requires 100",
///   "retryable": false
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`CoreError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Whether the caller may retry the same operation unchanged.
    pub retryable: bool,
}

/// Core error enum for every fallible operation in the crate.
///
/// # Error Code Ranges
///
/// | Range     | Category                  | Retryable |
/// |-----------|---------------------------|-----------|
/// | 1000–1999 | Validation / bad input    | no        |
/// | 2000–2999 | Authorization             | no        |
/// | 3000–3999 | Missing / conflicting row | no        |
/// | 4000–4999 | Business-rule rejection   | no        |
/// | 5000–5999 | Store failures            | 5001 only |
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Request input is missing or malformed. Caller's fault, not retryable.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A monetary amount is zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(rust_decimal::Decimal),

    /// The actor's identity is missing or invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role or hierarchy policy forbids the action for this actor.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A referenced account does not exist (or is soft-deleted).
    #[error("account not found: {0}")]
    AccountNotFound(uuid::Uuid),

    /// Uniqueness violation (duplicate username or email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Business-rule rejection: the sending wallet cannot cover the amount.
    /// Terminal, never retried.
    #[error("insufficient balance: wallet holds {held}, operation requires {required}")]
    InsufficientBalance {
        /// Current wallet balance at the time of the check.
        held: rust_decimal::Decimal,
        /// Amount the operation needed.
        required: rust_decimal::Decimal,
    },

    /// Transient store failure (connection loss, pool timeout, serialization
    /// conflict). The only retryable kind; retried with bounded backoff.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// Non-transient store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns the stable numeric code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::InvalidAmount(_) => 1002,
            Self::Unauthorized(_) => 2001,
            Self::PermissionDenied(_) => 2002,
            Self::AccountNotFound(_) => 3001,
            Self::Conflict(_) => 3002,
            Self::InsufficientBalance { .. } => 4001,
            Self::TransientStore(_) => 5001,
            Self::Store(_) => 5002,
            Self::Internal(_) => 5000,
        }
    }

    /// True only for failures the caller may retry unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }

    /// Converts this error into its serializable payload.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.error_code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

impl From<sqlx::Error> for CoreError {
    /// Classifies an `sqlx` failure into the core taxonomy.
    ///
    /// Unique-constraint violations (SQLSTATE 23505) become [`CoreError::Conflict`];
    /// serialization failures (40001), deadlocks (40P01), I/O errors and pool
    /// timeouts become [`CoreError::TransientStore`]; everything else is a
    /// non-retryable [`CoreError::Store`].
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => Self::Conflict(db.to_string()),
                Some("40001") | Some("40P01") => Self::TransientStore(db.to_string()),
                _ => Self::Store(db.to_string()),
            },
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::TransientStore(err.to_string())
            }
            _ => Self::Store(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(CoreError::Validation("x".into()).error_code(), 1001);
        assert_eq!(CoreError::InvalidAmount(dec!(-1)).error_code(), 1002);
        assert_eq!(CoreError::Unauthorized("x".into()).error_code(), 2001);
        assert_eq!(CoreError::PermissionDenied("x".into()).error_code(), 2002);
        assert_eq!(
            CoreError::AccountNotFound(uuid::Uuid::nil()).error_code(),
            3001
        );
        assert_eq!(CoreError::Conflict("dup".into()).error_code(), 3002);
        assert_eq!(
            CoreError::InsufficientBalance {
                held: dec!(50),
                required: dec!(100)
            }
            .error_code(),
            4001
        );
        assert_eq!(CoreError::TransientStore("x".into()).error_code(), 5001);
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(CoreError::TransientStore("conn reset".into()).is_retryable());
        assert!(!CoreError::Store("corrupt".into()).is_retryable());
        assert!(
            !CoreError::InsufficientBalance {
                held: dec!(0),
                required: dec!(1)
            }
            .is_retryable()
        );
        assert!(!CoreError::Conflict("dup".into()).is_retryable());
    }

    #[test]
    fn body_carries_code_and_retryability() {
        let body = CoreError::InsufficientBalance {
            held: dec!(50),
            required: dec!(100),
        }
        .to_body();
        assert_eq!(body.code, 4001);
        assert!(!body.retryable);
        assert!(body.message.contains("50"));
    }
}

//! # Reply Envelope
//!
//! What an external caller receives for every operation:
//!
//! ```json
//! { "code": 200, "message": "ok", "payload": { ... } }
//! { "code": 517, "message": "Insufficient stock for b1: available 1, requested 2" }
//! ```
//!
//! Any `Result<T, E>` whose error implements [`Classify`] turns into a
//! [`Reply`] with [`IntoReply::into_reply`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Classify;

/// Result code for success.
pub const CODE_OK: u16 = 200;

/// Unified reply structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> Reply<T> {
    pub fn ok(payload: T) -> Self {
        Reply {
            code: CODE_OK,
            message: "ok".to_string(),
            payload: Some(payload),
        }
    }

    /// Builds the failure reply for a classified error.
    ///
    /// Internal store failures carry a fixed message; the detail stays in
    /// the logs.
    pub fn error<E: Classify + fmt::Display>(err: &E) -> Self {
        let kind = err.kind();
        let message = if kind.is_internal() {
            "internal store failure".to_string()
        } else {
            err.to_string()
        };

        Reply {
            code: kind.code(),
            message,
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

/// Conversion of an operation result into its reply.
pub trait IntoReply<T> {
    fn into_reply(self) -> Reply<T>;
}

impl<T, E> IntoReply<T> for Result<T, E>
where
    E: Classify + fmt::Display,
{
    fn into_reply(self) -> Reply<T> {
        match self {
            Ok(payload) => Reply::ok(payload),
            Err(err) => Reply::error(&err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

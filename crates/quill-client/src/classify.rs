//! Sorting failures into what a caller can do about them.

use quill_core::error::ClientError;
use quill_protocol::messages::error_code;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Worth retrying, possibly on another connection.
    Transient,
    /// The node sent something this client cannot interpret.
    Protocol,
    /// The request itself is wrong; retrying it unchanged cannot succeed.
    Data,
    /// The connection is unusable.
    FatalConnection,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        self == ErrorClass::Transient
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Protocol => "protocol",
            ErrorClass::Data => "data",
            ErrorClass::FatalConnection => "fatal_connection",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(err: &ClientError) -> ErrorClass {
    match err {
        ClientError::TransportTimeout(_)
        | ClientError::TransportReset(_)
        | ClientError::StreamsExhausted => ErrorClass::Transient,
        ClientError::Protocol(_) => ErrorClass::Protocol,
        ClientError::Encode(_) | ClientError::Decode(_) => ErrorClass::Data,
        ClientError::ConnectionClosed
        | ClientError::ConnectionLost(_)
        | ClientError::Handshake(_) => ErrorClass::FatalConnection,
        ClientError::Server { code, .. } => classify_server_code(*code),
    }
}

/// Class of an ERROR response by its code.
pub fn classify_server_code(code: i32) -> ErrorClass {
    match code {
        error_code::UNAVAILABLE
        | error_code::OVERLOADED
        | error_code::IS_BOOTSTRAPPING
        | error_code::READ_TIMEOUT
        | error_code::WRITE_TIMEOUT => ErrorClass::Transient,
        error_code::SERVER_ERROR | error_code::PROTOCOL_ERROR => ErrorClass::Protocol,
        error_code::BAD_CREDENTIALS => ErrorClass::FatalConnection,
        _ => ErrorClass::Data,
    }
}

/// Exponential backoff for transient failures. The client never retries on
/// its own; callers ask this policy whether and when to try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given that `attempts` attempts have
    /// failed so far and the last one failed with `err`. `None` means give up.
    pub fn next_backoff(&self, err: &ClientError, attempts: u32) -> Option<Duration> {
        if !classify(err).is_retryable() || attempts == 0 || attempts >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempts - 1).unwrap_or(u32::MAX);
        Some(
            self.base_backoff
                .checked_mul(factor)
                .map_or(self.max_backoff, |delay| delay.min(self.max_backoff)),
        )
    }
}

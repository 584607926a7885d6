//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest per-source allocation the store accepts, in seconds.
pub const MIN_ALLOCATION_SECS: i64 = 60;
/// Largest per-source allocation the store accepts, in seconds.
pub const MAX_ALLOCATION_SECS: i64 = 3600;
/// Allocation given to a source created without one.
pub const DEFAULT_ALLOCATION_SECS: i64 = 300;

/// Smallest daily limit, in seconds.
pub const MIN_TIME_LIMIT_SECS: i64 = 60;
/// Largest daily limit, in seconds.
pub const MAX_TIME_LIMIT_SECS: i64 = 7200;
/// Daily limit used when no settings have been persisted.
pub const DEFAULT_TIME_LIMIT_SECS: i64 = 1800;

/// Icon given to a source created without one.
pub const DEFAULT_ICON: &str = "📰";

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A source allocation was outside `[MIN_ALLOCATION_SECS, MAX_ALLOCATION_SECS]`.
    #[error(
        "Allocation must be between {min} and {max} seconds, got {value}",
        min = MIN_ALLOCATION_SECS,
        max = MAX_ALLOCATION_SECS
    )]
    AllocationOutOfRange { value: i64 },

    /// The daily limit was outside `[MIN_TIME_LIMIT_SECS, MAX_TIME_LIMIT_SECS]`.
    #[error(
        "Total time limit must be between {min} and {max} seconds, got {value}",
        min = MIN_TIME_LIMIT_SECS,
        max = MAX_TIME_LIMIT_SECS
    )]
    TimeLimitOutOfRange { value: i64 },

    /// A usage counter was negative.
    #[error("Usage values cannot be negative ({field} = {value})")]
    NegativeUsage { field: &'static str, value: i64 },

    /// The source URL did not parse as an absolute URL.
    #[error("Invalid URL format: {value}")]
    InvalidUrl { value: String },
}

/// Checks a per-source allocation against the accepted range.
pub const fn validate_allocation(seconds: i64) -> Result<(), ValidationError> {
    if seconds < MIN_ALLOCATION_SECS || seconds > MAX_ALLOCATION_SECS {
        return Err(ValidationError::AllocationOutOfRange { value: seconds });
    }
    Ok(())
}

/// Checks a daily limit against the accepted range.
pub const fn validate_time_limit(seconds: i64) -> Result<(), ValidationError> {
    if seconds < MIN_TIME_LIMIT_SECS || seconds > MAX_TIME_LIMIT_SECS {
        return Err(ValidationError::TimeLimitOutOfRange { value: seconds });
    }
    Ok(())
}

/// Checks that none of the usage counters are negative.
pub fn validate_usage(
    used_seconds: i64,
    sessions: i64,
    overrun_seconds: i64,
) -> Result<(), ValidationError> {
    for (field, value) in [
        ("timeUsed", used_seconds),
        ("sessions", sessions),
        ("overrunTime", overrun_seconds),
    ] {
        if value < 0 {
            return Err(ValidationError::NegativeUsage { field, value });
        }
    }
    Ok(())
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Unique, immutable identifier of a news source.
    SourceKey,
    "source key"
);

impl SourceKey {
    /// Derives a key from a display name.
    ///
    /// The name is lowercased and every character outside `[a-z0-9]` becomes `-`,
    /// so `"BBC News"` maps to `"bbc-news"`.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        let key = trimmed
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() {
                    c
                } else {
                    '-'
                }
            })
            .collect::<String>();
        Self::new(key)
    }
}

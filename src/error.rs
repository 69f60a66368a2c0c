//! Error handling for the hierarchical A-buffer
//!
//! Structural failures (resource creation, addressing epoch violations, bad
//! configuration) are values of [`HiabError`] and terminate the affected pass or
//! constructor. Capacity exhaustion is deliberately *not* an error: it is absorbed
//! by the passes and surfaced through `FrameDiagnostics`.

use std::error::Error as StdError;
use std::fmt;

/// Main error type for the crate
#[derive(Debug)]
pub enum HiabError {
    // Device Errors
    DeviceNotFound,
    DeviceRequestFailed {
        error: String,
    },
    ResourceCreationFailed {
        resource: String,
        size: u64,
        error: String,
    },
    HeapTooLarge {
        capacity_exp: u32,
        max_exp: u32,
    },
    BufferMappingFailed {
        operation: String,
    },
    UnknownProgramSlot {
        program: String,
        slot: String,
    },

    // Invariant Errors
    AddressingEpochMismatch {
        expected: u32,
        found: u32,
    },
    TraceState {
        message: String,
    },

    // Configuration Errors
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },
    ConfigParse {
        error: String,
    },
    IoError {
        path: String,
        error: String,
    },

    // Generic fallback for unexpected errors
    Internal {
        message: String,
    },
}

impl fmt::Display for HiabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HiabError::DeviceNotFound => write!(f, "GPU adapter not found"),
            HiabError::DeviceRequestFailed { error } => {
                write!(f, "GPU device request failed: {}", error)
            }
            HiabError::ResourceCreationFailed {
                resource,
                size,
                error,
            } => write!(
                f,
                "Creating {} ({} bytes) failed: {}",
                resource, size, error
            ),
            HiabError::HeapTooLarge {
                capacity_exp,
                max_exp,
            } => write!(
                f,
                "Heap of 2^{} slots exceeds the addressable maximum of 2^{}",
                capacity_exp, max_exp
            ),
            HiabError::BufferMappingFailed { operation } => {
                write!(f, "Buffer mapping failed during {}", operation)
            }
            HiabError::UnknownProgramSlot { program, slot } => {
                write!(f, "Program '{}' has no slot named '{}'", program, slot)
            }

            HiabError::AddressingEpochMismatch { expected, found } => write!(
                f,
                "Heap addressing epoch mismatch: pass expects epoch {}, storage is epoch {}",
                expected, found
            ),
            HiabError::TraceState { message } => write!(f, "Trace preview: {}", message),

            HiabError::InvalidConfig {
                field,
                value,
                reason,
            } => write!(f, "Invalid config: {} = {} ({})", field, value, reason),
            HiabError::ConfigParse { error } => write!(f, "Config parse error: {}", error),
            HiabError::IoError { path, error } => write!(f, "IO error for {}: {}", path, error),

            HiabError::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl StdError for HiabError {}

impl HiabError {
    /// True for invariant violations and construction failures that cannot be recovered
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HiabError::AddressingEpochMismatch { .. }
                | HiabError::DeviceNotFound
                | HiabError::DeviceRequestFailed { .. }
                | HiabError::ResourceCreationFailed { .. }
                | HiabError::Internal { .. }
        )
    }
}

/// Type alias for Results in this crate
pub type HiabResult<T> = Result<T, HiabError>;

impl From<std::io::Error> for HiabError {
    fn from(error: std::io::Error) -> Self {
        HiabError::IoError {
            path: String::new(),
            error: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for HiabError {
    fn from(error: toml::de::Error) -> Self {
        HiabError::ConfigParse {
            error: error.to_string(),
        }
    }
}

impl From<wgpu::RequestDeviceError> for HiabError {
    fn from(error: wgpu::RequestDeviceError) -> Self {
        HiabError::DeviceRequestFailed {
            error: error.to_string(),
        }
    }
}

impl From<crate::trace::TraceError> for HiabError {
    fn from(error: crate::trace::TraceError) -> Self {
        HiabError::TraceState {
            message: error.to_string(),
        }
    }
}

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_hiab<F>(self, f: F) -> HiabResult<T>
    where
        F: FnOnce() -> HiabError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_hiab<F>(self, f: F) -> HiabResult<T>
    where
        F: FnOnce() -> HiabError,
    {
        self.ok_or_else(f)
    }
}

/// Extension trait for adding context to foreign errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> HiabResult<T>;
    fn with_context<F>(self, f: F) -> HiabResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: fmt::Display,
{
    fn context(self, msg: &str) -> HiabResult<T> {
        self.map_err(|e| HiabError::Internal {
            message: format!("{}: {}", msg, e),
        })
    }

    fn with_context<F>(self, f: F) -> HiabResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| HiabError::Internal {
            message: format!("{}: {}", f(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HiabError::AddressingEpochMismatch {
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Heap addressing epoch mismatch: pass expects epoch 3, storage is epoch 2"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(HiabError::AddressingEpochMismatch {
            expected: 1,
            found: 0
        }
        .is_fatal());
        assert!(!HiabError::ConfigParse {
            error: "x".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_hiab(|| HiabError::Internal {
            message: "test".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_error_context() {
        let result: Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let with_context = result.context("loading config");
        match with_context {
            Err(HiabError::Internal { message }) => {
                assert!(message.starts_with("loading config"));
                assert!(message.contains("file not found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

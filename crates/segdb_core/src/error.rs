//! Error types for SegDB core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in SegDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] segdb_storage::StorageError),

    /// I/O error outside the storage backend, such as spawning a thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] segdb_codec::CodecError),

    /// A write or transaction against the engine failed. Nothing was applied.
    #[error("write failed for {key}: {message}")]
    WriteFailure {
        /// Record key the write targeted.
        key: String,
        /// Why the write failed.
        message: String,
    },

    /// Invalid parameters, detected before touching the store.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the invalid parameter.
        message: String,
    },

    /// A stored record or operation does not have the expected shape.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The engine log is corrupted.
    #[error("log corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in a log frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },

    /// The engine has been closed.
    #[error("engine is closed")]
    EngineClosed,
}

impl CoreError {
    /// Creates a write failure error.
    pub fn write_failure(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailure {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Returns whether this error is a [`CoreError::WriteFailure`].
    #[must_use]
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_failure_display_names_key() {
        let err = CoreError::write_failure("test/devices/abc", "engine is closed");
        assert!(err.is_write_failure());
        assert_eq!(
            err.to_string(),
            "write failed for test/devices/abc: engine is closed"
        );
    }

    #[test]
    fn codec_errors_convert() {
        let err: CoreError = segdb_codec::CodecError::FloatForbidden.into();
        assert!(matches!(err, CoreError::Codec(_)));
        assert!(!err.is_write_failure());
    }
}

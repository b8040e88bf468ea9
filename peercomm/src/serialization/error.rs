//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Serialization error types.
//!
//! Two families live here:
//!
//! - [`CodecError`] for frame level encoding used by stream bindings
//! - [`ObjectSerializationError`] for the object serializer registry that
//!   carries command parameters, results and notification arguments

use std::io;
use thiserror::Error;

/// Error raised while encoding, decoding or framing a wire value.
///
/// # Examples
///
/// ```rust
/// use peercomm::serialization::CodecError;
///
/// let error = CodecError::FrameTooLarge { size: 20, max: 10 };
/// assert!(!error.is_disconnect());
/// assert!(error.to_string().contains("20"));
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// A value could not be encoded.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// The underlying encoder error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be decoded.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// The underlying decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// A frame exceeded the maximum frame size.
    #[error("frame size {size} exceeds maximum allowed size {max}")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The underlying stream failed.
    #[error("frame I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Returns `true` if the error means the peer closed the stream.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Error raised by the object serializer registry.
#[derive(Debug, Error)]
pub enum ObjectSerializationError {
    /// No registered serializer handles the given type.
    #[error("no object serializer registered for type '{type_name}'")]
    MissingSerializer {
        /// Local type name or wire type name that could not be resolved.
        type_name: String,
    },

    /// A serializer was handed a value of a type it does not handle.
    #[error("object serializer for '{expected}' cannot handle a value of type '{actual}'")]
    TypeMismatch {
        /// The type the serializer handles.
        expected: String,
        /// The type of the value it received.
        actual: String,
    },

    /// JSON conversion failed.
    #[error("object conversion for '{type_name}' failed: {source}")]
    Json {
        /// The type being converted.
        type_name: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ObjectSerializationError {
    /// Returns `true` if this error is caused by a missing serializer.
    #[must_use]
    pub const fn is_missing_serializer(&self) -> bool {
        matches!(self, Self::MissingSerializer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_disconnect_detection() {
        let eof = CodecError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.is_disconnect());

        let other = CodecError::Io(io::Error::other("boom"));
        assert!(!other.is_disconnect());
    }

    #[test]
    fn test_decode_error_has_source() {
        let source = serde_json::from_str::<u32>("nope").unwrap_err();
        let error = CodecError::Decode {
            what: "frame",
            source,
        };
        assert!(error.source().is_some());
        assert!(error.to_string().starts_with("failed to decode frame"));
    }

    #[test]
    fn test_missing_serializer() {
        let error = ObjectSerializationError::MissingSerializer {
            type_name: "Foo".to_string(),
        };
        assert!(error.is_missing_serializer());
        assert_eq!(
            error.to_string(),
            "no object serializer registered for type 'Foo'"
        );
    }
}

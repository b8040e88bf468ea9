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

//! Length-prefixed framing for stream bindings.
//!
//! Each frame is a 4-byte big-endian length followed by the payload:
//!
//! ```text
//! +------------------+-------------------+
//! | Length (4 bytes) | Payload (N bytes) |
//! +------------------+-------------------+
//! ```
//!
//! # Examples
//!
//! ```rust
//! use peercomm::serialization::framing::{read_frame, write_frame};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buffer = Vec::new();
//! write_frame(&mut buffer, b"Hello").await?;
//! assert_eq!(buffer.len(), 9);
//!
//! let mut reader = &buffer[..];
//! assert_eq!(read_frame(&mut reader).await?, b"Hello");
//! # Ok(())
//! # }
//! ```

use crate::serialization::{CodecError, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in a single frame (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Writes one length-prefixed frame and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame.
///
/// A peer closing the stream before the header surfaces as an
/// [`CodecError::Io`] for which [`CodecError::is_disconnect`] holds.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Serializes a value and writes it as one frame.
pub async fn write_message<W, S, T>(
    writer: &mut W,
    serializer: &S,
    message: &T,
) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    S: Serializer,
    T: serde::Serialize,
{
    let payload = serializer.serialize(message)?;
    write_frame(writer, &payload).await
}

/// Reads one frame and deserializes it.
pub async fn read_message<R, S, T>(reader: &mut R, serializer: &S) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    S: Serializer,
    T: serde::de::DeserializeOwned,
{
    let payload = read_frame(reader).await?;
    serializer.deserialize(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::JsonSerializer;

    #[tokio::test]
    async fn test_frame_round_trip_preserves_boundaries() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"first").await.unwrap();
        write_frame(&mut buffer, b"").await.unwrap();
        write_frame(&mut buffer, b"third").await.unwrap();

        let mut reader = &buffer[..];
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"first");
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"");
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"third");
        let eof = read_frame(&mut reader).await.unwrap_err();
        assert!(eof.is_disconnect());
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        let mut reader = &buffer[..];
        let error = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(error, CodecError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10u32.to_be_bytes());
        buffer.extend_from_slice(b"short");
        let mut reader = &buffer[..];
        assert!(read_frame(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_message_helpers() {
        let serializer = JsonSerializer::new();
        let mut buffer = Vec::new();
        write_message(&mut buffer, &serializer, &("ping", 3u8))
            .await
            .unwrap();
        let mut reader = &buffer[..];
        let value: (String, u8) = read_message(&mut reader, &serializer).await.unwrap();
        assert_eq!(value, ("ping".to_string(), 3));
    }
}

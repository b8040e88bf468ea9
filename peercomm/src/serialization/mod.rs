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

//! Serialization layer.
//!
//! Two concerns live here:
//!
//! - **Frame encoding**: the [`Serializer`] trait, its [`JsonSerializer`]
//!   backend and the [`framing`] helpers used by stream bindings such as TCP.
//! - **Object payloads**: the [`ObjectSerializerRegistry`] that turns
//!   type-erased [`ObjectValue`]s (command parameters and results,
//!   notification arguments) into [`SerializedObject`]s and back.
//!
//! # Message Framing
//!
//! ```text
//! +------------------+----------------------+
//! | Length (4 bytes) | Payload (N bytes)    |
//! +------------------+----------------------+
//! ```
//!
//! The length is a big-endian `u32`; payloads above
//! [`framing::MAX_FRAME_SIZE`] are rejected on both sides.

mod error;
pub mod framing;
mod json;
mod object;
mod traits;

pub use error::{CodecError, ObjectSerializationError};
pub use json::JsonSerializer;
pub use object::{
    JsonObjectSerializer, ObjectSerializer, ObjectSerializerRegistry, ObjectValue,
    SerializedObject,
};
pub use traits::Serializer;

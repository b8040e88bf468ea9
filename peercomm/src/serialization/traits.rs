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

//! Frame serializer trait.

use crate::serialization::CodecError;

/// Encodes whole wire values into frame payloads and back.
///
/// Stream bindings are generic over the serializer so a binding can be
/// switched to another encoding without touching the protocol layer.
///
/// # Examples
///
/// ```rust
/// use peercomm::serialization::{JsonSerializer, Serializer};
///
/// let serializer = JsonSerializer::default();
/// let bytes = serializer.serialize(&vec![1, 2, 3]).unwrap();
/// let back: Vec<i32> = serializer.deserialize(&bytes).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
pub trait Serializer: Send + Sync + 'static {
    /// Encodes a value into bytes.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: serde::Serialize + ?Sized;

    /// Decodes a value from bytes.
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: serde::de::DeserializeOwned;

    /// Short name of the encoding, used in logs.
    fn name(&self) -> &'static str;
}

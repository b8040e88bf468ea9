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

//! JSON frame serializer.

use crate::serialization::{CodecError, Serializer};

/// JSON implementation of [`Serializer`].
///
/// Human readable on the wire, which makes captured TCP traffic easy to
/// inspect.
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Creates a compact JSON serializer.
    #[must_use]
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Creates a serializer that pretty prints its output.
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: serde::Serialize + ?Sized,
    {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        result.map_err(|source| CodecError::Encode {
            what: "frame payload",
            source,
        })
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|source| CodecError::Decode {
            what: "frame payload",
            source,
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        id: u32,
        label: String,
    }

    #[test]
    fn test_pretty_output_is_multiline() {
        let probe = Probe {
            id: 7,
            label: "seven".to_string(),
        };
        let compact = JsonSerializer::new().serialize(&probe).unwrap();
        let pretty = JsonSerializer::pretty().serialize(&probe).unwrap();
        assert!(!compact.contains(&b'\n'));
        assert!(pretty.contains(&b'\n'));
    }

    #[test]
    fn test_invalid_input_is_decode_error() {
        let result: Result<Probe, _> = JsonSerializer::new().deserialize(b"{not json");
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }
}

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

//! Identity and versioning primitives.
//!
//! Every other layer names things with the value types defined here:
//!
//! - [`EndpointId`]: the identity of a participating endpoint
//! - [`MessageId`]: the identity of a single message, with [`MessageId::NONE`]
//!   as the "not a response" marker
//! - [`CommunicationSubject`]: a topic tag two endpoints must share to talk
//! - [`Version`]: an ordered protocol or type version

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a participating endpoint.
///
/// Endpoint ids compare by value. Each process normally creates a single id
/// at startup through [`EndpointId::for_current_process`].
///
/// # Examples
///
/// ```rust
/// use peercomm::id::EndpointId;
///
/// let a = EndpointId::new("node-a");
/// let b: EndpointId = "node-a".into();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "node-a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    /// Creates an endpoint id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an id that is unique for the current process.
    ///
    /// The id combines the process id with a random suffix so that several
    /// endpoints hosted by the same process remain distinguishable.
    #[must_use]
    pub fn for_current_process() -> Self {
        Self(format!("{}:{}", std::process::id(), Uuid::new_v4().simple()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a single message.
///
/// Responses reference the id of the message they answer. Messages that do
/// not answer anything carry [`MessageId::NONE`] in that position.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::MessageId;
///
/// let id = MessageId::next();
/// assert!(!id.is_none());
/// assert!(MessageId::NONE.is_none());
/// assert_ne!(id, MessageId::next());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// The "no message" sentinel.
    pub const NONE: MessageId = MessageId(Uuid::nil());

    /// Creates a fresh, random message id.
    #[must_use]
    pub fn next() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `true` if this is the [`MessageId::NONE`] sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "MessageId(None)")
        } else {
            write!(f, "MessageId({})", self.0)
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A topic tag. Two endpoints only connect when they share at least one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunicationSubject(String);

impl CommunicationSubject {
    /// Creates a subject from any string-like value.
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Returns the subject as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunicationSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommunicationSubject {
    fn from(subject: &str) -> Self {
        Self(subject.to_string())
    }
}

impl From<String> for CommunicationSubject {
    fn from(subject: String) -> Self {
        Self(subject)
    }
}

/// An ordered `major.minor.patch` version.
///
/// Used both for wire protocol versions and for the versions of command and
/// notification set types. Ordering compares `major`, then `minor`, then
/// `patch`.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::Version;
///
/// let v1: Version = "1.0.0".parse().unwrap();
/// let v2 = Version::new(1, 2, 0);
/// assert!(v1 < v2);
/// assert_eq!(v2.to_string(), "1.2.0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    /// Major version; incompatible changes.
    pub major: u32,
    /// Minor version; compatible additions.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl Version {
    /// Creates a version from its three components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a string is not a valid [`Version`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{input}': expected 'major[.minor[.patch]]'")]
pub struct ParseVersionError {
    input: String,
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseVersionError {
            input: s.to_string(),
        };
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, ParseVersionError> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| error()),
                None if required => Err(error()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(error());
        }
        Ok(Self::new(major, minor, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_id_equality() {
        assert_eq!(EndpointId::new("a"), EndpointId::from("a"));
        assert_ne!(EndpointId::new("a"), EndpointId::new("b"));
    }

    #[test]
    fn test_endpoint_id_for_current_process_is_unique() {
        let a = EndpointId::for_current_process();
        let b = EndpointId::for_current_process();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&std::process::id().to_string()));
    }

    #[test]
    fn test_message_id_none() {
        assert!(MessageId::NONE.is_none());
        assert_eq!(MessageId::default(), MessageId::NONE);
        assert_eq!(format!("{:?}", MessageId::NONE), "MessageId(None)");
    }

    #[test]
    fn test_message_id_serde_is_transparent() {
        let id = MessageId::next();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_version_ordering() {
        let mut versions = vec![
            Version::new(2, 0, 0),
            Version::new(1, 10, 0),
            Version::new(1, 2, 3),
        ];
        versions.sort();
        assert_eq!(
            versions,
            vec![
                Version::new(1, 2, 3),
                Version::new(1, 10, 0),
                Version::new(2, 0, 0)
            ]
        );
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("1".parse::<Version>().unwrap(), Version::new(1, 0, 0));
        assert_eq!("1.2".parse::<Version>().unwrap(), Version::new(1, 2, 0));
        assert_eq!("1.2.3".parse::<Version>().unwrap(), Version::new(1, 2, 3));
        assert!("".parse::<Version>().is_err());
        assert!("1.x".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }
}

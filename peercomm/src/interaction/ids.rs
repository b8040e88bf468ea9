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

//! Type identities and member identifiers.
//!
//! Command and notification sets are identified by name and version rather
//! than by Rust type, so two builds of an application can talk as long as
//! they agree on names. A [`TypeFallback`] lists the identities a set answers
//! to, newest first; a peer that only knows an older identity still matches.

use crate::id::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name and version of a command or notification set type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeIdentity {
    /// Stable type name.
    pub name: String,
    /// Version of the type.
    pub version: Version,
}

impl TypeIdentity {
    /// Creates an identity.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Ordered, newest-first list of identities a set type answers to.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::Version;
/// use peercomm::interaction::{TypeFallback, TypeIdentity};
///
/// let ours = TypeFallback::new(TypeIdentity::new("calc.Calculator", Version::new(2, 0, 0)))
///     .with_fallback(TypeIdentity::new("calc.Calculator", Version::new(1, 0, 0)));
/// let theirs = TypeFallback::new(TypeIdentity::new("calc.Calculator", Version::new(1, 0, 0)));
///
/// assert_eq!(ours.best_match(&theirs).unwrap().version, Version::new(1, 0, 0));
/// assert!(ours.matches(&theirs));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<TypeIdentity>", into = "Vec<TypeIdentity>")]
pub struct TypeFallback {
    entries: Vec<TypeIdentity>,
}

impl TryFrom<Vec<TypeIdentity>> for TypeFallback {
    type Error = &'static str;

    fn try_from(entries: Vec<TypeIdentity>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            Err("a type fallback list needs at least one identity")
        } else {
            Ok(Self { entries })
        }
    }
}

impl From<TypeFallback> for Vec<TypeIdentity> {
    fn from(fallback: TypeFallback) -> Self {
        fallback.entries
    }
}

impl TypeFallback {
    /// Creates a fallback list with its newest identity.
    #[must_use]
    pub fn new(primary: TypeIdentity) -> Self {
        Self {
            entries: vec![primary],
        }
    }

    /// Appends an older identity.
    #[must_use]
    pub fn with_fallback(mut self, older: TypeIdentity) -> Self {
        if !self.entries.contains(&older) {
            self.entries.push(older);
        }
        self
    }

    /// The newest identity.
    #[must_use]
    pub fn primary(&self) -> &TypeIdentity {
        &self.entries[0]
    }

    /// All identities, newest first.
    #[must_use]
    pub fn entries(&self) -> &[TypeIdentity] {
        &self.entries
    }

    /// The newest of our identities the other list also contains.
    #[must_use]
    pub fn best_match(&self, other: &TypeFallback) -> Option<&TypeIdentity> {
        self.entries.iter().find(|e| other.entries.contains(e))
    }

    /// Returns `true` if the two lists share an identity.
    #[must_use]
    pub fn matches(&self, other: &TypeFallback) -> bool {
        self.best_match(other).is_some()
    }
}

impl fmt::Display for TypeFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.primary(), f)
    }
}

/// Identifies one command: the declaring set plus the member name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId {
    /// The declaring command set.
    pub declaring: TypeFallback,
    /// Name of the command within the set.
    pub member: String,
}

impl CommandId {
    /// Creates a command id.
    pub fn new(declaring: TypeFallback, member: impl Into<String>) -> Self {
        Self {
            declaring,
            member: member.into(),
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.member)
    }
}

/// Identifies one notification: the declaring set plus the member name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId {
    /// The declaring notification set.
    pub declaring: TypeFallback,
    /// Name of the notification within the set.
    pub member: String,
}

impl NotificationId {
    /// Creates a notification id.
    pub fn new(declaring: TypeFallback, member: impl Into<String>) -> Self {
        Self {
            declaring,
            member: member.into(),
        }
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, major: u32) -> TypeIdentity {
        TypeIdentity::new(name, Version::new(major, 0, 0))
    }

    #[test]
    fn test_best_match_prefers_newest_shared() {
        let ours = TypeFallback::new(identity("a", 3))
            .with_fallback(identity("a", 2))
            .with_fallback(identity("a", 1));
        let theirs = TypeFallback::new(identity("a", 2)).with_fallback(identity("a", 1));
        assert_eq!(ours.best_match(&theirs), Some(&identity("a", 2)));
    }

    #[test]
    fn test_renamed_type_matches_through_fallback() {
        let ours = TypeFallback::new(identity("new.Name", 2)).with_fallback(identity("old.Name", 1));
        let theirs = TypeFallback::new(identity("old.Name", 1));
        assert!(ours.matches(&theirs));
        assert!(theirs.matches(&ours));
    }

    #[test]
    fn test_no_match() {
        let ours = TypeFallback::new(identity("a", 1));
        let theirs = TypeFallback::new(identity("a", 2));
        assert!(!ours.matches(&theirs));
    }

    #[test]
    fn test_empty_list_rejected_on_the_wire() {
        let result: Result<TypeFallback, _> = serde_json::from_str("[]");
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_fallback_ignored() {
        let list = TypeFallback::new(identity("a", 1)).with_fallback(identity("a", 1));
        assert_eq!(list.entries().len(), 1);
    }

    #[test]
    fn test_command_id_equality_is_structural() {
        let set = TypeFallback::new(identity("calc", 1));
        assert_eq!(CommandId::new(set.clone(), "add"), CommandId::new(set.clone(), "add"));
        assert_ne!(CommandId::new(set.clone(), "add"), CommandId::new(set, "sub"));
        assert_eq!(
            CommandId::new(TypeFallback::new(identity("calc", 1)), "add").to_string(),
            "calc@1.0.0::add"
        );
    }
}

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

//! Connection approval.

use crate::id::CommunicationSubject;
use crate::protocol::CommunicationDescription;
use std::collections::BTreeSet;

/// Decides whether a remote endpoint may connect.
pub trait ConnectionApprover: Send + Sync {
    /// Returns `true` if the endpoint described by `description` may connect.
    fn is_endpoint_allowed_to_connect(&self, description: &CommunicationDescription) -> bool;
}

/// Approves endpoints that share at least one subject with us.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::{CommunicationSubject, Version};
/// use peercomm::protocol::{CommunicationDescription, ConnectionApprover, SubjectApprover};
///
/// let approver = SubjectApprover::new([CommunicationSubject::new("calc")]);
/// let peer = CommunicationDescription::new(Version::new(1, 0, 0), ["calc".into(), "log".into()]);
/// let stranger = CommunicationDescription::new(Version::new(1, 0, 0), ["other".into()]);
///
/// assert!(approver.is_endpoint_allowed_to_connect(&peer));
/// assert!(!approver.is_endpoint_allowed_to_connect(&stranger));
/// ```
#[derive(Debug, Clone)]
pub struct SubjectApprover {
    subjects: BTreeSet<CommunicationSubject>,
}

impl SubjectApprover {
    /// Creates an approver for the local subjects.
    pub fn new(subjects: impl IntoIterator<Item = CommunicationSubject>) -> Self {
        Self {
            subjects: subjects.into_iter().collect(),
        }
    }

    /// The local subjects.
    #[must_use]
    pub fn subjects(&self) -> &BTreeSet<CommunicationSubject> {
        &self.subjects
    }
}

impl ConnectionApprover for SubjectApprover {
    fn is_endpoint_allowed_to_connect(&self, description: &CommunicationDescription) -> bool {
        description
            .subjects
            .iter()
            .any(|s| self.subjects.contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Version;

    #[test]
    fn test_no_local_subjects_rejects_everyone() {
        let approver = SubjectApprover::new(Vec::new());
        let peer = CommunicationDescription::new(Version::new(1, 0, 0), ["calc".into()]);
        assert!(!approver.is_endpoint_allowed_to_connect(&peer));
    }

    #[test]
    fn test_identical_subjects_are_approved() {
        let approver = SubjectApprover::new(["calc".into(), "log".into()]);
        let peer = CommunicationDescription::new(Version::new(1, 0, 0), ["calc".into(), "log".into()]);
        assert!(approver.is_endpoint_allowed_to_connect(&peer));
    }

    #[test]
    fn test_overlapping_subjects_are_approved() {
        let approver = SubjectApprover::new(["calc".into(), "log".into()]);
        let peer = CommunicationDescription::new(Version::new(1, 0, 0), ["log".into(), "files".into()]);
        assert!(approver.is_endpoint_allowed_to_connect(&peer));
    }

    #[test]
    fn test_disjoint_subjects_are_rejected() {
        let approver = SubjectApprover::new(["calc".into()]);
        let peer = CommunicationDescription::new(Version::new(1, 0, 0), ["files".into(), "log".into()]);
        assert!(!approver.is_endpoint_allowed_to_connect(&peer));
    }

    #[test]
    fn test_peer_without_subjects_is_rejected() {
        let approver = SubjectApprover::new(["calc".into()]);
        let peer = CommunicationDescription::new(Version::new(1, 0, 0), Vec::new());
        assert!(!approver.is_endpoint_allowed_to_connect(&peer));
    }
}

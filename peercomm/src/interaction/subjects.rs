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

//! Subject groups and the interaction decision.

use crate::id::CommunicationSubject;
use crate::interaction::TypeFallback;
use serde::{Deserialize, Serialize};

/// What an endpoint offers and needs for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectGroup {
    /// The subject.
    pub subject: CommunicationSubject,
    /// Command sets this endpoint provides.
    pub provided_commands: Vec<TypeFallback>,
    /// Command sets this endpoint needs from peers.
    pub required_commands: Vec<TypeFallback>,
    /// Notification sets this endpoint provides.
    pub provided_notifications: Vec<TypeFallback>,
    /// Notification sets this endpoint needs from peers.
    pub required_notifications: Vec<TypeFallback>,
}

impl SubjectGroup {
    /// Creates an empty group for a subject.
    pub fn new(subject: impl Into<CommunicationSubject>) -> Self {
        Self {
            subject: subject.into(),
            provided_commands: Vec::new(),
            required_commands: Vec::new(),
            provided_notifications: Vec::new(),
            required_notifications: Vec::new(),
        }
    }

    /// Returns `true` if `provider` offers everything this group requires.
    #[must_use]
    pub fn is_satisfied_by(&self, provider: &SubjectGroup) -> bool {
        fn covered(required: &[TypeFallback], provided: &[TypeFallback]) -> bool {
            required
                .iter()
                .all(|r| provided.iter().any(|p| r.matches(p)))
        }
        covered(&self.required_commands, &provider.provided_commands)
            && covered(&self.required_notifications, &provider.provided_notifications)
    }
}

/// Whether an endpoint wants to interact with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionConnectionState {
    /// The peer provides what we need on at least one shared subject.
    Desired,
    /// No shared subject, or a shared subject whose needs are not met.
    NotDesired,
}

/// Decides whether we want to interact with a peer described by `remote`.
///
/// The answer is [`InteractionConnectionState::Desired`] when the two sides
/// share at least one subject and, for every shared subject, the peer
/// provides all command and notification sets we require.
///
/// # Examples
///
/// ```rust
/// use peercomm::interaction::{evaluate_interaction, InteractionConnectionState, SubjectGroup};
///
/// let local = vec![SubjectGroup::new("calc")];
/// let remote = vec![SubjectGroup::new("calc"), SubjectGroup::new("log")];
/// assert_eq!(evaluate_interaction(&local, &remote), InteractionConnectionState::Desired);
///
/// let stranger = vec![SubjectGroup::new("other")];
/// assert_eq!(evaluate_interaction(&local, &stranger), InteractionConnectionState::NotDesired);
/// ```
#[must_use]
pub fn evaluate_interaction(
    local: &[SubjectGroup],
    remote: &[SubjectGroup],
) -> InteractionConnectionState {
    let mut shared = 0usize;
    for ours in local {
        for theirs in remote.iter().filter(|g| g.subject == ours.subject) {
            shared += 1;
            if !ours.is_satisfied_by(theirs) {
                return InteractionConnectionState::NotDesired;
            }
        }
    }
    if shared > 0 {
        InteractionConnectionState::Desired
    } else {
        InteractionConnectionState::NotDesired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Version;
    use crate::interaction::TypeIdentity;

    fn set(name: &str, major: u32) -> TypeFallback {
        TypeFallback::new(TypeIdentity::new(name, Version::new(major, 0, 0)))
    }

    #[test]
    fn test_required_commands_must_be_provided() {
        let mut ours = SubjectGroup::new("calc");
        ours.required_commands.push(set("calc.Calculator", 1));

        let bare = SubjectGroup::new("calc");
        assert_eq!(
            evaluate_interaction(&[ours.clone()], &[bare]),
            InteractionConnectionState::NotDesired
        );

        let mut provider = SubjectGroup::new("calc");
        provider.provided_commands.push(set("calc.Calculator", 1));
        assert_eq!(
            evaluate_interaction(&[ours], &[provider]),
            InteractionConnectionState::Desired
        );
    }

    #[test]
    fn test_required_notifications_must_be_provided() {
        let mut ours = SubjectGroup::new("log");
        ours.required_notifications.push(set("log.Events", 2));
        let mut provider = SubjectGroup::new("log");
        provider.provided_notifications.push(set("log.Events", 1));
        assert_eq!(
            evaluate_interaction(&[ours], &[provider]),
            InteractionConnectionState::NotDesired
        );
    }

    #[test]
    fn test_no_shared_subject() {
        assert_eq!(
            evaluate_interaction(&[SubjectGroup::new("a")], &[SubjectGroup::new("b")]),
            InteractionConnectionState::NotDesired
        );
        assert_eq!(
            evaluate_interaction(&[], &[]),
            InteractionConnectionState::NotDesired
        );
    }
}

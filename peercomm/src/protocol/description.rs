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

//! Description of what an endpoint offers, sent while connecting.

use crate::id::{CommunicationSubject, Version};
use crate::interaction::TypeFallback;
use serde::{Deserialize, Serialize};

/// Capabilities announced by an endpoint in its connect message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationDescription {
    /// Wire protocol version the sender uses on this connection.
    pub protocol_version: Version,
    /// Subjects the sender participates in.
    pub subjects: Vec<CommunicationSubject>,
    /// Command sets the sender provides.
    pub command_sets: Vec<TypeFallback>,
    /// Notification sets the sender provides.
    pub notification_sets: Vec<TypeFallback>,
}

impl CommunicationDescription {
    /// Creates a description with subjects only.
    pub fn new(
        protocol_version: Version,
        subjects: impl IntoIterator<Item = CommunicationSubject>,
    ) -> Self {
        Self {
            protocol_version,
            subjects: subjects.into_iter().collect(),
            command_sets: Vec::new(),
            notification_sets: Vec::new(),
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::relationship::{Perspective, RelationshipStatus};
use crate::types::UserId;

/// Read-only projection of a user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl DirectoryProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// One row of a relationship-aware user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub user_id: UserId,
    /// `None` when the profile could not be resolved ("unknown user").
    pub profile: Option<DirectoryProfile>,
    pub relationship: RelationshipStatus,
    pub perspective: Perspective,
}

use serde::{Deserialize, Serialize};

string_id!(
    /// Identifier of a marketplace user.
    UserId
);

/// Marketplace role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Candidate,
    Employer,
    Admin,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Profile a user presents about themselves when connecting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Participant {
    /// Participant for `id` described by `profile`. A blank display name
    /// falls back to the id.
    pub fn from_profile(id: UserId, profile: Profile) -> Self {
        let display_name = if profile.display_name.trim().is_empty() {
            id.to_string()
        } else {
            profile.display_name
        };
        Self {
            id,
            display_name,
            company_name: profile.company_name,
            role: profile.role,
            avatar_url: profile.avatar_url,
        }
    }

    /// Minimal profile for a user the directory knows nothing about.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            display_name: id.to_string(),
            id,
            company_name: None,
            role: ParticipantRole::Unknown,
            avatar_url: None,
        }
    }

    /// Company name for employers, display name otherwise.
    pub fn label(&self) -> &str {
        match (&self.role, &self.company_name) {
            (ParticipantRole::Employer, Some(company)) if !company.is_empty() => company,
            _ => &self.display_name,
        }
    }
}

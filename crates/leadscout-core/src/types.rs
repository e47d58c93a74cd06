use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares a UUIDv7 (time-sortable) newtype identifier for an entity.
macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Mint a fresh id. UUIDv7 keeps ids roughly creation-ordered,
            /// which makes log correlation and range scans friendlier.
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

entity_id!(TenantId);
entity_id!(UserId);
entity_id!(CredentialId);
entity_id!(ChannelId);
entity_id!(SubscriptionId);
entity_id!(RuleId);
entity_id!(MessageId);
entity_id!(ProgressId);
entity_id!(LeadId);
entity_id!(NotificationId);

/// A confidence/threshold value clamped to `[0, 1]` at construction.
///
/// Both the LM classifier's confidence and the rule's threshold use this
/// type so the `0 <= score <= 1` invariant can't be violated by a stray
/// float slipping in from a malformed upstream response.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct UnitScore(f64);

impl UnitScore {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for UnitScore {
    fn default() -> Self {
        Self(0.0)
    }
}

impl fmt::Display for UnitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Kind of a Global Channel on the upstream chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Broadcast,
    Group,
    Chat,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Broadcast => write!(f, "broadcast"),
            ChannelKind::Group => write!(f, "group"),
            ChannelKind::Chat => write!(f, "chat"),
        }
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadcast" => Ok(ChannelKind::Broadcast),
            "group" => Ok(ChannelKind::Group),
            "chat" => Ok(ChannelKind::Chat),
            other => Err(format!("unknown channel kind: {other}")),
        }
    }
}

/// Status of a Chat-Platform Credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialStatus {
    Active,
    NeedsReauth,
    Blocked,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStatus::Active => write!(f, "active"),
            CredentialStatus::NeedsReauth => write!(f, "needs-reauth"),
            CredentialStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for CredentialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CredentialStatus::Active),
            "needs-reauth" => Ok(CredentialStatus::NeedsReauth),
            "blocked" => Ok(CredentialStatus::Blocked),
            other => Err(format!("unknown credential status: {other}")),
        }
    }
}

/// Lifecycle status of a Lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    InProgress,
    Processed,
    Archived,
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadStatus::New => write!(f, "new"),
            LeadStatus::InProgress => write!(f, "in_progress"),
            LeadStatus::Processed => write!(f, "processed"),
            LeadStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "in_progress" => Ok(LeadStatus::InProgress),
            "processed" => Ok(LeadStatus::Processed),
            "archived" => Ok(LeadStatus::Archived),
            other => Err(format!("unknown lead status: {other}")),
        }
    }
}

/// The three notification event shapes the Notifier supports (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEventKind {
    LeadCreated,
    LeadStatusChanged,
    LeadAssigned,
}

impl fmt::Display for NotificationEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEventKind::LeadCreated => write!(f, "lead_created"),
            NotificationEventKind::LeadStatusChanged => write!(f, "lead_status_changed"),
            NotificationEventKind::LeadAssigned => write!(f, "lead_assigned"),
        }
    }
}

impl std::str::FromStr for NotificationEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead_created" => Ok(NotificationEventKind::LeadCreated),
            "lead_status_changed" => Ok(NotificationEventKind::LeadStatusChanged),
            "lead_assigned" => Ok(NotificationEventKind::LeadAssigned),
            other => Err(format!("unknown notification event kind: {other}")),
        }
    }
}

/// Either "all of the tenant's subscribed channels" or an explicit set.
///
/// Mirrors the `channel_filter` field on Rule (§3): empty means "all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelFilter(pub Vec<ChannelId>);

impl ChannelFilter {
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_score_clamps_out_of_range_values() {
        assert_eq!(UnitScore::new(-0.5).get(), 0.0);
        assert_eq!(UnitScore::new(1.5).get(), 1.0);
        assert_eq!(UnitScore::new(0.42).get(), 0.42);
    }

    #[test]
    fn channel_filter_empty_means_all() {
        assert!(ChannelFilter::all().is_all());
        assert!(!ChannelFilter(vec![ChannelId::new()]).is_all());
    }

    #[test]
    fn lead_status_roundtrips_through_str() {
        for s in ["new", "in_progress", "processed", "archived"] {
            let parsed: LeadStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }
}

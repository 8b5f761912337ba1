//! Audit log model
//!
//! An `AuditLogEntry` records one admin action. Entries are written once and
//! never updated; `entity_name` is a snapshot taken when the action happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of admin action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Approve,
    Reject,
    Hide,
    Unhide,
    Delete,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Approve => "approve",
            ActionType::Reject => "reject",
            ActionType::Hide => "hide",
            ActionType::Unhide => "unhide",
            ActionType::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(ActionType::Approve),
            "reject" => Ok(ActionType::Reject),
            "hide" => Ok(ActionType::Hide),
            "unhide" => Ok(ActionType::Unhide),
            "delete" => Ok(ActionType::Delete),
            _ => Err(anyhow::anyhow!("Invalid action type: {}", s)),
        }
    }
}

/// Kind of resource an admin action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Job,
    Article,
    User,
    Subscription,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Job => "job",
            EntityType::Article => "article",
            EntityType::User => "user",
            EntityType::Subscription => "subscription",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "job" => Ok(EntityType::Job),
            "article" => Ok(EntityType::Article),
            "user" => Ok(EntityType::User),
            "subscription" => Ok(EntityType::Subscription),
            _ => Err(anyhow::anyhow!("Invalid entity type: {}", s)),
        }
    }
}

/// Identity of the admin performing an action.
///
/// Passed explicitly into every moderation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext {
    pub admin_id: i64,
    pub admin_email: String,
    /// Client address as reported by the proxy, or "unknown"
    pub ip_address: String,
}

impl AdminContext {
    pub fn new(admin_id: i64, admin_email: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            admin_id,
            admin_email: admin_email.into(),
            ip_address: ip_address.into(),
        }
    }
}

/// A persisted audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub admin_id: i64,
    pub admin_email: String,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub entity_name: Option<String>,
    pub description: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an audit log entry
#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
    pub admin_id: i64,
    pub admin_email: String,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub entity_name: Option<String>,
    pub description: String,
    pub ip_address: String,
}

impl NewAuditLogEntry {
    pub fn new(
        admin: &AdminContext,
        action_type: ActionType,
        entity_type: EntityType,
        entity_id: i64,
        entity_name: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            admin_id: admin.admin_id,
            admin_email: admin.admin_email.clone(),
            action_type,
            entity_type,
            entity_id,
            entity_name,
            description: description.into(),
            ip_address: admin.ip_address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parse_is_case_insensitive() {
        assert_eq!("JOB".parse::<EntityType>().unwrap(), EntityType::Job);
        assert_eq!("Subscription".parse::<EntityType>().unwrap(), EntityType::Subscription);
        assert!("course".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_action_type_round_trips_through_db_form() {
        for action in [
            ActionType::Approve,
            ActionType::Reject,
            ActionType::Hide,
            ActionType::Unhide,
            ActionType::Delete,
        ] {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
    }

    #[test]
    fn test_serialized_forms_are_uppercase() {
        assert_eq!(serde_json::to_string(&ActionType::Unhide).unwrap(), "\"UNHIDE\"");
        assert_eq!(serde_json::to_string(&EntityType::Article).unwrap(), "\"ARTICLE\"");
    }

    #[test]
    fn test_new_entry_copies_admin_context() {
        let admin = AdminContext::new(9, "root@example.com", "10.0.0.1");
        let entry = NewAuditLogEntry::new(
            &admin,
            ActionType::Hide,
            EntityType::Job,
            3,
            Some("Rust dev".to_string()),
            "Admin hid job: Rust dev. Reason: spam",
        );
        assert_eq!(entry.admin_id, 9);
        assert_eq!(entry.admin_email, "root@example.com");
        assert_eq!(entry.ip_address, "10.0.0.1");
    }
}

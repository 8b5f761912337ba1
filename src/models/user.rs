//! Account and profile models
//!
//! Accounts have one role. Recruiters and students each own a profile row,
//! and jobs, applications and CVs reference the profile rather than the
//! account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Name shown in audit records and messages, falling back to the email.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Recruiter,
    #[default]
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Recruiter => "recruiter",
            UserRole::Student => "student",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "recruiter" => Ok(UserRole::Recruiter),
            "student" => Ok(UserRole::Student),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Recruiter profile owned by a recruiter account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruiterProfile {
    pub id: i64,
    pub user_id: i64,
    /// Company in the external company directory, if linked
    pub company_id: Option<i64>,
    pub company_name: String,
}

/// Student profile owned by a student account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: i64,
    pub user_id: i64,
}

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
}

impl CreateUserInput {
    pub fn new(email: impl Into<String>, role: UserRole) -> Self {
        Self {
            email: email.into(),
            full_name: None,
            role,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(full_name: Option<&str>) -> User {
        User {
            id: 1,
            email: "ana@example.com".to_string(),
            full_name: full_name.map(str::to_string),
            role: UserRole::Recruiter,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        assert_eq!(user(Some("Ana Silva")).display_name(), "Ana Silva");
        assert_eq!(user(Some("  ")).display_name(), "ana@example.com");
        assert_eq!(user(None).display_name(), "ana@example.com");
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("RECRUITER".parse::<UserRole>().unwrap(), UserRole::Recruiter);
        assert!("editor".parse::<UserRole>().is_err());
        assert!(!user(None).is_admin());
    }
}

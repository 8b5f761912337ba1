//! Job posting model
//!
//! Jobs are created PENDING by a recruiter and moderated by admins. The
//! hidden flag is independent of the status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EntityType, ModeratedResource, ModeratedStatus, OwnerRef};

/// Job posting entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// Owning recruiter profile (not a user id)
    pub recruiter_id: i64,
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    pub hidden: bool,
    pub hidden_reason: Option<String>,
    pub hidden_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Active,
    Rejected,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "active" => Ok(JobStatus::Active),
            "rejected" => Ok(JobStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

impl ModeratedStatus for JobStatus {
    const LIVE: Self = JobStatus::Active;
    const REJECTED: Self = JobStatus::Rejected;

    fn as_str(&self) -> &'static str {
        JobStatus::as_str(self)
    }
}

impl ModeratedResource for Job {
    type Status = JobStatus;
    type Input = CreateJobInput;

    const ENTITY: EntityType = EntityType::Job;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn owner(&self) -> OwnerRef {
        OwnerRef::RecruiterProfile(self.recruiter_id)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Input for creating a job posting
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobInput {
    pub recruiter_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl CreateJobInput {
    pub fn new(recruiter_id: i64, title: impl Into<String>) -> Self {
        Self {
            recruiter_id,
            title: title.into(),
            description: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_parse() {
        assert_eq!("ACTIVE".parse::<JobStatus>().unwrap(), JobStatus::Active);
        assert_eq!(JobStatus::default(), JobStatus::Pending);
        assert!("published".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_job_owner_is_recruiter_profile() {
        let now = Utc::now();
        let job = Job {
            id: 1,
            recruiter_id: 5,
            title: "Backend engineer".to_string(),
            description: String::new(),
            status: JobStatus::Pending,
            hidden: false,
            hidden_reason: None,
            hidden_at: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(job.owner(), OwnerRef::RecruiterProfile(5));
        assert_eq!(<Job as ModeratedResource>::ENTITY, EntityType::Job);
        assert_eq!(serde_json::to_value(&job).unwrap()["status"], "PENDING");
    }
}

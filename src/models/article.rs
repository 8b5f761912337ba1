//! Article model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EntityType, ModeratedResource, ModeratedStatus, OwnerRef};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    /// Author account id
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub status: ArticleStatus,
    pub hidden: bool,
    pub hidden_reason: Option<String>,
    pub hidden_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Article publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArticleStatus {
    #[default]
    Draft,
    /// Submitted for review
    Pending,
    Published,
    Rejected,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Pending => "pending",
            ArticleStatus::Published => "published",
            ArticleStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ArticleStatus::Draft),
            "pending" => Ok(ArticleStatus::Pending),
            "published" => Ok(ArticleStatus::Published),
            "rejected" => Ok(ArticleStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid article status: {}", s)),
        }
    }
}

impl ModeratedStatus for ArticleStatus {
    const LIVE: Self = ArticleStatus::Published;
    const REJECTED: Self = ArticleStatus::Rejected;

    fn as_str(&self) -> &'static str {
        ArticleStatus::as_str(self)
    }
}

impl ModeratedResource for Article {
    type Status = ArticleStatus;
    type Input = CreateArticleInput;

    const ENTITY: EntityType = EntityType::Article;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn owner(&self) -> OwnerRef {
        OwnerRef::User(self.author_id)
    }

    fn status(&self) -> ArticleStatus {
        self.status
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Input for creating an article
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArticleInput {
    pub author_id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Initial status, defaults to DRAFT
    #[serde(default)]
    pub status: ArticleStatus,
}

impl CreateArticleInput {
    pub fn new(author_id: i64, title: impl Into<String>) -> Self {
        Self {
            author_id,
            title: title.into(),
            content: String::new(),
            status: ArticleStatus::Draft,
        }
    }

    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_status_round_trip() {
        for status in [
            ArticleStatus::Draft,
            ArticleStatus::Pending,
            ArticleStatus::Published,
            ArticleStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ArticleStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_live_status_is_published() {
        assert_eq!(ArticleStatus::LIVE, ArticleStatus::Published);
        assert_eq!(
            CreateArticleInput::new(1, "Hello").status,
            ArticleStatus::Draft
        );
    }
}

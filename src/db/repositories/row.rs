//! Column accessors shared by the SQLite and MySQL row mappers

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, Row};
use std::str::FromStr;

pub(crate) trait RowExt {
    fn int(&self, col: &str) -> Result<i64>;
    fn opt_int(&self, col: &str) -> Result<Option<i64>>;
    fn text(&self, col: &str) -> Result<String>;
    fn opt_text(&self, col: &str) -> Result<Option<String>>;
    fn flag(&self, col: &str) -> Result<bool>;
    fn timestamp(&self, col: &str) -> Result<DateTime<Utc>>;
    fn opt_timestamp(&self, col: &str) -> Result<Option<DateTime<Utc>>>;

    /// Decode a lowercase enum column such as `status` or `role`
    fn parsed<T>(&self, col: &str) -> Result<T>
    where
        T: FromStr<Err = anyhow::Error>,
    {
        self.text(col)?.parse()
    }
}

macro_rules! impl_row_ext {
    ($row:ty) => {
        impl RowExt for $row {
            fn int(&self, col: &str) -> Result<i64> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_int(&self, col: &str) -> Result<Option<i64>> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }

            fn text(&self, col: &str) -> Result<String> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_text(&self, col: &str) -> Result<Option<String>> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }

            fn flag(&self, col: &str) -> Result<bool> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }

            fn timestamp(&self, col: &str) -> Result<DateTime<Utc>> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_timestamp(&self, col: &str) -> Result<Option<DateTime<Utc>>> {
                self.try_get(col)
                    .with_context(|| format!("Failed to read column {}", col))
            }
        }
    };
}

impl_row_ext!(SqliteRow);
impl_row_ext!(MySqlRow);

/// `?, ?, ?` for an `IN (...)` clause with `n` placeholders
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }
}

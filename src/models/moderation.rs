//! Traits shared by every resource an admin can moderate

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::{EntityType, OwnerRef};

/// Status enum of a moderated resource type.
///
/// Every type has a "live" status reached by approval and a terminal
/// `REJECTED` status.
pub trait ModeratedStatus:
    Copy + Eq + fmt::Debug + fmt::Display + FromStr + Send + Sync + 'static
{
    const LIVE: Self;
    const REJECTED: Self;

    /// Database representation
    fn as_str(&self) -> &'static str;
}

/// A resource that goes through admin moderation (jobs, articles).
pub trait ModeratedResource: Clone + Serialize + Send + Sync + 'static {
    type Status: ModeratedStatus;
    /// Owner-supplied fields for creating the resource
    type Input: Send + Sync + 'static;

    const ENTITY: EntityType;

    fn id(&self) -> i64;
    fn title(&self) -> &str;
    fn owner(&self) -> OwnerRef;
    fn status(&self) -> Self::Status;
    fn is_hidden(&self) -> bool;
}

//! Modgate - moderation and approval engine
//!
//! Admin moderation of job postings, articles and accounts, exclusive
//! package subscriptions, and the audit trail behind every admin action.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

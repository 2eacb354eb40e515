pub mod api;
pub mod cache;
pub mod config;
pub mod humanize;
pub mod observability;
pub mod query;
pub mod vendor;
pub mod webhook;

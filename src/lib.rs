pub mod api;
pub mod backend;
pub mod capabilities;
pub mod classify;
pub mod config;
pub mod error;
pub mod filename;
pub mod formats;
pub mod humanize;
pub mod jobs;
pub mod observability;

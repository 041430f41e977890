//! Subcommand implementations

pub mod collections;
pub mod config;
pub mod doctor;
pub mod post;
pub mod reset;
pub mod stats;

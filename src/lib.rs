//! Persistence core for the todos application.
//!
//! Users, projects and (recurring) todos live in an embedded SQLite
//! database. The schema is bootstrapped or migrated on first use and
//! credentials are stored as salted one-way hashes.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod db;

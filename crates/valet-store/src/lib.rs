//! valet storage crate - SQLite persistence for the action engine.
//!
//! Provides a WAL-mode SQLite database with migrations and repository
//! implementations for action records, autonomy settings, notifications,
//! and channel preferences. Status changes go through guarded conditional
//! updates so concurrent writers race on rows-affected, not on reads.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{
    ActionRepository, NotificationRepository, PrefsRepository, SettingsRepository, TransitionPatch,
};

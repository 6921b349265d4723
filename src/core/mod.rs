//! Core module - Framework-agnostic attendance logic.
//! Pure calculations live alongside the database operations that feed them;
//! [`state::TrackerState`] is the single entry point for writes.

/// Saving and retrieving per-session attendance entries
pub mod attendance;
/// PM counts that follow the AM counts until edited
pub mod autocopy;
/// Class setup and maintenance
pub mod class;
/// Lifetime statistics, historical averages and trends
pub mod cumulative;
/// Attendance rates and their classification
pub mod rate;
/// Daily and filtered reports with text formatting
pub mod report;
/// Single-writer application state
pub mod state;
/// Key-value persistence for caches and settings
pub mod store;
/// Aggregation of entries and record filtering
pub mod summary;
/// Outbox and remote store for two-phase sync
pub mod sync;
/// Terms and week numbering
pub mod term;
/// Export and import of all data
pub mod transfer;

#![warn(clippy::unwrap_used)]

//! Timetable web tier: accounts, the academic catalog, generation jobs,
//! role-aware timetable views, and exports.
//!
//! Storage sits behind `TimetableStore`: `PgStore` for PostgreSQL and
//! `MemoryStore` (DashMap) for development and tests.

pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod pg;
pub mod query;
pub mod router;
pub mod solver;
pub mod store;
pub mod timetable;

pub use handlers::ManagementState;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use router::management_router;
pub use solver::{HttpSolver, Solver};
pub use store::TimetableStore;

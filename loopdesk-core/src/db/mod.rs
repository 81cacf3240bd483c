//! Incident store: SQLite persistence for incidents, history, and the knowledge base

pub mod repo;
pub mod schema;

pub use repo::Database;

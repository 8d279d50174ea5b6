//! Persistence layer: PostgreSQL hierarchy store and wallet ledger.
//!
//! Provides [`postgres::PostgresStore`], the single owner of every SQL
//! statement in the crate. All multi-row financial mutations run as one
//! transaction with row-level wallet locking; the service layer supplies
//! policy checks and retry orchestration on top.

pub mod models;
pub mod postgres;

pub use postgres::PostgresStore;

//! Repository layer
//!
//! Repositories are thin wrappers over the shared Postgres store. They hold
//! no business logic: claim and finalize statements, staged payload access,
//! the production event table and the job log table.
//!
//! All repositories are trait-based so the dispatch loop can run against
//! in-memory stores in tests.

mod events;
mod jobs;
mod logs;
mod payloads;

#[cfg(test)]
pub mod memory;
#[cfg(test)]
mod test_db;

// Re-export traits
pub use events::EventRepository;
pub use jobs::JobRepository;
pub use logs::LogRepository;
pub use payloads::PayloadRepository;

// Re-export implementations
pub use events::PgEventRepository;
pub use jobs::PgJobRepository;
pub use logs::PgLogRepository;
pub use payloads::PgPayloadRepository;

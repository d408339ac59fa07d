//! PostgreSQL adapters for the scheduling ports

pub mod clients;
pub mod schedule;

pub use clients::PgClientDirectory;
pub use schedule::PgScheduleRepository;

//! Corpus store adapters
//!
//! [`MemoryCorpus`] keeps everything in process and backs the test suite and
//! database-less development runs. [`PgCorpus`] reads and writes the
//! PostgreSQL schema in `migrations/`.

mod memory;
mod postgres;

pub use memory::MemoryCorpus;
pub use postgres::PgCorpus;

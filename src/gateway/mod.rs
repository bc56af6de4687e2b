//! Database gateway implementations of [`Backend`](crate::Backend).

mod memory;
mod postgrest;
pub mod query;

pub use memory::{MemoryBackend, MemoryBackendError};
pub use postgrest::{PostgrestBackend, PostgrestError};

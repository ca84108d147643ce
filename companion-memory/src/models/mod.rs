pub mod error;

pub use error::{ErrorKind, MemoryError, MemoryResult};

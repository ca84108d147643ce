//! Storage abstractions for the memory core
//!
//! Stores never touch a map directly; they go through [`Repository`], so the
//! in-memory backend and a persistent one are interchangeable.
//!
//! ## Available Backends
//!
//! - `memory`: In-memory storage behind a `parking_lot::RwLock` (default)

mod memory;
mod traits;

pub use memory::*;
pub use traits::*;

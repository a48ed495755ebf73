//! Repository layer: entity-scoped database operations.
//!
//! Only detection records live here today. The record store is insert-only;
//! there is no update or delete path.

mod detection;

pub use detection::*;

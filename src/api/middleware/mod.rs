//! API middleware.
//!
//! Only caller identity resolution; every route sees an `OwnerContext`.

pub mod identity;

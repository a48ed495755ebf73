//! API endpoint handlers.

pub mod chat;
pub mod detect;
pub mod detections;
pub mod health;

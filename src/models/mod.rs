pub mod detection;
pub mod enums;

pub use detection::*;

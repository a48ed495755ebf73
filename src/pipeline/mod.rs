pub mod detection;
pub mod gemini;

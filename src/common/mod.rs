// Common utilities and shared types used across the application

pub mod constants;
pub mod error;

// Re-export commonly used items at module root for convenience
pub use error::{PipelineError, Result};

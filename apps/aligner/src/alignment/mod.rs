//! Alignment engine: resume sections and job requirements in, gap report and
//! tailoring suggestions out. Everything here is synchronous and free of I/O.

pub mod config;
pub mod errors;
pub mod formatting;
pub mod matcher;
pub mod models;
pub mod prompts;
pub mod requirements;
pub mod segmenter;
pub mod suggestions;

pub use config::AlignmentConfig;
pub use errors::AlignError;
pub use matcher::SemanticMatcher;

//! Scan a log file for severity keywords and stream a model's analysis of the surrounding context.

pub mod config;
pub mod error;
pub mod extractor;
pub mod ollama;
pub mod reporter;

pub use config::{Config, KeywordRule};
pub use error::{ExtractError, ModelError, ReportError};
pub use extractor::{AnnotatedLine, Extractor};
pub use ollama::ModelCheck;
pub use reporter::{build_prompt, render_stream, Reporter, StreamChunk, StreamOutcome, StreamRenderer};

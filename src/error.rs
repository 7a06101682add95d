use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Error: File '{}' not found.", .0.display())]
    NotFound(PathBuf),

    #[error("Error reading file: {0}")]
    Read(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    /// Connect failures, timeouts, non-success status and broken response bodies.
    #[error("Error making API request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error writing to console: {0}")]
    Console(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid API endpoint '{url}': {reason}")]
    Endpoint { url: String, reason: String },

    #[error("Failed to prepare model (is ollama running?): {0}")]
    Ollama(String),

    #[error("Error writing to console: {0}")]
    Console(#[from] std::io::Error),
}

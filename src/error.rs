//! Error types for the survey pipeline
//!
//! - Ingestion failures (unsupported format, bad columns or values)
//! - Malformed model replies (recoverable per item)
//! - Store failures (fatal to a batch)
//! - Batch-level failures

use std::path::PathBuf;

use thiserror::Error;

/// Transcript loading failed
#[derive(Debug, Error)]
pub enum IngestError {
    /// File extension outside the supported set
    #[error("unsupported transcript file type '{extension}' for {path:?} (expected .csv or .parquet)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A required column is absent
    #[error("transcript table is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: empty respondent_id")]
    EmptyRespondentId { row: usize },

    #[error("duplicate respondent_id '{0}'")]
    DuplicateRespondent(String),

    #[error("row {row}: invalid value '{value}' for column '{column}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// The model reply could not be turned into an answer
#[derive(Debug, Clone, Error)]
#[error("malformed model response: {reason}")]
pub struct MalformedResponseError {
    pub reason: String,
    /// Raw reply text, kept for diagnostics
    pub raw: String,
}

impl MalformedResponseError {
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// Response store failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open response store at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create store directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A durable append failed
    #[error("failed to persist answer for respondent '{respondent_id}': {source}")]
    Write {
        respondent_id: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One synthesis call failed
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The record has no transcript to ground the answer in
    #[error("respondent '{0}' has no transcript_text")]
    MissingTranscript(String),

    #[error("question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Malformed(#[from] MalformedResponseError),

    /// Transport or API failure talking to the model
    #[error("model call failed: {0}")]
    Model(#[source] anyhow::Error),
}

/// A batch run was halted
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no questions to ask")]
    NoQuestions,

    #[error("no respondents match the selection")]
    NoRespondents,

    /// Pre-flight check: some selected respondents cannot be synthesized
    #[error("{} selected respondent(s) have no transcript_text: {}", .0.len(), .0.join(", "))]
    MissingTranscript(Vec<String>),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("batch halted after {completed} of {total} answers: {source}")]
    Synthesis {
        completed: usize,
        total: usize,
        #[source]
        source: SynthesisError,
    },
}

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::SurveyResponse;

/// One row of a batch export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub respondent_id: String,
    pub question: String,
    pub answer: String,
    pub confidence: f64,
}

impl From<&SurveyResponse> for ExportRow {
    fn from(response: &SurveyResponse) -> Self {
        Self {
            respondent_id: response.respondent_id.clone(),
            question: response.question.clone(),
            answer: response.answer.clone(),
            confidence: response.confidence,
        }
    }
}

/// Column order of a batch export
pub const EXPORT_HEADER: [&str; 4] = ["respondent_id", "question", "answer", "confidence"];

/// Write responses as delimited text with a header row, even when empty
pub fn write_export<W: Write>(writer: W, responses: &[SurveyResponse]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer
        .write_record(EXPORT_HEADER)
        .context("Failed to write export header")?;
    for response in responses {
        writer
            .serialize(ExportRow::from(response))
            .context("Failed to serialize export row")?;
    }
    writer.flush().context("Failed to flush export")?;
    Ok(())
}

/// Write responses to a CSV file, creating parent directories
pub fn write_export_file(path: &Path, responses: &[SurveyResponse]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    write_export(file, responses)
}

/// Read a batch export back
pub fn read_export<R: Read>(reader: R) -> Result<Vec<ExportRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<ExportRow>, _>>()
        .context("Failed to parse export")
}

pub fn read_export_file(path: &Path) -> Result<Vec<ExportRow>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    read_export(file)
}

/// Write any serializable report as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, value).context("Failed to write JSON")?;
    Ok(())
}

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::debug;

use crate::error::IngestError;
use crate::models::{AttributeColumns, RespondentRecord, TranscriptTable};

/// Sample transcripts shipped with the binary
const BUNDLED_SAMPLE: &str = include_str!("../../data/sample_transcripts.csv");

/// Source formats accepted for transcript tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    Csv,
    Parquet,
}

impl TranscriptFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(TranscriptFormat::Csv),
            "parquet" => Ok(TranscriptFormat::Parquet),
            _ => Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Load a transcript table from a CSV or Parquet file
pub fn load_transcripts(path: &Path) -> Result<TranscriptTable, IngestError> {
    let format = TranscriptFormat::from_path(path)?;
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let raw = match format {
        TranscriptFormat::Csv => read_csv_rows(file)?,
        TranscriptFormat::Parquet => read_parquet_rows(file)?,
    };
    debug!(
        "Read {} rows with columns {:?} from {:?}",
        raw.rows.len(),
        raw.headers,
        path
    );
    build_table(raw)
}

/// Parse a CSV transcript table from any reader
pub fn parse_transcripts_csv<R: Read>(reader: R) -> Result<TranscriptTable, IngestError> {
    build_table(read_csv_rows(reader)?)
}

/// The transcript table bundled with the crate
pub fn bundled_sample() -> Result<TranscriptTable, IngestError> {
    parse_transcripts_csv(BUNDLED_SAMPLE.as_bytes())
}

/// Format-independent view of a table: column names plus cells, blank as None
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

fn read_csv_rows<R: Read>(reader: R) -> Result<RawTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.trim().is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable { headers, rows })
}

fn read_parquet_rows(file: File) -> Result<RawTable, IngestError> {
    let reader = SerializedFileReader::new(file)?;

    let headers: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in reader.get_row_iter(None)? {
        let row = row?;
        let mut cells = vec![None; headers.len()];
        for (name, field) in row.get_column_iter() {
            if let Some(index) = headers.iter().position(|h| h == name) {
                cells[index] = parquet_cell(field);
            }
        }
        rows.push(cells);
    }

    Ok(RawTable { headers, rows })
}

fn parquet_cell(field: &Field) -> Option<String> {
    let text = match field {
        Field::Null => return None,
        Field::Str(s) => s.clone(),
        Field::Bytes(bytes) => bytes.as_utf8().ok()?.to_string(),
        other => other.to_string(),
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Turn raw rows into respondent records, enforcing required columns and unique IDs
fn build_table(raw: RawTable) -> Result<TranscriptTable, IngestError> {
    let column = |name: &str| raw.headers.iter().position(|h| h == name);

    let id_col = column("respondent_id").ok_or(IngestError::MissingColumn("respondent_id"))?;
    let text_col =
        column("transcript_text").ok_or(IngestError::MissingColumn("transcript_text"))?;
    let age_col = column("age");
    let gender_col = column("gender");
    let region_col = column("region");

    let columns = AttributeColumns {
        age: age_col.is_some(),
        gender: gender_col.is_some(),
        region: region_col.is_some(),
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.rows.len());

    for (index, row) in raw.rows.iter().enumerate() {
        // 1-based data row, header excluded
        let row_number = index + 1;
        let cell = move |col: Option<usize>| col.and_then(|c| row.get(c)).and_then(|v| v.as_deref());

        let respondent_id = cell(Some(id_col))
            .map(|s| s.trim().to_string())
            .ok_or(IngestError::EmptyRespondentId { row: row_number })?;
        if !seen.insert(respondent_id.clone()) {
            return Err(IngestError::DuplicateRespondent(respondent_id));
        }

        let age = match cell(age_col) {
            Some(value) => Some(parse_age(value).ok_or_else(|| IngestError::InvalidValue {
                row: row_number,
                column: "age",
                value: value.to_string(),
            })?),
            None => None,
        };

        records.push(RespondentRecord {
            respondent_id,
            transcript_text: cell(Some(text_col)).unwrap_or_default().to_string(),
            age,
            gender: cell(gender_col).map(|s| s.trim().to_string()),
            region: cell(region_col).map(|s| s.trim().to_string()),
        });
    }

    Ok(TranscriptTable::new(records, columns))
}

/// Ages may arrive as integers or as integral floats ("42.0")
fn parse_age(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

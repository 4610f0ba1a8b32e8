use serde::{Deserialize, Serialize};

/// One row of the transcript table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondentRecord {
    /// Unique identifier within a loaded table
    pub respondent_id: String,
    /// Verbatim text of the prior interview
    pub transcript_text: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub region: Option<String>,
}

impl RespondentRecord {
    pub fn new(respondent_id: impl Into<String>, transcript_text: impl Into<String>) -> Self {
        Self {
            respondent_id: respondent_id.into(),
            transcript_text: transcript_text.into(),
            age: None,
            gender: None,
            region: None,
        }
    }

    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Whether the record carries enough context to be synthesized
    pub fn has_transcript(&self) -> bool {
        !self.transcript_text.trim().is_empty()
    }
}

/// Which optional demographic columns the source table carried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeColumns {
    pub age: bool,
    pub gender: bool,
    pub region: bool,
}

impl AttributeColumns {
    pub fn all() -> Self {
        Self {
            age: true,
            gender: true,
            region: true,
        }
    }
}

/// In-memory transcript table, uniform regardless of source format
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptTable {
    /// Rows in source order
    pub records: Vec<RespondentRecord>,
    /// Demographic columns present in the source
    pub columns: AttributeColumns,
}

impl TranscriptTable {
    pub fn new(records: Vec<RespondentRecord>, columns: AttributeColumns) -> Self {
        Self { records, columns }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First `n` rows, for previews
    pub fn head(&self, n: usize) -> &[RespondentRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Records that cannot be used for synthesis
    pub fn missing_transcripts(&self) -> impl Iterator<Item = &RespondentRecord> {
        self.records.iter().filter(|r| !r.has_transcript())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_clamps_to_len() {
        let table = TranscriptTable::new(
            vec![
                RespondentRecord::new("r1", "a"),
                RespondentRecord::new("r2", "b"),
            ],
            AttributeColumns::default(),
        );
        assert_eq!(table.head(5).len(), 2);
        assert_eq!(table.head(1)[0].respondent_id, "r1");
    }

    #[test]
    fn test_blank_transcript_is_unusable() {
        let record = RespondentRecord::new("r1", "   \n");
        assert!(!record.has_transcript());
        assert!(RespondentRecord::new("r2", "hello").has_transcript());
    }
}

use std::path::Path;

use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{RespondentRecord, SurveyResponse};

/// Append-only log of generated answers backed by a local SQLite file.
///
/// One writer is assumed. Every append is its own committed insert, so a
/// failure mid-batch leaves earlier answers in place. `AUTOINCREMENT`
/// guarantees surrogate IDs are never reused.
pub struct ResponseStore {
    conn: Connection,
}

impl ResponseStore {
    /// Open (or create) the store, creating the parent directory and schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self { conn };
        store.create_schema()?;
        debug!("Opened response store at {:?}", path);
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    /// Create the table if missing; safe to call repeatedly
    pub fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Persist one answer with a snapshot of the respondent's demographics
    pub fn append(
        &self,
        record: &RespondentRecord,
        question: &str,
        answer: &str,
        confidence: f64,
    ) -> Result<SurveyResponse, StoreError> {
        self.conn
            .execute(
                "INSERT INTO survey_responses
                    (respondent_id, age, gender, region, question, answer, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.respondent_id,
                    record.age,
                    record.gender,
                    record.region,
                    question,
                    answer,
                    confidence,
                ],
            )
            .map_err(|source| StoreError::Write {
                respondent_id: record.respondent_id.clone(),
                source,
            })?;

        let id = self.conn.last_insert_rowid();
        Ok(SurveyResponse::from_record(
            id, record, question, answer, confidence,
        ))
    }

    /// Total number of stored responses
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM survey_responses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Distinct questions in first-asked order
    pub fn questions(&self) -> Result<Vec<String>, StoreError> {
        let mut statement = self.conn.prepare(
            "SELECT question FROM survey_responses GROUP BY question ORDER BY MIN(id)",
        )?;
        let questions = statement
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(questions)
    }

    /// All responses to one question, oldest first
    pub fn responses_for_question(&self, question: &str) -> Result<Vec<SurveyResponse>, StoreError> {
        let mut statement = self.conn.prepare(
            "SELECT id, respondent_id, age, gender, region, question, answer, confidence
             FROM survey_responses WHERE question = ?1 ORDER BY id",
        )?;
        let responses = statement
            .query_map(params![question], response_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(responses)
    }
}

fn response_from_row(row: &Row<'_>) -> rusqlite::Result<SurveyResponse> {
    Ok(SurveyResponse {
        id: row.get(0)?,
        respondent_id: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        region: row.get(4)?,
        question: row.get(5)?,
        answer: row.get(6)?,
        confidence: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::error::BatchError;
    use crate::models::{Persona, QuestionList};
    use crate::stages::execute_batch;
    use crate::stages::stage1_synthesize::tests::ScriptedModel;

    fn record(id: &str) -> RespondentRecord {
        RespondentRecord::new(id, "transcript")
            .with_age(30)
            .with_gender("female")
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let store = ResponseStore::open_in_memory().unwrap();

        let a = store.append(&record("r1"), "Q1", "Yes", 0.9).unwrap();
        let b = store.append(&record("r2"), "Q1", "No", 0.4).unwrap();

        assert!(b.id > a.id);
        assert_eq!(a.gender.as_deref(), Some("female"));
        assert_eq!(a.region, None);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let store = ResponseStore::open_in_memory().unwrap();
        store.append(&record("r1"), "Q1", "Yes", 0.9).unwrap();
        store.create_schema().unwrap();
        store.create_schema().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_reopen_file_keeps_rows_and_never_reuses_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("database.db");

        let first_id = {
            let store = ResponseStore::open(&path).unwrap();
            store.append(&record("r1"), "Q1", "Yes", 0.9).unwrap().id
        };

        let store = ResponseStore::open(&path).unwrap();
        let second = store.append(&record("r2"), "Q1", "No", 0.1).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert!(second.id > first_id);
    }

    #[test]
    fn test_read_back_by_question() {
        let store = ResponseStore::open_in_memory().unwrap();
        store.append(&record("r1"), "Q2", "A", 0.5).unwrap();
        store.append(&record("r1"), "Q1", "B", 0.5).unwrap();
        store.append(&record("r2"), "Q2", "C", 0.7).unwrap();

        assert_eq!(store.questions().unwrap(), vec!["Q2", "Q1"]);

        let q2 = store.responses_for_question("Q2").unwrap();
        assert_eq!(q2.len(), 2);
        assert_eq!(q2[0].answer, "A");
        assert_eq!(q2[1].respondent_id, "r2");
        assert_eq!(q2[1].age, Some(30));

        assert_eq!(store.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_write_failure_halts_batch_and_keeps_earlier_rows() {
        let store = ResponseStore::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_r2 BEFORE INSERT ON survey_responses
                 WHEN NEW.respondent_id = 'r2'
                 BEGIN SELECT RAISE(ABORT, 'disk gone'); END;",
            )
            .unwrap();

        let model = ScriptedModel::new([
            r#"{"answer": "Yes", "confidence": 0.9}"#,
            r#"{"answer": "No", "confidence": 0.4}"#,
            r#"{"answer": "Maybe", "confidence": 0.5}"#,
        ]);
        let respondents = vec![record("r1"), record("r2"), record("r3")];
        let mut questions = QuestionList::new();
        questions.add("Q1");

        let err = execute_batch(
            &model,
            &store,
            Uuid::new_v4(),
            &respondents,
            &questions,
            Persona::Pollster,
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            BatchError::Storage(StoreError::Write { ref respondent_id, .. }) if respondent_id == "r2"
        ));
        // r3 is never asked
        assert_eq!(model.call_count(), 2);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.responses_for_question("Q1").unwrap()[0].respondent_id, "r1");
    }
}

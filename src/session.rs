use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::BatchError;
use crate::llm::ChatModel;
use crate::models::{Persona, QuestionList, RespondentRecord, TranscriptTable};
use crate::stages::{execute_batch, BatchProgress, BatchResult};
use crate::store::ResponseStore;

/// How many respondents answer each question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleSize {
    /// Every respondent in the filtered pool, once
    #[default]
    All,
    /// A random sample of this size; with replacement when it exceeds the pool
    Count(usize),
}

/// Everything needed for one batch run.
///
/// Built from a filtered table and the operator's questions, consumed by
/// [`SurveySession::run`].
#[derive(Debug, Clone)]
pub struct SurveySession {
    pub id: Uuid,
    /// Filtered respondent pool
    pub pool: TranscriptTable,
    pub questions: QuestionList,
    pub persona: Persona,
    pub sample: SampleSize,
}

impl SurveySession {
    pub fn new(pool: TranscriptTable, questions: QuestionList, persona: Persona) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool,
            questions,
            persona,
            sample: SampleSize::All,
        }
    }

    pub fn with_sample(mut self, sample: SampleSize) -> Self {
        self.sample = sample;
        self
    }

    /// Number of answers the run will produce
    pub fn planned_answers(&self) -> usize {
        let respondents = match self.sample {
            SampleSize::All => self.pool.len(),
            SampleSize::Count(_) if self.pool.is_empty() => 0,
            SampleSize::Count(n) => n,
        };
        respondents * self.questions.len()
    }

    /// Draw the respondents for this run
    pub fn draw_respondents<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<RespondentRecord> {
        sample_respondents(&self.pool.records, self.sample, rng)
    }

    /// Sample respondents, then ask every question of each
    pub async fn run<R, F>(
        self,
        client: &dyn ChatModel,
        store: &ResponseStore,
        rng: &mut R,
        on_progress: F,
    ) -> Result<BatchResult, BatchError>
    where
        R: Rng + ?Sized,
        F: FnMut(BatchProgress),
    {
        let respondents = self.draw_respondents(rng);
        info!(
            "Session {}: {} respondents drawn from a pool of {}",
            self.id,
            respondents.len(),
            self.pool.len()
        );

        execute_batch(
            client,
            store,
            self.id,
            &respondents,
            &self.questions,
            self.persona,
            on_progress,
        )
        .await
    }
}

/// Draw `sample` respondents from `pool`.
///
/// A sample no larger than the pool is drawn without replacement; a larger
/// one is drawn with replacement.
pub fn sample_respondents<R: Rng + ?Sized>(
    pool: &[RespondentRecord],
    sample: SampleSize,
    rng: &mut R,
) -> Vec<RespondentRecord> {
    match sample {
        SampleSize::All => pool.to_vec(),
        SampleSize::Count(n) if n <= pool.len() => pool.choose_multiple(rng, n).cloned().collect(),
        SampleSize::Count(n) => {
            warn!(
                "Requested {} respondents but only {} transcripts match, sampling with replacement",
                n,
                pool.len()
            );
            (0..n).filter_map(|_| pool.choose(rng)).cloned().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::models::AttributeColumns;
    use crate::stages::stage1_synthesize::tests::ScriptedModel;

    fn pool(n: usize) -> Vec<RespondentRecord> {
        (0..n)
            .map(|i| RespondentRecord::new(format!("r{}", i), "transcript"))
            .collect()
    }

    #[test]
    fn test_sample_all_keeps_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = sample_respondents(&pool(4), SampleSize::All, &mut rng);
        assert_eq!(drawn, pool(4));
    }

    #[test]
    fn test_sample_without_replacement() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = sample_respondents(&pool(10), SampleSize::Count(4), &mut rng);

        let ids: HashSet<&str> = drawn.iter().map(|r| r.respondent_id.as_str()).collect();
        assert_eq!(drawn.len(), 4);
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_sample_with_replacement_when_oversized() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = sample_respondents(&pool(2), SampleSize::Count(5), &mut rng);

        assert_eq!(drawn.len(), 5);
        assert!(drawn.iter().all(|r| r.respondent_id == "r0" || r.respondent_id == "r1"));
    }

    #[test]
    fn test_sample_from_empty_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(sample_respondents(&[], SampleSize::Count(3), &mut rng).is_empty());
    }

    #[test]
    fn test_planned_answers() {
        let mut questions = QuestionList::new();
        questions.add("Q1");
        questions.add("Q2");
        let table = TranscriptTable::new(pool(3), AttributeColumns::default());

        let session = SurveySession::new(table.clone(), questions.clone(), Persona::Pollster);
        assert_eq!(session.planned_answers(), 6);

        let session = session.with_sample(SampleSize::Count(10));
        assert_eq!(session.planned_answers(), 20);

        let empty = SurveySession::new(TranscriptTable::default(), questions, Persona::Pollster)
            .with_sample(SampleSize::Count(10));
        assert_eq!(empty.planned_answers(), 0);
    }

    #[tokio::test]
    async fn test_session_run_persists_every_item() {
        let model = ScriptedModel::new(
            (0..4).map(|i| format!(r#"{{"answer": "A{}", "confidence": 0.5}}"#, i)),
        );
        let store = ResponseStore::open_in_memory().unwrap();
        let mut questions = QuestionList::new();
        questions.add("Q1");
        questions.add("Q2");

        let session = SurveySession::new(
            TranscriptTable::new(pool(5), AttributeColumns::default()),
            questions,
            Persona::ProductManager,
        )
        .with_sample(SampleSize::Count(2));
        let batch_id = session.id;

        let mut rng = StdRng::seed_from_u64(1);
        let result = session
            .run(&model, &store, &mut rng, |_| {})
            .await
            .unwrap();

        assert_eq!(result.batch_id, batch_id);
        assert_eq!(result.persona, Persona::ProductManager);
        assert_eq!(result.responses.len(), 4);
        assert_eq!(store.count().unwrap(), 4);
        assert_eq!(model.call_count(), 4);
    }
}

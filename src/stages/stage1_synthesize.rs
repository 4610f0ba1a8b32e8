use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BatchError, SynthesisError};
use crate::llm::{build_synthesis_prompt, parse_answer_reply, ChatModel, Usage};
use crate::models::{
    AnswerOutcome, GeneratedAnswer, Persona, QuestionList, RespondentRecord, SurveyResponse,
};
use crate::store::ResponseStore;

/// A validated answer plus the tokens it cost
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub answer: GeneratedAnswer,
    pub usage: Usage,
}

/// Answer one question as one respondent, with exactly one model call.
///
/// Fails fast (before any network call) when the record has no transcript
/// or the question is blank. Repeated calls with the same inputs are not
/// expected to agree.
pub async fn synthesize(
    client: &dyn ChatModel,
    record: &RespondentRecord,
    question: &str,
    persona: Persona,
) -> Result<SynthesisOutput, SynthesisError> {
    if !record.has_transcript() {
        return Err(SynthesisError::MissingTranscript(
            record.respondent_id.clone(),
        ));
    }
    if question.trim().is_empty() {
        return Err(SynthesisError::EmptyQuestion);
    }

    let prompt = build_synthesis_prompt(record, question, persona);
    debug!("Prompt for {}:\n{}", record.respondent_id, prompt);

    let reply = client
        .complete_json(&prompt)
        .await
        .map_err(SynthesisError::Model)?;

    let answer = parse_answer_reply(&reply.content)?;

    Ok(SynthesisOutput {
        answer,
        usage: reply.usage,
    })
}

/// Completed vs. total answers in a running batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Result of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub persona: Persona,
    /// One persisted row per attempted (respondent, question) pair
    pub responses: Vec<SurveyResponse>,
    /// Rows that hold the malformed-reply sentinel
    pub sentinel_count: usize,
    pub usage: Usage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Run every (respondent, question) pair sequentially, respondent-major.
///
/// Each answer is committed on its own, so a halt leaves every earlier
/// answer persisted. Malformed replies become sentinel rows and the batch
/// moves on; model transport errors and store failures halt it.
pub async fn execute_batch<F>(
    client: &dyn ChatModel,
    store: &ResponseStore,
    batch_id: Uuid,
    respondents: &[RespondentRecord],
    questions: &QuestionList,
    persona: Persona,
    mut on_progress: F,
) -> Result<BatchResult, BatchError>
where
    F: FnMut(BatchProgress),
{
    if questions.is_empty() {
        return Err(BatchError::NoQuestions);
    }
    if respondents.is_empty() {
        return Err(BatchError::NoRespondents);
    }

    let mut missing: Vec<String> = respondents
        .iter()
        .filter(|r| !r.has_transcript())
        .map(|r| r.respondent_id.clone())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(BatchError::MissingTranscript(missing));
    }

    let total = respondents.len() * questions.len();
    let started_at = Utc::now();
    info!(
        "Batch {}: generating {} answers ({} respondents x {} questions) as {} with {}",
        batch_id,
        total,
        respondents.len(),
        questions.len(),
        persona,
        client.model_name()
    );

    let mut responses = Vec::with_capacity(total);
    let mut sentinel_count = 0;
    let mut usage = Usage::default();

    for record in respondents {
        for question in questions.iter() {
            let outcome = match synthesize(client, record, question, persona).await {
                Ok(output) => {
                    usage.add(output.usage);
                    AnswerOutcome::Answered(output.answer)
                }
                Err(SynthesisError::Malformed(e)) => {
                    warn!(
                        "Respondent {}: {}, substituting sentinel (raw reply: {:?})",
                        record.respondent_id, e, e.raw
                    );
                    AnswerOutcome::Sentinel { reason: e.reason }
                }
                Err(source) => {
                    return Err(BatchError::Synthesis {
                        completed: responses.len(),
                        total,
                        source,
                    });
                }
            };

            if outcome.is_sentinel() {
                sentinel_count += 1;
            }

            let response =
                store.append(record, question, outcome.answer_text(), outcome.confidence())?;
            debug!(
                "Stored response {} for {}: {:?}",
                response.id, record.respondent_id, response.answer
            );
            responses.push(response);

            let progress = BatchProgress {
                completed: responses.len(),
                total,
            };
            debug!("{}/{} answers", progress.completed, progress.total);
            on_progress(progress);
        }
    }

    info!(
        "Batch {} complete: {} answers, {} sentinels, {} tokens",
        batch_id,
        responses.len(),
        sentinel_count,
        usage.total()
    );

    Ok(BatchResult {
        batch_id,
        persona,
        responses,
        sentinel_count,
        usage,
        started_at,
        finished_at: Utc::now(),
    })
}

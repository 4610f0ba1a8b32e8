use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::RespondentRecord;

/// Confidence recorded when the model answers but does not report one.
/// The answer is usable; only its certainty is unknown.
pub const UNREPORTED_CONFIDENCE: f64 = 0.5;

/// Confidence recorded for sentinel answers. There is no usable answer,
/// so nothing about it can be trusted.
pub const SENTINEL_CONFIDENCE: f64 = 0.0;

/// Answer text substituted when a model reply cannot be parsed
pub const SENTINEL_ANSWER: &str = "ERROR: malformed response";

/// Role label shaping the voice of the model's answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    #[default]
    Pollster,
    Marketer,
    ProductManager,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Pollster, Persona::Marketer, Persona::ProductManager];

    /// Label embedded in the prompt
    pub fn label(&self) -> &'static str {
        match self {
            Persona::Pollster => "pollster",
            Persona::Marketer => "marketer",
            Persona::ProductManager => "product manager",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Persona::ALL
            .into_iter()
            .find(|p| p.label() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown persona '{}' (expected one of: pollster, marketer, product-manager)",
                    s
                )
            })
    }
}

/// Structured answer produced by one synthesis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    /// Free-text answer, never empty
    pub answer: String,
    /// Self-reported certainty in [0, 1]
    pub confidence: f64,
    /// True when the model omitted confidence and the default was applied
    #[serde(default)]
    pub confidence_defaulted: bool,
}

impl GeneratedAnswer {
    pub fn new(answer: impl Into<String>, confidence: f64) -> Self {
        Self {
            answer: answer.into(),
            confidence: confidence.clamp(0.0, 1.0),
            confidence_defaulted: false,
        }
    }

    /// Answer without a reported confidence
    pub fn unrated(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            confidence: UNREPORTED_CONFIDENCE,
            confidence_defaulted: true,
        }
    }
}

/// Outcome of one (respondent, question) item in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// The model produced a valid answer
    Answered(GeneratedAnswer),
    /// The reply was malformed; a flagged placeholder stands in
    Sentinel { reason: String },
}

impl AnswerOutcome {
    pub fn answer_text(&self) -> &str {
        match self {
            AnswerOutcome::Answered(a) => &a.answer,
            AnswerOutcome::Sentinel { .. } => SENTINEL_ANSWER,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            AnswerOutcome::Answered(a) => a.confidence,
            AnswerOutcome::Sentinel { .. } => SENTINEL_CONFIDENCE,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, AnswerOutcome::Sentinel { .. })
    }
}

/// Persisted row: respondent snapshot + question + answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    /// Surrogate key assigned by the store
    pub id: i64,
    pub respondent_id: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub region: Option<String>,
    pub question: String,
    pub answer: String,
    pub confidence: f64,
}

impl SurveyResponse {
    /// Build a response from a respondent snapshot; `id` is set by the store
    pub fn from_record(
        id: i64,
        record: &RespondentRecord,
        question: &str,
        answer: &str,
        confidence: f64,
    ) -> Self {
        Self {
            id,
            respondent_id: record.respondent_id.clone(),
            age: record.age,
            gender: record.gender.clone(),
            region: record.region.clone(),
            question: question.to_string(),
            answer: answer.to_string(),
            confidence,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.answer == SENTINEL_ANSWER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_parse() {
        assert_eq!("pollster".parse::<Persona>().unwrap(), Persona::Pollster);
        assert_eq!(
            "product-manager".parse::<Persona>().unwrap(),
            Persona::ProductManager
        );
        assert_eq!(
            "Product Manager".parse::<Persona>().unwrap(),
            Persona::ProductManager
        );
        assert!("economist".parse::<Persona>().is_err());
    }

    #[test]
    fn test_generated_answer_clamps_confidence() {
        assert_eq!(GeneratedAnswer::new("yes", 1.7).confidence, 1.0);
        assert_eq!(GeneratedAnswer::new("yes", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_unrated_and_sentinel_confidence_differ() {
        let unrated = GeneratedAnswer::unrated("maybe");
        assert!(unrated.confidence_defaulted);
        assert_eq!(unrated.confidence, UNREPORTED_CONFIDENCE);

        let sentinel = AnswerOutcome::Sentinel {
            reason: "bad json".to_string(),
        };
        assert_eq!(sentinel.confidence(), SENTINEL_CONFIDENCE);
        assert_eq!(sentinel.answer_text(), SENTINEL_ANSWER);
        assert!(sentinel.is_sentinel());
    }
}

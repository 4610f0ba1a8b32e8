use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::SurveyResponse;

/// Words ignored by the word-frequency summary
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "him", "his", "how", "i", "i'd", "i'm", "if", "in", "into", "is",
    "it", "it's", "its", "just", "me", "more", "most", "my", "no", "not", "of", "on", "or",
    "our", "out", "she", "so", "some", "than", "that", "the", "their", "them", "then", "there",
    "they", "this", "to", "too", "up", "very", "was", "we", "were", "what", "when", "which",
    "who", "will", "with", "would", "you", "your",
];

/// Configuration for the results view
#[derive(Debug, Clone)]
pub struct ResultsConfig {
    /// Minimum whitespace-delimited tokens before a word summary is produced
    pub min_summary_tokens: usize,
    /// Number of words kept in the summary
    pub top_words: usize,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            min_summary_tokens: 5,
            top_words: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerCount {
    pub answer: String,
    pub count: usize,
}

/// Demographic attribute used for cross-tabulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Bucketed by decade ("30-39")
    Age,
    Gender,
    Region,
}

impl Attribute {
    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Age => "age",
            Attribute::Gender => "gender",
            Attribute::Region => "region",
        }
    }
}

/// Answer frequencies within one attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossTabRow {
    pub value: String,
    pub counts: Vec<AnswerCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossTab {
    pub attribute: Attribute,
    /// Rows ordered by attribute value
    pub rows: Vec<CrossTabRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Word-frequency summary over the concatenated answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WordSummary {
    /// Too few tokens to summarize
    InsufficientText { token_count: usize },
    Summary {
        token_count: usize,
        words: Vec<WordCount>,
    },
}

/// Aggregated view of the answers to one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub question: String,
    pub total_answers: usize,
    pub unique_respondents: usize,
    pub sentinel_count: usize,
    pub mean_confidence: Option<f64>,
    /// Descending by count, ties by answer text
    pub answer_counts: Vec<AnswerCount>,
    /// One entry per attribute present in at least one response
    pub cross_tabs: Vec<CrossTab>,
    pub word_summary: WordSummary,
}

impl ResultsView {
    /// Build the view for `question`; responses to other questions are ignored
    pub fn build(question: &str, responses: &[SurveyResponse], config: &ResultsConfig) -> Self {
        let subset: Vec<&SurveyResponse> =
            responses.iter().filter(|r| r.question == question).collect();

        let unique_respondents = subset
            .iter()
            .map(|r| r.respondent_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        // Sentinels carry no confidence information
        let rated: Vec<f64> = subset
            .iter()
            .filter(|r| !r.is_sentinel())
            .map(|r| r.confidence)
            .collect();
        let mean_confidence =
            (!rated.is_empty()).then(|| rated.iter().sum::<f64>() / rated.len() as f64);

        let mut cross_tabs = Vec::new();
        if let Some(tab) = cross_tab(&subset, Attribute::Age, |r| {
            r.age.map(|a| {
                let start = a.div_euclid(10) * 10;
                (start, format!("{}-{}", start, start + 9))
            })
        }) {
            cross_tabs.push(tab);
        }
        if let Some(tab) = cross_tab(&subset, Attribute::Gender, |r| {
            r.gender.clone().map(|g| (0, g))
        }) {
            cross_tabs.push(tab);
        }
        if let Some(tab) = cross_tab(&subset, Attribute::Region, |r| {
            r.region.clone().map(|g| (0, g))
        }) {
            cross_tabs.push(tab);
        }

        // Every stored answer for the question, sentinels included
        let word_summary = summarize_words(subset.iter().map(|r| r.answer.as_str()), config);

        Self {
            question: question.to_string(),
            total_answers: subset.len(),
            unique_respondents,
            sentinel_count: subset.iter().filter(|r| r.is_sentinel()).count(),
            mean_confidence,
            answer_counts: count_answers(subset.iter().map(|r| r.answer.as_str())),
            cross_tabs,
            word_summary,
        }
    }

    /// Human-readable rendering
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Question: {}", self.question);
        let _ = writeln!(out, "{}", "=".repeat(self.question.len() + 10));
        let _ = writeln!(out, "Total synthetic answers: {}", self.total_answers);
        let _ = writeln!(out, "Unique synthetic personas: {}", self.unique_respondents);
        if self.sentinel_count > 0 {
            let _ = writeln!(out, "Malformed (sentinel) answers: {}", self.sentinel_count);
        }
        if let Some(mean) = self.mean_confidence {
            let _ = writeln!(out, "Mean confidence: {:.2}", mean);
        }
        out.push('\n');

        out.push_str("Answer counts\n-------------\n");
        let width = self
            .answer_counts
            .iter()
            .map(|c| c.answer.chars().count())
            .max()
            .unwrap_or(0)
            .min(60);
        for count in &self.answer_counts {
            let share = count.count as f64 / self.total_answers.max(1) as f64 * 100.0;
            let _ = writeln!(
                out,
                "{:<width$}  {:>4}  {:>5.1}%",
                truncate(&count.answer, 60),
                count.count,
                share,
                width = width
            );
        }

        for tab in &self.cross_tabs {
            let label = tab.attribute.label();
            let _ = write!(out, "\nBy {}\n{}\n", label, "-".repeat(3 + label.len()));
            for row in &tab.rows {
                let cells: Vec<String> = row
                    .counts
                    .iter()
                    .map(|c| format!("{} ({})", truncate(&c.answer, 30), c.count))
                    .collect();
                let _ = writeln!(out, "{}: {}", row.value, cells.join(", "));
            }
        }

        out.push_str("\nWord frequency\n--------------\n");
        match &self.word_summary {
            WordSummary::InsufficientText { .. } => {
                out.push_str("Not enough text to summarize.\n");
            }
            WordSummary::Summary { words, .. } => {
                let line: Vec<String> = words
                    .iter()
                    .map(|w| format!("{} ({})", w.word, w.count))
                    .collect();
                let _ = writeln!(out, "{}", line.join(", "));
            }
        }

        out
    }
}

/// Distinct questions in first-seen order
pub fn distinct_questions(responses: &[SurveyResponse]) -> Vec<String> {
    let mut seen = HashSet::new();
    responses
        .iter()
        .filter(|r| seen.insert(r.question.as_str()))
        .map(|r| r.question.clone())
        .collect()
}

/// Frequency per distinct answer, descending by count then ascending by text
pub fn count_answers<'a>(answers: impl Iterator<Item = &'a str>) -> Vec<AnswerCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for answer in answers {
        *counts.entry(answer).or_insert(0) += 1;
    }

    let mut counts: Vec<AnswerCount> = counts
        .into_iter()
        .map(|(answer, count)| AnswerCount {
            answer: answer.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.answer.cmp(&b.answer)));
    counts
}

/// Cross-tabulate answers against one attribute. The key function returns
/// a sort key plus display label; responses without the attribute are
/// skipped, and `None` is returned when no response has it.
fn cross_tab<F>(subset: &[&SurveyResponse], attribute: Attribute, key: F) -> Option<CrossTab>
where
    F: Fn(&SurveyResponse) -> Option<(i64, String)>,
{
    let mut groups: BTreeMap<(i64, String), Vec<&str>> = BTreeMap::new();
    for response in subset {
        if let Some(k) = key(*response) {
            groups.entry(k).or_default().push(response.answer.as_str());
        }
    }

    if groups.is_empty() {
        return None;
    }

    Some(CrossTab {
        attribute,
        rows: groups
            .into_iter()
            .map(|((_, value), answers)| CrossTabRow {
                value,
                counts: count_answers(answers.into_iter()),
            })
            .collect(),
    })
}

/// Word frequencies over the concatenated answers, or `InsufficientText`
/// when there are fewer than `min_summary_tokens` whitespace tokens
pub fn summarize_words<'a>(
    answers: impl Iterator<Item = &'a str>,
    config: &ResultsConfig,
) -> WordSummary {
    let blob = answers.collect::<Vec<_>>().join(" ");
    let token_count = blob.split_whitespace().count();

    if token_count < config.min_summary_tokens {
        return WordSummary::InsufficientText { token_count };
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in blob.split_whitespace() {
        let word = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.is_empty() || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut words: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect();
    words.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    words.truncate(config.top_words);

    WordSummary::Summary { token_count, words }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut cut: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Demographic predicates applied to a transcript table.
/// Every predicate is optional; `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicSelection {
    /// Inclusive (min, max) age bounds
    pub age_range: Option<(i64, i64)>,
    /// Allowed gender values
    pub gender_in: Option<BTreeSet<String>>,
    /// Allowed region values
    pub region_in: Option<BTreeSet<String>>,
}

impl DemographicSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_age_range(mut self, min: i64, max: i64) -> Self {
        self.age_range = Some((min, max));
        self
    }

    pub fn with_genders<I, S>(mut self, genders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gender_in = Some(genders.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.region_in = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    /// True when no predicate is set
    pub fn is_unrestricted(&self) -> bool {
        self.age_range.is_none() && self.gender_in.is_none() && self.region_in.is_none()
    }
}

/// Ordered list of survey questions owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionList {
    questions: Vec<String>,
}

impl QuestionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question. Input is trimmed; blank input is ignored.
    /// Returns whether the question was added.
    pub fn add(&mut self, question: &str) -> bool {
        let question = question.trim();
        if question.is_empty() {
            return false;
        }
        self.questions.push(question.to_string());
        true
    }

    /// Remove the question at `index`, returning it
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index < self.questions.len() {
            Some(self.questions.remove(index))
        } else {
            None
        }
    }

    /// Parse one question per line, skipping blank lines
    pub fn from_lines(text: &str) -> Self {
        let mut list = Self::new();
        for line in text.lines() {
            list.add(line);
        }
        list
    }

    pub fn extend<I, S>(&mut self, questions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for q in questions {
            self.add(q.as_ref());
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_list_add_trims_and_skips_blank() {
        let mut list = QuestionList::new();
        assert!(list.add("  Who will you vote for?  "));
        assert!(!list.add("   "));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["Who will you vote for?"]);
    }

    #[test]
    fn test_question_list_remove() {
        let mut list = QuestionList::from_lines("Q1\n\nQ2\nQ3\n");
        assert_eq!(list.len(), 3);
        assert_eq!(list.remove(1).as_deref(), Some("Q2"));
        assert_eq!(list.remove(5), None);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["Q1", "Q3"]);
    }

    #[test]
    fn test_selection_unrestricted() {
        assert!(DemographicSelection::new().is_unrestricted());
        assert!(!DemographicSelection::new()
            .with_genders(["female"])
            .is_unrestricted());
    }
}

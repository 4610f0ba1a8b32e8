use crate::models::{Persona, RespondentRecord};

/// Build the single prompt for one synthesis call.
///
/// The prompt carries, in order: the persona framing, the respondent's
/// verbatim transcript, the instruction to answer as that person would
/// today, the required JSON reply shape, and the question itself.
pub fn build_synthesis_prompt(record: &RespondentRecord, question: &str, persona: Persona) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are acting as a {} conducting an interview.\n\n",
        persona.label()
    ));

    prompt.push_str("# Context\n");
    prompt.push_str("Verbatim transcript from a prior interview with this respondent:\n");
    prompt.push_str("\"\"\"\n");
    prompt.push_str(record.transcript_text.trim());
    prompt.push_str("\n\"\"\"\n\n");

    prompt.push_str("# Task\n");
    prompt.push_str(
        "Based on the interview above, answer the survey question below \
         **as that same person would answer it today**, in their own voice.\n",
    );
    prompt.push_str(
        "If the question lists options in brackets, answer with exactly one of those options.\n\n",
    );

    prompt.push_str("# Output format\n");
    prompt.push_str("Reply with a single JSON object and nothing else:\n");
    prompt.push_str("{\"answer\": string, \"confidence\": number between 0 and 1}\n\n");

    prompt.push_str("# Question\n");
    prompt.push_str(question.trim());
    prompt.push('\n');

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_all_parts() {
        let record = RespondentRecord::new("r1", "  I ride my bike to work every day.  ");
        let prompt = build_synthesis_prompt(&record, "How do you commute?", Persona::ProductManager);

        assert!(prompt.starts_with("You are acting as a product manager"));
        assert!(prompt.contains("\"\"\"\nI ride my bike to work every day.\n\"\"\""));
        assert!(prompt.contains("as that same person would answer it today"));
        assert!(prompt.contains("\"answer\": string"));
        assert!(prompt.contains("\"confidence\": number"));
        assert!(prompt.trim_end().ends_with("How do you commute?"));
    }

    #[test]
    fn test_prompt_does_not_leak_demographics() {
        let record = RespondentRecord::new("r1", "hello")
            .with_age(44)
            .with_region("north");
        let prompt = build_synthesis_prompt(&record, "Q?", Persona::Pollster);

        assert!(!prompt.contains("44"));
        assert!(!prompt.contains("north"));
    }
}

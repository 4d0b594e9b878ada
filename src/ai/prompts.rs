/// Preamble for follow-up questions (text-completion provider)
pub const FOLLOWUP_SYSTEM_PROMPT: &str = r#"You are a medical assistant. A patient uploaded a prescription, medicine label or medical report, and the text below was extracted from it.

RULES:
1. Answer the patient's question using the extracted text as your primary context
2. Explain clearly, in plain language
3. If the text does not contain the answer, say so instead of guessing
4. Remind the patient to confirm dosage changes with their doctor or pharmacist"#;

/// Probe sent by the connection check
pub const CONNECTION_CHECK_PROMPT: &str = "Hello, please respond with 'OK' if you can hear me.";

/// Build the follow-up prompt
///
/// The extracted text and the question are included verbatim. Callers must check
/// the result against the provider's size limit rather than cutting it down.
pub fn build_followup_prompt(extracted_text: &str, question: &str) -> String {
    let mut prompt = String::with_capacity(
        FOLLOWUP_SYSTEM_PROMPT.len() + extracted_text.len() + question.len() + 64,
    );

    prompt.push_str(FOLLOWUP_SYSTEM_PROMPT);
    prompt.push_str(&format!(
        r#"

EXTRACTED TEXT:
---
{}
---

QUESTION: {}"#,
        extracted_text, question
    ));

    prompt
}

/// Size of a prompt as counted against the provider limit
pub fn prompt_size(prompt: &str) -> usize {
    prompt.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_text_and_question_verbatim() {
        let text = "Lisinopril 10mg\n  take 1 tablet   twice daily";
        let question = "  Can I take this with food?  ";
        let prompt = build_followup_prompt(text, question);

        assert!(prompt.starts_with(FOLLOWUP_SYSTEM_PROMPT));
        assert!(prompt.contains(text));
        assert!(prompt.ends_with(question));
    }

    #[test]
    fn test_prompt_is_not_truncated() {
        let text = "x".repeat(100_000);
        let prompt = build_followup_prompt(&text, "?");
        assert!(prompt_size(&prompt) > 100_000);
    }

    #[test]
    fn test_prompt_size_counts_chars() {
        assert_eq!(prompt_size("abc"), 3);
        assert_eq!(prompt_size("mg/µl"), 5);
    }
}

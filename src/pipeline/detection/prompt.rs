/// Substituted whenever recommendations cannot be generated, whatever the label.
///
/// The wording reads as a healthy verdict even for diseased labels; callers
/// that care can tell via `Recommendation::is_fallback`.
pub const FALLBACK_RECOMMENDATION: &str =
    "Plant appears healthy. Continue regular monitoring and maintenance.";

/// Upper bound on the advice length requested from the model.
pub const MAX_RECOMMENDATION_WORDS: u32 = 300;

/// Build the treatment prompt for one classified disease label.
pub fn build_recommendation_prompt(disease_name: &str) -> String {
    // Quotes inside the label would end the quoted name early.
    let label = disease_name.replace('"', "'");

    format!(
        r#"You are an expert agricultural pathologist. Provide detailed treatment recommendations for "{label}" in plants. Include:

1. **Immediate Actions** (what to do right now)
2. **Treatment Options** (fungicides, organic treatments)
3. **Prevention** (how to prevent future occurrences)
4. **Monitoring** (what to watch for)

Format with markdown headers and bullet points. Keep it practical and actionable for farmers. Maximum {MAX_RECOMMENDATION_WORDS} words."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_interpolates_label() {
        let prompt = build_recommendation_prompt("Rust or Yellow Leaf Disease");
        assert!(prompt.contains("\"Rust or Yellow Leaf Disease\""));
    }

    #[test]
    fn prompt_requests_all_four_sections() {
        let prompt = build_recommendation_prompt("Healthy Plant");
        for section in ["Immediate Actions", "Treatment Options", "Prevention", "Monitoring"] {
            assert!(prompt.contains(section), "missing section {section}");
        }
        assert!(prompt.contains("markdown"));
        assert!(prompt.contains("Maximum 300 words"));
    }

    #[test]
    fn prompt_neutralizes_embedded_quotes() {
        let prompt = build_recommendation_prompt("Odd \"label\"");
        assert!(prompt.contains("\"Odd 'label'\""));
    }

    #[test]
    fn fallback_text_is_exact() {
        assert_eq!(
            FALLBACK_RECOMMENDATION,
            "Plant appears healthy. Continue regular monitoring and maintenance."
        );
    }
}

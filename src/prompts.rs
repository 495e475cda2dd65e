//! Prompts for the interpretation and summary stages.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing what the model is asked for
//!    (e.g. adding a field to the interpretation) requires editing one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, so prompt regressions are caught early.
//!
//! The interpretation output is itself the input of both summaries, so the
//! field list in [`INTERPRETATION_FIELDS`] is effectively a contract between
//! the stages.

/// System message of the interpretation stage.
pub const INTERPRET_SYSTEM_PROMPT: &str = "You are an expert of data analysis and charts.";

/// System message shared by both summary stages.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful business assistant.";

/// Fields the interpretation must report, in order.
pub const INTERPRETATION_FIELDS: [&str; 9] = [
    "Name of chart",
    "Source of chart",
    "Type of chart",
    "Variables (axes or categories)",
    "Units",
    "Topic of chart (1–2 sentences)",
    "Trends (2–3 sentences)",
    "Highest and lowest values",
    "Confidence of your answers",
];

const INTERPRET_INSTRUCTIONS: &str = r#"Interpret the following OCR text extracted from a chart.
Your task is to clean OCR errors, recover numeric values, and extract structured information.

IMPORTANT RULES:
- Do NOT guess missing information. If something is not present, return "unknown".
- Use only the content that appears in the OCR text.
- Identify the chart type only if it can be clearly determined (e.g., bar, line, pie, scatter).
  If the type is ambiguous or unclear, return "unknown".
  The list of chart types is not exhaustive.

Return the result in the following structured form:
"#;

/// Placeholder hint for each field in [`INTERPRETATION_FIELDS`].
const FIELD_HINTS: [&str; 9] = [
    "<cleaned title or \"unknown\">",
    "<if mentioned, otherwise \"unknown\">",
    "<as defined above>",
    "<list of variables extracted from the text>",
    "<if identified, otherwise \"unknown\">",
    "<short explanation of what the chart describes>",
    "<main trend(s) visible in the data>",
    "<specify category + value for highest and lowest>",
    "<low / medium / high>",
];

const LONG_SUMMARY_INSTRUCTIONS: &str = r#"You are a business assistant who creates short, clear summaries of provided data.
Based on the interpretation below, prepare a concise summary in English,
understandable for a non-technical reader.

Guidelines:
- Maximum 4–6 sentences.
- Style: professional, concise, focused on conclusions.
- Avoid technical jargon.
- Focus on trends, differences, changes, and key figures.
- Do not repeat raw data — describe them in words.
- If the data shows growth/decline – state it clearly.
- Do not add any information that is not present in the interpretation."#;

const SHORT_SUMMARY_INSTRUCTIONS: &str = "Create a one-sentence short summary describing the main trend or key insight.\nBe concise and rely only on the interpretation below.";

/// User message of the interpretation stage.
pub fn interpret_prompt(ocr_text: &str) -> String {
    let fields: String = INTERPRETATION_FIELDS
        .iter()
        .zip(FIELD_HINTS.iter())
        .map(|(field, hint)| format!("- {field}: {hint}\n"))
        .collect();
    format!("{INTERPRET_INSTRUCTIONS}\n{fields}\nOCR data:\n{ocr_text}\n")
}

/// User message of the one-sentence summary.
pub fn short_summary_prompt(interpretation: &str) -> String {
    format!("{SHORT_SUMMARY_INSTRUCTIONS}\n\nINTERPRETATION:\n{interpretation}\n")
}

/// User message of the 4–6 sentence summary.
pub fn long_summary_prompt(interpretation: &str) -> String {
    format!("{LONG_SUMMARY_INSTRUCTIONS}\n\nDATA FOR SUMMARY:\n{interpretation}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpret_prompt_lists_every_field_in_order() {
        let prompt = interpret_prompt("Q1 100");
        let mut last = 0;
        for field in INTERPRETATION_FIELDS {
            let pos = prompt
                .find(&format!("- {field}:"))
                .unwrap_or_else(|| panic!("missing field {field}"));
            assert!(pos > last, "{field} out of order");
            last = pos;
        }
        assert!(prompt.contains("return \"unknown\""));
        assert!(prompt.ends_with("OCR data:\nQ1 100\n"));
    }

    #[test]
    fn summary_prompts_embed_interpretation() {
        let short = short_summary_prompt("Sales grew.");
        assert!(short.contains("one-sentence"));
        assert!(short.contains("INTERPRETATION:\nSales grew."));

        let long = long_summary_prompt("Sales grew.");
        assert!(long.contains("Maximum 4–6 sentences."));
        assert!(long.contains("Avoid technical jargon."));
        assert!(long.contains("DATA FOR SUMMARY:\nSales grew."));
    }

    #[test]
    fn system_prompts_are_distinct() {
        assert_ne!(INTERPRET_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT);
    }
}

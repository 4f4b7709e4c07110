//! Instruction text sent to the generation model.

use slide_protocol::SlideDeck;

use crate::error::Result;

/// Fixed instruction for chunk summarization.
pub const SUMMARIZE_INSTRUCTION: &str = "You are a document summarizer. Shorten the following \
article while capturing all key points. Keep the original format. Output only the shortened \
article.";

const SLIDE_FORMAT: &str = r#"[{"slide_number": <Float>, "title": "<String>", "content": "<String>", "narration": "<String>"}]"#;

/// Render the context block for a generate or edit request.
///
/// `existing` is sent with narration stripped; an empty deck means a fresh
/// presentation.
pub fn render_slide_instructions(source_text: &str, existing: &SlideDeck) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();

    if !source_text.trim().is_empty() {
        parts.push(format!("Input Article: {source_text}"));
    }

    let based_on = if source_text.trim().is_empty() {
        ""
    } else {
        " based on the aforementioned Input Article"
    };
    let existing_json = serde_json::to_string(&existing.without_narration())?;
    parts.push(
        [
            format!(
                "User will ask you to create or update text content for some slides{based_on}. \
                 The response must be valid JSON structured as: {SLIDE_FORMAT}"
            ),
            "The content field is the main text of each slide and should be comprehensive. \
             Use a mix of bullet points and text when applicable."
                .to_string(),
            "When modifying an existing slide keep its slide number unchanged. When adding \
             slides use decimal slide numbers: to add slides after slide 2 use 2.1, 2.2, ..."
                .to_string(),
            "To remove a slide set its slide number to the negative of its current value."
                .to_string(),
            format!("The existing slides are as follows: {existing_json}"),
        ]
        .join("\n"),
    );

    parts.push(
        "The narration field is an example transcript presenting the content field. Never \
         mention the slide number in the transcript. Only populate narration when the user \
         explicitly asks for it, otherwise leave it empty. When a slide must change, modify \
         its content field rather than its narration."
            .to_string(),
    );
    parts.push(
        "Respond only with JSON in the format described above. slide_number, title and content \
         are mandatory keys."
            .to_string(),
    );

    Ok(parts.join("\n\n"))
}

pub fn render_theme_hint(theme: Option<&str>) -> Option<String> {
    theme
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("Presentation theme: {t}. Match tone and wording to this theme."))
}

/// Corrective instruction appended when a response could not be parsed.
pub fn render_repair_instruction(prompt: &str, reason: &str) -> String {
    format!(
        "{prompt}\n\nYour previous answer could not be used ({reason}). Reply again with only a \
         JSON array of objects shaped exactly as {SLIDE_FORMAT}, with no surrounding text."
    )
}

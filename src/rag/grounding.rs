//! Prompt construction for grounded answers.
//!
//! The grounding contract lives entirely in the system instructions: answer
//! from the supplied material or reply with [`SENTINEL_ANSWER`] verbatim.
//! Personalization only appends phrasing guidance and never relaxes that rule.

use super::types::{ExperienceLevel, QueryResult, UserProfile};

/// Exact abstention answer. Clients match on this string.
pub const SENTINEL_ANSWER: &str = "I don't know — it's not in the provided content.";

/// Spellings of the sentinel seen from models and mis-decoded transports.
const SENTINEL_VARIANTS: [&str; 3] = [
    SENTINEL_ANSWER,
    "I don't know - it's not in the provided content.",
    "I don't know â€” it's not in the provided content.",
];

const NO_SECTION: &str = "Untitled";

pub fn full_book_system_prompt() -> String {
    format!(
        "You are a teaching assistant for a technical book. Answer strictly and only \
         from the book context provided in the user message.\n\
         If the answer is not present in that context, respond with exactly: {}\n\
         Never invent information, never use outside knowledge, and never guess.",
        SENTINEL_ANSWER
    )
}

pub fn selected_text_system_prompt() -> String {
    format!(
        "You are a teaching assistant for a technical book. Answer using ONLY the provided \
         selected text in the user message; ignore anything else you know about the topic.\n\
         If the answer is not present in the selected text, respond with exactly: {}\n\
         Never invent information and never guess.",
        SENTINEL_ANSWER
    )
}

/// Extra phrasing guidance for the reader's experience level, if any.
///
/// Beginner in either domain wins over advanced; an all-intermediate profile
/// adds nothing.
pub fn personalization_instruction(profile: &UserProfile) -> Option<String> {
    let domains_at = |level: ExperienceLevel| -> Vec<&'static str> {
        [
            ("software", profile.software_experience),
            ("hardware", profile.hardware_experience),
        ]
        .into_iter()
        .filter(|(_, l)| *l == level)
        .map(|(domain, _)| domain)
        .collect()
    };

    let beginner = domains_at(ExperienceLevel::Beginner);
    if !beginner.is_empty() {
        return Some(format!(
            "When explaining concepts, assume the user has beginner-level experience in {}. \
             Provide more detailed explanations and simpler terminology.",
            beginner.join(" and ")
        ));
    }

    let advanced = domains_at(ExperienceLevel::Advanced);
    if !advanced.is_empty() {
        return Some(format!(
            "When explaining concepts, assume the user has advanced-level experience in {}. \
             Use precise technical terminology and skip introductory explanations.",
            advanced.join(" and ")
        ));
    }

    None
}

/// Base instructions followed by the profile guidance, when there is any.
pub fn with_personalization(system: String, profile: Option<&UserProfile>) -> String {
    match profile.and_then(personalization_instruction) {
        Some(extra) => format!("{}\n\n{}", system, extra),
        None => system,
    }
}

/// Retrieved chunks, each tagged with where it came from.
pub fn format_context(results: &[QueryResult]) -> String {
    results
        .iter()
        .map(|result| {
            let payload = &result.payload;
            let title = if payload.section_title.trim().is_empty() {
                NO_SECTION
            } else {
                payload.section_title.as_str()
            };
            format!(
                "[Section: {} | Page {}]\n{}",
                title,
                payload.page_number,
                payload.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn full_book_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Book context:\n{}\n\nQuestion: {}\n\nAnswer using only the book context above.",
        context,
        question.trim()
    )
}

pub fn selected_text_user_prompt(selected_text: &str, question: &str) -> String {
    format!(
        "Selected text:\n\"\"\"\n{}\n\"\"\"\n\nQuestion: {}\n\nAnswer using only the selected text above.",
        selected_text.trim(),
        question.trim()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCheck {
    Empty,
    Abstained,
    Approved,
}

/// Pattern check only; it does not verify the answer against the context.
///
/// An answer abstains only when the whole reply is the sentinel, give or take
/// wrapping quotes and the final period. A partial answer that mentions the
/// sentinel for one part of the question is kept.
pub fn validate_response_accuracy(answer: &str) -> ResponseCheck {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        ResponseCheck::Empty
    } else if is_sentinel(trimmed) {
        ResponseCheck::Abstained
    } else {
        ResponseCheck::Approved
    }
}

fn is_sentinel(answer: &str) -> bool {
    let bare = |text: &str| {
        text.trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '\u{201c}' | '\u{201d}'))
            .trim()
            .trim_end_matches('.')
            .trim()
            .to_string()
    };
    let answer = bare(answer);
    SENTINEL_VARIANTS
        .iter()
        .any(|variant| bare(variant).eq_ignore_ascii_case(&answer))
}

/// Collapses empty and abstaining answers onto the exact sentinel.
pub fn normalize_answer(answer: String) -> String {
    match validate_response_accuracy(&answer) {
        ResponseCheck::Approved => answer.trim().to_string(),
        ResponseCheck::Empty | ResponseCheck::Abstained => SENTINEL_ANSWER.to_string(),
    }
}

//! Payload parser for closed tagged blocks
//!
//! Quiz and flashcard blocks carry a JSON object; the image directive is a
//! single line of the form `<prompt> | n=<count>`. Any decoding or schema
//! failure is returned as a [`PayloadError`] so the caller can fall back to
//! showing the block's text.

use crate::config::{RenderConfig, IMAGE_COUNT_LIMIT};
use crate::error::{PayloadError, Result};
use crate::tags::TagKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static COUNT_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*n\s*=\s*(.*?)\s*$").expect("count clause regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPayload {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardPayload {
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// `[IMAGE: <prompt> | n=<count>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDirective {
    pub prompt: String,
    pub count: u32,
}

/// A decoded block payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Quiz(QuizPayload),
    Flashcards(FlashcardPayload),
    Image(ImageDirective),
}

impl Payload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Quiz(_) => "quiz",
            Payload::Flashcards(_) => "flashcards",
            Payload::Image(_) => "image",
        }
    }
}

/// Decode the inner text of a closed block of the given kind
pub fn parse_payload(kind: &TagKind, inner: &str, config: &RenderConfig) -> Result<Payload> {
    match kind {
        TagKind::Quiz => parse_quiz(inner, config).map(Payload::Quiz),
        TagKind::Flashcards => parse_flashcards(inner).map(Payload::Flashcards),
        TagKind::Image => parse_image(inner, config).map(Payload::Image),
        TagKind::Unknown(name) => Err(PayloadError::unknown_kind(name.as_str())),
    }
}

pub fn parse_quiz(inner: &str, config: &RenderConfig) -> Result<QuizPayload> {
    let quiz: QuizPayload = serde_json::from_str(inner.trim())?;

    if quiz.questions.is_empty() {
        return Err(PayloadError::EmptyQuiz);
    }

    for (i, q) in quiz.questions.iter().enumerate() {
        let found = q.options.len();
        if found < config.min_options {
            return Err(PayloadError::TooFewOptions {
                question: i,
                found,
                min: config.min_options,
            });
        }
        if found > config.max_options {
            return Err(PayloadError::TooManyOptions {
                question: i,
                found,
                max: config.max_options,
            });
        }
        if q.answer_index >= found {
            return Err(PayloadError::AnswerOutOfRange {
                question: i,
                index: q.answer_index,
                options: found,
            });
        }
    }

    Ok(quiz)
}

pub fn parse_flashcards(inner: &str) -> Result<FlashcardPayload> {
    let deck: FlashcardPayload = serde_json::from_str(inner.trim())?;

    if deck.cards.is_empty() {
        return Err(PayloadError::EmptyDeck);
    }

    Ok(deck)
}

/// Parse `<prompt> | n=<count>`. The last `|` separates prompt and count.
pub fn parse_image(inner: &str, config: &RenderConfig) -> Result<ImageDirective> {
    let (prompt, clause) = inner.rsplit_once('|').ok_or(PayloadError::MissingCount)?;

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PayloadError::MissingPrompt);
    }

    let caps = COUNT_CLAUSE
        .captures(clause)
        .ok_or(PayloadError::MissingCount)?;
    let raw = &caps[1];

    let count: u32 = raw.parse().map_err(|_| PayloadError::invalid_count(raw))?;
    if count < 1 {
        return Err(PayloadError::invalid_count(raw));
    }

    let max = config.max_image_count.min(IMAGE_COUNT_LIMIT);
    let count = if count > max {
        log::warn!("image directive asks for {} images, clamping to {}", count, max);
        max
    } else {
        count
    };

    Ok(ImageDirective {
        prompt: prompt.to_string(),
        count,
    })
}

//! Interactive widgets built from decoded payloads
//!
//! Each widget pairs its payload with interaction state that starts at the
//! defaults (nothing answered, cards face up, images pending) and only
//! changes through the widget's own handlers.

use crate::config::RenderConfig;
use crate::error::WidgetError;
use crate::payload::{parse_payload, FlashcardPayload, ImageDirective, Payload, QuizPayload};
use crate::tags::TagKind;
use serde::Serialize;

/// A quiz with one-shot answers per question
#[derive(Debug, Clone, Serialize)]
pub struct QuizWidget {
    pub payload: QuizPayload,
    selections: Vec<Option<usize>>,
}

impl QuizWidget {
    pub fn new(payload: QuizPayload) -> Self {
        let selections = vec![None; payload.questions.len()];
        Self {
            payload,
            selections,
        }
    }

    /// Record an answer. The first answer to a question is final.
    ///
    /// Returns whether the answer was correct, or `None` if the selection
    /// was ignored (already answered, or an index out of range).
    pub fn select_option(&mut self, question: usize, option: usize) -> Option<bool> {
        let q = self.payload.questions.get(question)?;
        if option >= q.options.len() {
            return None;
        }

        let slot = &mut self.selections[question];
        if slot.is_some() {
            return None;
        }
        *slot = Some(option);

        Some(option == q.answer_index)
    }

    pub fn selection(&self, question: usize) -> Option<usize> {
        self.selections.get(question).copied().flatten()
    }

    /// A question is revealed once it has been answered
    pub fn is_revealed(&self, question: usize) -> bool {
        self.selection(question).is_some()
    }

    pub fn is_correct(&self, question: usize) -> Option<bool> {
        let selected = self.selection(question)?;
        Some(selected == self.payload.questions[question].answer_index)
    }

    /// (correct, answered)
    pub fn score(&self) -> (usize, usize) {
        (0..self.selections.len()).fold((0, 0), |(correct, answered), q| {
            match self.is_correct(q) {
                Some(true) => (correct + 1, answered + 1),
                Some(false) => (correct, answered + 1),
                None => (correct, answered),
            }
        })
    }

    pub fn question_count(&self) -> usize {
        self.payload.questions.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardFace {
    Front,
    Back,
}

/// A deck of independently flippable cards
#[derive(Debug, Clone, Serialize)]
pub struct FlashcardDeck {
    pub payload: FlashcardPayload,
    flipped: Vec<bool>,
}

impl FlashcardDeck {
    pub fn new(payload: FlashcardPayload) -> Self {
        let flipped = vec![false; payload.cards.len()];
        Self { payload, flipped }
    }

    /// Toggle one card. Returns the face now showing.
    pub fn flip(&mut self, card: usize) -> Option<CardFace> {
        let flipped = self.flipped.get_mut(card)?;
        *flipped = !*flipped;
        self.face(card)
    }

    pub fn face(&self, card: usize) -> Option<CardFace> {
        self.flipped
            .get(card)
            .map(|&back| if back { CardFace::Back } else { CardFace::Front })
    }

    /// Text on the face currently showing
    pub fn visible_text(&self, card: usize) -> Option<&str> {
        let c = self.payload.cards.get(card)?;
        match self.face(card)? {
            CardFace::Front => Some(&c.front),
            CardFace::Back => Some(&c.back),
        }
    }

    pub fn card_count(&self) -> usize {
        self.payload.cards.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageSlot {
    Pending,
    Loaded,
    /// Rendered as a placeholder; never retried
    Failed,
}

/// A grid of `count` images generated from one prompt
#[derive(Debug, Clone, Serialize)]
pub struct ImageGrid {
    pub directive: ImageDirective,
    slots: Vec<ImageSlot>,
}

impl ImageGrid {
    pub fn new(directive: ImageDirective) -> Self {
        let slots = vec![ImageSlot::Pending; directive.count as usize];
        Self { directive, slots }
    }

    /// Settle a pending slot. Returns false if the slot does not exist or
    /// already has a result.
    pub fn report_load_result(&mut self, image: usize, success: bool) -> bool {
        match self.slots.get_mut(image) {
            Some(slot) if *slot == ImageSlot::Pending => {
                *slot = if success {
                    ImageSlot::Loaded
                } else {
                    ImageSlot::Failed
                };
                true
            }
            _ => false,
        }
    }

    pub fn slot(&self, image: usize) -> Option<ImageSlot> {
        self.slots.get(image).copied()
    }

    pub fn slots(&self) -> &[ImageSlot] {
        &self.slots
    }

    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ImageSlot::Pending)
            .map(|(i, _)| i)
    }
}

/// One of the fixed widget variants
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Quiz(QuizWidget),
    Flashcards(FlashcardDeck),
    ImageGrid(ImageGrid),
}

impl Widget {
    pub fn kind(&self) -> TagKind {
        match self {
            Widget::Quiz(_) => TagKind::Quiz,
            Widget::Flashcards(_) => TagKind::Flashcards,
            Widget::ImageGrid(_) => TagKind::Image,
        }
    }

    pub fn as_quiz_mut(&mut self) -> Option<&mut QuizWidget> {
        match self {
            Widget::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }

    pub fn as_deck_mut(&mut self) -> Option<&mut FlashcardDeck> {
        match self {
            Widget::Flashcards(deck) => Some(deck),
            _ => None,
        }
    }

    pub fn as_grid_mut(&mut self) -> Option<&mut ImageGrid> {
        match self {
            Widget::ImageGrid(grid) => Some(grid),
            _ => None,
        }
    }
}

/// Builds widgets with fresh default state
#[derive(Debug, Clone, Default)]
pub struct WidgetFactory {
    config: RenderConfig,
}

impl WidgetFactory {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Decode a closed block's inner text and build its widget
    pub fn build(&self, kind: &TagKind, inner: &str) -> Result<Widget, WidgetError> {
        let payload = parse_payload(kind, inner, &self.config)?;
        self.create(kind, payload)
    }

    pub fn create(&self, kind: &TagKind, payload: Payload) -> Result<Widget, WidgetError> {
        match (kind, payload) {
            (TagKind::Quiz, Payload::Quiz(quiz)) => Ok(Widget::Quiz(QuizWidget::new(quiz))),
            (TagKind::Flashcards, Payload::Flashcards(deck)) => {
                Ok(Widget::Flashcards(FlashcardDeck::new(deck)))
            }
            (TagKind::Image, Payload::Image(directive)) => {
                Ok(Widget::ImageGrid(ImageGrid::new(directive)))
            }
            (TagKind::Unknown(name), _) => Err(WidgetError::Unsupported(name.clone())),
            (kind, payload) => Err(WidgetError::KindMismatch {
                kind: static_kind_name(kind),
                payload: payload.kind_name(),
            }),
        }
    }
}

fn static_kind_name(kind: &TagKind) -> &'static str {
    match kind {
        TagKind::Quiz => "quiz",
        TagKind::Flashcards => "flashcards",
        TagKind::Image => "image",
        TagKind::Unknown(_) => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayloadError;
    use crate::payload::{Flashcard, QuizQuestion};

    fn quiz() -> QuizWidget {
        QuizWidget::new(QuizPayload {
            questions: vec![
                QuizQuestion {
                    question: "2+2?".to_string(),
                    options: vec!["3".to_string(), "4".to_string()],
                    answer_index: 1,
                },
                QuizQuestion {
                    question: "Capital of France?".to_string(),
                    options: vec!["Paris".to_string(), "Rome".to_string(), "Oslo".to_string()],
                    answer_index: 0,
                },
            ],
        })
    }

    fn deck() -> FlashcardDeck {
        FlashcardDeck::new(FlashcardPayload {
            cards: vec![
                Flashcard {
                    front: "Front 1".to_string(),
                    back: "Back 1".to_string(),
                },
                Flashcard {
                    front: "Front 2".to_string(),
                    back: "Back 2".to_string(),
                },
            ],
        })
    }

    #[test]
    fn test_quiz_first_answer_is_final() {
        let mut quiz = quiz();
        assert!(!quiz.is_revealed(0));
        assert_eq!(quiz.select_option(0, 0), Some(false));
        assert_eq!(quiz.select_option(0, 1), None);
        assert_eq!(quiz.selection(0), Some(0));
        assert!(quiz.is_revealed(0));
        assert!(!quiz.is_revealed(1));
    }

    #[test]
    fn test_quiz_out_of_range_ignored() {
        let mut quiz = quiz();
        assert_eq!(quiz.select_option(5, 0), None);
        assert_eq!(quiz.select_option(0, 2), None);
        assert!(!quiz.is_revealed(0));
    }

    #[test]
    fn test_quiz_score() {
        let mut quiz = quiz();
        assert_eq!(quiz.score(), (0, 0));
        quiz.select_option(0, 1);
        assert_eq!(quiz.score(), (1, 1));
        quiz.select_option(1, 2);
        assert_eq!(quiz.score(), (1, 2));
        assert_eq!(quiz.is_correct(1), Some(false));
    }

    #[test]
    fn test_flip_is_per_card() {
        let mut deck = deck();
        assert_eq!(deck.flip(1), Some(CardFace::Back));
        assert_eq!(deck.face(0), Some(CardFace::Front));
        assert_eq!(deck.visible_text(1), Some("Back 2"));
        assert_eq!(deck.flip(1), Some(CardFace::Front));
        assert_eq!(deck.flip(7), None);
    }

    #[test]
    fn test_image_slots_settle_once() {
        let mut grid = ImageGrid::new(ImageDirective {
            prompt: "a cat".to_string(),
            count: 2,
        });
        assert_eq!(grid.pending().collect::<Vec<_>>(), vec![0, 1]);
        assert!(grid.report_load_result(0, false));
        assert!(!grid.report_load_result(0, true));
        assert_eq!(grid.slot(0), Some(ImageSlot::Failed));
        assert_eq!(grid.slot(1), Some(ImageSlot::Pending));
        assert!(!grid.report_load_result(2, true));
    }

    #[test]
    fn test_factory_rejects_mismatch() {
        let factory = WidgetFactory::default();
        let payload = Payload::Image(ImageDirective {
            prompt: "x".to_string(),
            count: 1,
        });
        assert!(matches!(
            factory.create(&TagKind::Quiz, payload).unwrap_err(),
            WidgetError::KindMismatch {
                kind: "quiz",
                payload: "image"
            }
        ));
    }

    #[test]
    fn test_factory_build_surfaces_payload_error() {
        let factory = WidgetFactory::default();
        let err = factory.build(&TagKind::Flashcards, "not json").unwrap_err();
        assert!(matches!(err, WidgetError::Payload(PayloadError::MalformedJson(_))));
    }

    #[test]
    fn test_factory_builds_default_state() {
        let factory = WidgetFactory::default();
        let widget = factory
            .create(&TagKind::Flashcards, Payload::Flashcards(deck().payload))
            .unwrap();
        match widget {
            Widget::Flashcards(deck) => {
                assert_eq!(deck.card_count(), 2);
                assert_eq!(deck.face(0), Some(CardFace::Front));
                assert_eq!(deck.face(1), Some(CardFace::Front));
            }
            other => panic!("expected flashcards, got {:?}", other.kind()),
        }
    }
}

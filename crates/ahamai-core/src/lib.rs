//! # AhamAI core
//!
//! Chat-client logic with no UI attached: turning streamed assistant text
//! into interactive widgets, and admitting user messages one at a time.
//!
//! ```text
//! full text ──> tags::scan ──> payload::parse_payload ──> WidgetFactory
//!                    │                                         │
//!                    └──────────── MessageRenderer <───────────┘
//!                                        │
//!                                  Vec<Segment>
//!
//! submit(query) ──> SendQueue ──> Generation::dispatch
//!                       └───────> QueuePanel::update
//! ```
//!
//! The renderer and the send queue don't know about each other; the view
//! layer wires them together.

pub mod config;
pub mod error;
pub mod history;
pub mod payload;
pub mod queue;
pub mod render;
pub mod state;
pub mod tags;
pub mod widget;

// Re-export main types for convenience
pub use config::{OpenBlockPolicy, RenderConfig, IMAGE_COUNT_LIMIT};
pub use error::{PayloadError, WidgetError};
pub use history::{Chat, ChatHistory, ChatId};
pub use payload::{Flashcard, FlashcardPayload, ImageDirective, Payload, QuizPayload, QuizQuestion};
pub use queue::{
    EntryStatus, Generation, QueueEntry, QueuePanel, QueueState, SendQueue, SubmitOutcome,
};
pub use render::{MessageRenderer, Segment, WidgetId};
pub use state::{ChatRole, Message};
pub use tags::{scan, Span, TagKind, TaggedBlock};
pub use widget::{
    CardFace, FlashcardDeck, ImageGrid, ImageSlot, QuizWidget, Widget, WidgetFactory,
};

//! Message renderer
//!
//! Turns the full current text of a message into ordered segments. The view
//! layer calls [`MessageRenderer::render`] with the cumulative text on every
//! streaming update, so rendering is a pure re-derivation from the text plus
//! a per-message widget table. A closed block keeps the same widget (and its
//! interaction state) for as long as its start offset and contents stay the
//! same.

use crate::config::{OpenBlockPolicy, RenderConfig};
use crate::state::{ChatRole, Message};
use crate::tags::{scan, Span, TagKind, TaggedBlock};
use crate::widget::{Widget, WidgetFactory};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Index of a widget in its message's widget table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub usize);

/// Identity of a closed block: where it starts and what it contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetKey {
    pub start: usize,
    pub fingerprint: u64,
}

impl WidgetKey {
    pub fn for_block(block: &TaggedBlock, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(block.kind.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(block.inner_text(text).as_bytes());
        let digest = hasher.finalize();
        Self {
            start: block.start_outer,
            fingerprint: u64::from_be_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]),
        }
    }
}

/// Arena of widgets owned by one message.
///
/// Ids are never reused, so an id held by the view for a widget that has
/// since been pruned resolves to `None` rather than to another widget.
#[derive(Debug, Clone, Default)]
pub struct WidgetTable {
    widgets: HashMap<WidgetId, Widget>,
    index: HashMap<WidgetKey, WidgetId>,
    /// Blocks that failed to build; remembered so failures are logged once
    rejected: HashSet<WidgetKey>,
    next_id: usize,
}

impl WidgetTable {
    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(&id)
    }

    pub fn lookup(&self, key: &WidgetKey) -> Option<WidgetId> {
        self.index.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    fn insert(&mut self, key: WidgetKey, widget: Widget) -> WidgetId {
        let id = WidgetId(self.next_id);
        self.next_id += 1;
        self.widgets.insert(id, widget);
        self.index.insert(key, id);
        id
    }

    /// Drop widgets and rejections whose block is no longer in the text
    fn retain_keys(&mut self, seen: &HashSet<WidgetKey>) {
        let before = self.widgets.len() + self.rejected.len();
        self.index.retain(|key, _| seen.contains(key));
        self.rejected.retain(|key| seen.contains(key));
        let live: HashSet<WidgetId> = self.index.values().copied().collect();
        self.widgets.retain(|id, _| live.contains(id));

        let pruned = before - (self.widgets.len() + self.rejected.len());
        if pruned > 0 {
            log::debug!("pruned {} stale widget entries", pruned);
        }
    }
}

/// One renderable piece of a message, in text order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Widget { id: WidgetId, kind: TagKind },
}

/// Renders messages into segments using one shared configuration
#[derive(Debug, Clone, Default)]
pub struct MessageRenderer {
    factory: WidgetFactory,
}

impl MessageRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            factory: WidgetFactory::new(config),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        self.factory.config()
    }

    /// Re-derive `message`'s segments from `full_text`.
    ///
    /// Returns the widgets materialized for the first time by this call, so
    /// one-shot work (like starting image loads) runs once per widget.
    pub fn render(&self, message: &mut Message, full_text: &str) -> Vec<WidgetId> {
        if full_text.len() < message.raw_text.len() {
            log::debug!(
                "message text shrank from {} to {} bytes, re-deriving",
                message.raw_text.len(),
                full_text.len()
            );
        }
        message.raw_text.clear();
        message.raw_text.push_str(full_text);
        self.rerender(message)
    }

    /// Mark the message's stream as ended and apply the open block policy
    pub fn finish(&self, message: &mut Message) -> Vec<WidgetId> {
        message.finished = true;
        self.rerender(message)
    }

    fn rerender(&self, message: &mut Message) -> Vec<WidgetId> {
        let mut segments = Vec::new();
        let mut materialized = Vec::new();

        if message.role == ChatRole::User {
            push_text(&mut segments, &message.raw_text);
            message.segments = segments;
            return materialized;
        }

        let text = message.raw_text.as_str();
        let mut seen = HashSet::new();
        for span in scan(text) {
            match span {
                Span::Text(range) => push_text(&mut segments, &text[range]),
                Span::Partial(range) => {
                    if message.finished {
                        push_text(&mut segments, &text[range]);
                    }
                }
                Span::Block(block) if block.closed => {
                    let key = WidgetKey::for_block(&block, text);
                    let inner = block.inner_text(text);
                    seen.insert(key);

                    if let Some(id) = message.widgets.lookup(&key) {
                        segments.push(Segment::Widget {
                            id,
                            kind: block.kind,
                        });
                    } else if message.widgets.rejected.contains(&key) {
                        push_text(&mut segments, &fallback_text(inner));
                    } else {
                        match self.factory.build(&block.kind, inner) {
                            Ok(widget) => {
                                let id = message.widgets.insert(key, widget);
                                log::debug!("materialized {} widget {:?}", block.kind.as_str(), id);
                                materialized.push(id);
                                segments.push(Segment::Widget {
                                    id,
                                    kind: block.kind,
                                });
                            }
                            Err(e) => {
                                log::warn!(
                                    "rendering {} block at {} as text: {}",
                                    block.kind.as_str(),
                                    block.start_outer,
                                    e
                                );
                                message.widgets.rejected.insert(key);
                                push_text(&mut segments, &fallback_text(inner));
                            }
                        }
                    }
                }
                Span::Block(block) => {
                    if message.finished
                        && self.config().open_block_policy == OpenBlockPolicy::FlushAsText
                    {
                        push_text(&mut segments, &fallback_text(block.inner_text(text)));
                    }
                }
            }
        }

        message.widgets.retain_keys(&seen);
        message.segments = segments;
        materialized
    }
}

/// Text shown for a block that did not become a widget, with any delimiters
/// inside it removed the same way they are at the top level
fn fallback_text(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    for span in scan(inner) {
        match span {
            Span::Text(range) | Span::Partial(range) => out.push_str(&inner[range]),
            Span::Block(block) => out.push_str(&fallback_text(block.inner_text(inner))),
        }
    }
    out
}

/// Append text, merging with a preceding text segment
fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ: &str = r#"[QUIZ_JSON]{"questions":[{"question":"2+2?","options":["3","4"],"answerIndex":1}]}[/QUIZ_JSON]"#;

    fn texts(message: &Message) -> Vec<&str> {
        message
            .segments()
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_key_depends_on_position_and_content() {
        let text = format!("{QUIZ} {QUIZ}");
        let blocks: Vec<_> = scan(&text)
            .into_iter()
            .filter_map(|s| match s {
                Span::Block(b) => Some(b),
                _ => None,
            })
            .collect();
        let a = WidgetKey::for_block(&blocks[0], &text);
        let b = WidgetKey::for_block(&blocks[1], &text);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_text_twice_keeps_widget() {
        let renderer = MessageRenderer::default();
        let mut message = Message::assistant();
        let text = format!("a {QUIZ} b");

        let first = renderer.render(&mut message, &text);
        assert_eq!(first, vec![WidgetId(0)]);
        let segments = message.segments().to_vec();

        let second = renderer.render(&mut message, &text);
        assert!(second.is_empty());
        assert_eq!(message.segments(), segments.as_slice());
        assert_eq!(message.widget_count(), 1);
    }

    #[test]
    fn test_user_message_is_literal() {
        let renderer = MessageRenderer::default();
        let mut message = Message::new(ChatRole::User);
        renderer.render(&mut message, QUIZ);
        assert_eq!(message.segments(), &[Segment::Text(QUIZ.to_string())]);
    }

    #[test]
    fn test_failed_block_rendered_once_as_text() {
        let renderer = MessageRenderer::default();
        let mut message = Message::assistant();
        let text = "x [FLASHCARDS_JSON]{oops}[/FLASHCARDS_JSON] y";

        renderer.render(&mut message, text);
        renderer.render(&mut message, text);
        assert_eq!(texts(&message), vec!["x {oops} y"]);
        assert_eq!(message.widget_count(), 0);
    }

    #[test]
    fn test_rejection_forgotten_once_block_is_gone() {
        let renderer = MessageRenderer::default();
        let mut message = Message::assistant();
        renderer.render(&mut message, "[QUIZ_JSON]{oops}[/QUIZ_JSON]");
        assert_eq!(message.widgets.rejected.len(), 1);

        renderer.render(&mut message, "plain");
        assert!(message.widgets.rejected.is_empty());
        assert!(message.widgets.index.is_empty());
    }

    #[test]
    fn test_open_block_discarded_on_finish_by_default() {
        let renderer = MessageRenderer::default();
        let mut message = Message::assistant();
        renderer.render(&mut message, "head [QUIZ_JSON]{\"questions\"");
        renderer.finish(&mut message);
        assert!(message.is_finished());
        assert_eq!(texts(&message), vec!["head "]);
    }

    #[test]
    fn test_open_block_flushed_when_configured() {
        let renderer = MessageRenderer::new(RenderConfig {
            open_block_policy: OpenBlockPolicy::FlushAsText,
            ..Default::default()
        });
        let mut message = Message::assistant();
        renderer.render(&mut message, "head [QUIZ_JSON]{\"questions\"");
        assert_eq!(texts(&message), vec!["head "]);

        renderer.finish(&mut message);
        assert_eq!(texts(&message), vec!["head {\"questions\""]);
    }

    #[test]
    fn test_partial_delimiter_shown_after_finish() {
        let renderer = MessageRenderer::default();
        let mut message = Message::assistant();
        renderer.render(&mut message, "see [A");
        assert_eq!(texts(&message), vec!["see "]);
        renderer.finish(&mut message);
        assert_eq!(texts(&message), vec!["see [A"]);
    }

    #[test]
    fn test_shrinking_text_rederives() {
        let renderer = MessageRenderer::default();
        let mut message = Message::assistant();
        renderer.render(&mut message, &format!("{QUIZ} tail"));
        renderer.render(&mut message, "short");
        assert_eq!(message.segments(), &[Segment::Text("short".to_string())]);
    }
}

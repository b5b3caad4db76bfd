//! UI-agnostic chat state types
//!
//! These are shared by any view layer and don't depend on a UI framework.
//! A [`Message`] is only rendered through [`crate::MessageRenderer`].

use crate::render::{Segment, WidgetId, WidgetTable};
use crate::widget::{CardFace, Widget};
use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// A chat message with its rendered segments and widget state
#[derive(Debug, Clone)]
pub struct Message {
    pub role: ChatRole,
    pub(crate) raw_text: String,
    pub(crate) segments: Vec<Segment>,
    pub(crate) widgets: WidgetTable,
    pub(crate) finished: bool,
}

impl Message {
    pub fn new(role: ChatRole) -> Self {
        Self {
            role,
            raw_text: String::new(),
            segments: Vec::new(),
            widgets: WidgetTable::default(),
            finished: false,
        }
    }

    /// An empty assistant message, ready for streaming snapshots
    pub fn assistant() -> Self {
        Self::new(ChatRole::Assistant)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(id)
    }

    pub fn widget_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(id)
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    /// Widgets in display order
    pub fn widget_ids(&self) -> impl Iterator<Item = WidgetId> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Widget { id, .. } => Some(*id),
            Segment::Text(_) => None,
        })
    }

    /// Concatenated text segments
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.as_str()),
                Segment::Widget { .. } => None,
            })
            .collect()
    }

    pub fn select_option(&mut self, id: WidgetId, question: usize, option: usize) -> Option<bool> {
        self.widget_mut(id)?
            .as_quiz_mut()?
            .select_option(question, option)
    }

    pub fn flip(&mut self, id: WidgetId, card: usize) -> Option<CardFace> {
        self.widget_mut(id)?.as_deck_mut()?.flip(card)
    }

    pub fn report_load_result(&mut self, id: WidgetId, image: usize, success: bool) -> bool {
        self.widget_mut(id)
            .and_then(Widget::as_grid_mut)
            .map_or(false, |grid| grid.report_load_result(image, success))
    }
}

//! In-memory chat history for the sidebar

use crate::state::{ChatRole, Message};
use chrono::{DateTime, Utc};

pub const NEW_CHAT_TITLE: &str = "New Thread";

/// Titles taken from the first user message are cut to this many characters
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub u64);

#[derive(Debug, Clone)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    pub messages: Vec<Message>,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
}

/// All chats of the running client, newest first
#[derive(Debug, Default)]
pub struct ChatHistory {
    chats: Vec<Chat>,
    current: Option<ChatId>,
    next_id: u64,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chat at the top of the list and make it current
    pub fn create_chat(&mut self) -> ChatId {
        self.next_id += 1;
        let id = ChatId(self.next_id);
        self.chats.insert(
            0,
            Chat {
                id,
                title: NEW_CHAT_TITLE.to_string(),
                messages: Vec::new(),
                pinned: false,
                created_at: Utc::now(),
            },
        );
        self.current = Some(id);
        id
    }

    /// The current chat, created on demand
    pub fn ensure_current(&mut self) -> ChatId {
        match self.current {
            Some(id) => id,
            None => self.create_chat(),
        }
    }

    pub fn current_id(&self) -> Option<ChatId> {
        self.current
    }

    pub fn current(&self) -> Option<&Chat> {
        self.current.and_then(|id| self.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Chat> {
        let id = self.current?;
        self.get_mut(id)
    }

    pub fn get(&self, id: ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ChatId) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == id)
    }

    /// Switch to an existing chat
    pub fn select(&mut self, id: ChatId) -> bool {
        if self.get(id).is_some() {
            self.current = Some(id);
            true
        } else {
            false
        }
    }

    /// Start a fresh thread; the chat itself is created by the first message
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn delete_chat(&mut self, id: ChatId) -> bool {
        let before = self.chats.len();
        self.chats.retain(|c| c.id != id);
        if self.current == Some(id) {
            self.current = None;
        }
        self.chats.len() != before
    }

    /// Returns the new pinned flag
    pub fn toggle_pin(&mut self, id: ChatId) -> Option<bool> {
        let chat = self.get_mut(id)?;
        chat.pinned = !chat.pinned;
        Some(chat.pinned)
    }

    pub fn rename(&mut self, id: ChatId, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        match self.get_mut(id) {
            Some(chat) => {
                chat.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// Append a message. The first user message names the chat, so render
    /// it before adding it.
    pub fn add_message(&mut self, id: ChatId, message: Message) -> bool {
        let Some(chat) = self.get_mut(id) else {
            return false;
        };

        let first_user = message.role == ChatRole::User
            && !chat.messages.iter().any(|m| m.role == ChatRole::User);
        if first_user {
            chat.title = title_from(message.raw_text());
        }

        chat.messages.push(message);
        true
    }

    /// Chats for display: pinned first, then newest first
    pub fn list(&self) -> Vec<&Chat> {
        let (pinned, rest): (Vec<&Chat>, Vec<&Chat>) = self.chats.iter().partition(|c| c.pinned);
        pinned.into_iter().chain(rest).collect()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

fn title_from(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() > TITLE_MAX_CHARS {
        let head: String = content.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

//! Single-flight send queue
//!
//! At most one query is being generated at a time. Queries submitted while
//! one is in flight wait in FIFO order and are dispatched one by one as the
//! generation collaborator reports completion. The queue panel is told about
//! the waiting entries after every change.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Receives queries that start sending
pub trait Generation {
    fn dispatch(&mut self, query: &str);
}

/// Receives the waiting entries after every queue mutation
pub trait QueuePanel {
    fn update(&mut self, queued: &[QueueEntry]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Queued,
    Sending,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub id: u64,
    pub query: String,
    pub enqueued_at: DateTime<Utc>,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Dispatched immediately
    Sending { id: u64 },
    /// Waiting behind the in-flight query; `position` is 1-based
    Queued { id: u64, position: usize },
    /// Blank query
    Ignored,
}

/// Owner of the outbound queue for one chat session
pub struct SendQueue<G: Generation, P: QueuePanel> {
    generation: G,
    panel: P,
    current: Option<QueueEntry>,
    entries: VecDeque<QueueEntry>,
    next_id: u64,
}

impl<G: Generation, P: QueuePanel> SendQueue<G, P> {
    pub fn new(generation: G, panel: P) -> Self {
        Self {
            generation,
            panel,
            current: None,
            entries: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn state(&self) -> QueueState {
        if self.current.is_some() {
            QueueState::Sending
        } else {
            QueueState::Idle
        }
    }

    /// The entry being generated right now
    pub fn current(&self) -> Option<&QueueEntry> {
        self.current.as_ref()
    }

    /// Waiting entries, oldest first
    pub fn queued(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.entries.len()
    }

    pub fn submit(&mut self, query: &str) -> SubmitOutcome {
        let query = query.trim();
        if query.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut entry = QueueEntry {
            id,
            query: query.to_string(),
            enqueued_at: Utc::now(),
            status: EntryStatus::Queued,
        };

        let outcome = if self.current.is_none() {
            entry.status = EntryStatus::Sending;
            log::debug!("sending query {} immediately", id);
            self.generation.dispatch(&entry.query);
            self.current = Some(entry);
            SubmitOutcome::Sending { id }
        } else {
            self.entries.push_back(entry);
            let position = self.entries.len();
            log::debug!("queued query {} at position {}", id, position);
            SubmitOutcome::Queued { id, position }
        };

        self.notify();
        outcome
    }

    /// The in-flight query finished. Dispatches the next waiting entry, if
    /// any, and returns the finished entry.
    pub fn complete_current(&mut self) -> Option<QueueEntry> {
        let Some(mut done) = self.current.take() else {
            log::debug!("complete_current with nothing in flight, ignoring");
            return None;
        };
        done.status = EntryStatus::Done;

        if let Some(mut next) = self.entries.pop_front() {
            next.status = EntryStatus::Sending;
            log::debug!("promoting queued query {}", next.id);
            self.generation.dispatch(&next.query);
            self.current = Some(next);
        }

        self.notify();
        Some(done)
    }

    /// Remove a waiting entry. The sending entry cannot be cancelled.
    pub fn cancel(&mut self, id: u64) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            log::debug!("cancel: {} is not waiting in the queue", id);
            return false;
        };
        self.entries.remove(pos);
        self.notify();
        true
    }

    /// Drop everything, including the in-flight entry. Used when the chat
    /// session is switched or cleared.
    pub fn clear(&mut self) {
        self.current = None;
        self.entries.clear();
        self.notify();
    }

    pub fn generation(&self) -> &G {
        &self.generation
    }

    pub fn generation_mut(&mut self) -> &mut G {
        &mut self.generation
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    fn notify(&mut self) {
        let queued = self.entries.make_contiguous();
        self.panel.update(queued);
    }
}

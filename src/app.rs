use ahamai_core::{
    ChatHistory, ChatId, ChatRole, Message, MessageRenderer, QueueEntry, QueuePanel, QueueState,
    SendQueue, Segment, SubmitOutcome, Widget, WidgetId,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::time::Duration;
use tokio::sync::mpsc;
use crate::config::Config;
use crate::stream::{ScriptedGenerator, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    /// Typing a new title for a chat in the history sidebar
    Renaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    History,
    Input,
}

/// What the queue panel draws: the waiting entries, oldest first
#[derive(Debug, Default)]
pub struct QueuePanelView {
    pub items: Vec<(u64, String)>,
}

impl QueuePanel for QueuePanelView {
    fn update(&mut self, queued: &[QueueEntry]) {
        self.items = queued.iter().map(|e| (e.id, e.query.clone())).collect();
    }
}

/// The widget keyboard interactions go to. `item` is the question, card
/// or image within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetFocus {
    pub message: usize,
    pub widget: WidgetId,
    pub item: usize,
}

/// Assistant message receiving the live stream
#[derive(Debug, Clone, Copy)]
struct StreamTarget {
    stream: u64,
    chat: ChatId,
    message: usize,
}

/// Image grid whose slots are still loading
#[derive(Debug, Clone, Copy)]
struct LoadingImages {
    chat: ChatId,
    message: usize,
    widget: WidgetId,
}

pub type ChatQueue = SendQueue<ScriptedGenerator, QueuePanelView>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub config: Config,

    // Input
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input, in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area
    pub chat_width: u16,
    pub follow_output: bool,
    pub chat_area: Option<Rect>,

    // Sessions
    pub history: ChatHistory,
    pub history_state: ListState,
    pub show_history: bool,

    // Rendering and sending
    pub renderer: MessageRenderer,
    pub queue: ChatQueue,
    pub show_queue_panel: bool,
    pub widget_focus: Option<WidgetFocus>,
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    target: Option<StreamTarget>,
    loading_images: Vec<LoadingImages>,
    rename: Option<PendingRename>,
}

/// A chat title being edited in the input box; the message draft waits aside
struct PendingRename {
    chat: ChatId,
    draft: String,
    draft_cursor: usize,
}

impl App {
    pub fn new(config: Config, tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        let generator = ScriptedGenerator::new(
            tx,
            config.stream_chunk_chars,
            Duration::from_millis(config.stream_interval_ms),
        );
        let renderer = MessageRenderer::new(config.render.clone());

        let mut history = ChatHistory::new();
        history.create_chat();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            config,
            query_input: String::new(),
            query_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_output: true,
            chat_area: None,
            history,
            history_state: ListState::default(),
            show_history: false,
            renderer,
            queue: SendQueue::new(generator, QueuePanelView::default()),
            show_queue_panel: false,
            widget_focus: None,
            status: None,
            animation_frame: 0,
            target: None,
            loading_images: Vec::new(),
            rename: None,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.queue.state() == QueueState::Sending
    }

    /// Index of the message currently streaming in the current chat
    pub fn streaming_message(&self) -> Option<usize> {
        let target = self.target?;
        (Some(target.chat) == self.history.current_id()).then_some(target.message)
    }

    pub fn current_messages(&self) -> &[Message] {
        self.history
            .current()
            .map(|chat| chat.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Send the input box contents, or queue them behind the live reply
    pub fn submit_input(&mut self) {
        let text = std::mem::take(&mut self.query_input);
        self.query_cursor = 0;

        match self.queue.submit(&text) {
            SubmitOutcome::Sending { id } => {
                log::debug!("query {} sent", id);
                self.status = None;
            }
            SubmitOutcome::Queued { id, position } => {
                log::debug!("query {} queued at {}", id, position);
                self.status = Some(format!("Queued (#{} in line)", position));
            }
            SubmitOutcome::Ignored => {}
        }
    }

    /// Drop the newest waiting query
    pub fn cancel_last_queued(&mut self) {
        let Some(id) = self.queue.queued().last().map(|e| e.id) else {
            return;
        };
        if self.queue.cancel(id) {
            self.status = Some("Removed last queued message".to_string());
        }
    }

    pub fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Started { stream, query } => {
                if !self.is_live(stream) {
                    log::debug!("ignoring start of stale stream {}", stream);
                    return;
                }
                let chat = self.history.ensure_current();

                let mut user = Message::new(ChatRole::User);
                self.renderer.render(&mut user, &query);
                self.renderer.finish(&mut user);
                self.history.add_message(chat, user);
                self.history.add_message(chat, Message::assistant());

                let message = self
                    .history
                    .get(chat)
                    .map_or(0, |c| c.messages.len().saturating_sub(1));
                self.target = Some(StreamTarget {
                    stream,
                    chat,
                    message,
                });
                self.follow_output = true;
            }
            StreamEvent::Snapshot { stream, text } => {
                let Some(target) = self.target.filter(|t| t.stream == stream) else {
                    return;
                };
                let Some(message) = self
                    .history
                    .get_mut(target.chat)
                    .and_then(|c| c.messages.get_mut(target.message))
                else {
                    return;
                };
                let fresh = self.renderer.render(message, &text);
                self.track_images(target.chat, target.message, &fresh);
            }
            StreamEvent::Done { stream } => {
                let Some(target) = self.target.filter(|t| t.stream == stream) else {
                    return;
                };
                self.target = None;
                if let Some(message) = self
                    .history
                    .get_mut(target.chat)
                    .and_then(|c| c.messages.get_mut(target.message))
                {
                    let fresh = self.renderer.finish(message);
                    self.track_images(target.chat, target.message, &fresh);
                }
                if let Some(done) = self.queue.complete_current() {
                    log::info!("query {} done", done.id);
                }
            }
        }
    }

    fn is_live(&self, stream: u64) -> bool {
        self.is_generating() && self.queue.generation().current_stream() == stream
    }

    fn message_mut(&mut self, chat: ChatId, index: usize) -> Option<&mut Message> {
        self.history.get_mut(chat)?.messages.get_mut(index)
    }

    fn track_images(&mut self, chat: ChatId, message: usize, fresh: &[WidgetId]) {
        let Some(msg) = self.history.get(chat).and_then(|c| c.messages.get(message)) else {
            return;
        };
        for id in fresh {
            if let Some(Widget::ImageGrid(_)) = msg.widget(*id) {
                self.loading_images.push(LoadingImages {
                    chat,
                    message,
                    widget: *id,
                });
            }
        }
    }

    /// Abandon the live reply and everything queued behind it
    fn discard_session(&mut self) {
        self.queue.generation_mut().abort();
        self.queue.clear();
        if let Some(target) = self.target.take() {
            if let Some(message) = self
                .history
                .get_mut(target.chat)
                .and_then(|c| c.messages.get_mut(target.message))
            {
                self.renderer.finish(message);
            }
        }
        self.widget_focus = None;
        self.status = None;
        self.chat_scroll = 0;
        self.follow_output = true;
    }

    pub fn new_chat(&mut self) {
        self.discard_session();
        self.history.create_chat();
        self.sync_history_selection();
    }

    /// Clear the messages of the current chat
    pub fn clear_chat(&mut self) {
        self.discard_session();
        if let Some(current) = self.history.current_id() {
            self.loading_images.retain(|l| l.chat != current);
        }
        self.history.clear_current();
    }

    // History sidebar
    fn selected_chat(&self) -> Option<ChatId> {
        let index = self.history_state.selected()?;
        self.history.list().get(index).map(|chat| chat.id)
    }

    pub fn sync_history_selection(&mut self) {
        let current = self.history.current_id();
        let index = self.history.list().iter().position(|c| Some(c.id) == current);
        self.history_state.select(index.or(Some(0)));
    }

    pub fn history_nav_down(&mut self) {
        let len = self.history.len();
        if len == 0 {
            return;
        }
        let i = self.history_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.history_state.select(Some(i));
    }

    pub fn history_nav_up(&mut self) {
        let i = self.history_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.history_state.select(Some(i));
    }

    pub fn load_selected_chat(&mut self) {
        let Some(id) = self.selected_chat() else {
            return;
        };
        if Some(id) != self.history.current_id() {
            self.discard_session();
            self.history.select(id);
        }
        self.show_history = false;
        self.focus = FocusPane::Chat;
    }

    pub fn delete_selected_chat(&mut self) {
        let Some(id) = self.selected_chat() else {
            return;
        };
        if Some(id) == self.history.current_id() {
            self.discard_session();
        }
        self.loading_images.retain(|l| l.chat != id);
        self.history.delete_chat(id);
        if self.history.current_id().is_none() {
            match self.history.list().first().map(|chat| chat.id) {
                Some(next) => {
                    self.history.select(next);
                }
                None => {
                    self.history.create_chat();
                }
            }
        }

        let len = self.history.len();
        let selected = self.history_state.selected().unwrap_or(0).min(len.saturating_sub(1));
        self.history_state.select(Some(selected));
    }

    /// Put the selected chat's title in the input box for editing
    pub fn start_rename_selected(&mut self) {
        let Some(id) = self.selected_chat() else {
            return;
        };
        let title = self
            .history
            .get(id)
            .map(|chat| chat.title.clone())
            .unwrap_or_default();
        self.rename = Some(PendingRename {
            chat: id,
            draft: std::mem::replace(&mut self.query_input, title),
            draft_cursor: self.query_cursor,
        });
        self.query_cursor = self.query_input.chars().count();
        self.input_mode = InputMode::Renaming;
        self.focus = FocusPane::Input;
    }

    /// Apply the typed title. A blank title leaves the chat unchanged.
    pub fn commit_rename(&mut self) {
        let Some(pending) = self.rename.take() else {
            return;
        };
        let title = std::mem::replace(&mut self.query_input, pending.draft);
        self.query_cursor = pending.draft_cursor;
        self.status = Some(if self.history.rename(pending.chat, &title) {
            "Renamed".to_string()
        } else {
            "Title unchanged".to_string()
        });
        self.leave_rename();
    }

    pub fn cancel_rename(&mut self) {
        if let Some(pending) = self.rename.take() {
            self.query_input = pending.draft;
            self.query_cursor = pending.draft_cursor;
        }
        self.leave_rename();
    }

    fn leave_rename(&mut self) {
        self.input_mode = InputMode::Normal;
        self.focus = FocusPane::History;
    }

    pub fn toggle_pin_selected(&mut self) {
        let Some(id) = self.selected_chat() else {
            return;
        };
        if let Some(pinned) = self.history.toggle_pin(id) {
            self.status = Some(if pinned { "Pinned" } else { "Unpinned" }.to_string());
            // Pinned chats move to the top, keep the cursor on the same chat
            let index = self.history.list().iter().position(|c| c.id == id);
            self.history_state.select(index);
        }
    }

    // Widget focus
    fn focusable_widgets(&self) -> Vec<(usize, WidgetId)> {
        self.current_messages()
            .iter()
            .enumerate()
            .flat_map(|(m, message)| {
                message.segments().iter().filter_map(move |segment| match segment {
                    Segment::Widget { id, .. } => Some((m, *id)),
                    Segment::Text(_) => None,
                })
            })
            .collect()
    }

    pub fn focus_next_widget(&mut self) {
        self.step_widget_focus(true);
    }

    pub fn focus_prev_widget(&mut self) {
        self.step_widget_focus(false);
    }

    fn step_widget_focus(&mut self, forward: bool) {
        let widgets = self.focusable_widgets();
        if widgets.is_empty() {
            self.widget_focus = None;
            return;
        }

        let current = self
            .widget_focus
            .and_then(|f| widgets.iter().position(|w| *w == (f.message, f.widget)));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => widgets.len() - 1,
            (Some(i), true) => (i + 1) % widgets.len(),
            (Some(i), false) => (i + widgets.len() - 1) % widgets.len(),
        };

        let (message, widget) = widgets[next];
        self.widget_focus = Some(WidgetFocus {
            message,
            widget,
            item: 0,
        });
        self.follow_output = false;
    }

    pub fn focused_widget(&self) -> Option<&Widget> {
        let focus = self.widget_focus?;
        self.current_messages().get(focus.message)?.widget(focus.widget)
    }

    fn focused_message_mut(&mut self) -> Option<(&mut Message, WidgetFocus)> {
        let focus = self.widget_focus?;
        let message = self.history.current_mut()?.messages.get_mut(focus.message)?;
        Some((message, focus))
    }

    pub fn focus_next_item(&mut self) {
        let count = match self.focused_widget() {
            Some(Widget::Quiz(quiz)) => quiz.question_count(),
            Some(Widget::Flashcards(deck)) => deck.card_count(),
            Some(Widget::ImageGrid(grid)) => grid.slots().len(),
            None => return,
        };
        if let Some(focus) = self.widget_focus.as_mut() {
            focus.item = (focus.item + 1).min(count.saturating_sub(1));
        }
    }

    pub fn focus_prev_item(&mut self) {
        if let Some(focus) = self.widget_focus.as_mut() {
            focus.item = focus.item.saturating_sub(1);
        }
    }

    /// Answer the focused quiz question with a 0-based option
    pub fn answer_focused(&mut self, option: usize) {
        let Some((message, focus)) = self.focused_message_mut() else {
            return;
        };
        match message.select_option(focus.widget, focus.item, option) {
            Some(true) => self.status = Some("Correct!".to_string()),
            Some(false) => self.status = Some("Not quite".to_string()),
            None => {}
        }
    }

    pub fn flip_focused(&mut self) {
        if let Some((message, focus)) = self.focused_message_mut() {
            message.flip(focus.widget, focus.item);
        }
    }

    /// Advance the animation and settle one loading image per grid
    pub fn tick(&mut self) {
        if self.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        let mut still_loading = Vec::with_capacity(self.loading_images.len());
        for loading in std::mem::take(&mut self.loading_images) {
            let Some(message) = self.message_mut(loading.chat, loading.message) else {
                continue;
            };
            let next = match message.widget(loading.widget) {
                Some(Widget::ImageGrid(grid)) => grid
                    .pending()
                    .next()
                    .map(|image| (image, simulated_load(&grid.directive.prompt, image))),
                _ => None,
            };
            let Some((image, success)) = next else {
                continue;
            };
            if !success {
                log::debug!("image {} of widget {:?} failed to load", image, loading.widget);
            }
            message.report_load_result(loading.widget, image, success);
            still_loading.push(loading);
        }
        self.loading_images = still_loading;
    }

    // Scrolling
    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_output = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        let half = (self.chat_height / 2).max(1);
        self.chat_scroll = self.chat_scroll.saturating_add(half);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half = (self.chat_height / 2).max(1);
        self.chat_scroll = self.chat_scroll.saturating_sub(half);
        self.follow_output = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_output = true;
    }

    /// Animated ellipsis: cycles through ".", "..", "..."
    pub fn thinking_dots(&self) -> String {
        ".".repeat(self.animation_frame as usize + 1)
    }
}

/// Outcome of the simulated image fetch. Prompts mentioning "broken" fail
/// every second slot.
fn simulated_load(prompt: &str, image: usize) -> bool {
    !(image % 2 == 1 && prompt.to_lowercase().contains("broken"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::reply_for;
    use ahamai_core::ImageSlot;

    fn app() -> (App, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(Config::new(), tx), rx)
    }

    /// Feed a whole reply for the live stream
    fn finish_reply(app: &mut App, rx: &mut mpsc::UnboundedReceiver<StreamEvent>, reply: &str) {
        let Ok(StreamEvent::Started { stream, query }) = rx.try_recv() else {
            panic!("expected a started event");
        };
        app.handle_stream_event(StreamEvent::Started { stream, query });
        app.handle_stream_event(StreamEvent::Snapshot {
            stream,
            text: reply.to_string(),
        });
        app.handle_stream_event(StreamEvent::Done { stream });
    }

    #[tokio::test]
    async fn test_submit_while_sending_queues() {
        let (mut app, _rx) = app();
        app.query_input = "first".to_string();
        app.submit_input();
        app.query_input = "second".to_string();
        app.submit_input();

        assert!(app.is_generating());
        assert_eq!(app.queue.panel().items, vec![(2, "second".to_string())]);
        assert_eq!(app.status.as_deref(), Some("Queued (#1 in line)"));
        assert!(app.query_input.is_empty());
    }

    #[tokio::test]
    async fn test_stream_renders_into_current_chat() {
        let (mut app, mut rx) = app();
        app.query_input = "a quiz please".to_string();
        app.submit_input();
        app.queue.generation_mut().abort();

        let reply = r#"Go: [QUIZ_JSON]{"questions":[{"question":"1+1?","options":["1","2"],"answerIndex":1}]}[/QUIZ_JSON]"#;
        finish_reply(&mut app, &mut rx, reply);

        let messages = app.current_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].raw_text(), "a quiz please");
        assert_eq!(messages[1].widget_count(), 1);
        assert!(messages[1].is_finished());
        assert!(!app.is_generating());
        assert_eq!(app.history.current().map(|c| c.title.as_str()), Some("a quiz please"));
    }

    #[tokio::test]
    async fn test_answer_and_flip_through_focus() {
        let (mut app, mut rx) = app();
        app.query_input = "hello".to_string();
        app.submit_input();
        app.queue.generation_mut().abort();

        let reply = concat!(
            r#"[QUIZ_JSON]{"questions":[{"question":"1+1?","options":["1","2"],"answerIndex":1}]}[/QUIZ_JSON]"#,
            r#"[FLASHCARDS_JSON]{"cards":[{"front":"F","back":"B"}]}[/FLASHCARDS_JSON]"#
        );
        finish_reply(&mut app, &mut rx, reply);

        app.focus_next_widget();
        app.answer_focused(1);
        assert_eq!(app.status.as_deref(), Some("Correct!"));
        app.answer_focused(0);
        match app.focused_widget() {
            Some(Widget::Quiz(quiz)) => assert_eq!(quiz.score(), (1, 1)),
            other => panic!("expected quiz, got {other:?}"),
        }

        app.focus_next_widget();
        app.flip_focused();
        match app.focused_widget() {
            Some(Widget::Flashcards(deck)) => assert_eq!(deck.visible_text(0), Some("B")),
            other => panic!("expected deck, got {other:?}"),
        }

        // Wraps back to the quiz
        app.focus_next_widget();
        assert!(matches!(app.focused_widget(), Some(Widget::Quiz(_))));
    }

    #[tokio::test]
    async fn test_new_chat_discards_queue_and_stale_events() {
        let (mut app, mut rx) = app();
        app.query_input = "one".to_string();
        app.submit_input();
        app.query_input = "two".to_string();
        app.submit_input();

        let Ok(StreamEvent::Started { stream, query }) = rx.try_recv() else {
            panic!("expected a started event");
        };
        app.handle_stream_event(StreamEvent::Started { stream, query });
        let first_chat = app.history.current_id();

        app.new_chat();
        assert_eq!(app.queue.state(), QueueState::Idle);
        assert!(app.queue.panel().items.is_empty());

        // A late snapshot from the abandoned stream changes nothing
        app.handle_stream_event(StreamEvent::Snapshot {
            stream,
            text: "late".to_string(),
        });
        assert_ne!(app.history.current_id(), first_chat);
        assert!(app.current_messages().is_empty());
        let old = first_chat.and_then(|id| app.history.get(id)).unwrap();
        assert_eq!(old.messages.len(), 2);
        assert!(old.messages[1].raw_text().is_empty());
    }

    #[tokio::test]
    async fn test_images_settle_on_ticks() {
        let (mut app, mut rx) = app();
        app.query_input = "pics".to_string();
        app.submit_input();
        app.queue.generation_mut().abort();
        finish_reply(&mut app, &mut rx, "[IMAGE: a cat | n=2]");

        app.tick();
        app.tick();
        app.tick();

        app.focus_next_widget();
        match app.focused_widget() {
            Some(Widget::ImageGrid(grid)) => assert_eq!(grid.pending().count(), 0),
            other => panic!("expected image grid, got {other:?}"),
        }
        assert!(app.loading_images.is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_stays_failed() {
        let (mut app, mut rx) = app();
        app.query_input = "draw a broken vase".to_string();
        app.submit_input();
        app.queue.generation_mut().abort();
        finish_reply(&mut app, &mut rx, &reply_for("draw a broken vase"));

        app.focus_next_widget();
        let focus = app.widget_focus.expect("grid is focusable");
        for _ in 0..5 {
            app.tick();
        }
        match app.focused_widget() {
            Some(Widget::ImageGrid(grid)) => assert_eq!(
                grid.slots(),
                &[ImageSlot::Loaded, ImageSlot::Failed, ImageSlot::Loaded]
            ),
            other => panic!("expected image grid, got {other:?}"),
        }
        assert!(app.loading_images.is_empty());

        // A late success report cannot revive the slot
        let chat = app.history.current_id().unwrap();
        let message = app.message_mut(chat, focus.message).unwrap();
        assert!(!message.report_load_result(focus.widget, 1, true));
        app.tick();
        match app.focused_widget() {
            Some(Widget::ImageGrid(grid)) => assert_eq!(grid.slot(1), Some(ImageSlot::Failed)),
            other => panic!("expected image grid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_last_chat_leaves_fresh_one() {
        let (mut app, _rx) = app();
        app.sync_history_selection();
        app.delete_selected_chat();
        assert_eq!(app.history.len(), 1);
        assert!(app.history.current_id().is_some());
    }
}

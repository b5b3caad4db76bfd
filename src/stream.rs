use ahamai_core::Generation;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Progress of one streamed reply. `stream` identifies the dispatch so
/// events from an abandoned session can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Started { stream: u64, query: String },
    /// Cumulative reply text so far
    Snapshot { stream: u64, text: String },
    Done { stream: u64 },
}

/// Stand-in backend: streams a canned reply chosen from keywords in the
/// query, a few characters at a time.
pub struct ScriptedGenerator {
    tx: mpsc::UnboundedSender<StreamEvent>,
    chunk_chars: usize,
    interval: Duration,
    next_stream: u64,
    task: Option<JoinHandle<()>>,
}

impl ScriptedGenerator {
    pub fn new(tx: mpsc::UnboundedSender<StreamEvent>, chunk_chars: usize, interval: Duration) -> Self {
        Self {
            tx,
            chunk_chars: chunk_chars.max(1),
            interval,
            next_stream: 0,
            task: None,
        }
    }

    /// Id of the most recent dispatch; only its events are live
    pub fn current_stream(&self) -> u64 {
        self.next_stream
    }

    /// Stop the in-flight reply, if any. No further events arrive for it.
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("aborted stream {}", self.next_stream);
        }
    }
}

impl Generation for ScriptedGenerator {
    fn dispatch(&mut self, query: &str) {
        self.next_stream += 1;
        let stream = self.next_stream;

        let started = StreamEvent::Started {
            stream,
            query: query.to_string(),
        };
        if self.tx.send(started).is_err() {
            log::warn!("stream receiver closed, dropping query");
            return;
        }

        let reply = reply_for(query);
        let tx = self.tx.clone();
        let chunk_chars = self.chunk_chars;
        let interval = self.interval;

        log::info!("stream {} started ({} chars)", stream, reply.chars().count());
        self.task = Some(tokio::spawn(async move {
            let chars: Vec<char> = reply.chars().collect();
            let mut text = String::with_capacity(reply.len());
            for chunk in chars.chunks(chunk_chars) {
                tokio::time::sleep(interval).await;
                text.extend(chunk);
                let snapshot = StreamEvent::Snapshot {
                    stream,
                    text: text.clone(),
                };
                if tx.send(snapshot).is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Done { stream });
        }));
    }
}

/// Pick a canned reply for `query`
pub fn reply_for(query: &str) -> String {
    let lower = query.to_lowercase();

    if lower.contains("quiz") {
        return QUIZ_REPLY.to_string();
    }
    if lower.contains("flashcard") || lower.contains("cards") {
        return FLASHCARD_REPLY.to_string();
    }
    if lower.contains("image") || lower.contains("draw") || lower.contains("picture") {
        // Keep the directive on one line with a single separator
        let prompt: String = query
            .chars()
            .map(|c| match c {
                '[' | ']' | '|' | '\n' | '\r' => ' ',
                c => c,
            })
            .collect();
        return format!(
            "Here are some pictures for you:\n[IMAGE: {} | n=3]\nLet me know if you want more.",
            prompt.trim()
        );
    }
    if lower.contains("broken") {
        return BROKEN_REPLY.to_string();
    }

    format!("You said: **{}**\n\nAsk me for a quiz, flashcards or an image.", query.trim())
}

const QUIZ_REPLY: &str = r#"Let's check what you know.
[QUIZ_JSON]
{
  "questions": [
    { "question": "What is 2 + 2?", "options": ["3", "4", "5", "6"], "answerIndex": 1 },
    { "question": "Which planet is known as the red planet?", "options": ["Venus", "Mars", "Jupiter"], "answerIndex": 1 },
    { "question": "Water boils at sea level at...", "options": ["90 C", "100 C"], "answerIndex": 1 }
  ]
}
[/QUIZ_JSON]
Pick an answer with the number keys."#;

const FLASHCARD_REPLY: &str = r#"Here is a small deck to review:
[FLASHCARDS_JSON]
{
  "cards": [
    { "front": "Ownership", "back": "Each value has exactly one owner" },
    { "front": "Borrowing", "back": "Referencing a value without taking ownership" },
    { "front": "Lifetime", "back": "The scope for which a reference is valid" }
  ]
}
[/FLASHCARDS_JSON]
Press space to flip a card."#;

const BROKEN_REPLY: &str = r#"This quiz has a mistake in it:
[QUIZ_JSON]{"questions":[{"question":"Only one option?","options":["Yes"],"answerIndex":3}]}[/QUIZ_JSON]
It shows up as plain text instead."#;

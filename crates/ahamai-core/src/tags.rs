//! Tag scanner for assistant message text
//!
//! Splits the full text of a message into plain-text runs and tagged blocks.
//! The scanner is re-run on every streaming snapshot, so it must cope with a
//! block whose closing delimiter has not arrived yet, and with an opening
//! delimiter that is itself cut in half at the end of the snapshot.
//!
//! ```text
//! intro [QUIZ_JSON]{...}[/QUIZ_JSON] outro [IMAGE: a cat | n=2] [FLASHCARDS_J
//! └Text┘└──────── Block ────────────┘└Text┘└──── Block ────────┘└Partial────┘
//! ```

use std::ops::Range;

pub const QUIZ_BLOCK: &str = "QUIZ_JSON";
pub const FLASHCARDS_BLOCK: &str = "FLASHCARDS_JSON";
pub const IMAGE_OPEN: &str = "[IMAGE:";

const BLOCK_SUFFIX: &str = "_JSON";

/// The kind of a tagged block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    Quiz,
    Flashcards,
    Image,
    /// A well-formed `[NAME_JSON]` block with no widget behind it
    Unknown(String),
}

impl TagKind {
    /// Map a block name such as `QUIZ_JSON` to its kind
    pub fn from_block_name(name: &str) -> Self {
        match name {
            QUIZ_BLOCK => TagKind::Quiz,
            FLASHCARDS_BLOCK => TagKind::Flashcards,
            other => TagKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TagKind::Quiz => "quiz",
            TagKind::Flashcards => "flashcards",
            TagKind::Image => "image",
            TagKind::Unknown(name) => name,
        }
    }
}

/// A located tagged block inside the scanned text.
///
/// Offsets are byte offsets into the text that was scanned. For an open
/// block `end_outer` is the end of the text and `inner` runs to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedBlock {
    pub kind: TagKind,
    pub start_outer: usize,
    pub end_outer: usize,
    pub inner: Range<usize>,
    pub closed: bool,
}

impl TaggedBlock {
    pub fn inner_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner.clone()]
    }
}

/// One piece of scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    /// Displayable plain text
    Text(Range<usize>),
    /// An open or closed tagged block
    Block(TaggedBlock),
    /// Trailing text that may still grow into an opening delimiter
    Partial(Range<usize>),
}

enum Delimiter<'a> {
    /// `[NAME_JSON]`
    Open { name: &'a str, len: usize },
    /// `[IMAGE:`
    Image,
    /// `[/NAME_JSON]` outside of any block
    Close { len: usize },
    /// Input ends before the delimiter could be decided
    Partial,
    None,
}

/// Scan `text` left to right into ordered spans.
///
/// Stray closing delimiters are dropped. Scanning stops at the first open
/// block or partial delimiter, since everything after it belongs to it.
pub fn scan(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('[') {
        let at = cursor + offset;

        match classify(&text[at..]) {
            Delimiter::None => {
                cursor = at + 1;
            }
            Delimiter::Partial => {
                push_text(&mut spans, text_start..at);
                spans.push(Span::Partial(at..text.len()));
                return spans;
            }
            Delimiter::Close { len } => {
                push_text(&mut spans, text_start..at);
                cursor = at + len;
                text_start = cursor;
            }
            Delimiter::Open { name, len } => {
                push_text(&mut spans, text_start..at);

                let kind = TagKind::from_block_name(name);
                let inner_start = at + len;
                let closing = format!("[/{}]", name);

                match text[inner_start..].find(&closing) {
                    Some(rel) => {
                        let inner_end = inner_start + rel;
                        let end = inner_end + closing.len();
                        spans.push(Span::Block(TaggedBlock {
                            kind,
                            start_outer: at,
                            end_outer: end,
                            inner: inner_start..inner_end,
                            closed: true,
                        }));
                        cursor = end;
                        text_start = end;
                    }
                    None => {
                        spans.push(Span::Block(TaggedBlock {
                            kind,
                            start_outer: at,
                            end_outer: text.len(),
                            inner: inner_start..text.len(),
                            closed: false,
                        }));
                        return spans;
                    }
                }
            }
            Delimiter::Image => {
                let inner_start = at + IMAGE_OPEN.len();
                let line = &text[inner_start..];

                match line.find(|c: char| c == ']' || c == '\n') {
                    Some(rel) if line.as_bytes()[rel] == b']' => {
                        push_text(&mut spans, text_start..at);
                        let end = inner_start + rel + 1;
                        spans.push(Span::Block(TaggedBlock {
                            kind: TagKind::Image,
                            start_outer: at,
                            end_outer: end,
                            inner: inner_start..inner_start + rel,
                            closed: true,
                        }));
                        cursor = end;
                        text_start = end;
                    }
                    Some(_) => {
                        // Line ended first; the directive is single-line only,
                        // so its opener is dropped and the rest stays text
                        push_text(&mut spans, text_start..at);
                        text_start = inner_start;
                        cursor = inner_start;
                    }
                    None => {
                        push_text(&mut spans, text_start..at);
                        spans.push(Span::Block(TaggedBlock {
                            kind: TagKind::Image,
                            start_outer: at,
                            end_outer: text.len(),
                            inner: inner_start..text.len(),
                            closed: false,
                        }));
                        return spans;
                    }
                }
            }
        }
    }

    push_text(&mut spans, text_start..text.len());
    log::trace!("scanned {} bytes into {} spans", text.len(), spans.len());
    spans
}

fn push_text(spans: &mut Vec<Span>, range: Range<usize>) {
    if !range.is_empty() {
        spans.push(Span::Text(range));
    }
}

/// Decide what the `[` at the start of `rest` opens
fn classify(rest: &str) -> Delimiter<'_> {
    if rest.starts_with(IMAGE_OPEN) {
        return Delimiter::Image;
    }
    if IMAGE_OPEN.starts_with(rest) {
        return Delimiter::Partial;
    }

    let body = &rest[1..];
    let (closing, body) = match body.strip_prefix('/') {
        Some(stripped) => (true, stripped),
        None => (false, body),
    };

    let ident_len = body
        .bytes()
        .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
        .count();
    let ident = &body[..ident_len];

    if ident_len == body.len() {
        return if could_become_block_name(ident) {
            Delimiter::Partial
        } else {
            Delimiter::None
        };
    }

    if body.as_bytes()[ident_len] != b']' || !is_block_name(ident) {
        return Delimiter::None;
    }

    let len = 1 + usize::from(closing) + ident_len + 1;
    if closing {
        Delimiter::Close { len }
    } else {
        Delimiter::Open { name: ident, len }
    }
}

fn is_block_name(ident: &str) -> bool {
    ident.len() > BLOCK_SUFFIX.len()
        && ident.ends_with(BLOCK_SUFFIX)
        && ident.as_bytes()[0].is_ascii_uppercase()
}

fn could_become_block_name(ident: &str) -> bool {
    ident.bytes().next().map_or(true, |b| b.is_ascii_uppercase())
}

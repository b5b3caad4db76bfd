use thiserror::Error;

/// Result type for payload decoding
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Reasons a closed tagged block could not be decoded into a payload.
///
/// None of these are fatal: the renderer shows the block's inner text
/// instead of a widget.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The block body is not a valid JSON object of the expected shape
    #[error("Malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// A quiz block with no questions
    #[error("Quiz has no questions")]
    EmptyQuiz,

    #[error("Question {question} has {found} options, at least {min} required")]
    TooFewOptions {
        question: usize,
        found: usize,
        min: usize,
    },

    #[error("Question {question} has {found} options, at most {max} allowed")]
    TooManyOptions {
        question: usize,
        found: usize,
        max: usize,
    },

    #[error("Question {question} answer index {index} is out of range for {options} options")]
    AnswerOutOfRange {
        question: usize,
        index: usize,
        options: usize,
    },

    /// A flashcard block with no cards
    #[error("Flashcard deck has no cards")]
    EmptyDeck,

    /// Image directive without a prompt before the `|`
    #[error("Image directive has no prompt")]
    MissingPrompt,

    /// Image directive without an `n=<count>` clause
    #[error("Image directive has no n=<count> clause")]
    MissingCount,

    /// Count is not an integer, or is below 1
    #[error("Invalid image count: {0}")]
    InvalidCount(String),

    /// A `[NAME_JSON]` block whose name has no widget
    #[error("Unknown tag kind: {0}")]
    UnknownKind(String),
}

impl PayloadError {
    /// Create an invalid count error
    pub fn invalid_count(raw: impl Into<String>) -> Self {
        Self::InvalidCount(raw.into())
    }

    /// Create an unknown kind error
    pub fn unknown_kind(name: impl Into<String>) -> Self {
        Self::UnknownKind(name.into())
    }
}

/// Errors from the widget factory
#[derive(Error, Debug)]
pub enum WidgetError {
    /// The block body could not be decoded
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The payload variant does not belong to the tag kind it came from
    #[error("Payload of kind {payload} cannot build a {kind} widget")]
    KindMismatch {
        kind: &'static str,
        payload: &'static str,
    },

    /// The tag kind has no widget variant
    #[error("No widget for tag kind: {0}")]
    Unsupported(String),
}

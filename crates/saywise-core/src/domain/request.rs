use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to every queued speech request.
pub type RequestId = Uuid;

/// A request to speak one piece of text.
///
/// Created by the facade for every `speak` call that survives
/// deduplication, and consumed exactly once by the queue processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Unique request id.
    pub id: RequestId,

    /// Text to speak, as given by the caller.
    pub text: String,

    /// Priority requests jump ahead of all non-priority ones and bypass
    /// deduplication.
    pub priority: bool,

    /// When the request entered the queue.
    pub enqueued_at: DateTime<Utc>,

    /// Free-form caller label (e.g. the lesson step), used for tracing only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SpeechRequest {
    /// Create a request stamped with a fresh id and the current time.
    pub fn new(text: impl Into<String>, priority: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            priority,
            enqueued_at: Utc::now(),
            context: None,
        }
    }

    /// Attach a caller label.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// First 60 characters of the text, for log lines.
    pub fn preview(&self) -> &str {
        match self.text.char_indices().nth(60) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

//! Conversation messages exchanged during an interview.
//!
//! A message pairs a role with text content. Interview transcripts use the
//! `interviewer` and `candidate` roles; the constants on [`Message`] keep the
//! strings in one place for persistence and prompt assembly.

use serde::{Deserialize, Serialize};

/// One turn of the interview transcript.
///
/// # Examples
///
/// ```
/// use susi::message::Message;
///
/// let q = Message::interviewer("자기소개 부탁드립니다.");
/// let a = Message::candidate("안녕하세요, ...");
/// assert_eq!(q.role, Message::INTERVIEWER);
/// assert_eq!(a.role, Message::CANDIDATE);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the speaker (`interviewer` or `candidate`).
    pub role: String,
    /// The text content of the turn.
    pub content: String,
}

impl Message {
    /// Role of the AI interviewer.
    pub const INTERVIEWER: &'static str = "interviewer";
    /// Role of the student being interviewed.
    pub const CANDIDATE: &'static str = "candidate";

    /// Creates a message with an explicit role.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates an interviewer message.
    #[must_use]
    pub fn interviewer(content: &str) -> Self {
        Self::new(Self::INTERVIEWER, content)
    }

    /// Creates a candidate message.
    #[must_use]
    pub fn candidate(content: &str) -> Self {
        Self::new(Self::CANDIDATE, content)
    }

    /// Whether this message was spoken by the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

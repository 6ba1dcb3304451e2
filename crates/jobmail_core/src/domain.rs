//! crates/jobmail_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application workflow.
//! These structs are independent of any transport or storage format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The authenticated user as reported by the backend profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

/// The fixed set of external mail providers an account can be linked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Microsoft,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Google => write!(f, "google"),
            Provider::Microsoft => write!(f, "microsoft"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "microsoft" => Ok(Provider::Microsoft),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// An external mail account authorized for sending on the user's behalf.
///
/// Owned by the backend; the client holds a read-through cache that is
/// refreshed after connect/disconnect operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: i64,
    pub provider: Provider,
    pub email: String,
}

/// The authenticated session: the user profile plus their linked accounts.
///
/// A `Session` only exists while a valid credential does; a stale persisted
/// credential must be verified before any cached session is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub linked_accounts: Vec<LinkedAccount>,
}

/// Lifecycle of an uploaded document on the backend.
///
/// Transitions only ever move forward:
/// `uploaded -> processing -> {completed, error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    /// Whether moving from `self` to `next` follows the forward-only
    /// document state machine. Staying in place is always allowed (polling
    /// is idempotent).
    pub fn may_become(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Uploaded, Processing) => true,
            (Processing, Completed) | (Processing, Error) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Error)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Uploaded => write!(f, "uploaded"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Error => write!(f, "error"),
        }
    }
}

/// The fields extracted from a parsed document that the compose flow
/// consumes. Attached to a [`Document`] only once its status is `completed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// An uploaded file plus its parsing/extraction lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub extracted: Option<ExtractedData>,
}

/// The job posting details the user fills in during the `details` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    pub position: String,
    pub company: String,
    pub description: String,
    pub requirements: String,
}

/// In-progress, not-yet-sent application email composition state.
///
/// `generated_content` is regenerated in place (replaced, not versioned)
/// each time generation is invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftMessage {
    pub job: JobDetails,
    pub extracted: Option<ExtractedData>,
    pub generated_content: Option<String>,
}

/// The three fields a send attempt is made of. A resend reuses these
/// verbatim from a failed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub content: String,
}

/// Delivery outcome of one send attempt.
///
/// `pending -> {sent, failed}`; a failed record is never transitioned by a
/// resend, which creates a fresh `pending` record instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Pending,
    Sent,
    Failed,
}

impl SendStatus {
    /// Forward-only transition check for the send state machine.
    pub fn may_become(self, next: SendStatus) -> bool {
        use SendStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Pending, Sent) | (Pending, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendStatus::Pending => write!(f, "pending"),
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A record of one send attempt and its delivery outcome. Retained for
/// history even after a resend supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentEmail {
    pub id: i64,
    pub to: String,
    pub subject: String,
    pub content: String,
    pub status: SendStatus,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A reusable subject/body template stored on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: i64,
    pub name: String,
    pub subject_template: String,
    pub body_template: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Ordered stages of the compose flow; each stage is gated on the output
/// of the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStage {
    Upload,
    Details,
    Generate,
    Review,
}

impl fmt::Display for ComposeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeStage::Upload => write!(f, "upload"),
            ComposeStage::Details => write!(f, "details"),
            ComposeStage::Generate => write!(f, "generate"),
            ComposeStage::Review => write!(f, "review"),
        }
    }
}

/// Registration payload. The confirmation check is a local precondition;
/// the backend separately rejects duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_status_only_moves_forward() {
        use DocumentStatus::*;
        assert!(Uploaded.may_become(Processing));
        assert!(Processing.may_become(Completed));
        assert!(Processing.may_become(Error));
        assert!(Processing.may_become(Processing));

        assert!(!Processing.may_become(Uploaded));
        assert!(!Completed.may_become(Processing));
        assert!(!Completed.may_become(Error));
        assert!(!Error.may_become(Completed));

        // Terminal statuses are only reachable through processing.
        assert!(
            !Uploaded.may_become(Completed),
            "uploaded -> completed skips processing"
        );
        assert!(
            !Uploaded.may_become(Error),
            "uploaded -> error skips processing"
        );
    }

    #[test]
    fn send_status_never_leaves_terminal_states() {
        use SendStatus::*;
        assert!(Pending.may_become(Sent));
        assert!(Pending.may_become(Failed));
        assert!(!Failed.may_become(Pending));
        assert!(!Sent.may_become(Failed));
    }

    #[test]
    fn provider_round_trips_through_str() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!(
            "Microsoft".parse::<Provider>().unwrap(),
            Provider::Microsoft
        );
        assert!("yahoo".parse::<Provider>().is_err());
        assert_eq!(Provider::Google.to_string(), "google");
    }
}

//! crates/jobmail_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core workflow to be independent of the concrete HTTP backend and of the
//! durable credential storage.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::domain::{
    Document, DocumentStatus, EmailTemplate, ExtractedData, LinkedAccount, OutgoingEmail,
    Registration, SentEmail, User,
};

//=========================================================================================
// Error Taxonomy and Result Type
//=========================================================================================

/// The error taxonomy shared by every port operation.
///
/// Local preconditions (`Validation`, `UnsupportedType`, `TooLarge`,
/// `InvalidState`) are checked before any network call is made. `Remote`
/// carries the backend's rejection untouched. `SessionExpired` is the one
/// variant that implies a local side effect already happened: the credential
/// was cleared by the transport before the error was surfaced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// A local precondition was violated; no network call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload gate: the file type is outside the accepted set.
    #[error("File type not supported: {0}")]
    UnsupportedType(String),

    /// Upload gate: the file exceeds the size limit.
    #[error("File too large: {size} bytes (maximum {limit})")]
    TooLarge { size: u64, limit: u64 },

    /// The operation is not allowed in the item's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The backend rejected the call; session state is untouched.
    #[error("Remote error ({code}): {message}")]
    Remote { code: String, message: String },

    /// An authorization failure was detected; the credential has been
    /// cleared before this error was returned.
    #[error("Session expired")]
    SessionExpired,

    /// The OAuth provider reported a failure on the callback.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// The OAuth callback carried neither a token nor an error.
    #[error("No authentication token received")]
    MissingToken,

    /// The referenced item does not exist locally.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A convenience type alias for `Result<T, ApiError>`.
pub type ApiResult<T> = Result<T, ApiError>;

//=========================================================================================
// Request Payloads
//=========================================================================================

/// A file handed to the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// The payload for AI email generation: the job posting plus whatever was
/// extracted from the user's document.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateEmailRequest {
    pub job_position: String,
    pub job_company: String,
    pub job_description: String,
    pub job_requirements: String,
    pub extracted_data: Option<ExtractedData>,
}

/// Fields for creating or updating a template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateUpsert {
    pub name: String,
    pub subject_template: String,
    pub body_template: String,
    pub is_public: bool,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Authentication and linked-account operations.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a bearer token.
    async fn login(&self, email: &str, password: &str) -> ApiResult<String>;

    /// Creates an account. Does not authenticate; the caller must log in.
    async fn register(&self, registration: &Registration) -> ApiResult<()>;

    /// Notifies the backend of logout. Best-effort from the caller's view.
    async fn logout(&self) -> ApiResult<()>;

    /// Fetches the profile of the currently authenticated user.
    async fn profile(&self) -> ApiResult<User>;

    async fn linked_accounts(&self) -> ApiResult<Vec<LinkedAccount>>;

    async fn disconnect_account(&self, account_id: i64) -> ApiResult<()>;
}

/// Document upload, parsing, and extraction operations.
#[async_trait]
pub trait FilesApi: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> ApiResult<Document>;

    /// Asks the backend to start parsing. Acceptance, not completion.
    async fn trigger_parse(&self, document_id: i64) -> ApiResult<()>;

    async fn status(&self, document_id: i64) -> ApiResult<DocumentStatus>;

    async fn extracted(&self, document_id: i64) -> ApiResult<ExtractedData>;

    async fn delete(&self, document_id: i64) -> ApiResult<()>;

    async fn list(&self) -> ApiResult<Vec<Document>>;
}

/// AI generation, consumed as an opaque remote service.
#[async_trait]
pub trait AiApi: Send + Sync {
    /// Returns the generated email body.
    async fn generate_email(&self, request: &GenerateEmailRequest) -> ApiResult<String>;
}

/// Email dispatch and send-history operations.
#[async_trait]
pub trait EmailApi: Send + Sync {
    /// Issues one send attempt and returns the backend's record for it.
    async fn send(&self, email: &OutgoingEmail) -> ApiResult<SentEmail>;

    async fn send_status(&self, send_id: i64) -> ApiResult<SentEmail>;

    async fn list_sent(&self) -> ApiResult<Vec<SentEmail>>;

    async fn delete_send(&self, send_id: i64) -> ApiResult<()>;
}

/// Template CRUD against the backend.
#[async_trait]
pub trait TemplatesApi: Send + Sync {
    async fn create(&self, template: &TemplateUpsert) -> ApiResult<EmailTemplate>;

    async fn list(&self) -> ApiResult<Vec<EmailTemplate>>;

    async fn get(&self, template_id: i64) -> ApiResult<EmailTemplate>;

    async fn update(&self, template_id: i64, template: &TemplateUpsert)
        -> ApiResult<EmailTemplate>;

    async fn delete(&self, template_id: i64) -> ApiResult<()>;

    async fn list_builtin(&self) -> ApiResult<Vec<EmailTemplate>>;
}

/// Durable storage for the one persisted bearer credential.
///
/// Storage failures are logged by the caller, never surfaced: losing the
/// persisted copy degrades to a fresh login, nothing worse.
pub trait CredentialStore: Send + Sync {
    /// Reads the persisted token, if one exists.
    fn load(&self) -> std::io::Result<Option<String>>;

    fn save(&self, token: &str) -> std::io::Result<()>;

    fn clear(&self) -> std::io::Result<()>;
}

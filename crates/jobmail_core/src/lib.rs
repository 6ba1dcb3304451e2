pub mod domain;
pub mod ports;

pub use domain::{
    ComposeStage, Document, DocumentStatus, DraftMessage, EmailTemplate, ExtractedData, JobDetails,
    LinkedAccount, OutgoingEmail, Provider, Registration, SendStatus, SentEmail, Session, User,
};
pub use ports::{
    AiApi, ApiError, ApiResult, AuthApi, CredentialStore, EmailApi, FilesApi, GenerateEmailRequest,
    TemplatesApi, TemplateUpsert, UploadRequest,
};

//! services/client/src/adapters/http.rs
//!
//! The reqwest-backed transport adapter. This is the single entry point for
//! all remote interaction: it attaches the current credential to every
//! outgoing request and classifies responses uniformly. An authorization
//! failure (HTTP 401) clears the credential handle and surfaces as
//! `ApiError::SessionExpired`; every other rejection becomes
//! `ApiError::Remote` without touching session state.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use jobmail_core::domain::{
    Document, DocumentStatus, EmailTemplate, ExtractedData, LinkedAccount, OutgoingEmail,
    Registration, SentEmail, User,
};
use jobmail_core::ports::{
    AiApi, ApiError, ApiResult, AuthApi, EmailApi, FilesApi, GenerateEmailRequest, TemplatesApi,
    TemplateUpsert, UploadRequest,
};

use crate::credential::CredentialHandle;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
}

#[derive(Serialize)]
struct RegisterPayload<'a> {
    email: &'a str,
    name: Option<&'a str>,
    password: &'a str,
}

#[derive(Deserialize)]
struct FileStatusReply {
    status: DocumentStatus,
}

/// The backend returns parsed contact details nested under `contact`; the
/// compose flow consumes them flattened.
#[derive(Deserialize)]
struct ExtractedReply {
    #[serde(default)]
    contact: ContactReply,
    #[serde(default)]
    skills: Vec<String>,
}

#[derive(Deserialize, Default)]
struct ContactReply {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl From<ExtractedReply> for ExtractedData {
    fn from(reply: ExtractedReply) -> Self {
        ExtractedData {
            name: reply.contact.name,
            email: reply.contact.email,
            phone: reply.contact.phone,
            skills: reply.skills,
        }
    }
}

#[derive(Deserialize)]
struct GenerateReply {
    generated_email: String,
}

/// The shape of the backend's error body.
#[derive(Deserialize)]
struct ErrorReply {
    detail: String,
}

//=========================================================================================
// Response Classification
//=========================================================================================

/// Maps a transport-level failure (no response at all) onto the taxonomy.
/// A timeout is a remote error, never a session invalidation.
fn transport_failure(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Remote {
            code: "timeout".to_string(),
            message: "request timed out".to_string(),
        }
    } else {
        ApiError::Remote {
            code: "network".to_string(),
            message: e.to_string(),
        }
    }
}

/// Classifies a completed HTTP exchange.
///
/// This is the single place session invalidation is triggered reactively:
/// a 401 clears the credential (idempotent; a concurrent second clear is a
/// no-op) and becomes `SessionExpired`. Other non-success statuses become
/// `Remote` with the backend's `detail` message when the body carries one.
fn classify(credential: &CredentialHandle, status: StatusCode, body: &[u8]) -> ApiResult<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED {
        if credential.clear() {
            debug!("Authorization failure: cleared stored credential");
        }
        return Err(ApiError::SessionExpired);
    }
    let message = serde_json::from_slice::<ErrorReply>(body)
        .map(|e| e.detail)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(ApiError::Remote {
        code: status.as_u16().to_string(),
        message,
    })
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::Remote {
        code: "decode".to_string(),
        message: format!("malformed response body: {}", e),
    })
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements every remote-facing port over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    credential: CredentialHandle,
}

impl HttpBackend {
    /// Creates a backend with the single uniform request timeout.
    pub fn new(
        base_url: &str,
        request_timeout: std::time::Duration,
        credential: CredentialHandle,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer credential when present; omits it when absent.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credential.get() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request and runs the body through the classification path.
    async fn execute(&self, request: RequestBuilder) -> ApiResult<bytes::Bytes> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_failure)?;
        classify(&self.credential, status, &body)?;
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let body = self.execute(self.http.get(self.url(path))).await?;
        decode(&body)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> ApiResult<T> {
        let body = self
            .execute(self.http.post(self.url(path)).json(payload))
            .await?;
        decode(&body)
    }

    async fn delete_unit(&self, path: &str) -> ApiResult<()> {
        self.execute(self.http.delete(self.url(path))).await?;
        Ok(())
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthApi for HttpBackend {
    /// Exchanges credentials for a bearer token. The login endpoint is
    /// form-encoded with a `username` field carrying the email.
    async fn login(&self, email: &str, password: &str) -> ApiResult<String> {
        let form = [("username", email), ("password", password)];
        let body = self
            .execute(self.http.post(self.url("/auth/login")).form(&form))
            .await?;
        let reply: TokenReply = decode(&body)?;
        Ok(reply.access_token)
    }

    async fn register(&self, registration: &Registration) -> ApiResult<()> {
        let payload = RegisterPayload {
            email: &registration.email,
            name: registration.name.as_deref(),
            password: &registration.password,
        };
        self.execute(self.http.post(self.url("/auth/register")).json(&payload))
            .await?;
        Ok(())
    }

    async fn logout(&self) -> ApiResult<()> {
        self.execute(self.http.post(self.url("/auth/logout")))
            .await?;
        Ok(())
    }

    async fn profile(&self) -> ApiResult<User> {
        self.get_json("/auth/me").await
    }

    async fn linked_accounts(&self) -> ApiResult<Vec<LinkedAccount>> {
        self.get_json("/auth/email/accounts").await
    }

    async fn disconnect_account(&self, account_id: i64) -> ApiResult<()> {
        self.delete_unit(&format!("/auth/email/accounts/{}", account_id))
            .await
    }
}

#[async_trait]
impl FilesApi for HttpBackend {
    async fn upload(&self, request: &UploadRequest) -> ApiResult<Document> {
        let part = Part::bytes(request.data.to_vec())
            .file_name(request.filename.clone())
            .mime_str(&request.content_type)
            .map_err(|e| ApiError::Validation(format!("invalid content type: {}", e)))?;
        let form = Form::new().part("file", part);
        let body = self
            .execute(self.http.post(self.url("/files/upload")).multipart(form))
            .await?;
        decode(&body)
    }

    async fn trigger_parse(&self, document_id: i64) -> ApiResult<()> {
        self.execute(
            self.http
                .post(self.url(&format!("/files/{}/parse", document_id))),
        )
        .await?;
        Ok(())
    }

    async fn status(&self, document_id: i64) -> ApiResult<DocumentStatus> {
        let reply: FileStatusReply = self
            .get_json(&format!("/files/{}/status", document_id))
            .await?;
        Ok(reply.status)
    }

    async fn extracted(&self, document_id: i64) -> ApiResult<ExtractedData> {
        let reply: ExtractedReply = self
            .get_json(&format!("/files/{}/extracted", document_id))
            .await?;
        Ok(reply.into())
    }

    async fn delete(&self, document_id: i64) -> ApiResult<()> {
        self.delete_unit(&format!("/files/{}", document_id)).await
    }

    async fn list(&self) -> ApiResult<Vec<Document>> {
        self.get_json("/files/").await
    }
}

#[async_trait]
impl AiApi for HttpBackend {
    async fn generate_email(&self, request: &GenerateEmailRequest) -> ApiResult<String> {
        let reply: GenerateReply = self.post_json("/ai/generate-email", request).await?;
        Ok(reply.generated_email)
    }
}

#[async_trait]
impl EmailApi for HttpBackend {
    async fn send(&self, email: &OutgoingEmail) -> ApiResult<SentEmail> {
        self.post_json("/email/send", email).await
    }

    async fn send_status(&self, send_id: i64) -> ApiResult<SentEmail> {
        self.get_json(&format!("/email/sends/{}", send_id)).await
    }

    async fn list_sent(&self) -> ApiResult<Vec<SentEmail>> {
        self.get_json("/email/sent").await
    }

    async fn delete_send(&self, send_id: i64) -> ApiResult<()> {
        self.delete_unit(&format!("/email/sends/{}", send_id)).await
    }
}

#[async_trait]
impl TemplatesApi for HttpBackend {
    async fn create(&self, template: &TemplateUpsert) -> ApiResult<EmailTemplate> {
        self.post_json("/templates/", template).await
    }

    async fn list(&self) -> ApiResult<Vec<EmailTemplate>> {
        self.get_json("/templates/").await
    }

    async fn get(&self, template_id: i64) -> ApiResult<EmailTemplate> {
        self.get_json(&format!("/templates/{}", template_id)).await
    }

    async fn update(
        &self,
        template_id: i64,
        template: &TemplateUpsert,
    ) -> ApiResult<EmailTemplate> {
        let body = self
            .execute(
                self.http
                    .put(self.url(&format!("/templates/{}", template_id)))
                    .json(template),
            )
            .await?;
        decode(&body)
    }

    async fn delete(&self, template_id: i64) -> ApiResult<()> {
        self.delete_unit(&format!("/templates/{}", template_id))
            .await
    }

    async fn list_builtin(&self) -> ApiResult<Vec<EmailTemplate>> {
        self.get_json("/templates/builtin/list").await
    }
}

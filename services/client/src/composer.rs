//! services/client/src/composer.rs
//!
//! The workflow orchestrator for the compose flow. Drives a draft through
//! the ordered stages `upload -> details -> generate -> review`, gating each
//! stage on the previous stage's output, and hands send attempts to the
//! pipeline store.

use std::sync::Arc;

use jobmail_core::domain::{
    ComposeStage, DocumentStatus, DraftMessage, ExtractedData, JobDetails, OutgoingEmail, SentEmail,
};
use jobmail_core::ports::{AiApi, ApiError, ApiResult, GenerateEmailRequest};
use tracing::info;

use crate::pipeline::PipelineStore;

/// Orchestrates one composition session.
///
/// All methods take `&mut self`: a single composer instance serializes its
/// own operations, so a second intent against the same draft cannot race the
/// first.
pub struct Composer {
    ai: Arc<dyn AiApi>,
    pipeline: Arc<PipelineStore>,
    stage: ComposeStage,
    draft: DraftMessage,
    /// Working copy of the outgoing email, seeded by generation and edited
    /// in the review stage.
    email: OutgoingEmail,
}

impl Composer {
    pub fn new(ai: Arc<dyn AiApi>, pipeline: Arc<PipelineStore>) -> Self {
        Self {
            ai,
            pipeline,
            stage: ComposeStage::Upload,
            draft: DraftMessage::default(),
            email: empty_email(),
        }
    }

    pub fn stage(&self) -> ComposeStage {
        self.stage
    }

    pub fn draft(&self) -> &DraftMessage {
        &self.draft
    }

    pub fn email(&self) -> &OutgoingEmail {
        &self.email
    }

    /// Enters the `details` stage with extracted data from a completed
    /// document, or with an explicit skip when no document is attached.
    pub fn enter_details(&mut self, document_id: Option<i64>) -> ApiResult<()> {
        let extracted = match document_id {
            Some(id) => {
                let document = self
                    .pipeline
                    .document(id)
                    .ok_or_else(|| ApiError::NotFound(format!("document {}", id)))?;
                if document.status != DocumentStatus::Completed {
                    return Err(ApiError::InvalidState(format!(
                        "document {} is {}, details need a completed document",
                        id, document.status
                    )));
                }
                document.extracted
            }
            None => None,
        };
        self.draft.extracted = extracted;
        self.stage = ComposeStage::Details;
        Ok(())
    }

    pub fn set_job_details(&mut self, job: JobDetails) {
        self.draft.job = job;
    }

    /// Moves on to generation. Requires a non-empty position and company.
    pub fn enter_generate(&mut self) -> ApiResult<()> {
        if self.draft.job.position.trim().is_empty() || self.draft.job.company.trim().is_empty() {
            return Err(ApiError::Validation(
                "job position and company are required".to_string(),
            ));
        }
        self.stage = ComposeStage::Generate;
        Ok(())
    }

    /// Generates (or regenerates) the email body.
    ///
    /// Re-entrant: invoking this at the `review` stage overwrites the
    /// generated content and the working body in place, discarding unsent
    /// edits. That overwrite is deliberate and the presentation layer is
    /// expected to disclose it before calling. The recipient survives a
    /// regenerate.
    pub async fn generate_email(&mut self) -> ApiResult<String> {
        match self.stage {
            ComposeStage::Generate | ComposeStage::Review => {}
            other => {
                return Err(ApiError::InvalidState(format!(
                    "cannot generate from the {} stage",
                    other
                )))
            }
        }

        let request = GenerateEmailRequest {
            job_position: self.draft.job.position.clone(),
            job_company: self.draft.job.company.clone(),
            job_description: self.draft.job.description.clone(),
            job_requirements: self.draft.job.requirements.clone(),
            extracted_data: self.draft.extracted.clone(),
        };
        let content = self.ai.generate_email(&request).await?;

        self.draft.generated_content = Some(content.clone());
        self.email.subject = format!(
            "Application for {} at {}",
            self.draft.job.position, self.draft.job.company
        );
        self.email.content = content.clone();
        self.stage = ComposeStage::Review;
        Ok(content)
    }

    pub fn set_recipient(&mut self, to: &str) {
        self.email.to = to.to_string();
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.email.subject = subject.to_string();
    }

    pub fn set_content(&mut self, content: &str) {
        self.email.content = content.to_string();
    }

    /// Sends the reviewed email.
    ///
    /// All three fields must be non-empty; violations are local and make no
    /// network call. On success the whole draft resets to a fresh `upload`
    /// stage; on failure the draft is retained unchanged so the user can
    /// retry without re-entering anything.
    pub async fn send_email(
        &mut self,
        to: &str,
        subject: &str,
        content: &str,
    ) -> ApiResult<SentEmail> {
        if self.stage != ComposeStage::Review {
            return Err(ApiError::InvalidState(format!(
                "cannot send from the {} stage",
                self.stage
            )));
        }
        if to.trim().is_empty() || subject.trim().is_empty() || content.trim().is_empty() {
            return Err(ApiError::Validation(
                "recipient, subject and content are all required".to_string(),
            ));
        }

        let record = self
            .pipeline
            .record_send(&OutgoingEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                content: content.to_string(),
            })
            .await?;
        info!("Sent application email to {}", record.to);
        self.reset();
        Ok(record)
    }

    /// Resends a failed email from history with its exact stored fields,
    /// without re-running generation. The draft is untouched.
    pub async fn resend(&self, send_id: i64) -> ApiResult<SentEmail> {
        self.pipeline.resend(send_id).await
    }

    /// Discards the draft and returns to the `upload` stage.
    pub fn reset(&mut self) {
        self.draft = DraftMessage::default();
        self.email = empty_email();
        self.stage = ComposeStage::Upload;
    }

    /// The extracted data attached to the current draft, if any. Cleared
    /// along with the rest of the draft on [`reset`](Self::reset).
    pub fn extracted(&self) -> Option<&ExtractedData> {
        self.draft.extracted.as_ref()
    }
}

fn empty_email() -> OutgoingEmail {
    OutgoingEmail {
        to: String::new(),
        subject: String::new(),
        content: String::new(),
    }
}

//! services/client/src/pipeline.rs
//!
//! The pipeline store: per-document state tracking (upload -> parse ->
//! extract) and per-message state tracking (send/resend), reconciled against
//! the backend as the source of truth. Document and send statuses only move
//! forward; backend-reported regressions are logged and ignored.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use jobmail_core::domain::{Document, DocumentStatus, OutgoingEmail, SendStatus, SentEmail};
use jobmail_core::ports::{ApiError, ApiResult, EmailApi, FilesApi, UploadRequest};
use tracing::{debug, warn};

/// Client-side upload gate. The backend stays authoritative; this check only
/// avoids wasted round trips.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted upload extensions and their MIME types.
const ACCEPTED_TYPES: [(&str, &str); 3] = [
    ("pdf", "application/pdf"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("txt", "text/plain"),
];

fn content_type_for(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    ACCEPTED_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Tracks documents and send records for the active session.
///
/// Nothing here is persisted locally; after a reload the store is rebuilt
/// from the backend via [`PipelineStore::sync_documents`] and
/// [`PipelineStore::sync_sent`].
pub struct PipelineStore {
    files: Arc<dyn FilesApi>,
    email: Arc<dyn EmailApi>,
    documents: RwLock<BTreeMap<i64, Document>>,
    sent: RwLock<Vec<SentEmail>>,
}

impl PipelineStore {
    pub fn new(files: Arc<dyn FilesApi>, email: Arc<dyn EmailApi>) -> Self {
        Self {
            files,
            email,
            documents: RwLock::new(BTreeMap::new()),
            sent: RwLock::new(Vec::new()),
        }
    }

    //=====================================================================================
    // Documents
    //=====================================================================================

    pub fn document(&self, document_id: i64) -> Option<Document> {
        lock_read(&self.documents).get(&document_id).cloned()
    }

    pub fn documents(&self) -> Vec<Document> {
        lock_read(&self.documents).values().cloned().collect()
    }

    /// Uploads a file, gating locally on type and size before any network
    /// call is made.
    pub async fn record_upload(&self, filename: &str, data: Bytes) -> ApiResult<Document> {
        let Some(content_type) = content_type_for(filename) else {
            return Err(ApiError::UnsupportedType(filename.to_string()));
        };
        let size = data.len() as u64;
        if size > MAX_UPLOAD_BYTES {
            return Err(ApiError::TooLarge {
                size,
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let document = self
            .files
            .upload(&UploadRequest {
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                data,
            })
            .await?;
        lock_write(&self.documents).insert(document.id, document.clone());
        Ok(document)
    }

    /// Asks the backend to start parsing a document.
    ///
    /// Only valid while the document is `uploaded`; anything else fails with
    /// `InvalidState` before any network call. Once the backend accepts the
    /// trigger the status is set to `processing` optimistically, which
    /// closes the window where a second trigger could race the first.
    pub async fn trigger_parse(&self, document_id: i64) -> ApiResult<()> {
        let status = self
            .document(document_id)
            .ok_or_else(|| ApiError::NotFound(format!("document {}", document_id)))?
            .status;
        if status != DocumentStatus::Uploaded {
            return Err(ApiError::InvalidState(format!(
                "document {} is {}, parsing can only be triggered while uploaded",
                document_id, status
            )));
        }

        self.files.trigger_parse(document_id).await?;

        if let Some(doc) = lock_write(&self.documents).get_mut(&document_id) {
            doc.status = DocumentStatus::Processing;
        }
        Ok(())
    }

    /// Polls the backend for a document's status. Idempotent; safe to call
    /// repeatedly. Extracted data is fetched once the document completes.
    pub async fn refresh_status(&self, document_id: i64) -> ApiResult<Document> {
        if self.document(document_id).is_none() {
            return Err(ApiError::NotFound(format!("document {}", document_id)));
        }
        let reported = self.files.status(document_id).await?;

        let needs_extraction = {
            let mut documents = lock_write(&self.documents);
            let Some(doc) = documents.get_mut(&document_id) else {
                return Err(ApiError::NotFound(format!("document {}", document_id)));
            };
            if doc.status != reported {
                // A terminal status for a still-`uploaded` document means the
                // parse was triggered outside this store and finished between
                // polls; step through `processing` rather than skipping it.
                if doc.status == DocumentStatus::Uploaded && reported.is_terminal() {
                    doc.status = DocumentStatus::Processing;
                }
                if doc.status.may_become(reported) {
                    debug!(
                        "Document {} moved {} -> {}",
                        document_id, doc.status, reported
                    );
                    doc.status = reported;
                } else {
                    warn!(
                        "Ignoring status regression for document {}: {} -> {}",
                        document_id, doc.status, reported
                    );
                }
            }
            doc.status == DocumentStatus::Completed && doc.extracted.is_none()
        };

        if needs_extraction {
            // Non-fatal: the next poll retries the fetch.
            match self.files.extracted(document_id).await {
                Ok(extracted) => {
                    if let Some(doc) = lock_write(&self.documents).get_mut(&document_id) {
                        doc.extracted = Some(extracted);
                    }
                }
                Err(e) => warn!(
                    "Failed to fetch extracted data for document {}: {}",
                    document_id, e
                ),
            }
        }

        self.document(document_id)
            .ok_or_else(|| ApiError::NotFound(format!("document {}", document_id)))
    }

    /// Deletes a document; the local entry is removed only after the remote
    /// confirms.
    pub async fn delete_document(&self, document_id: i64) -> ApiResult<()> {
        self.files.delete(document_id).await?;
        lock_write(&self.documents).remove(&document_id);
        Ok(())
    }

    /// Rebuilds the document map from the backend, keeping any extracted
    /// data already fetched for documents the listing does not carry it for.
    pub async fn sync_documents(&self) -> ApiResult<Vec<Document>> {
        let listed = self.files.list().await?;
        let mut documents = lock_write(&self.documents);
        let previous = std::mem::take(&mut *documents);
        for mut doc in listed {
            if doc.extracted.is_none() {
                if let Some(existing) = previous.get(&doc.id) {
                    doc.extracted = existing.extracted.clone();
                }
            }
            documents.insert(doc.id, doc);
        }
        Ok(documents.values().cloned().collect())
    }

    //=====================================================================================
    // Sent Emails
    //=====================================================================================

    pub fn sent_email(&self, send_id: i64) -> Option<SentEmail> {
        lock_read(&self.sent)
            .iter()
            .find(|record| record.id == send_id)
            .cloned()
    }

    pub fn sent_emails(&self) -> Vec<SentEmail> {
        lock_read(&self.sent).clone()
    }

    /// Issues one send attempt and records the backend's record for it.
    pub async fn record_send(&self, email: &OutgoingEmail) -> ApiResult<SentEmail> {
        let record = self.email.send(email).await?;
        lock_write(&self.sent).push(record.clone());
        Ok(record)
    }

    /// Resends a failed email: a fresh send with the exact stored
    /// to/subject/content, recorded as a new entry. The original failed
    /// record is retained for history and never transitioned.
    pub async fn resend(&self, send_id: i64) -> ApiResult<SentEmail> {
        let original = self
            .sent_email(send_id)
            .ok_or_else(|| ApiError::NotFound(format!("send {}", send_id)))?;
        if original.status != SendStatus::Failed {
            return Err(ApiError::InvalidState(format!(
                "send {} is {}, only failed sends can be resent",
                send_id, original.status
            )));
        }
        self.record_send(&OutgoingEmail {
            to: original.to,
            subject: original.subject,
            content: original.content,
        })
        .await
    }

    /// Polls the backend for a send record's delivery outcome.
    pub async fn refresh_send(&self, send_id: i64) -> ApiResult<SentEmail> {
        let fetched = self.email.send_status(send_id).await?;
        let mut sent = lock_write(&self.sent);
        match sent.iter_mut().find(|record| record.id == send_id) {
            Some(record) => {
                if record.status.may_become(fetched.status) {
                    record.status = fetched.status;
                    record.error_message = fetched.error_message.clone();
                } else {
                    warn!(
                        "Ignoring status regression for send {}: {} -> {}",
                        send_id, record.status, fetched.status
                    );
                }
                Ok(record.clone())
            }
            None => {
                sent.push(fetched.clone());
                Ok(fetched)
            }
        }
    }

    /// Rebuilds the send history from the backend.
    pub async fn sync_sent(&self) -> ApiResult<Vec<SentEmail>> {
        let listed = self.email.list_sent().await?;
        *lock_write(&self.sent) = listed.clone();
        Ok(listed)
    }

    /// Removes a send record; local removal only after remote confirmation.
    pub async fn delete_send(&self, send_id: i64) -> ApiResult<()> {
        self.email.delete_send(send_id).await?;
        lock_write(&self.sent).retain(|record| record.id != send_id);
        Ok(())
    }
}

fn lock_read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use jobmail_core::domain::ExtractedData;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A scripted files backend: hands out sequential document ids and
    /// reports whatever status the test programs next.
    pub struct MockFilesApi {
        pub upload_calls: AtomicUsize,
        pub parse_calls: AtomicUsize,
        pub status_calls: AtomicUsize,
        pub extracted_calls: AtomicUsize,
        pub delete_calls: AtomicUsize,
        pub next_id: AtomicI64,
        pub reported_status: Mutex<DocumentStatus>,
        pub fail_extracted: AtomicBool,
        pub fail_delete: AtomicBool,
    }

    impl MockFilesApi {
        pub fn new() -> Self {
            Self {
                upload_calls: AtomicUsize::new(0),
                parse_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
                extracted_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
                next_id: AtomicI64::new(1),
                reported_status: Mutex::new(DocumentStatus::Uploaded),
                fail_extracted: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
            }
        }

        pub fn report(&self, status: DocumentStatus) {
            *self.reported_status.lock().unwrap() = status;
        }
    }

    #[async_trait]
    impl FilesApi for MockFilesApi {
        async fn upload(&self, request: &UploadRequest) -> ApiResult<Document> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Document {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                filename: request.filename.clone(),
                size: request.data.len() as u64,
                created_at: Utc::now(),
                status: DocumentStatus::Uploaded,
                extracted: None,
            })
        }

        async fn trigger_parse(&self, _document_id: i64) -> ApiResult<()> {
            self.parse_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn status(&self, _document_id: i64) -> ApiResult<DocumentStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(*self.reported_status.lock().unwrap())
        }

        async fn extracted(&self, _document_id: i64) -> ApiResult<ExtractedData> {
            self.extracted_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_extracted.load(Ordering::SeqCst) {
                return Err(ApiError::Remote {
                    code: "500".to_string(),
                    message: "extraction unavailable".to_string(),
                });
            }
            Ok(ExtractedData {
                name: Some("Jane Doe".to_string()),
                email: Some("jane@example.com".to_string()),
                phone: None,
                skills: vec!["Rust".to_string()],
            })
        }

        async fn delete(&self, _document_id: i64) -> ApiResult<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(ApiError::Remote {
                    code: "500".to_string(),
                    message: "delete failed".to_string(),
                });
            }
            Ok(())
        }

        async fn list(&self) -> ApiResult<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    /// A scripted email backend: every send yields a fresh record whose
    /// initial status the test controls.
    pub struct MockEmailApi {
        pub send_calls: AtomicUsize,
        pub next_id: AtomicI64,
        pub next_status: Mutex<SendStatus>,
        pub fail_send: AtomicBool,
    }

    impl MockEmailApi {
        pub fn new() -> Self {
            Self {
                send_calls: AtomicUsize::new(0),
                next_id: AtomicI64::new(100),
                next_status: Mutex::new(SendStatus::Pending),
                fail_send: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EmailApi for MockEmailApi {
        async fn send(&self, email: &OutgoingEmail) -> ApiResult<SentEmail> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(ApiError::Remote {
                    code: "502".to_string(),
                    message: "provider rejected the message".to_string(),
                });
            }
            Ok(SentEmail {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                to: email.to.clone(),
                subject: email.subject.clone(),
                content: email.content.clone(),
                status: *self.next_status.lock().unwrap(),
                sent_at: Utc::now(),
                error_message: None,
            })
        }

        async fn send_status(&self, send_id: i64) -> ApiResult<SentEmail> {
            Ok(SentEmail {
                id: send_id,
                to: "hiring@example.com".to_string(),
                subject: "subject".to_string(),
                content: "content".to_string(),
                status: *self.next_status.lock().unwrap(),
                sent_at: Utc::now(),
                error_message: None,
            })
        }

        async fn list_sent(&self) -> ApiResult<Vec<SentEmail>> {
            Ok(Vec::new())
        }

        async fn delete_send(&self, _send_id: i64) -> ApiResult<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{MockEmailApi, MockFilesApi};
    use super::*;
    use std::sync::atomic::Ordering;

    fn store() -> (Arc<MockFilesApi>, Arc<MockEmailApi>, PipelineStore) {
        let files = Arc::new(MockFilesApi::new());
        let email = Arc::new(MockEmailApi::new());
        let store = PipelineStore::new(files.clone(), email.clone());
        (files, email, store)
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_any_network_call() {
        let (files, _, store) = store();
        let data = Bytes::from(vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize]);

        let err = store.record_upload("resume.pdf", data).await.unwrap_err();
        assert!(matches!(err, ApiError::TooLarge { .. }));
        assert_eq!(files.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_locally() {
        let (files, _, store) = store();

        let err = store
            .record_upload("resume.exe", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedType(_)));

        let err = store
            .record_upload("no-extension", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedType(_)));
        assert_eq!(files.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn accepted_upload_is_tracked_as_uploaded() {
        let (_, _, store) = store();

        let doc = store
            .record_upload("Resume.PDF", Bytes::from_static(b"content"))
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(store.documents().len(), 1);
    }

    #[tokio::test]
    async fn parse_trigger_is_guarded_by_document_state() {
        let (files, _, store) = store();
        let doc = store
            .record_upload("resume.pdf", Bytes::from_static(b"content"))
            .await
            .unwrap();

        store.trigger_parse(doc.id).await.unwrap();
        // Accepted trigger moves the document to processing optimistically.
        assert_eq!(
            store.document(doc.id).unwrap().status,
            DocumentStatus::Processing
        );

        // A second trigger is rejected locally without a network call.
        let err = store.trigger_parse(doc.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert_eq!(files.parse_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parse_trigger_on_unknown_document_is_not_found() {
        let (files, _, store) = store();
        let err = store.trigger_parse(42).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(files.parse_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn completion_attaches_extracted_data() {
        let (files, _, store) = store();
        let doc = store
            .record_upload("resume.pdf", Bytes::from_static(b"content"))
            .await
            .unwrap();
        store.trigger_parse(doc.id).await.unwrap();

        files.report(DocumentStatus::Completed);
        let refreshed = store.refresh_status(doc.id).await.unwrap();
        assert_eq!(refreshed.status, DocumentStatus::Completed);
        let extracted = refreshed.extracted.unwrap();
        assert_eq!(extracted.name.as_deref(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn externally_parsed_document_completes_without_skipping_processing() {
        let (files, _, store) = store();
        let doc = store
            .record_upload("resume.pdf", Bytes::from_static(b"content"))
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);

        // The parse finished between polls without this store triggering it.
        files.report(DocumentStatus::Completed);
        let refreshed = store.refresh_status(doc.id).await.unwrap();
        assert_eq!(refreshed.status, DocumentStatus::Completed);
        assert!(refreshed.extracted.is_some());
    }

    #[tokio::test]
    async fn extraction_failure_is_retried_on_the_next_poll() {
        let (files, _, store) = store();
        let doc = store
            .record_upload("resume.pdf", Bytes::from_static(b"content"))
            .await
            .unwrap();
        store.trigger_parse(doc.id).await.unwrap();

        files.report(DocumentStatus::Completed);
        files.fail_extracted.store(true, Ordering::SeqCst);
        let refreshed = store.refresh_status(doc.id).await.unwrap();
        assert_eq!(refreshed.status, DocumentStatus::Completed);
        assert!(refreshed.extracted.is_none());

        files.fail_extracted.store(false, Ordering::SeqCst);
        let refreshed = store.refresh_status(doc.id).await.unwrap();
        assert!(refreshed.extracted.is_some());
    }

    #[tokio::test]
    async fn backend_status_regressions_are_ignored() {
        let (files, _, store) = store();
        let doc = store
            .record_upload("resume.pdf", Bytes::from_static(b"content"))
            .await
            .unwrap();
        store.trigger_parse(doc.id).await.unwrap();
        files.report(DocumentStatus::Completed);
        store.refresh_status(doc.id).await.unwrap();

        files.report(DocumentStatus::Uploaded);
        let refreshed = store.refresh_status(doc.id).await.unwrap();
        assert_eq!(refreshed.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn local_entry_outlives_a_failed_remote_delete() {
        let (files, _, store) = store();
        let doc = store
            .record_upload("resume.pdf", Bytes::from_static(b"content"))
            .await
            .unwrap();

        files.fail_delete.store(true, Ordering::SeqCst);
        assert!(store.delete_document(doc.id).await.is_err());
        assert!(store.document(doc.id).is_some());

        files.fail_delete.store(false, Ordering::SeqCst);
        store.delete_document(doc.id).await.unwrap();
        assert!(store.document(doc.id).is_none());
    }

    #[tokio::test]
    async fn resend_creates_a_new_record_and_preserves_the_original() {
        let (_, email, store) = store();
        *email.next_status.lock().unwrap() = SendStatus::Failed;
        let failed = store
            .record_send(&OutgoingEmail {
                to: "hiring@example.com".to_string(),
                subject: "Application".to_string(),
                content: "Dear team".to_string(),
            })
            .await
            .unwrap();

        *email.next_status.lock().unwrap() = SendStatus::Pending;
        let resent = store.resend(failed.id).await.unwrap();

        assert_ne!(resent.id, failed.id);
        assert_eq!(resent.to, failed.to);
        assert_eq!(resent.subject, failed.subject);
        assert_eq!(resent.content, failed.content);
        assert_eq!(resent.status, SendStatus::Pending);

        let history = store.sent_emails();
        assert_eq!(history.len(), 2);
        let original = store.sent_email(failed.id).unwrap();
        assert_eq!(original.status, SendStatus::Failed);
    }

    #[tokio::test]
    async fn only_failed_sends_can_be_resent() {
        let (_, email, store) = store();
        *email.next_status.lock().unwrap() = SendStatus::Sent;
        let delivered = store
            .record_send(&OutgoingEmail {
                to: "hiring@example.com".to_string(),
                subject: "Application".to_string(),
                content: "Dear team".to_string(),
            })
            .await
            .unwrap();
        let sends_before = email.send_calls.load(Ordering::SeqCst);

        let err = store.resend(delivered.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert_eq!(email.send_calls.load(Ordering::SeqCst), sends_before);
    }

    #[tokio::test]
    async fn refresh_send_moves_pending_forward_only() {
        let (_, email, store) = store();
        let record = store
            .record_send(&OutgoingEmail {
                to: "hiring@example.com".to_string(),
                subject: "Application".to_string(),
                content: "Dear team".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(record.status, SendStatus::Pending);

        *email.next_status.lock().unwrap() = SendStatus::Sent;
        let refreshed = store.refresh_send(record.id).await.unwrap();
        assert_eq!(refreshed.status, SendStatus::Sent);

        // A later poll reporting pending again must not regress the record.
        *email.next_status.lock().unwrap() = SendStatus::Pending;
        let refreshed = store.refresh_send(record.id).await.unwrap();
        assert_eq!(refreshed.status, SendStatus::Sent);
    }
}

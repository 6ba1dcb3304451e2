//! services/client/src/lib.rs
//!
//! The client-side workflow engine: session lifecycle, document pipeline,
//! and compose orchestration over the remote API.

pub mod adapters;
pub mod composer;
pub mod config;
pub mod credential;
pub mod error;
pub mod pipeline;
pub mod session;

pub use composer::Composer;
pub use config::Config;
pub use credential::CredentialHandle;
pub use error::ClientError;
pub use pipeline::PipelineStore;
pub use session::{SessionManager, SessionState};

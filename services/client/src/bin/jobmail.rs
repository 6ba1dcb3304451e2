//! services/client/src/bin/jobmail.rs

use bytes::Bytes;
use clap::{Parser, Subcommand};
use client_lib::{
    adapters::{HttpBackend, TokenFileStore},
    composer::Composer,
    config::Config,
    credential::CredentialHandle,
    error::ClientError,
    pipeline::PipelineStore,
    session::SessionManager,
};
use jobmail_core::domain::{JobDetails, Registration};
use jobmail_core::ports::{AiApi, ApiError, AuthApi, EmailApi, FilesApi, TemplatesApi};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobmail", about = "Turn an uploaded document into a sent application email")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account (log in separately afterwards)
    Register {
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Log in and persist the credential
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Clear the local session (best-effort remote notification)
    Logout,
    /// Verify the persisted credential and show the session
    Status,
    /// Complete an OAuth redirect callback
    OauthCallback {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        error: Option<String>,
    },
    /// List linked mail accounts
    Accounts,
    /// Disconnect a linked mail account
    Disconnect { account_id: i64 },
    /// Upload a document (pdf, docx or txt, at most 10 MiB)
    Upload { path: PathBuf },
    /// Trigger parsing of an uploaded document
    Parse { document_id: i64 },
    /// List known documents
    Files,
    /// Poll a document until parsing reaches a terminal status
    Poll { document_id: i64 },
    /// Show the data extracted from a completed document
    Extracted { document_id: i64 },
    /// Delete a document
    DeleteFile { document_id: i64 },
    /// Generate an application email; optionally send it right away
    Generate {
        #[arg(long)]
        position: String,
        #[arg(long)]
        company: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        requirements: String,
        /// Use the extracted data of this completed document
        #[arg(long)]
        document: Option<i64>,
        /// Send the generated email to this address instead of printing it
        #[arg(long)]
        to: Option<String>,
    },
    /// Send an email with explicit fields
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        content_file: PathBuf,
    },
    /// Resend a failed email from history
    Resend { send_id: i64 },
    /// Show the send history
    History,
    /// Delete a send record
    DeleteSend { send_id: i64 },
    /// List available templates
    Templates,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- 2. Build the Credential Handle and Adapters ---
    let store = Arc::new(TokenFileStore::new(config.credential_path.clone()));
    let credential = CredentialHandle::new(store);
    let backend = Arc::new(
        HttpBackend::new(&config.api_base_url, config.request_timeout, credential.clone())
            .map_err(|e| ClientError::Internal(format!("failed to build HTTP client: {}", e)))?,
    );

    // --- 3. Wire the Managers ---
    let session = SessionManager::new(backend.clone() as Arc<dyn AuthApi>, credential);
    let pipeline = Arc::new(PipelineStore::new(
        backend.clone() as Arc<dyn FilesApi>,
        backend.clone() as Arc<dyn EmailApi>,
    ));
    let mut composer = Composer::new(backend.clone() as Arc<dyn AiApi>, pipeline.clone());

    match cli.command {
        Command::Register {
            email,
            name,
            password,
            confirm,
        } => {
            session
                .register(&Registration {
                    email: email.clone(),
                    name,
                    password,
                    password_confirmation: confirm,
                })
                .await?;
            println!("Registered {}. Log in with `jobmail login`.", email);
        }
        Command::Login { email, password } => {
            let active = session.login(&email, &password).await?;
            println!("Logged in as {}", active.user.email);
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out.");
        }
        Command::Status => match session.check_status().await {
            Some(active) => {
                println!("Authenticated as {}", active.user.email);
                for account in &active.linked_accounts {
                    println!("  linked: {} ({})", account.email, account.provider);
                }
            }
            None => println!("Not authenticated."),
        },
        Command::OauthCallback { token, error } => {
            let active = session.complete_oauth_callback(token, error).await?;
            println!("Connected. Authenticated as {}", active.user.email);
        }
        Command::Accounts => {
            session
                .check_status()
                .await
                .ok_or(ApiError::SessionExpired)?;
            for account in session.linked_accounts() {
                println!("{}  {}  {}", account.id, account.provider, account.email);
            }
        }
        Command::Disconnect { account_id } => {
            session.disconnect_account(account_id).await?;
            println!("Disconnected account {}.", account_id);
        }
        Command::Upload { path } => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ClientError::Internal("invalid file name".to_string()))?
                .to_string();
            let data = Bytes::from(tokio::fs::read(&path).await?);
            let document = pipeline.record_upload(&filename, data).await?;
            println!(
                "Uploaded {} as document {} ({} bytes).",
                document.filename, document.id, document.size
            );
        }
        Command::Parse { document_id } => {
            pipeline.sync_documents().await?;
            pipeline.trigger_parse(document_id).await?;
            println!("Parsing started for document {}.", document_id);
        }
        Command::Files => {
            for doc in pipeline.sync_documents().await? {
                println!("{}  {}  {}  {} bytes", doc.id, doc.status, doc.filename, doc.size);
            }
        }
        Command::Poll { document_id } => {
            pipeline.sync_documents().await?;
            loop {
                let doc = pipeline.refresh_status(document_id).await?;
                println!("document {} is {}", document_id, doc.status);
                if doc.status.is_terminal() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }
        Command::Extracted { document_id } => {
            pipeline.sync_documents().await?;
            let doc = pipeline.refresh_status(document_id).await?;
            match doc.extracted {
                Some(extracted) => {
                    println!("name:   {}", extracted.name.as_deref().unwrap_or("-"));
                    println!("email:  {}", extracted.email.as_deref().unwrap_or("-"));
                    println!("phone:  {}", extracted.phone.as_deref().unwrap_or("-"));
                    println!("skills: {}", extracted.skills.join(", "));
                }
                None => println!("No extracted data yet (document is {}).", doc.status),
            }
        }
        Command::DeleteFile { document_id } => {
            pipeline.sync_documents().await?;
            pipeline.delete_document(document_id).await?;
            println!("Deleted document {}.", document_id);
        }
        Command::Generate {
            position,
            company,
            description,
            requirements,
            document,
            to,
        } => {
            pipeline.sync_documents().await?;
            if let Some(id) = document {
                pipeline.refresh_status(id).await?;
            }
            composer.enter_details(document)?;
            composer.set_job_details(JobDetails {
                position,
                company,
                description,
                requirements,
            });
            composer.enter_generate()?;
            let content = composer.generate_email().await?;
            let subject = composer.email().subject.clone();

            match to {
                Some(to) => {
                    let record = composer.send_email(&to, &subject, &content).await?;
                    println!("Sent to {} (send {}).", record.to, record.id);
                }
                None => {
                    println!("Subject: {}\n\n{}", subject, content);
                }
            }
        }
        Command::Send {
            to,
            subject,
            content_file,
        } => {
            let content = tokio::fs::read_to_string(&content_file).await?;
            if to.trim().is_empty() || subject.trim().is_empty() || content.trim().is_empty() {
                return Err(ApiError::Validation(
                    "recipient, subject and content are all required".to_string(),
                )
                .into());
            }
            let record = pipeline
                .record_send(&jobmail_core::domain::OutgoingEmail {
                    to,
                    subject,
                    content,
                })
                .await?;
            println!("Send {} is {}.", record.id, record.status);
        }
        Command::Resend { send_id } => {
            pipeline.sync_sent().await?;
            let record = composer.resend(send_id).await?;
            println!("Resent as send {} ({}).", record.id, record.status);
        }
        Command::History => {
            for record in pipeline.sync_sent().await? {
                println!(
                    "{}  {}  {}  {}  {}",
                    record.id,
                    record.status,
                    record.sent_at.format("%Y-%m-%d %H:%M"),
                    record.to,
                    record.subject
                );
            }
        }
        Command::DeleteSend { send_id } => {
            pipeline.sync_sent().await?;
            pipeline.delete_send(send_id).await?;
            println!("Deleted send {}.", send_id);
        }
        Command::Templates => {
            let templates = backend.clone() as Arc<dyn TemplatesApi>;
            for template in templates.list().await? {
                println!("{}  {}", template.id, template.name);
            }
            info!("Built-in templates are available via the backend as well");
            for template in templates.list_builtin().await? {
                println!("{}  {} (builtin)", template.id, template.name);
            }
        }
    }

    Ok(())
}

//! Mock upstream collaborators: authentication, file storage, and the AI
//! assistant.
//!
//! Every call sleeps for its configured latency and then answers from
//! fixed data. With [`UpstreamConfig::simulate_failure`] set, every call
//! fails with [`OperationError::Simulated`] after the same delay.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OperationError;
use crate::slices::auth::{Session, User};
use crate::slices::chat::ChatMessage;
use crate::slices::documents::{Document, FileUpload};

/// The only credentials [`MockUpstream::authenticate`] accepts.
pub const DEMO_EMAIL: &str = "user@example.com";
pub const DEMO_PASSWORD: &str = "password";
const DEMO_TOKEN: &str = "mock-jwt-token-12345";

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types accepted by [`MockUpstream::store_file`].
pub const ALLOWED_MIME_TYPES: [&str; 9] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/jpeg",
    "image/png",
    "image/gif",
    "text/plain",
];

const DOCUMENT_CONTENT: &str = "This is a mock document content for the AI assistant.";

const REPLIES: [&str; 5] = [
    "Based on the document you provided, I can help you analyze the content. What specific aspect would you like me to focus on?",
    "I've reviewed your document. Here are the key points I extracted...",
    "This document appears to be well-structured. Would you like me to summarize it for you?",
    "I notice some important patterns in your document. Let me help you understand them better.",
    "As your Naija AI Assistant, I'm ready to help you work with this document. What would you like to know?",
];

/// Simulated latency per call, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Latency {
    pub login_ms: u64,
    pub refresh_ms: u64,
    pub upload_ms: u64,
    pub chat_ms: u64,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            login_ms: 1000,
            refresh_ms: 500,
            upload_ms: 1500,
            chat_ms: 2000,
        }
    }
}

impl Latency {
    /// The same delay for every call.
    pub fn uniform(ms: u64) -> Self {
        Self {
            login_ms: ms,
            refresh_ms: ms,
            upload_ms: ms,
            chat_ms: ms,
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::uniform(0)
    }
}

/// Configuration for [`MockUpstream`].
///
/// Deserializable so that it can live in an application config file:
///
/// ```
/// use statefold::UpstreamConfig;
///
/// let config: UpstreamConfig =
///     serde_json::from_str(r#"{"latency": {"chat_ms": 10}}"#).unwrap();
/// assert_eq!(config.latency.chat_ms, 10);
/// assert_eq!(config.latency.login_ms, 1000);
/// assert!(!config.simulate_failure);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub latency: Latency,
    /// Fail every call with [`OperationError::Simulated`].
    pub simulate_failure: bool,
}

/// Stand-in for the real backends.
#[derive(Debug, Clone, Default)]
pub struct MockUpstream {
    config: UpstreamConfig,
}

impl MockUpstream {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    async fn delay(&self, ms: u64, call: &'static str) -> Result<(), OperationError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        if self.config.simulate_failure {
            tracing::debug!(call, "simulated upstream failure");
            return Err(OperationError::Simulated(format!("{call} failed")));
        }
        Ok(())
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] ("Invalid credentials") for anything
    /// other than the demo account.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, OperationError> {
        self.delay(self.config.latency.login_ms, "authenticate").await?;
        if email != DEMO_EMAIL || password != DEMO_PASSWORD {
            return Err(OperationError::invalid("Invalid credentials"));
        }
        Ok(Session {
            user: User {
                id: "1".to_owned(),
                name: "Naija User".to_owned(),
                email: email.to_owned(),
                avatar: "🇳🇬".to_owned(),
            },
            token: DEMO_TOKEN.to_owned(),
        })
    }

    /// Exchange a token for a fresh one.
    pub async fn refresh_token(&self, token: &str) -> Result<String, OperationError> {
        self.delay(self.config.latency.refresh_ms, "refresh_token").await?;
        Ok(format!("refreshed-{token}"))
    }

    /// Validate and store an uploaded file.
    ///
    /// Validation happens before the simulated delay.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for files over 10 MB or with a MIME
    /// type outside [`ALLOWED_MIME_TYPES`].
    pub async fn store_file(&self, file: &FileUpload) -> Result<Document, OperationError> {
        if file.size > MAX_UPLOAD_BYTES {
            return Err(OperationError::invalid("File size must be less than 10MB"));
        }
        if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
            return Err(OperationError::invalid(
                "Please upload PDF, Word, Excel, Image, or Text files only",
            ));
        }

        self.delay(self.config.latency.upload_ms, "store_file").await?;

        let kind = file
            .mime_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or("document");
        Ok(Document {
            id: Uuid::new_v4().to_string(),
            name: file.name.clone(),
            size: file.size,
            kind: kind.to_owned(),
            uploaded_at: Utc::now(),
            content: DOCUMENT_CONTENT.to_owned(),
        })
    }

    /// Produce an assistant reply, annotated with the document under
    /// discussion when there is one.
    pub async fn answer_query(
        &self,
        message: &str,
        document: Option<&Document>,
    ) -> Result<ChatMessage, OperationError> {
        self.delay(self.config.latency.chat_ms, "answer_query").await?;
        tracing::trace!(chars = message.len(), "answering query");

        let reply = REPLIES[rand::thread_rng().gen_range(0..REPLIES.len())];
        let content = match document {
            Some(doc) => format!(
                "{reply} I'm analyzing \"{}\" - a {} file.",
                doc.name,
                doc.kind.to_uppercase()
            ),
            None => reply.to_owned(),
        };
        Ok(ChatMessage::assistant(content))
    }
}

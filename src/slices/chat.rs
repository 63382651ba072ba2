//! Chat slice -- append-only message history and the AI query lifecycle.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::error::{OperationError, StoreError};
use crate::operation::{AsyncOperation, TaskHandle};
use crate::slice::Slice;
use crate::state::StateTree;
use crate::store::Store;

/// Content of the synthetic message appended when a query fails.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A single chat entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    fn new(content: impl Into<String>, is_ai: bool, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            timestamp: Utc::now(),
            is_ai,
            is_error,
        }
    }

    /// A message typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, false, false)
    }

    /// A reply from the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, true, false)
    }

    /// The error entry shown in the history when a query fails.
    pub fn apology() -> Self {
        Self::new(APOLOGY, true, true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub is_agent_typing: bool,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Actions accepted by the [`ChatState`] slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatAction {
    AddMessage(ChatMessage),
    QueryPending,
    QueryFulfilled(ChatMessage),
    /// The query failed: record the reason and append `apology`.
    QueryRejected {
        reason: String,
        apology: ChatMessage,
    },
    Clear,
}

impl ChatAction {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::AddMessage(_) => "addMessage",
            Self::QueryPending => "sendQuery/pending",
            Self::QueryFulfilled(_) => "sendQuery/fulfilled",
            Self::QueryRejected { .. } => "sendQuery/rejected",
            Self::Clear => "clearChat",
        }
    }
}

// ---------------------------------------------------------------------------
// Slice impl
// ---------------------------------------------------------------------------

impl Slice for ChatState {
    const NAME: &'static str = "chat";
    type Action = ChatAction;

    fn route(action: &Action) -> Option<&ChatAction> {
        match action {
            Action::Chat(a) => Some(a),
            _ => None,
        }
    }

    fn apply(mut self, action: &ChatAction) -> Self {
        match action {
            ChatAction::AddMessage(message) => self.messages.push(message.clone()),
            ChatAction::QueryPending => {
                self.is_agent_typing = true;
                self.error = None;
            }
            ChatAction::QueryFulfilled(reply) => {
                self.is_agent_typing = false;
                self.messages.push(reply.clone());
            }
            ChatAction::QueryRejected { reason, apology } => {
                self.is_agent_typing = false;
                self.error = Some(reason.clone());
                self.messages.push(apology.clone());
            }
            ChatAction::Clear => {
                self.messages.clear();
                self.error = None;
            }
        }
        self
    }

    fn get(tree: &StateTree) -> &Arc<Self> {
        &tree.chat
    }

    fn get_mut(tree: &mut StateTree) -> &mut Arc<Self> {
        &mut tree.chat
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Ask the assistant a question, optionally about a specific document.
///
/// When `document_id` is `None` the document currently selected in the
/// `documents` slice (if any) is used for the reply annotation.
#[derive(Debug, Clone)]
pub struct SendQuery {
    pub message: String,
    pub document_id: Option<String>,
}

impl SendQuery {
    /// Build a query, rejecting blank messages.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] if `message` is empty or whitespace.
    pub fn new(
        message: impl Into<String>,
        document_id: Option<String>,
    ) -> Result<Self, OperationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(OperationError::invalid("Message cannot be empty"));
        }
        Ok(Self {
            message,
            document_id,
        })
    }
}

impl AsyncOperation for SendQuery {
    type Output = ChatMessage;
    const NAME: &'static str = "chat/sendQuery";

    fn requested(&self) -> Action {
        ChatAction::QueryPending.into()
    }

    fn run(self, store: Store) -> impl Future<Output = Result<ChatMessage, OperationError>> + Send {
        async move {
            let document = {
                let state = store.state();
                match &self.document_id {
                    Some(id) => state.documents.find(id).cloned(),
                    None => state.documents.selected().cloned(),
                }
            };
            store
                .upstream()
                .answer_query(&self.message, document.as_ref())
                .await
        }
    }

    fn succeeded(reply: &ChatMessage) -> Action {
        ChatAction::QueryFulfilled(reply.clone()).into()
    }

    fn failed(error: &OperationError) -> Action {
        ChatAction::QueryRejected {
            reason: error.reason().to_owned(),
            apology: ChatMessage::apology(),
        }
        .into()
    }
}

/// Submit user input the way the chat box does: append the user's
/// message, then query the assistant about the selected document.
///
/// Returns `Ok(None)` without touching state when the input is blank or
/// the assistant is still answering a previous query.
///
/// # Errors
///
/// [`StoreError::StoreGone`] if the store actor has exited.
pub async fn submit(
    store: &Store,
    input: &str,
) -> Result<Option<TaskHandle<ChatMessage>>, StoreError> {
    let state = store.state();
    if state.chat.is_agent_typing {
        tracing::debug!("assistant busy, input ignored");
        return Ok(None);
    }
    let Ok(query) = SendQuery::new(input, state.documents.selected_id.clone()) else {
        return Ok(None);
    };

    store
        .dispatch(ChatAction::AddMessage(ChatMessage::user(input)))
        .await?;
    store.run(query).await.map(Some)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Documents slice -- uploaded files, the current selection, and the
//! upload lifecycle.
//!
//! Selection is an id pointer into `documents`, never an owned copy, so a
//! deleted document can not linger as "selected".

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::OperationError;
use crate::operation::AsyncOperation;
use crate::slice::Slice;
use crate::slices::ui::{Notification, NotificationKind, UiAction};
use crate::state::StateTree;
use crate::store::Store;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME subtype of the uploaded file (e.g. `"pdf"`, `"png"`).
    #[serde(rename = "type")]
    pub kind: String,
    pub uploaded_at: DateTime<Utc>,
    pub content: String,
}

/// Documents state. Newest uploads come first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsState {
    pub documents: Vec<Document>,
    pub selected_id: Option<String>,
    pub is_uploading: bool,
    pub error: Option<String>,
}

impl DocumentsState {
    /// Resolve the selection pointer.
    pub fn selected(&self) -> Option<&Document> {
        let id = self.selected_id.as_deref()?;
        self.find(id)
    }

    /// Look up a document by id.
    pub fn find(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Actions accepted by the [`DocumentsState`] slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DocumentsAction {
    UploadPending,
    /// Upload finished; the document is inserted at the front.
    UploadFulfilled(Document),
    UploadRejected(String),
    /// Remove a document by id. Missing ids are ignored.
    Delete(String),
    /// Point the selection at a document, or clear it with `None`.
    /// An id with no matching document clears the selection.
    Select(Option<String>),
    Clear,
}

impl DocumentsAction {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::UploadPending => "upload/pending",
            Self::UploadFulfilled(_) => "upload/fulfilled",
            Self::UploadRejected(_) => "upload/rejected",
            Self::Delete(_) => "deleteDocument",
            Self::Select(_) => "selectDocument",
            Self::Clear => "clearDocuments",
        }
    }
}

// ---------------------------------------------------------------------------
// Slice impl
// ---------------------------------------------------------------------------

impl Slice for DocumentsState {
    const NAME: &'static str = "documents";
    type Action = DocumentsAction;

    fn route(action: &Action) -> Option<&DocumentsAction> {
        match action {
            Action::Documents(a) => Some(a),
            _ => None,
        }
    }

    fn apply(mut self, action: &DocumentsAction) -> Self {
        match action {
            DocumentsAction::UploadPending => {
                self.is_uploading = true;
                self.error = None;
            }
            DocumentsAction::UploadFulfilled(document) => {
                self.is_uploading = false;
                self.documents.insert(0, document.clone());
            }
            DocumentsAction::UploadRejected(reason) => {
                self.is_uploading = false;
                self.error = Some(reason.clone());
            }
            DocumentsAction::Delete(id) => {
                self.documents.retain(|d| &d.id != id);
                if self.selected_id.as_ref() == Some(id) {
                    self.selected_id = None;
                }
            }
            DocumentsAction::Select(id) => {
                self.selected_id = id
                    .as_deref()
                    .and_then(|id| self.find(id))
                    .map(|d| d.id.clone());
            }
            DocumentsAction::Clear => {
                self.documents.clear();
                self.selected_id = None;
            }
        }
        self
    }

    fn get(tree: &StateTree) -> &Arc<Self> {
        &tree.documents
    }

    fn get_mut(tree: &mut StateTree) -> &mut Arc<Self> {
        &mut tree.documents
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// A file handed over by the presentation layer for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

/// Upload a file and add it to the document list.
///
/// Success and failure both post a notification to the `ui` slice before
/// the terminal transition is applied.
#[derive(Debug, Clone)]
pub struct UploadDocument {
    pub file: FileUpload,
}

impl UploadDocument {
    pub fn new(file: FileUpload) -> Self {
        Self { file }
    }
}

impl AsyncOperation for UploadDocument {
    type Output = Document;
    const NAME: &'static str = "documents/upload";

    fn requested(&self) -> Action {
        DocumentsAction::UploadPending.into()
    }

    fn run(self, store: Store) -> impl Future<Output = Result<Document, OperationError>> + Send {
        async move {
            let result = store.upstream().store_file(&self.file).await;

            let notification = match &result {
                Ok(_) => Notification::new(
                    NotificationKind::Success,
                    format!("Document \"{}\" uploaded successfully!", self.file.name),
                ),
                Err(_) => Notification::new(
                    NotificationKind::Error,
                    format!("Failed to upload \"{}\"", self.file.name),
                ),
            };
            if let Err(e) = store.dispatch(UiAction::AddNotification(notification)).await {
                tracing::warn!(error = %e, file = %self.file.name, "upload notification dropped");
            }

            result
        }
    }

    fn succeeded(document: &Document) -> Action {
        DocumentsAction::UploadFulfilled(document.clone()).into()
    }

    fn failed(error: &OperationError) -> Action {
        DocumentsAction::UploadRejected(error.reason().to_owned()).into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn doc(id: &str) -> Document {
        Document {
            id: id.into(),
            name: format!("{id}.pdf"),
            size: 1024,
            kind: "pdf".into(),
            uploaded_at: Utc::now(),
            content: "body".into(),
        }
    }

    fn with_docs(ids: &[&str]) -> DocumentsState {
        ids.iter().fold(DocumentsState::default(), |s, id| {
            s.apply(&DocumentsAction::UploadFulfilled(doc(id)))
        })
    }

    #[test]
    fn upload_inserts_newest_first() {
        let s = with_docs(&["a", "b"]);
        let ids: Vec<_> = s.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn upload_lifecycle_clears_flag() {
        let s = DocumentsState::default().apply(&DocumentsAction::UploadPending);
        assert!(s.is_uploading);
        let s = s.apply(&DocumentsAction::UploadRejected("too big".into()));
        assert!(!s.is_uploading);
        assert_eq!(s.error.as_deref(), Some("too big"));
        let s = s.apply(&DocumentsAction::UploadPending);
        assert_eq!(s.error, None);
    }

    #[test]
    fn select_existing_document() {
        let s = with_docs(&["a", "b"]).apply(&DocumentsAction::Select(Some("a".into())));
        assert_eq!(s.selected().map(|d| d.id.as_str()), Some("a"));
    }

    #[test]
    fn select_missing_id_clears_selection() {
        let s = with_docs(&["a"])
            .apply(&DocumentsAction::Select(Some("a".into())))
            .apply(&DocumentsAction::Select(Some("ghost".into())));
        assert_eq!(s.selected_id, None);
    }

    #[test]
    fn select_none_clears_selection() {
        let s = with_docs(&["a"])
            .apply(&DocumentsAction::Select(Some("a".into())))
            .apply(&DocumentsAction::Select(None));
        assert_eq!(s.selected_id, None);
    }

    #[test]
    fn deleting_selected_clears_selection() {
        let s = with_docs(&["a", "b"])
            .apply(&DocumentsAction::Select(Some("a".into())))
            .apply(&DocumentsAction::Delete("a".into()));
        assert_eq!(s.selected_id, None);
        assert_eq!(s.documents.len(), 1);
    }

    #[test]
    fn deleting_other_keeps_selection() {
        let s = with_docs(&["a", "b"])
            .apply(&DocumentsAction::Select(Some("a".into())))
            .apply(&DocumentsAction::Delete("b".into()));
        assert_eq!(s.selected_id.as_deref(), Some("a"));
        assert_eq!(s.documents.len(), 1);
    }

    #[test]
    fn delete_missing_id_is_noop() {
        let before = with_docs(&["a"]);
        let after = before.clone().apply(&DocumentsAction::Delete("ghost".into()));
        assert_eq!(before, after);
    }

    #[test]
    fn clear_drops_documents_and_selection() {
        let s = with_docs(&["a"])
            .apply(&DocumentsAction::Select(Some("a".into())))
            .apply(&DocumentsAction::Clear);
        assert!(s.documents.is_empty());
        assert_eq!(s.selected_id, None);
    }

    #[test]
    fn document_serializes_type_field() {
        let json = serde_json::to_value(doc("a")).expect("serialize");
        assert_eq!(json["type"], "pdf");
        assert!(json.get("uploadedAt").is_some());
    }
}

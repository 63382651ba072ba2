//! Root action type and routing helpers.

use serde::{Deserialize, Serialize};

use crate::slices::auth::AuthAction;
use crate::slices::chat::ChatAction;
use crate::slices::documents::DocumentsAction;
use crate::slices::expenses::ExpenseAction;
use crate::slices::ui::UiAction;

/// An intended state transition, addressed to one slice.
///
/// Each variant wraps the closed action enum of the slice that owns it,
/// so a slice can only ever receive actions it declares. Serialized as
/// `{"slice": "<name>", "action": {"type": "<Kind>", "data": ...}}`.
///
/// # Examples
///
/// ```
/// use statefold::Action;
/// use statefold::slices::ui::UiAction;
///
/// let action: Action = UiAction::ToggleSidebar.into();
/// assert_eq!(action.name(), "ui/toggleSidebar");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slice", content = "action", rename_all = "camelCase")]
pub enum Action {
    Auth(AuthAction),
    Documents(DocumentsAction),
    Chat(ChatAction),
    Ui(UiAction),
    Expenses(ExpenseAction),
}

impl Action {
    /// Stable `"<slice>/<kind>"` name used in log fields.
    pub fn name(&self) -> String {
        let (slice, kind) = match self {
            Self::Auth(a) => ("auth", a.kind()),
            Self::Documents(a) => ("documents", a.kind()),
            Self::Chat(a) => ("chat", a.kind()),
            Self::Ui(a) => ("ui", a.kind()),
            Self::Expenses(a) => ("expenses", a.kind()),
        };
        format!("{slice}/{kind}")
    }
}

impl From<AuthAction> for Action {
    fn from(action: AuthAction) -> Self {
        Self::Auth(action)
    }
}

impl From<DocumentsAction> for Action {
    fn from(action: DocumentsAction) -> Self {
        Self::Documents(action)
    }
}

impl From<ChatAction> for Action {
    fn from(action: ChatAction) -> Self {
        Self::Chat(action)
    }
}

impl From<UiAction> for Action {
    fn from(action: UiAction) -> Self {
        Self::Ui(action)
    }
}

impl From<ExpenseAction> for Action {
    fn from(action: ExpenseAction) -> Self {
        Self::Expenses(action)
    }
}

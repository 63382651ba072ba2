//! The root state tree composed from every slice.

use std::sync::Arc;

use serde::Serialize;

use crate::action::Action;
use crate::slice::{Slice, reduce};
use crate::slices::auth::AuthState;
use crate::slices::chat::ChatState;
use crate::slices::documents::DocumentsState;
use crate::slices::expenses::ExpenseState;
use crate::slices::ui::UiState;

/// The single source of truth: one `Arc` per slice.
///
/// Cloning a tree is cheap (five `Arc` clones). A slice's `Arc` is
/// replaced exactly when that slice's value changes, which is what the
/// selector layer keys its caches on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateTree {
    pub auth: Arc<AuthState>,
    pub documents: Arc<DocumentsState>,
    pub chat: Arc<ChatState>,
    pub ui: Arc<UiState>,
    pub expenses: Arc<ExpenseState>,
}

impl StateTree {
    /// Offer `action` to every slice and return the names of the slices
    /// that changed.
    pub(crate) fn reduce(&mut self, action: &Action) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if reduce::<AuthState>(self, action) {
            changed.push(AuthState::NAME);
        }
        if reduce::<DocumentsState>(self, action) {
            changed.push(DocumentsState::NAME);
        }
        if reduce::<ChatState>(self, action) {
            changed.push(ChatState::NAME);
        }
        if reduce::<UiState>(self, action) {
            changed.push(UiState::NAME);
        }
        if reduce::<ExpenseState>(self, action) {
            changed.push(ExpenseState::NAME);
        }
        changed
    }
}

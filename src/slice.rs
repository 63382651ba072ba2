//! Slice trait and the generic reduce step used by the root store.

use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;

use crate::action::Action;
use crate::state::StateTree;

/// A named partition of the state tree whose value changes only through
/// its own transition function.
///
/// The implementing type itself serves as the slice state.
///
/// # Associated Items
///
/// - `NAME`: the slice name (e.g. `"auth"`). Used as the persistence key
///   and in log fields.
/// - `Action`: the closed set of actions this slice recognizes.
///
/// # Contract
///
/// - [`apply`](Slice::apply) must be a pure, total function. It takes
///   ownership of the current state and a reference to an action and
///   returns the next state. Anything impure an action needs (ids,
///   timestamps, "today") is captured when the action value is built.
/// - [`route`](Slice::route) returns `Some` only for root actions this
///   slice handles. Everything else leaves the slice untouched.
pub trait Slice: Default + Clone + PartialEq + Debug + Serialize + Send + Sync + 'static {
    /// Identifies this slice (e.g. `"documents"`).
    const NAME: &'static str;

    /// The set of actions this slice can apply.
    type Action: Debug + Clone + Send + Sync + 'static;

    /// Extract this slice's action from a root action, if it is one.
    fn route(action: &Action) -> Option<&Self::Action>;

    /// Apply a single action to produce the next state.
    fn apply(self, action: &Self::Action) -> Self;

    /// Borrow this slice out of the state tree.
    fn get(tree: &StateTree) -> &Arc<Self>;

    /// Mutably borrow this slice's slot in the state tree.
    fn get_mut(tree: &mut StateTree) -> &mut Arc<Self>;
}

/// Route `action` to slice `S` and replace its slot if the value changed.
///
/// Returns `true` when the slice received a new `Arc`. A transition that
/// produces a value equal to the current one keeps the existing `Arc`, so
/// identity-keyed selectors do not recompute.
pub(crate) fn reduce<S: Slice>(tree: &mut StateTree, action: &Action) -> bool {
    let Some(slice_action) = S::route(action) else {
        return false;
    };

    let current = S::get(tree);
    let next = current.as_ref().clone().apply(slice_action);
    if next == **current {
        return false;
    }

    *S::get_mut(tree) = Arc::new(next);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slices::auth::{AuthAction, AuthState};
    use crate::slices::ui::{Theme, UiAction, UiState};

    #[test]
    fn unrouted_action_leaves_slice_identity() {
        let mut tree = StateTree::default();
        let before = Arc::clone(&tree.auth);

        let changed = reduce::<AuthState>(&mut tree, &UiAction::ToggleSidebar.into());

        assert!(!changed);
        assert!(Arc::ptr_eq(&before, &tree.auth));
    }

    #[test]
    fn routed_action_replaces_slice() {
        let mut tree = StateTree::default();
        let before = Arc::clone(&tree.ui);

        let changed = reduce::<UiState>(&mut tree, &UiAction::SetTheme(Theme::Dark).into());

        assert!(changed);
        assert!(!Arc::ptr_eq(&before, &tree.ui));
        assert_eq!(tree.ui.theme, Theme::Dark);
    }

    #[test]
    fn equal_result_keeps_identity() {
        let mut tree = StateTree::default();
        let before = Arc::clone(&tree.auth);

        // Clearing an error that is already clear is a no-op.
        let changed = reduce::<AuthState>(&mut tree, &AuthAction::ClearError.into());

        assert!(!changed);
        assert!(Arc::ptr_eq(&before, &tree.auth));
    }
}

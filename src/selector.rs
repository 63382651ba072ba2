//! Memoized selectors: derived read models over slice snapshots.
//!
//! A [`Selector`] caches its last input slice `Arc` next to the computed
//! value. While the store keeps handing out the same slice `Arc` (which it
//! does for every dispatch that leaves the slice unchanged), the selector
//! returns the cached value without recomputing, and the returned `Arc` is
//! the same one as before so consumers can compare with [`Arc::ptr_eq`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;

use crate::slice::Slice;
use crate::slices::documents::{Document, DocumentsState};
use crate::slices::expenses::ExpenseState;
use crate::state::StateTree;

/// A pure derivation from one slice, memoized on the slice's identity.
pub struct Selector<S: Slice, T> {
    name: &'static str,
    compute: fn(&S) -> T,
    /// Last input and the value computed from it. Holding the input `Arc`
    /// keeps its address from being reused by a different slice value.
    cache: Mutex<Option<(Arc<S>, Arc<T>)>>,
    recomputations: AtomicUsize,
}

impl<S: Slice, T> Selector<S, T> {
    pub fn new(name: &'static str, compute: fn(&S) -> T) -> Self {
        Self {
            name,
            compute,
            cache: Mutex::new(None),
            recomputations: AtomicUsize::new(0),
        }
    }

    /// Derive the value from the tree's copy of slice `S`.
    pub fn select(&self, tree: &StateTree) -> Arc<T> {
        self.select_slice(S::get(tree))
    }

    /// Derive the value from a slice snapshot.
    pub fn select_slice(&self, slice: &Arc<S>) -> Arc<T> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((input, value)) = cache.as_ref()
            && Arc::ptr_eq(input, slice)
        {
            return Arc::clone(value);
        }

        let value = Arc::new((self.compute)(slice));
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(selector = self.name, slice = S::NAME, "recomputed");
        *cache = Some((Arc::clone(slice), Arc::clone(&value)));
        value
    }

    /// How many times the derivation has actually run.
    pub fn recomputations(&self) -> usize {
        self.recomputations.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S: Slice, T> std::fmt::Debug for Selector<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.name)
            .field("slice", &S::NAME)
            .field("recomputations", &self.recomputations())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

/// Sum of every expense amount.
///
/// Saturates at `Decimal::MAX` rather than panicking. Rehydrated expenses
/// are not re-validated.
pub fn total_spent(state: &ExpenseState) -> Decimal {
    state
        .expenses
        .iter()
        .fold(Decimal::ZERO, |total, e| total.saturating_add(e.amount))
}

/// `total_budget - total_spent`. Negative when over budget.
pub fn remaining_budget(state: &ExpenseState) -> Decimal {
    state.total_budget.saturating_sub(total_spent(state))
}

/// Amount spent per category. Categories with no expenses are absent.
pub fn expenses_by_category(state: &ExpenseState) -> BTreeMap<String, Decimal> {
    let mut categories = BTreeMap::new();
    for expense in &state.expenses {
        let sum = categories
            .entry(expense.category.clone())
            .or_insert(Decimal::ZERO);
        *sum = sum.saturating_add(expense.amount);
    }
    categories
}

/// The document the selection pointer refers to.
pub fn selected_document(state: &DocumentsState) -> Option<Document> {
    state.selected().cloned()
}

/// The standard selector set, one cache per consumer.
///
/// Create one per view (or share one behind an `Arc`); each keeps its own
/// memo so independent consumers never evict each other's cache.
#[derive(Debug)]
pub struct Selectors {
    pub total_spent: Selector<ExpenseState, Decimal>,
    pub remaining_budget: Selector<ExpenseState, Decimal>,
    pub expenses_by_category: Selector<ExpenseState, BTreeMap<String, Decimal>>,
    pub selected_document: Selector<DocumentsState, Option<Document>>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            total_spent: Selector::new("totalSpent", total_spent),
            remaining_budget: Selector::new("remainingBudget", remaining_budget),
            expenses_by_category: Selector::new("expensesByCategory", expenses_by_category),
            selected_document: Selector::new("selectedDocument", selected_document),
        }
    }
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slices::expenses::{ExpenseAction, ExpenseDraft};

    fn add(tree: &mut StateTree, amount: i64, category: &str) -> String {
        let action = ExpenseAction::add(ExpenseDraft::new("item", Decimal::from(amount), category))
            .expect("valid draft");
        let id = match &action {
            ExpenseAction::Add(e) => e.id.clone(),
            _ => unreachable!(),
        };
        tree.reduce(&action.into());
        id
    }

    #[test]
    fn empty_slice_totals() {
        let tree = StateTree::default();
        let selectors = Selectors::new();
        assert_eq!(*selectors.total_spent.select(&tree), Decimal::ZERO);
        assert_eq!(*selectors.remaining_budget.select(&tree), Decimal::from(500_000));
        assert!(selectors.expenses_by_category.select(&tree).is_empty());
    }

    #[test]
    fn remaining_budget_goes_negative() {
        let mut tree = StateTree::default();
        tree.reduce(&ExpenseAction::set_budget(Decimal::from(100)).expect("valid").into());
        add(&mut tree, 150, "Other");
        assert_eq!(remaining_budget(&tree.expenses), Decimal::from(-50));
    }

    #[test]
    fn huge_amounts_saturate_instead_of_panicking() {
        use crate::slices::expenses::Expense;

        let huge = |id: &str| Expense {
            id: id.into(),
            description: "restored".into(),
            amount: Decimal::MAX,
            category: "Other".into(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        };
        // Persisted data is merged without validation.
        let state = ExpenseState {
            expenses: vec![huge("a"), huge("b")],
            ..ExpenseState::default()
        };

        assert_eq!(total_spent(&state), Decimal::MAX);
        assert_eq!(remaining_budget(&state), Decimal::from(500_000) - Decimal::MAX);
        assert_eq!(expenses_by_category(&state)["Other"], Decimal::MAX);
    }

    #[test]
    fn by_category_omits_absent_categories() {
        let mut tree = StateTree::default();
        add(&mut tree, 10, "Housing");
        add(&mut tree, 5, "Housing");
        add(&mut tree, 7, "Utilities");
        let categories = expenses_by_category(&tree.expenses);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories["Housing"], Decimal::from(15));
        assert_eq!(categories["Utilities"], Decimal::from(7));
        assert!(!categories.contains_key("Other"));
    }

    #[test]
    fn unchanged_input_returns_same_arc_without_recompute() {
        let mut tree = StateTree::default();
        add(&mut tree, 10, "Housing");
        let selectors = Selectors::new();

        let first = selectors.total_spent.select(&tree);
        let second = selectors.total_spent.select(&tree);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(selectors.total_spent.recomputations(), 1);
    }

    #[test]
    fn unrelated_slice_change_does_not_recompute() {
        let mut tree = StateTree::default();
        add(&mut tree, 10, "Housing");
        let selectors = Selectors::new();
        let first = selectors.expenses_by_category.select(&tree);

        tree.reduce(&crate::slices::ui::UiAction::ToggleSidebar.into());
        let second = selectors.expenses_by_category.select(&tree);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(selectors.expenses_by_category.recomputations(), 1);
    }

    #[test]
    fn input_change_recomputes() {
        let mut tree = StateTree::default();
        let selectors = Selectors::new();
        assert_eq!(*selectors.total_spent.select(&tree), Decimal::ZERO);

        let id = add(&mut tree, 25, "Other");
        assert_eq!(*selectors.total_spent.select(&tree), Decimal::from(25));

        tree.reduce(&ExpenseAction::Remove(id).into());
        assert_eq!(*selectors.total_spent.select(&tree), Decimal::ZERO);
        assert_eq!(selectors.total_spent.recomputations(), 3);
    }

    #[test]
    fn selected_document_follows_pointer() {
        use crate::slices::documents::DocumentsAction;
        use crate::slices::documents::tests::doc;

        let mut tree = StateTree::default();
        let selectors = Selectors::new();
        tree.reduce(&DocumentsAction::UploadFulfilled(doc("a")).into());
        assert_eq!(*selectors.selected_document.select(&tree), None);

        tree.reduce(&DocumentsAction::Select(Some("a".into())).into());
        let selected = selectors.selected_document.select(&tree);
        let id = selected.iter().map(|d| d.id.as_str()).next();
        assert_eq!(id, Some("a"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_entries() -> impl Strategy<Value = Vec<(i64, usize)>> {
            // Amounts in kobo (two decimal places), category index into a small set.
            prop::collection::vec((1i64..10_000_000, 0usize..4), 0..40)
        }

        const CATS: [&str; 4] = ["Food & Dining", "Housing", "Utilities", "Other"];

        proptest! {
            #[test]
            fn additivity_and_removal_symmetry(entries in arb_entries(), remove_mask in prop::collection::vec(any::<bool>(), 40)) {
                let mut state = ExpenseState::default();
                let mut expected = Decimal::ZERO;
                let mut ids = Vec::new();

                for (cents, cat) in &entries {
                    let amount = Decimal::new(*cents, 2);
                    let action = ExpenseAction::add(ExpenseDraft::new("x", amount, CATS[*cat]))
                        .expect("positive amount");
                    if let ExpenseAction::Add(e) = &action {
                        ids.push((e.id.clone(), amount));
                    }
                    state = state.apply(&action);
                    expected += amount;
                    prop_assert_eq!(total_spent(&state), expected);
                    prop_assert_eq!(remaining_budget(&state), state.total_budget - expected);
                }

                for ((id, amount), remove) in ids.into_iter().zip(remove_mask) {
                    if remove {
                        state = state.apply(&ExpenseAction::Remove(id));
                        expected -= amount;
                        prop_assert_eq!(total_spent(&state), expected);
                        prop_assert_eq!(remaining_budget(&state), state.total_budget - expected);
                    }
                }
            }

            #[test]
            fn category_sums_equal_total(entries in arb_entries()) {
                let state = entries.iter().fold(ExpenseState::default(), |s, (cents, cat)| {
                    let action = ExpenseAction::add(
                        ExpenseDraft::new("x", Decimal::new(*cents, 2), CATS[*cat]),
                    )
                    .expect("positive amount");
                    s.apply(&action)
                });

                let by_category = expenses_by_category(&state);
                let sum: Decimal = by_category.values().copied().sum();
                prop_assert_eq!(sum, total_spent(&state));
                prop_assert!(by_category.values().all(|v| *v > Decimal::ZERO));
            }
        }
    }
}

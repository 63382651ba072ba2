//! Expenses slice -- budget tracking with validated drafts.
//!
//! Totals are never stored here; see [`crate::selector`] for the derived
//! values. Both the expense list and the budget are persisted.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::error::OperationError;
use crate::persist::PersistedSlice;
use crate::slice::Slice;
use crate::state::StateTree;

/// Categories offered by the expense form.
pub const CATEGORIES: [&str; 10] = [
    "Food & Dining",
    "Transportation",
    "Housing",
    "Utilities",
    "Entertainment",
    "Healthcare",
    "Shopping",
    "Education",
    "Savings",
    "Other",
];

/// Budget a fresh or cleared slice starts with.
pub fn default_budget() -> Decimal {
    Decimal::new(500_000, 0)
}

/// Largest accepted expense amount or budget.
pub fn max_amount() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
}

/// User input for a new expense, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    /// Defaults to today (UTC) when absent.
    pub date: Option<NaiveDate>,
}

impl ExpenseDraft {
    pub fn new(description: impl Into<String>, amount: Decimal, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount,
            category: category.into(),
            date: None,
        }
    }

    /// Set an explicit date.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Field-wise update. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePatch {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseState {
    pub expenses: Vec<Expense>,
    pub total_budget: Decimal,
}

impl Default for ExpenseState {
    fn default() -> Self {
        Self {
            expenses: Vec::new(),
            total_budget: default_budget(),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Actions accepted by the [`ExpenseState`] slice.
///
/// Build `Add`, `Update`, and `SetBudget` through [`ExpenseAction::add`],
/// [`ExpenseAction::update`], and [`ExpenseAction::set_budget`], which
/// validate input and capture the generated id and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExpenseAction {
    Add(Expense),
    Remove(String),
    Update { id: String, patch: ExpensePatch },
    SetBudget(Decimal),
    /// Drop every expense and restore the default budget.
    ClearAll,
}

fn check_description(description: &str) -> Result<(), OperationError> {
    if description.trim().is_empty() {
        return Err(OperationError::invalid("Description cannot be empty"));
    }
    Ok(())
}

fn check_amount(amount: Decimal) -> Result<(), OperationError> {
    if amount <= Decimal::ZERO {
        return Err(OperationError::invalid("Amount must be greater than zero"));
    }
    if amount > max_amount() {
        return Err(OperationError::invalid(format!(
            "Amount must not exceed {}",
            max_amount()
        )));
    }
    Ok(())
}

impl ExpenseAction {
    /// Validate a draft and turn it into an `Add` with a fresh id.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for an empty description or an
    /// amount outside `(0, max_amount()]`.
    pub fn add(draft: ExpenseDraft) -> Result<Self, OperationError> {
        check_description(&draft.description)?;
        check_amount(draft.amount)?;
        Ok(Self::Add(Expense {
            id: Uuid::new_v4().to_string(),
            description: draft.description,
            amount: draft.amount,
            category: draft.category,
            date: draft.date.unwrap_or_else(|| Utc::now().date_naive()),
        }))
    }

    /// Validate the patched fields and build an `Update`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] if the patch sets an empty
    /// description or a non-positive amount.
    pub fn update(id: impl Into<String>, patch: ExpensePatch) -> Result<Self, OperationError> {
        if let Some(description) = &patch.description {
            check_description(description)?;
        }
        if let Some(amount) = patch.amount {
            check_amount(amount)?;
        }
        Ok(Self::Update {
            id: id.into(),
            patch,
        })
    }

    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for a budget outside
    /// `(0, max_amount()]`.
    pub fn set_budget(amount: Decimal) -> Result<Self, OperationError> {
        if amount <= Decimal::ZERO {
            return Err(OperationError::invalid("Budget must be greater than zero"));
        }
        if amount > max_amount() {
            return Err(OperationError::invalid(format!(
                "Budget must not exceed {}",
                max_amount()
            )));
        }
        Ok(Self::SetBudget(amount))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "addExpense",
            Self::Remove(_) => "removeExpense",
            Self::Update { .. } => "updateExpense",
            Self::SetBudget(_) => "setBudget",
            Self::ClearAll => "clearAllExpenses",
        }
    }
}

// ---------------------------------------------------------------------------
// Slice impl
// ---------------------------------------------------------------------------

impl Slice for ExpenseState {
    const NAME: &'static str = "expenses";
    type Action = ExpenseAction;

    fn route(action: &Action) -> Option<&ExpenseAction> {
        match action {
            Action::Expenses(a) => Some(a),
            _ => None,
        }
    }

    fn apply(mut self, action: &ExpenseAction) -> Self {
        match action {
            ExpenseAction::Add(expense) => self.expenses.push(expense.clone()),
            ExpenseAction::Remove(id) => self.expenses.retain(|e| &e.id != id),
            ExpenseAction::Update { id, patch } => {
                if let Some(expense) = self.expenses.iter_mut().find(|e| &e.id == id) {
                    if let Some(description) = &patch.description {
                        expense.description = description.clone();
                    }
                    if let Some(amount) = patch.amount {
                        expense.amount = amount;
                    }
                    if let Some(category) = &patch.category {
                        expense.category = category.clone();
                    }
                    if let Some(date) = patch.date {
                        expense.date = date;
                    }
                }
            }
            ExpenseAction::SetBudget(amount) => self.total_budget = *amount,
            ExpenseAction::ClearAll => return Self::default(),
        }
        self
    }

    fn get(tree: &StateTree) -> &Arc<Self> {
        &tree.expenses
    }

    fn get_mut(tree: &mut StateTree) -> &mut Arc<Self> {
        &mut tree.expenses
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpenseProjection {
    pub expenses: Option<Vec<Expense>>,
    pub total_budget: Option<Decimal>,
}

impl PersistedSlice for ExpenseState {
    type Projection = ExpenseProjection;

    fn project(&self) -> ExpenseProjection {
        ExpenseProjection {
            expenses: Some(self.expenses.clone()),
            total_budget: Some(self.total_budget),
        }
    }

    fn merge(mut self, projection: ExpenseProjection) -> Self {
        if let Some(expenses) = projection.expenses {
            self.expenses = expenses;
        }
        if let Some(total_budget) = projection.total_budget {
            self.total_budget = total_budget;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

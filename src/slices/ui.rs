//! UI slice -- sidebar, theme, and the bounded notification buffer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::persist::PersistedSlice;
use crate::slice::Slice;
use crate::state::StateTree;

/// Most notifications kept at once. Older ones fall off the end.
pub const MAX_NOTIFICATIONS: usize = 5;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Build a notification with a fresh id stamped now.
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// UI state. Notifications are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub sidebar_open: bool,
    pub theme: Theme,
    pub notifications: Vec<Notification>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            theme: Theme::Light,
            notifications: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UiAction {
    ToggleSidebar,
    SetSidebarOpen(bool),
    SetTheme(Theme),
    /// Insert at the front, evicting the oldest past [`MAX_NOTIFICATIONS`].
    AddNotification(Notification),
    RemoveNotification(String),
    ClearNotifications,
}

impl UiAction {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::ToggleSidebar => "toggleSidebar",
            Self::SetSidebarOpen(_) => "setSidebarOpen",
            Self::SetTheme(_) => "setTheme",
            Self::AddNotification(_) => "addNotification",
            Self::RemoveNotification(_) => "removeNotification",
            Self::ClearNotifications => "clearNotifications",
        }
    }
}

// ---------------------------------------------------------------------------
// Slice impl
// ---------------------------------------------------------------------------

impl Slice for UiState {
    const NAME: &'static str = "ui";
    type Action = UiAction;

    fn route(action: &Action) -> Option<&UiAction> {
        match action {
            Action::Ui(a) => Some(a),
            _ => None,
        }
    }

    fn apply(mut self, action: &UiAction) -> Self {
        match action {
            UiAction::ToggleSidebar => self.sidebar_open = !self.sidebar_open,
            UiAction::SetSidebarOpen(open) => self.sidebar_open = *open,
            UiAction::SetTheme(theme) => self.theme = *theme,
            UiAction::AddNotification(notification) => {
                self.notifications.insert(0, notification.clone());
                self.notifications.truncate(MAX_NOTIFICATIONS);
            }
            UiAction::RemoveNotification(id) => self.notifications.retain(|n| &n.id != id),
            UiAction::ClearNotifications => self.notifications.clear(),
        }
        self
    }

    fn get(tree: &StateTree) -> &Arc<Self> {
        &tree.ui
    }

    fn get_mut(tree: &mut StateTree) -> &mut Arc<Self> {
        &mut tree.ui
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Whitelisted UI fields: the theme only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiProjection {
    pub theme: Option<Theme>,
}

impl PersistedSlice for UiState {
    type Projection = UiProjection;

    fn project(&self) -> UiProjection {
        UiProjection {
            theme: Some(self.theme),
        }
    }

    fn merge(mut self, projection: UiProjection) -> Self {
        if let Some(theme) = projection.theme {
            self.theme = theme;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Top-level entry point: the [`Store`] handle and its [`StoreBuilder`].
//!
//! The builder rehydrates persisted slices, spawns the actor thread that
//! owns the state tree, and hands back a cheap, cloneable [`Store`].
//! Everything that changes state goes through [`Store::dispatch`], either
//! directly or from an [`AsyncOperation`] started with [`Store::run`].

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{mpsc, oneshot, watch};

use crate::action::Action;
use crate::actor::{ObserverList, Observers, StoreMessage, run_actor};
use crate::error::StoreError;
use crate::operation::{self, AsyncOperation, TaskHandle};
use crate::persist::{PersistedSlice, Persistor, ProjectionHook, SliceProjection};
use crate::slices::auth::{AuthAction, AuthState};
use crate::slices::chat::ChatAction;
use crate::slices::documents::DocumentsAction;
use crate::slices::expenses::ExpenseState;
use crate::slices::ui::UiState;
use crate::state::StateTree;
use crate::storage::{MemoryStorage, Storage};
use crate::upstream::{MockUpstream, UpstreamConfig};

/// Default capacity of the dispatch channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Handle to a running state container.
///
/// `Clone` is cheap -- all internal state is `Arc`-wrapped or a channel
/// end. The actor thread stops once every clone (including the ones held
/// by in-flight operations) has been dropped.
#[derive(Clone)]
pub struct Store {
    sender: mpsc::Sender<StoreMessage>,
    snapshots: watch::Receiver<Arc<StateTree>>,
    observers: Observers,
    upstream: Arc<MockUpstream>,
}

// Manual `Debug` because observers are opaque closures.
impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Store")
            .field("observers", &observers)
            .field("upstream", &self.upstream.config())
            .finish()
    }
}

impl Store {
    /// Create a builder for configuring a new store.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo() -> Result<(), statefold::StoreError> {
    /// use statefold::{FileStorage, Store};
    ///
    /// let store = Store::builder()
    ///     .storage(FileStorage::new("/tmp/statefold"))
    ///     .persist_defaults()
    ///     .open()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// The latest published snapshot.
    ///
    /// Never blocks on the actor. Slices that did not change between two
    /// snapshots share the same `Arc`.
    pub fn state(&self) -> Arc<StateTree> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// A `watch` receiver that yields every new snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<StateTree>> {
        self.snapshots.clone()
    }

    /// Apply an action and wait for the resulting snapshot.
    ///
    /// The action is offered to every slice; changed whitelisted slices are
    /// persisted, the snapshot is published, and observers are notified
    /// before this resolves.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the actor thread has exited.
    pub async fn dispatch(&self, action: impl Into<Action>) -> Result<Arc<StateTree>, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StoreMessage::Dispatch {
                action: action.into(),
                reply: tx,
            })
            .await
            .map_err(|_| StoreError::StoreGone)?;
        rx.await.map_err(|_| StoreError::StoreGone)
    }

    /// Start an async operation.
    ///
    /// The `requested` transition has been applied by the time this
    /// returns; the body then runs as a detached `tokio` task. Dropping the
    /// returned handle does not cancel it.
    ///
    /// Must be called from within a `tokio` runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the actor thread has exited.
    pub async fn run<O: AsyncOperation>(
        &self,
        operation: O,
    ) -> Result<TaskHandle<O::Output>, StoreError> {
        self.dispatch(operation.requested()).await?;
        tracing::debug!(operation = O::NAME, "operation started");
        let inner = tokio::spawn(operation::drive(operation, self.clone()));
        Ok(TaskHandle::new(O::NAME, inner))
    }

    /// Register an observer called after every completed dispatch.
    ///
    /// The observer runs on the actor thread while holding the observer
    /// registry lock. It must not call [`subscribe`](Store::subscribe) or
    /// drop a [`Subscription`]. Reading [`state`](Store::state) is fine.
    ///
    /// An observer that panics is logged and unsubscribed; the store keeps
    /// running.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(&Action, &Arc<StateTree>) + Send + 'static,
    {
        let id = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Box::new(observer));
        tracing::trace!(id, "observer subscribed");
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// End the session: log out, drop documents, and clear the chat.
    ///
    /// Issued as three separate dispatches; observers see each one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the actor thread has exited.
    pub async fn clear_session(&self) -> Result<Arc<StateTree>, StoreError> {
        self.dispatch(AuthAction::Logout).await?;
        self.dispatch(DocumentsAction::Clear).await?;
        self.dispatch(ChatAction::Clear).await
    }

    /// The upstream collaborators operations talk to.
    pub fn upstream(&self) -> &MockUpstream {
        &self.upstream
    }
}

/// Keeps an observer registered. Dropping it (or calling
/// [`unsubscribe`](Subscription::unsubscribe)) removes the observer; once
/// that returns, the observer is never called again.
#[derive(Debug)]
#[must_use = "the observer is removed as soon as the Subscription is dropped"]
pub struct Subscription {
    id: u64,
    observers: Weak<Mutex<ObserverList>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.id);
            tracing::trace!(id = self.id, "observer unsubscribed");
        }
    }
}

/// Builder for configuring and opening a [`Store`].
///
/// Defaults: in-memory storage, nothing persisted, default upstream
/// latencies, channel capacity of 64.
pub struct StoreBuilder {
    storage: Option<Arc<dyn Storage>>,
    hooks: Vec<Box<dyn ProjectionHook>>,
    upstream: UpstreamConfig,
    channel_capacity: usize,
}

impl std::fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let persisted: Vec<_> = self.hooks.iter().map(|h| h.key()).collect();
        f.debug_struct("StoreBuilder")
            .field("persisted", &persisted)
            .field("upstream", &self.upstream)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            hooks: Vec::new(),
            upstream: UpstreamConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Use `storage` for persisted projections.
    pub fn storage(mut self, storage: impl Storage) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Persist slice `S`. Registering the same slice twice is a no-op.
    pub fn persist<S: PersistedSlice>(mut self) -> Self {
        if self.hooks.iter().any(|h| h.key() == S::NAME) {
            return self;
        }
        self.hooks.push(Box::new(SliceProjection::<S>::new()));
        self
    }

    /// Persist the standard whitelist: `auth` token, `ui` theme, and the
    /// whole `expenses` slice.
    pub fn persist_defaults(self) -> Self {
        self.persist::<AuthState>()
            .persist::<UiState>()
            .persist::<ExpenseState>()
    }

    /// Configure the mock upstream.
    pub fn upstream(mut self, config: UpstreamConfig) -> Self {
        self.upstream = config;
        self
    }

    /// Capacity of the dispatch channel. Clamped to at least 1.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Rehydrate persisted slices and start the actor thread.
    ///
    /// Unreadable or malformed persisted data falls back to defaults and
    /// is logged, never returned as an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the actor thread cannot be spawned.
    pub fn open(self) -> Result<Store, StoreError> {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let mut persistor = Persistor::new(storage, self.hooks);
        let initial = persistor.rehydrate();

        let (snap_tx, snap_rx) = watch::channel(Arc::new(initial.clone()));
        let observers: Observers = Arc::default();
        let weak = Arc::downgrade(&observers);
        let (tx, rx) = mpsc::channel::<StoreMessage>(self.channel_capacity);

        std::thread::Builder::new()
            .name("statefold-store".to_owned())
            .spawn(move || run_actor(initial, persistor, snap_tx, weak, rx))?;

        tracing::debug!(upstream = ?self.upstream, "store opened");

        Ok(Store {
            sender: tx,
            snapshots: snap_rx,
            observers,
            upstream: Arc::new(MockUpstream::new(self.upstream)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slices::ui::{Theme, UiAction};
    use crate::upstream::Latency;

    fn fast() -> StoreBuilder {
        Store::builder().upstream(UpstreamConfig {
            latency: Latency::none(),
            simulate_failure: false,
        })
    }

    #[tokio::test]
    async fn dispatch_updates_state_snapshot() {
        let store = fast().open().expect("open should succeed");
        let tree = store
            .dispatch(UiAction::SetTheme(Theme::Dark))
            .await
            .expect("dispatch should succeed");
        assert_eq!(tree.ui.theme, Theme::Dark);
        assert!(Arc::ptr_eq(&tree, &store.state()));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = fast().open().expect("open should succeed");
        let other = store.clone();
        store
            .dispatch(UiAction::ToggleSidebar)
            .await
            .expect("dispatch should succeed");
        assert!(!other.state().ui.sidebar_open);
    }

    #[tokio::test]
    async fn watch_yields_new_snapshot() {
        let store = fast().open().expect("open should succeed");
        let mut rx = store.watch();
        store
            .dispatch(UiAction::ToggleSidebar)
            .await
            .expect("dispatch should succeed");
        rx.changed().await.expect("sender alive");
        assert!(!rx.borrow().ui.sidebar_open);
    }

    #[tokio::test]
    async fn unsubscribe_stops_notifications() {
        let store = fast().open().expect("open should succeed");
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        let sub = store.subscribe(move |_: &Action, _: &Arc<StateTree>| {
            *sink.lock().expect("lock") += 1;
        });

        store.dispatch(UiAction::ToggleSidebar).await.expect("dispatch");
        sub.unsubscribe();
        store.dispatch(UiAction::ToggleSidebar).await.expect("dispatch");

        assert_eq!(*count.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn noop_dispatch_still_notifies() {
        let store = fast().open().expect("open should succeed");
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        let _sub = store.subscribe(move |_: &Action, _: &Arc<StateTree>| {
            *sink.lock().expect("lock") += 1;
        });

        let before = store.state();
        let after = store
            .dispatch(DocumentsAction::Delete("ghost".into()))
            .await
            .expect("dispatch");
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(*count.lock().expect("lock"), 1);
    }

    fn faulty_observer(_: &Action, _: &Arc<StateTree>) {
        panic!("observer bug");
    }

    #[tokio::test]
    async fn panicking_observer_does_not_stop_the_store() {
        let store = fast().open().expect("open should succeed");
        let _bad = store.subscribe(faulty_observer);

        store
            .dispatch(UiAction::ToggleSidebar)
            .await
            .expect("first dispatch survives the panic");
        let tree = store
            .dispatch(UiAction::ToggleSidebar)
            .await
            .expect("store still running");
        assert!(tree.ui.sidebar_open);
    }

    #[test]
    fn persist_registration_is_idempotent() {
        let builder = Store::builder()
            .persist::<UiState>()
            .persist_defaults()
            .persist::<UiState>();
        assert_eq!(builder.hooks.len(), 3);
    }

    #[test]
    fn channel_capacity_is_clamped() {
        let builder = Store::builder().channel_capacity(0);
        assert_eq!(builder.channel_capacity, 1);
    }
}

//! Actor loop that owns the state tree and applies dispatched actions.
//!
//! The actor runs on a dedicated thread and processes messages from an
//! `mpsc` channel one at a time, so transitions never interleave. It
//! exclusively owns the current [`StateTree`] and the [`Persistor`]; readers
//! see published snapshots through a `watch` channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{mpsc, oneshot, watch};

use crate::action::Action;
use crate::persist::Persistor;
use crate::state::StateTree;

/// Callback invoked after every completed dispatch.
pub(crate) type Observer = Box<dyn FnMut(&Action, &Arc<StateTree>) + Send>;

/// Registered observers, keyed by subscription id.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<(u64, Observer)>,
}

impl ObserverList {
    pub(crate) fn insert(&mut self, observer: Observer) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Call every observer. An observer that panics is logged and removed;
    /// the rest still run and the actor keeps going.
    fn notify(&mut self, action: &Action, snapshot: &Arc<StateTree>) {
        self.entries.retain_mut(|(id, observer)| {
            let call = panic::catch_unwind(AssertUnwindSafe(|| observer(action, snapshot)));
            if call.is_err() {
                tracing::error!(id = *id, "observer panicked; unsubscribed");
            }
            call.is_ok()
        });
    }
}

/// Shared observer registry. The actor holds the lock for the whole
/// notification pass, so removal blocks until any in-flight call returns.
pub(crate) type Observers = Arc<Mutex<ObserverList>>;

/// Messages sent from [`Store`](crate::Store) to the actor loop.
pub(crate) enum StoreMessage {
    /// Apply an action and reply with the resulting snapshot.
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Arc<StateTree>>,
    },
}

/// Runs the store actor loop on its own thread.
///
/// The loop exits when the channel closes, i.e. when every `Store` clone
/// (including those held by running operations) has been dropped.
pub(crate) fn run_actor(
    initial: StateTree,
    mut persistor: Persistor,
    snapshots: watch::Sender<Arc<StateTree>>,
    observers: Weak<Mutex<ObserverList>>,
    mut rx: mpsc::Receiver<StoreMessage>,
) {
    let mut current = Arc::new(initial);

    while let Some(msg) = rx.blocking_recv() {
        match msg {
            StoreMessage::Dispatch { action, reply } => {
                let name = action.name();
                let _span = tracing::debug_span!("dispatch", action = %name).entered();

                current = apply_action(&current, &action, &mut persistor);
                snapshots.send_replace(Arc::clone(&current));

                if let Some(observers) = observers.upgrade() {
                    observers
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .notify(&action, &current);
                }

                // If the caller stopped waiting, the new state is still
                // published; nothing else to do.
                let _ = reply.send(Arc::clone(&current));
            }
        }
    }

    tracing::debug!("store actor stopped");
}

/// Reduce one action into a new snapshot, persisting changed slices.
///
/// Returns the previous snapshot unchanged when no slice changed.
fn apply_action(
    current: &Arc<StateTree>,
    action: &Action,
    persistor: &mut Persistor,
) -> Arc<StateTree> {
    let mut next = StateTree::clone(current);
    let changed = next.reduce(action);
    if changed.is_empty() {
        tracing::trace!("no slice changed");
        return Arc::clone(current);
    }

    tracing::debug!(slices = ?changed, "state updated");
    persistor.persist(&next);
    Arc::new(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::SliceProjection;
    use crate::slices::ui::{Theme, UiAction, UiState};
    use crate::storage::{MemoryStorage, Storage};

    fn spawn(
        storage: &MemoryStorage,
    ) -> (mpsc::Sender<StoreMessage>, watch::Receiver<Arc<StateTree>>, Observers) {
        let mut persistor = Persistor::new(
            Arc::new(storage.clone()),
            vec![Box::new(SliceProjection::<UiState>::new())],
        );
        let initial = persistor.rehydrate();
        let (snap_tx, snap_rx) = watch::channel(Arc::new(initial.clone()));
        let observers: Observers = Arc::default();
        let weak = Arc::downgrade(&observers);
        let (tx, rx) = mpsc::channel(8);
        std::thread::spawn(move || run_actor(initial, persistor, snap_tx, weak, rx));
        (tx, snap_rx, observers)
    }

    async fn send(tx: &mpsc::Sender<StoreMessage>, action: impl Into<Action>) -> Arc<StateTree> {
        let (reply, rx) = oneshot::channel();
        tx.send(StoreMessage::Dispatch {
            action: action.into(),
            reply,
        })
        .await
        .expect("actor alive");
        rx.await.expect("actor replied")
    }

    #[tokio::test]
    async fn dispatch_publishes_snapshot_and_persists() {
        let storage = MemoryStorage::new();
        let (tx, snapshots, _observers) = spawn(&storage);

        let tree = send(&tx, UiAction::SetTheme(Theme::Dark)).await;
        assert_eq!(tree.ui.theme, Theme::Dark);
        assert!(Arc::ptr_eq(&tree, &snapshots.borrow()));
        assert_eq!(
            storage.get("ui").expect("get").as_deref(),
            Some(r#"{"theme":"dark"}"#)
        );
    }

    #[tokio::test]
    async fn unchanged_dispatch_keeps_snapshot_identity() {
        let storage = MemoryStorage::new();
        let (tx, _snapshots, _observers) = spawn(&storage);

        let first = send(&tx, UiAction::SetTheme(Theme::Dark)).await;
        let second = send(&tx, UiAction::SetTheme(Theme::Dark)).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn observers_see_every_dispatch_in_order() {
        let storage = MemoryStorage::new();
        let (tx, _snapshots, observers) = spawn(&storage);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        observers
            .lock()
            .expect("lock")
            .insert(Box::new(move |action: &Action, tree: &Arc<StateTree>| {
                sink.lock().expect("lock").push((action.name(), tree.ui.sidebar_open));
            }));

        send(&tx, UiAction::ToggleSidebar).await;
        send(&tx, UiAction::ToggleSidebar).await;

        let seen = seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![
                ("ui/toggleSidebar".to_owned(), false),
                ("ui/toggleSidebar".to_owned(), true)
            ]
        );
    }

    #[tokio::test]
    async fn removed_observer_is_not_called() {
        let storage = MemoryStorage::new();
        let (tx, _snapshots, observers) = spawn(&storage);
        let calls = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&calls);
        let id = observers
            .lock()
            .expect("lock")
            .insert(Box::new(move |_: &Action, _: &Arc<StateTree>| *sink.lock().expect("lock") += 1));

        send(&tx, UiAction::ToggleSidebar).await;
        assert!(observers.lock().expect("lock").remove(id));
        send(&tx, UiAction::ToggleSidebar).await;

        assert_eq!(*calls.lock().expect("lock"), 1);
    }

    fn faulty_observer(_: &Action, _: &Arc<StateTree>) {
        panic!("observer bug");
    }

    #[tokio::test]
    async fn panicking_observer_is_dropped_and_actor_survives() {
        let storage = MemoryStorage::new();
        let (tx, _snapshots, observers) = spawn(&storage);
        let calls = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&calls);
        {
            let mut list = observers.lock().expect("lock");
            list.insert(Box::new(faulty_observer));
            list.insert(Box::new(move |_: &Action, _: &Arc<StateTree>| {
                *sink.lock().expect("lock") += 1
            }));
        }

        send(&tx, UiAction::ToggleSidebar).await;
        let tree = send(&tx, UiAction::ToggleSidebar).await;

        assert!(tree.ui.sidebar_open);
        assert_eq!(*calls.lock().expect("lock"), 2);
        assert_eq!(observers.lock().expect("lock").len(), 1);
    }
}

//! Whitelisted persistence of slice projections.
//!
//! A slice opts in by implementing [`PersistedSlice`] and being registered
//! on the [`StoreBuilder`](crate::StoreBuilder). The store actor then
//! writes the slice's projection after every dispatch that changed it, and
//! merges the stored projection into the default slice at startup.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::slice::Slice;
use crate::state::StateTree;
use crate::storage::Storage;

/// A slice with a whitelisted, persisted subset of fields.
///
/// # Contract
///
/// - [`project`](PersistedSlice::project) returns only whitelisted fields.
///   Anything outside the projection is never written.
/// - [`merge`](PersistedSlice::merge) copies fields that are present in
///   the projection onto `self` and leaves the rest untouched, so a
///   partial or older projection still rehydrates cleanly.
pub trait PersistedSlice: Slice {
    /// The whitelisted projection. Fields should be `#[serde(default)]` so
    /// that partially written values still parse.
    type Projection: Serialize + DeserializeOwned + Send + 'static;

    fn project(&self) -> Self::Projection;

    fn merge(self, projection: Self::Projection) -> Self;
}

/// Type-erased persistence hook for one slice.
///
/// Lets the actor hold hooks for heterogeneous slice types in one list.
pub(crate) trait ProjectionHook: Send {
    /// Storage key (the slice name).
    fn key(&self) -> &'static str;

    /// Merge the stored projection into `tree`. Never fails: absent or
    /// malformed data leaves the default slice in place.
    fn rehydrate(&mut self, tree: &mut StateTree, storage: &dyn Storage);

    /// Write the projection if the slice changed since the last call.
    ///
    /// Returns `true` if a write happened.
    fn persist(&mut self, tree: &StateTree, storage: &dyn Storage) -> Result<bool, StoreError>;
}

/// [`ProjectionHook`] for a concrete [`PersistedSlice`].
pub(crate) struct SliceProjection<S: PersistedSlice> {
    /// Slice value seen on the last `persist` / `rehydrate` call.
    last_seen: Option<Arc<S>>,
    /// JSON most recently written (or read) under the key.
    last_written: Option<String>,
    _slice: PhantomData<fn() -> S>,
}

impl<S: PersistedSlice> SliceProjection<S> {
    pub(crate) fn new() -> Self {
        Self {
            last_seen: None,
            last_written: None,
            _slice: PhantomData,
        }
    }

    fn encode(slice: &S) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&slice.project())?)
    }
}

impl<S: PersistedSlice> ProjectionHook for SliceProjection<S> {
    fn key(&self) -> &'static str {
        S::NAME
    }

    fn rehydrate(&mut self, tree: &mut StateTree, storage: &dyn Storage) {
        if let Some(projection) = read_projection::<S>(storage) {
            let merged = S::get(tree).as_ref().clone().merge(projection);
            *S::get_mut(tree) = Arc::new(merged);
            self.last_written = Self::encode(S::get(tree)).ok();
            tracing::debug!(key = S::NAME, "rehydrated projection");
        }
        // Startup state is not a mutation: only later changes are written.
        self.last_seen = Some(Arc::clone(S::get(tree)));
    }

    fn persist(&mut self, tree: &StateTree, storage: &dyn Storage) -> Result<bool, StoreError> {
        let current = S::get(tree);
        if let Some(last) = &self.last_seen
            && Arc::ptr_eq(last, current)
        {
            return Ok(false);
        }
        self.last_seen = Some(Arc::clone(current));

        let json = Self::encode(current)?;
        if self.last_written.as_deref() == Some(json.as_str()) {
            return Ok(false);
        }

        storage.set(S::NAME, &json)?;
        tracing::debug!(key = S::NAME, bytes = json.len(), "projection written");
        self.last_written = Some(json);
        Ok(true)
    }
}

/// Read and decode the stored projection for `S`.
///
/// Returns `None` when nothing is stored, the backend fails, or the value
/// is malformed. The last two are logged.
fn read_projection<S: PersistedSlice>(storage: &dyn Storage) -> Option<S::Projection> {
    let raw = match storage.get(S::NAME) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!(key = S::NAME, "no persisted projection, using defaults");
            return None;
        }
        Err(e) => {
            tracing::warn!(key = S::NAME, error = %e, "failed to read projection; using defaults");
            return None;
        }
    };

    match serde_json::from_str::<S::Projection>(&raw) {
        Ok(projection) => Some(projection),
        Err(e) => {
            tracing::warn!(
                key = S::NAME,
                error = %e,
                "failed to deserialize projection; using defaults"
            );
            None
        }
    }
}

/// All persistence hooks plus the backend they write to.
pub(crate) struct Persistor {
    storage: Arc<dyn Storage>,
    hooks: Vec<Box<dyn ProjectionHook>>,
}

impl Persistor {
    pub(crate) fn new(storage: Arc<dyn Storage>, hooks: Vec<Box<dyn ProjectionHook>>) -> Self {
        Self { storage, hooks }
    }

    /// Build the startup tree: defaults merged with every stored projection.
    pub(crate) fn rehydrate(&mut self) -> StateTree {
        let mut tree = StateTree::default();
        for hook in &mut self.hooks {
            hook.rehydrate(&mut tree, self.storage.as_ref());
        }
        tree
    }

    /// Write every changed projection. Failures are logged and skipped so
    /// a broken backend never blocks state transitions.
    pub(crate) fn persist(&mut self, tree: &StateTree) {
        for hook in &mut self.hooks {
            if let Err(e) = hook.persist(tree, self.storage.as_ref()) {
                tracing::error!(key = hook.key(), error = %e, "failed to persist projection");
            }
        }
    }
}

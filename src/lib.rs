//! Asynchronous state-slice container with memoized selectors and
//! whitelisted persistence.

mod action;
pub use action::Action;
mod actor;
mod error;
pub use error::{OperationError, StoreError};
mod operation;
pub use operation::{AsyncOperation, TaskHandle, TaskOutcome};
mod persist;
pub use persist::PersistedSlice;
pub mod selector;
pub use selector::{Selector, Selectors};
mod slice;
pub use slice::Slice;
pub mod slices;
mod state;
pub use state::StateTree;
mod storage;
pub use storage::{FileStorage, MemoryStorage, Storage};
mod store;
pub use store::{Store, StoreBuilder, Subscription};
pub mod upstream;
pub use upstream::{Latency, MockUpstream, UpstreamConfig};

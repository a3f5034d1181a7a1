//! Boundary to the hosted backend.
//!
//! Two seams: [`MeetingStore`] for row reads/writes and [`ChangeFeed`] for
//! realtime change notifications. `RestBackend` + `RealtimeFeed` talk to the
//! hosted service; `MemoryBackend` implements both seams in-process for
//! tests and local demo runs.

pub mod feed;
pub mod memory;
pub mod realtime;
pub mod rest;
pub mod store;

pub use feed::{
    ChangeEvent, ChangeFeed, ChangeKind, ChangePayload, EventFilter, Subscription, Table,
};
pub use memory::MemoryBackend;
pub use realtime::RealtimeFeed;
pub use rest::RestBackend;
pub use store::{MeetingStore, StoreError};

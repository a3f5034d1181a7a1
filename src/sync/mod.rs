//! Live meeting synchronization.
//!
//! [`MeetingSession`] mirrors one meeting's mutable sub-resources from the
//! hosted backend; [`LiveStateHandle`] is the observable surface the API
//! layer and tests read from.

pub mod roster;
pub mod session;
pub mod state;

pub use session::MeetingSession;
pub use state::{LiveState, LiveStateHandle};

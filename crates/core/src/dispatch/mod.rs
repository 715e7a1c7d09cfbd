//! Hand an accepted match to a download backend and record the result.

mod dispatcher;
mod events;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use events::{DispatchEvent, EventEnvelope, EventHandle};

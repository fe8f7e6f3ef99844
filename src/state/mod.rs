//! Shared and per-request state.
//!
//! [`HandlerState`] is server-scoped: created once at server construction,
//! shared across every connection and request, destroyed with the server.
//! [`RequestState`] is per-request scratch space that middleware stages
//! mutate as a request descends the handler chain; it is discarded when the
//! request completes.

mod handler_state;
mod request_state;

pub use handler_state::HandlerState;
pub use request_state::{RequestState, RequestStateValue};

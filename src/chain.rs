use std::sync::Arc;

use crate::event::TerminateEvent;
use crate::host_field::HostField;
use crate::server::handler::RequestHandler;
use crate::state::{HandlerState, RequestState};

/// The mutable bundle threaded through the downstream handler chain.
/// Every stage receives a `&mut RequestContext`, may reject the request
/// by writing into `handler.response` and returning without forwarding,
/// or may mutate `rel_path`/`req_state` and call the next stage itself.
pub struct RequestContext<'a> {
	pub host: HostField,
	pub rel_path: String,
	pub handler: &'a mut RequestHandler,
	pub handler_state: Arc<HandlerState>,
	pub req_state: RequestState,
	pub terminate: Arc<TerminateEvent>,
}

/// A single stage in the pluggable request-handling chain.
///
/// Mirrors the uniform `HandleRequest(host, relPath, pyHandler,
/// handlerState, reqState, terminateEvent)` call signature: every stage
/// either rejects the request (sets a response on `ctx.handler` and
/// returns) or forwards to the next configured stage, optionally after
/// mutating `ctx.rel_path` or `ctx.req_state`.
pub trait DownstreamHandler: Send + Sync {
	fn handle_request(&self, ctx: &mut RequestContext<'_>);
}

/// A terminal stage that always rejects with 404, used as the default
/// "end of chain" when no handler matched a path.
pub struct NotFoundHandler;

impl DownstreamHandler for NotFoundHandler {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		ctx.handler.set_code_and_text(404, "Not Found");
	}
}

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::chain::{DownstreamHandler, RequestContext};
use crate::valid_chars::is_path_char;

#[derive(Debug, Error)]
#[error("invalid path: {0}, must start with '/'")]
pub struct InvalidPathError(pub String);

/// Split `path` into the current path segment (e.g. `/Hello`) and
/// everything after it, scanning from index 1 for the first character
/// that isn't a valid path character. An empty path is its own valid
/// "leaf" segment with no next level.
fn split_this_and_next_level(path: &str) -> Result<(String, String), InvalidPathError> {
	if path.is_empty() {
		return Ok((String::new(), String::new()));
	}
	if !path.starts_with('/') {
		return Err(InvalidPathError(path.to_string()));
	}
	let bytes = path.as_bytes();
	let mut end = bytes.len();
	for (idx, c) in path.char_indices().skip(1) {
		if !is_path_char(c) {
			end = idx;
			break;
		}
	}
	Ok((path[..end].to_string(), path[end..].to_string()))
}

/// A method name to handler mapping for one path segment.
pub type MethodMap = HashMap<String, Arc<dyn DownstreamHandler>>;
/// A path segment to method-map mapping, the routing table consumed by
/// `HandlerByPath`.
pub type PathMap = HashMap<String, MethodMap>;

/// Routes a request one path segment at a time: splits `relPath` into its
/// current segment and the remainder, looks the segment up in the
/// routing table, then looks the HTTP method up within that segment's
/// method map. Forwards to the matched handler with `relPath` advanced
/// past the consumed segment; a miss at either level is a 404.
pub struct HandlerByPath {
	map: PathMap,
}

impl HandlerByPath {
	pub fn new(map: PathMap) -> Self {
		Self { map }
	}
}

impl DownstreamHandler for HandlerByPath {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let method = ctx.handler.method.clone();

		let (this_level, next_level) = match split_this_and_next_level(&ctx.rel_path) {
			Ok(v) => v,
			Err(_) => {
				ctx.handler.set_code_and_text(404, "Not Found");
				return;
			}
		};

		let Some(method_map) = self.map.get(&this_level) else {
			ctx.handler.set_code_and_text(404, "Not Found");
			return;
		};
		let Some(handler) = method_map.get(&method) else {
			ctx.handler.set_code_and_text(404, "Not Found");
			return;
		};

		ctx.rel_path = next_level;
		handler.handle_request(ctx);
	}
}

/// Wraps a handler so that it only fires once `relPath` has been fully
/// consumed -- i.e. this is a routing leaf, not an intermediate node.
pub struct EndPointHandler {
	inner: Arc<dyn DownstreamHandler>,
}

impl EndPointHandler {
	pub fn new(inner: Arc<dyn DownstreamHandler>) -> Self {
		Self { inner }
	}
}

impl DownstreamHandler for EndPointHandler {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		if ctx.rel_path.is_empty() {
			self.inner.handle_request(ctx);
		} else {
			ctx.handler.set_code_and_text(404, "Not Found");
		}
	}
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::chain::{DownstreamHandler, RequestContext};
use crate::tcp_chain::{TcpDownstreamHandler, TcpRequestContext};

/// Caps the number of requests being handled concurrently. Unlike a
/// blocking semaphore, a denied request is rejected immediately rather
/// than queued -- a full house means 403, not a wait.
///
/// The limit applies per connection-level chain, not per request: used at
/// the TCP layer via [`TcpConcurrentLimiter`] it caps concurrent
/// connections; used at the HTTP layer via [`ConcurrentLimiter`] it caps
/// concurrent in-flight requests. Both wrap the same [`ConcurrentLimiterCore`].
struct ConcurrentLimiterCore {
	max_concurrent: usize,
	in_flight: AtomicUsize,
}

impl ConcurrentLimiterCore {
	fn new(max_concurrent: usize) -> Self {
		Self {
			max_concurrent,
			in_flight: AtomicUsize::new(0),
		}
	}

	/// Try to acquire one of `max_concurrent` slots without blocking.
	fn try_acquire(&self) -> bool {
		let mut current = self.in_flight.load(Ordering::SeqCst);
		loop {
			if current >= self.max_concurrent {
				return false;
			}
			match self
				.in_flight
				.compare_exchange_weak(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
			{
				Ok(_) => return true,
				Err(observed) => current = observed,
			}
		}
	}

	fn release(&self) {
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Release on every exit path, including a panic unwinding through here,
/// by running the downstream call behind a guard rather than a bare
/// call + release.
struct ReleaseGuard<'a>(&'a ConcurrentLimiterCore);
impl Drop for ReleaseGuard<'_> {
	fn drop(&mut self) {
		self.0.release();
	}
}

pub struct ConcurrentLimiter {
	core: ConcurrentLimiterCore,
	downstream: Arc<dyn DownstreamHandler>,
}

impl ConcurrentLimiter {
	pub fn new(max_concurrent: usize, downstream: Arc<dyn DownstreamHandler>) -> Self {
		Self {
			core: ConcurrentLimiterCore::new(max_concurrent),
			downstream,
		}
	}

	fn try_acquire(&self) -> bool {
		self.core.try_acquire()
	}

	fn release(&self) {
		self.core.release()
	}
}

impl DownstreamHandler for ConcurrentLimiter {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		if !self.try_acquire() {
			log::debug!("ConcurrentLimiter: too many concurrent requests, request denied");
			ctx.handler.set_code_and_text(403, "Forbidden");
			return;
		}
		let _guard = ReleaseGuard(&self.core);
		self.downstream.handle_request(ctx);
	}
}

/// The raw-TCP-layer counterpart of [`ConcurrentLimiter`], for capping
/// concurrent connections before any HTTP framing is involved.
pub struct TcpConcurrentLimiter {
	core: ConcurrentLimiterCore,
	downstream: Arc<dyn TcpDownstreamHandler>,
}

impl TcpConcurrentLimiter {
	pub fn new(max_concurrent: usize, downstream: Arc<dyn TcpDownstreamHandler>) -> Self {
		Self {
			core: ConcurrentLimiterCore::new(max_concurrent),
			downstream,
		}
	}
}

impl TcpDownstreamHandler for TcpConcurrentLimiter {
	fn handle_request(&self, ctx: &mut TcpRequestContext) {
		if !self.core.try_acquire() {
			log::debug!("TcpConcurrentLimiter: too many concurrent connections, connection dropped");
			return;
		}
		let _guard = ReleaseGuard(&self.core);
		self.downstream.handle_request(ctx);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::NotFoundHandler;

	#[test]
	fn rejects_once_capacity_is_exhausted() {
		let limiter = ConcurrentLimiter::new(1, Arc::new(NotFoundHandler));
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());
		limiter.release();
		assert!(limiter.try_acquire());
	}
}

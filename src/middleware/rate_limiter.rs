use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::chain::{DownstreamHandler, RequestContext};
use crate::tcp_chain::{TcpDownstreamHandler, TcpRequestContext};

/// A sliding-window rate limiter: at most `max_req` requests are allowed
/// in any trailing `period` window, tracked as a deque of timestamps.
/// A timestamp is expired (and evicted) only once it is strictly older
/// than `period` -- a request landing exactly on the boundary still
/// counts against the window.
///
/// Shared by [`RateLimiter`] (HTTP-layer, one window per request) and
/// [`TcpRateLimiter`] (TCP-layer, one window per connection).
struct RateLimiterCore {
	max_req: usize,
	period: Duration,
	req_times: Mutex<VecDeque<Instant>>,
}

impl RateLimiterCore {
	fn new(max_req: usize, period: Duration) -> Self {
		Self {
			max_req,
			period,
			req_times: Mutex::new(VecDeque::new()),
		}
	}

	fn check_rate_limit(&self) -> bool {
		let now = Instant::now();
		let mut times = self.req_times.lock().unwrap();

		while let Some(&front) = times.front() {
			if now.duration_since(front) > self.period {
				times.pop_front();
			} else {
				break;
			}
		}

		if times.len() >= self.max_req {
			return false;
		}

		times.push_back(now);
		true
	}
}

pub struct RateLimiter {
	core: RateLimiterCore,
	downstream: Arc<dyn DownstreamHandler>,
}

impl RateLimiter {
	pub fn new(max_req: usize, period: Duration, downstream: Arc<dyn DownstreamHandler>) -> Self {
		Self {
			core: RateLimiterCore::new(max_req, period),
			downstream,
		}
	}

	fn check_rate_limit(&self) -> bool {
		self.core.check_rate_limit()
	}
}

impl DownstreamHandler for RateLimiter {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		if !self.check_rate_limit() {
			log::debug!("RateLimiter: rate limit exceeded, request denied");
			ctx.handler.set_code_and_text(403, "Forbidden");
			return;
		}
		self.downstream.handle_request(ctx);
	}
}

/// The raw-TCP-layer counterpart of [`RateLimiter`], rate-limiting new
/// connections rather than requests on an already-open one.
pub struct TcpRateLimiter {
	core: RateLimiterCore,
	downstream: Arc<dyn TcpDownstreamHandler>,
}

impl TcpRateLimiter {
	pub fn new(max_req: usize, period: Duration, downstream: Arc<dyn TcpDownstreamHandler>) -> Self {
		Self {
			core: RateLimiterCore::new(max_req, period),
			downstream,
		}
	}
}

impl TcpDownstreamHandler for TcpRateLimiter {
	fn handle_request(&self, ctx: &mut TcpRequestContext) {
		if !self.core.check_rate_limit() {
			log::debug!("TcpRateLimiter: rate limit exceeded, connection dropped");
			return;
		}
		self.downstream.handle_request(ctx);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::NotFoundHandler;

	#[test]
	fn allows_up_to_max_req_then_denies() {
		let limiter = RateLimiter::new(2, Duration::from_secs(60), Arc::new(NotFoundHandler));
		assert!(limiter.check_rate_limit());
		assert!(limiter.check_rate_limit());
		assert!(!limiter.check_rate_limit());
	}

	#[test]
	fn window_slides_once_entries_expire() {
		let limiter = RateLimiter::new(1, Duration::from_millis(20), Arc::new(NotFoundHandler));
		assert!(limiter.check_rate_limit());
		assert!(!limiter.check_rate_limit());
		std::thread::sleep(Duration::from_millis(30));
		assert!(limiter.check_rate_limit());
	}
}

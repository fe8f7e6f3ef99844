use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::event::TerminateEvent;

/// Race-safe start/terminate bookkeeping shared by every listening
/// server (`TcpServer`, the TLS listener, the HTTP/HTTPS pre-handlers).
///
/// `start_threaded` and `terminate` both take the same lock, so a
/// `terminate()` that runs before `start_threaded()` has spawned its
/// thread is guaranteed to be observed: the start call sees
/// `terminate`'s flag already set and refuses to spawn.
pub struct Lifecycle {
	state: Mutex<LifecycleState>,
	terminate: Arc<TerminateEvent>,
}

#[derive(Default)]
struct LifecycleState {
	thread_started: bool,
	join_handle: Option<JoinHandle<()>>,
}

impl Lifecycle {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(LifecycleState::default()),
			terminate: Arc::new(TerminateEvent::new()),
		}
	}

	pub fn terminate_event(&self) -> Arc<TerminateEvent> {
		self.terminate.clone()
	}

	/// Spawn `serve_forever` on a detached thread, unless a serve thread
	/// has already been started or the server has already been told to
	/// terminate. Safe to call more than once or concurrently with
	/// `terminate`.
	pub fn start_threaded<F>(&self, serve_forever: F)
	where
		F: FnOnce() + Send + 'static,
	{
		let mut guard = self.state.lock().unwrap();
		if guard.thread_started || self.terminate.is_set() {
			return;
		}
		guard.thread_started = true;
		let handle = thread::Builder::new()
			.name("netframe-serve".into())
			.spawn(serve_forever)
			.expect("failed to spawn serve thread");
		guard.join_handle = Some(handle);
	}

	/// Set the terminate flag, run `shutdown` (expected to unblock the
	/// accept loop, e.g. by dropping the listening socket), join the
	/// serve thread if one was started, then run `cleanup`.
	pub fn terminate(&self, shutdown: impl FnOnce(), cleanup: impl FnOnce()) {
		self.terminate.set();
		shutdown();

		let handle = {
			let mut guard = self.state.lock().unwrap();
			guard.join_handle.take()
		};
		if let Some(handle) = handle {
			let _ = handle.join();
		}

		cleanup();
	}
}

impl Default for Lifecycle {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[test]
	fn double_start_only_spawns_once() {
		let lc = Arc::new(Lifecycle::new());
		let runs = Arc::new(AtomicUsize::new(0));

		for _ in 0..3 {
			let runs = runs.clone();
			let term = lc.terminate_event();
			lc.start_threaded(move || {
				runs.fetch_add(1, Ordering::SeqCst);
				while !term.wait_timeout(Duration::from_millis(10)) {}
			});
		}

		lc.terminate(|| {}, || {});
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn terminate_before_start_prevents_spawn() {
		let lc = Lifecycle::new();
		lc.terminate(|| {}, || {});

		let ran = Arc::new(AtomicUsize::new(0));
		let ran2 = ran.clone();
		lc.start_threaded(move || {
			ran2.fetch_add(1, Ordering::SeqCst);
		});
		std::thread::sleep(Duration::from_millis(20));
		assert_eq!(ran.load(Ordering::SeqCst), 0);
	}
}

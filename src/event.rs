use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A process-wide, settable-once-observed-everywhere flag, analogous to
/// Python's `threading.Event`. Observed by the accept loop, the
/// request-line reader (bounded wait with poll granularity), and any user
/// code that chooses to poll it.
pub struct TerminateEvent {
	flag: Mutex<bool>,
	cv: Condvar,
}

impl TerminateEvent {
	pub fn new() -> Self {
		Self {
			flag: Mutex::new(false),
			cv: Condvar::new(),
		}
	}

	pub fn set(&self) {
		let mut guard = self.flag.lock().unwrap();
		*guard = true;
		self.cv.notify_all();
	}

	pub fn is_set(&self) -> bool {
		*self.flag.lock().unwrap()
	}

	/// Block up to `timeout`, waking early if the event is set. Returns
	/// whether the event was set by the time the call returned.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let guard = self.flag.lock().unwrap();
		if *guard {
			return true;
		}
		let (guard, _) = self.cv.wait_timeout(guard, timeout).unwrap();
		*guard
	}
}

impl Default for TerminateEvent {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::thread;
	use std::time::Instant;

	#[test]
	fn wait_timeout_returns_false_when_not_set() {
		let ev = TerminateEvent::new();
		let start = Instant::now();
		assert!(!ev.wait_timeout(Duration::from_millis(50)));
		assert!(start.elapsed() >= Duration::from_millis(40));
	}

	#[test]
	fn set_wakes_waiters_immediately() {
		let ev = Arc::new(TerminateEvent::new());
		let ev2 = ev.clone();
		let handle = thread::spawn(move || ev2.wait_timeout(Duration::from_secs(5)));
		thread::sleep(Duration::from_millis(20));
		ev.set();
		assert!(handle.join().unwrap());
	}
}

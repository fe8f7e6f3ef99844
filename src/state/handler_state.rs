use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

/// Thread-safe, server-scoped key/value store shared across every
/// connection and request.
///
/// Values are type-erased; callers retrieve them with [`HandlerState::get`]
/// and a turbofish / inference on the expected concrete type. Lifecycle:
/// created once alongside the server, lives as long as the server does.
pub struct HandlerState {
	store: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl HandlerState {
	pub fn new() -> Self {
		log::debug!("handler state initialized");
		Self {
			store: Mutex::new(HashMap::new()),
		}
	}

	/// Store `value` under `key`, overwriting any prior value.
	pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
		let key = key.into();
		self.store.lock().unwrap().insert(key.clone(), Box::new(value));
		log::info!("handler state key {} created", key);
	}

	/// Fetch a reference to the value stored under `key`, cloned out via `f`,
	/// if present and of the expected type.
	pub fn get<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
		let guard = self.store.lock().unwrap();
		guard.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
	}

	/// True if `key` is present, regardless of its type.
	pub fn contains(&self, key: &str) -> bool {
		self.store.lock().unwrap().contains_key(key)
	}

	pub fn remove(&self, key: &str) {
		self.store.lock().unwrap().remove(key);
	}
}

impl Default for HandlerState {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_then_get_roundtrips() {
		let state = HandlerState::new();
		state.set("count", 42i64);
		assert_eq!(state.get::<i64>("count"), Some(42));
	}

	#[test]
	fn missing_key_is_none() {
		let state = HandlerState::new();
		assert_eq!(state.get::<i64>("missing"), None);
	}

	#[test]
	fn wrong_type_is_none() {
		let state = HandlerState::new();
		state.set("count", 42i64);
		assert_eq!(state.get::<String>("count"), None);
	}
}

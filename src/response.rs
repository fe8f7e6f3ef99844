/// An ordered multi-map of header name to one-or-more values, preserving
/// insertion order so the wire serialization emits one line per value in
/// the order headers were added.
#[derive(Debug, Default, Clone)]
pub struct HeaderMap {
	// Kept as a Vec of (name, values) rather than a HashMap so insertion
	// order survives to the wire, matching the pre-handler's serialization
	// contract.
	entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
	pub fn new() -> Self {
		Self::default()
	}

	fn find(&self, key: &str) -> Option<usize> {
		self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))
	}

	/// Append `value` to the list for `key`, creating the entry if absent.
	pub fn add(&mut self, key: &str, value: impl Into<String>) {
		if let Some(idx) = self.find(key) {
			self.entries[idx].1.push(value.into());
		} else {
			self.entries.push((key.to_string(), vec![value.into()]));
		}
	}

	/// Replace the entire value list for `key`.
	pub fn set(&mut self, key: &str, values: Vec<String>) {
		if let Some(idx) = self.find(key) {
			self.entries[idx].1 = values;
		} else {
			self.entries.push((key.to_string(), values));
		}
	}

	pub fn get(&self, key: &str) -> Option<&[String]> {
		self.find(key).map(|idx| self.entries[idx].1.as_slice())
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Iterate header entries in insertion order, one `(name, value)` pair
	/// per wire line.
	pub fn lines(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries
			.iter()
			.flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
	}
}

/// The mutable response object owned by a single request's pre-handler
/// until it has been written to the wire.
///
/// Invariant: `was_sent` transitions `false` -> `true` exactly once per
/// request.
#[derive(Debug, Clone)]
pub struct Response {
	pub status_code: u16,
	pub headers: HeaderMap,
	pub body: Option<Vec<u8>>,
	pub was_sent: bool,
}

impl Default for Response {
	fn default() -> Self {
		Self {
			status_code: 500,
			headers: HeaderMap::new(),
			body: None,
			was_sent: false,
		}
	}
}

impl Response {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reset(&mut self) {
		self.headers.clear();
		self.body = None;
		self.status_code = 500;
		self.was_sent = false;
	}

	pub fn set_json_body(&mut self, data: &serde_json::Value, indent: Option<usize>, status_code: Option<u16>) -> serde_json::Result<()> {
		let body = match indent {
			Some(n) => {
				let buf = Vec::new();
				let formatter = serde_json::ser::PrettyFormatter::with_indent(" ".repeat(n).as_bytes());
				let mut ser = serde_json::Serializer::with_formatter(buf, formatter);
				serde::Serialize::serialize(data, &mut ser)?;
				ser.into_inner()
			}
			None => serde_json::to_vec(data)?,
		};
		self.headers.add("Content-Type", "application/json");
		self.headers.set("Content-Length", vec![body.len().to_string()]);
		self.body = Some(body);
		if let Some(code) = status_code {
			self.status_code = code;
		}
		Ok(())
	}

	pub fn set_code_and_text(&mut self, code: u16, message: &str) {
		self.status_code = code;
		let body = message.as_bytes().to_vec();
		self.headers.set("Content-Length", vec![body.len().to_string()]);
		self.headers.add("Content-Type", "text/plain");
		self.body = Some(body);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_map_preserves_insertion_order_and_multi_values() {
		let mut h = HeaderMap::new();
		h.add("Set-Cookie", "a=1");
		h.add("X-Foo", "bar");
		h.add("Set-Cookie", "b=2");
		let lines: Vec<_> = h.lines().collect();
		assert_eq!(
			lines,
			vec![("Set-Cookie", "a=1"), ("Set-Cookie", "b=2"), ("X-Foo", "bar")]
		);
	}

	#[test]
	fn set_code_and_text_sets_content_length() {
		let mut r = Response::new();
		r.set_code_and_text(403, "Forbidden");
		assert_eq!(r.status_code, 403);
		assert_eq!(r.headers.get("Content-Length"), Some(&["9".to_string()][..]));
		assert_eq!(r.body.as_deref(), Some(b"Forbidden".as_slice()));
	}

	#[test]
	fn reset_restores_defaults() {
		let mut r = Response::new();
		r.set_code_and_text(403, "Forbidden");
		r.was_sent = true;
		r.reset();
		assert_eq!(r.status_code, 500);
		assert!(r.body.is_none());
		assert!(!r.was_sent);
	}
}

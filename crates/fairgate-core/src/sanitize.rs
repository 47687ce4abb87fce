//! Value Sanitizer
//!
//! Recursively reduces values to a constrained printable character set. The
//! limiter uses it to clean client address strings before they become part of
//! a fingerprint key, but it accepts arbitrary nested values.
//!
//! Cleaning a string strips low control characters (newline and carriage
//! return survive), then drops every character outside printable ASCII,
//! Latin-1, the optional raw control range and a small typographic allow-list.
//! If anything non-ASCII is left after that the string is uncleanable.

/// Typographic code points that survive filtering (Œ œ Š š Ÿ ƒ – — ‘ ’ ‚ “ ” „ † ‡ • … ‰ € ™)
const ALLOW_LIST: [u32; 21] = [
	338, 339, 352, 353, 376, 402, 8211, 8212, 8216, 8217, 8218, 8220, 8221, 8222, 8224, 8225,
	8226, 8230, 8240, 8364, 8482,
];

/// A value that can be cleaned
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Array(Vec<Value>),
	/// Ordered map with arbitrary keys
	Map(Vec<(Value, Value)>),
	/// Key-value record with string keys
	Record(Vec<(String, Value)>),
	Pattern {
		source: String,
		flags: String,
	},
	Symbol(String),
	/// Arbitrary-precision integer in textual form
	BigInt(String),
}

impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Value::String(s),
			serde_json::Value::Array(items) => {
				Value::Array(items.into_iter().map(Value::from).collect())
			}
			serde_json::Value::Object(obj) => {
				Value::Record(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
			}
		}
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

/// Clean a value. `None` means the value cannot be reduced to the permitted
/// character set.
///
/// Nested elements that fail to clean are replaced by [`Value::Null`];
/// record and map entries whose key fails are dropped.
pub fn clean(value: &Value, allow_control_chars: bool) -> Option<Value> {
	match value {
		Value::Null => Some(Value::Null),
		Value::Bool(b) => Some(Value::Bool(*b)),
		Value::Number(n) => Some(Value::Number(*n)),
		Value::String(s) => clean_str(s, allow_control_chars).map(Value::String),
		Value::Array(items) => Some(Value::Array(
			items.iter().map(|item| clean_nested(item, allow_control_chars)).collect(),
		)),
		Value::Map(entries) => Some(Value::Map(
			entries
				.iter()
				.filter_map(|(k, v)| {
					let key = clean(k, allow_control_chars)?;
					Some((key, clean_nested(v, allow_control_chars)))
				})
				.collect(),
		)),
		Value::Record(entries) => Some(Value::Record(
			entries
				.iter()
				.filter_map(|(k, v)| {
					let key = clean_str(k, allow_control_chars)?;
					Some((key, clean_nested(v, allow_control_chars)))
				})
				.collect(),
		)),
		Value::Pattern { source, flags } => {
			let source = clean_str(source, allow_control_chars).filter(|s| !s.is_empty())?;
			let flags = clean_str(flags, allow_control_chars).unwrap_or_default();
			Some(Value::Pattern { source, flags })
		}
		Value::Symbol(desc) => clean_str(desc, allow_control_chars).map(Value::Symbol),
		Value::BigInt(text) => clean_bigint(text).map(Value::BigInt),
	}
}

fn clean_nested(value: &Value, allow_control_chars: bool) -> Value {
	clean(value, allow_control_chars).unwrap_or(Value::Null)
}

/// Clean a single string
pub fn clean_str(input: &str, allow_control_chars: bool) -> Option<String> {
	let stripped: String = input.chars().filter(|c| !is_low_control(*c)).collect();
	if stripped.is_ascii() {
		return Some(stripped);
	}

	let output: String =
		stripped.chars().filter(|c| is_allowed(*c, allow_control_chars)).collect();
	output.is_ascii().then_some(output)
}

fn is_low_control(c: char) -> bool {
	matches!(c, '\x00'..='\x09' | '\x0B' | '\x0C' | '\x0E'..='\x1F' | '\x7F')
}

fn is_allowed(c: char, allow_control_chars: bool) -> bool {
	let code = u32::from(c);
	(allow_control_chars && code <= 31)
		|| (32..=127).contains(&code)
		|| (160..=255).contains(&code)
		|| ALLOW_LIST.contains(&code)
}

fn clean_bigint(text: &str) -> Option<String> {
	let kept: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '-' || *c == '+').collect();
	let digits = kept.strip_prefix(['-', '+']).unwrap_or(&kept);
	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	Some(kept)
}


// vim: ts=4

//! Transport encoding for cache values.
//!
//! Values leave the process as bytes. Composite values (sequences and
//! mappings) are serialized into a tagged text format; plain scalars pass
//! through as their textual form. A scalar whose text already *looks* like
//! a serialized payload is serialized again, so the next read can tell "a
//! string that happens to look serialized" apart from "an actually
//! serialized string".
//!
//! Detection is a structural heuristic over the tagged grammar, not a full
//! parse: false negatives leave the value as-is, false positives are the
//! accepted risk of auto-detection.
//!
//! When the alternate binary codec is enabled, every value is encoded as
//! MessagePack instead, unconditionally.
//!
//! # Tagged grammar
//!
//! | tag | form                         |
//! |-----|------------------------------|
//! | `N` | `N;`                         |
//! | `b` | `b:0;` / `b:1;`              |
//! | `i` | `i:<int>;`                   |
//! | `d` | `d:<float>;`                 |
//! | `s` | `s:<bytelen>:"<raw>";`       |
//! | `a` | `a:<count>:{<item>...}`      |
//! | `o` | `o:<count>:{<skey><value>...}` |

use serde_json::Value;

/// Encodes and decodes values for transport to a byte-oriented store.
#[derive(Debug, Clone, Default)]
pub struct ValueCodec {
    binary: bool,
}

impl ValueCodec {
    /// Create a codec. With `binary` set, the MessagePack fast path is
    /// used unconditionally in both directions.
    pub fn new(binary: bool) -> Self {
        Self { binary }
    }

    /// Encode a value into its transport form.
    pub fn encode(&self, value: &Value) -> Vec<u8> {
        if self.binary {
            match rmp_serde::to_vec(value) {
                Ok(bytes) => return bytes,
                // Unencodable values fall back to the tagged format.
                Err(_) => return tagged::to_string(value).into_bytes(),
            }
        }

        match value {
            Value::Array(_) | Value::Object(_) => tagged::to_string(value).into_bytes(),
            Value::String(s) if looks_serialized(s, false) => {
                tagged::to_string(value).into_bytes()
            }
            Value::String(s) => s.clone().into_bytes(),
            Value::Null => Vec::new(),
            Value::Bool(b) => {
                let text = if *b { "true" } else { "false" };
                text.as_bytes().to_vec()
            }
            Value::Number(n) => n.to_string().into_bytes(),
        }
    }

    /// Decode a transport value. Anything that does not positively look
    /// serialized comes back unchanged as a string.
    pub fn decode(&self, raw: &[u8]) -> Value {
        if self.binary {
            if let Ok(value) = rmp_serde::from_slice::<Value>(raw) {
                return value;
            }
            return Value::String(String::from_utf8_lossy(raw).into_owned());
        }

        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(_) => return Value::String(String::from_utf8_lossy(raw).into_owned()),
        };

        if looks_serialized(text, true) {
            // A parse failure here is a detection false positive; keep the
            // original text.
            if let Some(value) = tagged::parse(text.trim()) {
                return value;
            }
        }

        Value::String(text.to_string())
    }
}

/// Structural check for the tagged serialization grammar.
///
/// In strict mode the payload must end at the terminator. Non-strict mode
/// tolerates trailing content, which detects a serialized value embedded in
/// something else.
pub fn looks_serialized(text: &str, strict: bool) -> bool {
    let data = text.trim();
    if data == "N;" {
        return true;
    }
    if data.len() < 4 {
        return false;
    }
    let bytes = data.as_bytes();
    if bytes[1] != b':' {
        return false;
    }
    if strict {
        let last = bytes[bytes.len() - 1];
        if last != b';' && last != b'}' {
            return false;
        }
    }

    match bytes[0] {
        b's' => {
            let closed = if strict {
                data.ends_with("\";")
            } else {
                data.contains("\";")
            };
            closed && has_length_prefix(bytes)
        }
        b'a' | b'o' => {
            let closed = if strict {
                data.ends_with('}')
            } else {
                data.contains('}')
            };
            closed && has_length_prefix(bytes)
        }
        b'b' | b'i' | b'd' => numeric_payload(&bytes[2..], strict),
        _ => false,
    }
}

/// `tag:<digits>:` prefix shared by the `s`, `a`, and `o` tags.
fn has_length_prefix(bytes: &[u8]) -> bool {
    let rest = &bytes[2..];
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    digits > 0 && rest.get(digits) == Some(&b':')
}

/// `<numeric>;` payload for the `b`, `i`, and `d` tags.
fn numeric_payload(rest: &[u8], strict: bool) -> bool {
    let numeric = rest
        .iter()
        .take_while(|b| matches!(b, b'0'..=b'9' | b'.' | b'E' | b'e' | b'+' | b'-'))
        .count();
    if numeric == 0 || rest.get(numeric) != Some(&b';') {
        return false;
    }
    !strict || numeric + 1 == rest.len()
}

/// The tagged text format itself.
pub(crate) mod tagged {
    use serde_json::{Map, Value};
    use std::fmt::Write as _;

    /// Serialize a value into the tagged format.
    pub fn to_string(value: &Value) -> String {
        let mut out = String::new();
        write_value(&mut out, value);
        out
    }

    fn write_value(out: &mut String, value: &Value) {
        match value {
            Value::Null => out.push_str("N;"),
            Value::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    let _ = write!(out, "i:{i};");
                } else if let Some(u) = n.as_u64() {
                    let _ = write!(out, "i:{u};");
                } else if let Some(f) = n.as_f64() {
                    let _ = write!(out, "d:{f};");
                }
            }
            Value::String(s) => write_string(out, s),
            Value::Array(items) => {
                let _ = write!(out, "a:{}:{{", items.len());
                for item in items {
                    write_value(out, item);
                }
                out.push('}');
            }
            Value::Object(map) => {
                let _ = write!(out, "o:{}:{{", map.len());
                for (key, item) in map {
                    write_string(out, key);
                    write_value(out, item);
                }
                out.push('}');
            }
        }
    }

    fn write_string(out: &mut String, s: &str) {
        let _ = write!(out, "s:{}:\"{s}\";", s.len());
    }

    /// Parse a tagged payload. Returns `None` on any grammar violation.
    pub fn parse(text: &str) -> Option<Value> {
        let mut parser = Parser {
            input: text.as_bytes(),
            pos: 0,
        };
        let value = parser.value()?;
        if parser.pos != parser.input.len() {
            return None;
        }
        Some(value)
    }

    struct Parser<'a> {
        input: &'a [u8],
        pos: usize,
    }

    impl<'a> Parser<'a> {
        fn value(&mut self) -> Option<Value> {
            match self.peek()? {
                b'N' => {
                    self.expect(b"N;")?;
                    Some(Value::Null)
                }
                b'b' => {
                    self.expect(b"b:")?;
                    let flag = self.take(1)?;
                    self.expect(b";")?;
                    match flag {
                        b"0" => Some(Value::Bool(false)),
                        b"1" => Some(Value::Bool(true)),
                        _ => None,
                    }
                }
                b'i' => {
                    self.expect(b"i:")?;
                    let digits = self.until(b';')?;
                    let text = std::str::from_utf8(digits).ok()?;
                    text.parse::<i64>().ok().map(Value::from)
                }
                b'd' => {
                    self.expect(b"d:")?;
                    let digits = self.until(b';')?;
                    let text = std::str::from_utf8(digits).ok()?;
                    text.parse::<f64>().ok().and_then(|f| {
                        serde_json::Number::from_f64(f).map(Value::Number)
                    })
                }
                b's' => self.string().map(Value::String),
                b'a' => {
                    let count = self.container_header(b'a')?;
                    let mut items = Vec::with_capacity(count);
                    for _ in 0..count {
                        items.push(self.value()?);
                    }
                    self.expect(b"}")?;
                    Some(Value::Array(items))
                }
                b'o' => {
                    let count = self.container_header(b'o')?;
                    let mut map = Map::new();
                    for _ in 0..count {
                        let key = self.string()?;
                        let value = self.value()?;
                        map.insert(key, value);
                    }
                    self.expect(b"}")?;
                    Some(Value::Object(map))
                }
                _ => None,
            }
        }

        /// `s:<bytelen>:"<raw>";`
        fn string(&mut self) -> Option<String> {
            self.expect(b"s:")?;
            let len = self.length()?;
            self.expect(b":\"")?;
            let raw = self.take(len)?;
            let text = std::str::from_utf8(raw).ok()?.to_string();
            self.expect(b"\";")?;
            Some(text)
        }

        /// `<tag>:<count>:{`
        fn container_header(&mut self, tag: u8) -> Option<usize> {
            self.expect(&[tag, b':'])?;
            let count = self.length()?;
            self.expect(b":{")?;
            Some(count)
        }

        fn length(&mut self) -> Option<usize> {
            let digits = self
                .input
                .get(self.pos..)?
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if digits == 0 {
                return None;
            }
            let raw = self.take(digits)?;
            std::str::from_utf8(raw).ok()?.parse().ok()
        }

        fn peek(&self) -> Option<u8> {
            self.input.get(self.pos).copied()
        }

        fn expect(&mut self, token: &[u8]) -> Option<()> {
            let end = self.pos.checked_add(token.len())?;
            if self.input.get(self.pos..end)? == token {
                self.pos = end;
                Some(())
            } else {
                None
            }
        }

        fn take(&mut self, len: usize) -> Option<&'a [u8]> {
            let end = self.pos.checked_add(len)?;
            let slice = self.input.get(self.pos..end)?;
            self.pos = end;
            Some(slice)
        }

        fn until(&mut self, stop: u8) -> Option<&'a [u8]> {
            let offset = self.input.get(self.pos..)?.iter().position(|b| *b == stop)?;
            let slice = self.take(offset)?;
            self.pos += 1; // consume the stop byte
            Some(slice)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_canonical_forms() {
        for payload in [
            "N;",
            "b:1;",
            "b:0;",
            "i:42;",
            "i:-7;",
            "d:1.5;",
            "s:3:\"abc\";",
            "a:1:{i:7;}",
            "o:1:{s:1:\"v\";i:7;}",
        ] {
            assert!(looks_serialized(payload, true), "strict: {payload}");
            assert!(looks_serialized(payload, false), "lenient: {payload}");
        }
    }

    #[test]
    fn rejects_plain_text() {
        for payload in ["", "hi", "hello world", "42", "3.14", "true", "s:3", "x:1;", "s;3:"] {
            assert!(!looks_serialized(payload, true), "strict: {payload}");
            assert!(!looks_serialized(payload, false), "lenient: {payload}");
        }
    }

    #[test]
    fn lenient_mode_tolerates_trailing_content() {
        assert!(!looks_serialized("s:3:\"abc\";extra", true));
        assert!(looks_serialized("s:3:\"abc\";extra", false));
        assert!(!looks_serialized("i:42;extra", true));
        assert!(looks_serialized("i:42;extra", false));
    }

    #[test]
    fn composite_values_round_trip() {
        let codec = ValueCodec::new(false);
        let value = json!({"version": "1.2", "tested": true, "requires": ["wp", "php"]});
        let encoded = codec.encode(&value);
        assert_eq!(codec.decode(&encoded), value);
    }

    #[test]
    fn nested_containers_round_trip() {
        let codec = ValueCodec::new(false);
        let value = json!([1, [2, 3], {"deep": {"deeper": null}}]);
        assert_eq!(codec.decode(&codec.encode(&value)), value);
    }

    #[test]
    fn plain_strings_pass_through() {
        let codec = ValueCodec::new(false);
        let encoded = codec.encode(&json!("hello"));
        assert_eq!(encoded, b"hello");
        assert_eq!(codec.decode(&encoded), json!("hello"));
    }

    #[test]
    fn serialized_looking_strings_are_double_encoded() {
        let codec = ValueCodec::new(false);
        let tricky = json!("i:42;");
        let encoded = codec.encode(&tricky);
        // Wrapped in the string tag so the read side is unambiguous.
        assert_eq!(encoded, b"s:5:\"i:42;\";");
        assert_eq!(codec.decode(&encoded), tricky);
    }

    #[test]
    fn scalars_narrow_to_text() {
        let codec = ValueCodec::new(false);
        assert_eq!(codec.encode(&json!(42)), b"42");
        assert_eq!(codec.decode(b"42"), json!("42"));
        assert_eq!(codec.encode(&json!(true)), b"true");
        assert_eq!(codec.encode(&Value::Null), b"");
    }

    #[test]
    fn binary_codec_round_trips_everything() {
        let codec = ValueCodec::new(true);
        for value in [
            json!(42),
            json!("hello"),
            json!({"version": "1.2"}),
            json!([1, 2, 3]),
            Value::Null,
        ] {
            assert_eq!(codec.decode(&codec.encode(&value)), value, "{value}");
        }
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        for payload in [
            "s:99:\"abc\";",
            "a:2:{i:1;}",
            "o:1:{i:1;i:2;}",
            "i:notanum;",
            "b:2;",
            "a:1:{i:1;}trailing",
        ] {
            assert!(tagged::parse(payload).is_none(), "{payload}");
        }
    }

    #[test]
    fn false_positive_detection_degrades_to_string() {
        let codec = ValueCodec::new(false);
        // Looks serialized to the heuristic, fails to parse: returned as-is.
        let raw = b"s:99:\"abc\";";
        assert_eq!(codec.decode(raw), json!("s:99:\"abc\";"));
    }

    #[test]
    fn unicode_strings_use_byte_lengths() {
        let codec = ValueCodec::new(false);
        let value = json!({"name": "héllo"});
        assert_eq!(codec.decode(&codec.encode(&value)), value);
    }
}

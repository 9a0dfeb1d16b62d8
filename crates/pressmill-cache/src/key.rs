//! Derivation of backend-safe cache keys.
//!
//! Logical keys supplied by callers are sanitized (the namespace separator
//! is replaced) and salted with a configured prefix before they reach a
//! backend. Backends with a key length cap get the tail of the derived key;
//! an oversized prefix can be silently cut off under pathological
//! configurations, which is accepted rather than fixed.

/// Separator between the prefix and the sanitized logical key.
pub const KEY_SEPARATOR: char = ':';

/// Replacement for separator characters found inside logical keys.
pub const KEY_SAFE_CHAR: char = '-';

/// Derives backend-safe keys from logical keys.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    prefix: String,
    max_len: Option<usize>,
}

impl KeyDeriver {
    /// Create a deriver with the given prefix ("salt") and optional
    /// backend key length cap in bytes.
    pub fn new(prefix: impl Into<String>, max_len: Option<usize>) -> Self {
        Self {
            prefix: prefix.into(),
            max_len,
        }
    }

    /// Replace every namespace separator in a logical key so it can never
    /// be mistaken for a multi-segment namespaced key.
    pub fn sanitize(raw: &str) -> String {
        raw.replace(KEY_SEPARATOR, &KEY_SAFE_CHAR.to_string())
    }

    /// Derive the key actually sent to the backend: `prefix:sanitized`,
    /// truncated from the start when the backend caps key length.
    pub fn derive(&self, raw: &str) -> String {
        let sanitized = Self::sanitize(raw);
        let mut derived = if self.prefix.is_empty() {
            sanitized
        } else {
            format!("{}{}{}", self.prefix, KEY_SEPARATOR, sanitized)
        };

        if let Some(max) = self.max_len {
            if derived.len() > max {
                let mut cut = derived.len() - max;
                while !derived.is_char_boundary(cut) {
                    cut += 1;
                }
                derived = derived.split_off(cut);
            }
        }

        derived
    }

    /// The configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

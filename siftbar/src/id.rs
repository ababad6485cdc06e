use std::fmt;

use nanoid::nanoid;

/// Alphabet for instance handles (lowercase, no ambiguous glyphs).
const HANDLE_ALPHABET: &[char] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const HANDLE_LENGTH: usize = 12;

/// Opaque handle identifying one mounted component instance. Replaces the
/// timestamp-suffixed element ids the host framework would otherwise need to
/// keep concurrently rendered views apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn generate() -> Self {
        Self(nanoid!(HANDLE_LENGTH, HANDLE_ALPHABET))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use std::fmt;

/// Display form of a byte string.
///
/// Valid UTF-8 is kept as is. Anything else is decoded lossily, with every
/// invalid sequence replaced by U+FFFD, and the value is flagged so callers
/// can report the degradation. Torrents made by older clients often store
/// names in a legacy code page, so this is never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    value: String,
    lossy: bool,
}

impl Text {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => Text { value: s.to_owned(), lossy: false },
            Err(_) => Text { value: String::from_utf8_lossy(bytes).into_owned(), lossy: true },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Text { value: value.to_owned(), lossy: false }
    }
}

impl From<String> for Text {
    fn from(value: String) -> Self {
        Text { value, lossy: false }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Upper bound, in characters, on any captured tool output.
pub const MAX_LOG_LENGTH: usize = 6000;

/// Tail-keeping text buffer for subprocess output.
///
/// Bytes are decoded as UTF-8 as they arrive. A multi-byte sequence split
/// across two chunks is held back until the rest of it shows up, and invalid
/// bytes become U+FFFD. Once the decoded text grows past `capacity`
/// characters, the oldest characters are dropped.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    text: String,
    chars: usize,
    capacity: usize,
    pending: Vec<u8>,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_LENGTH)
    }
}

impl DiagnosticLog {
    pub fn with_capacity(capacity: usize) -> Self {
        DiagnosticLog {
            text: String::new(),
            chars: 0,
            capacity,
            pending: Vec::new(),
        }
    }

    pub fn push_str(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        self.chars += chunk.chars().count();

        if self.chars > self.capacity {
            let excess = self.chars - self.capacity;
            let cut = self
                .text
                .char_indices()
                .nth(excess)
                .map(|(idx, _)| idx)
                .unwrap_or(self.text.len());
            self.text.drain(..cut);
            self.chars = self.capacity;
        }
    }

    pub fn push_bytes(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to always lands on a char boundary
                    self.push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match err.error_len() {
                        Some(bad) => {
                            self.push_str(char::REPLACEMENT_CHARACTER.encode_utf8(&mut [0; 4]));
                            rest = &after[bad..];
                        }
                        None => {
                            // Truncated sequence at the end, wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Flushes a dangling partial sequence, if any, as U+FFFD.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.push_str(char::REPLACEMENT_CHARACTER.encode_utf8(&mut [0; 4]));
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    /// Trimmed contents, or `fallback` when nothing but whitespace was captured.
    pub fn message_or(&self, fallback: &str) -> String {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

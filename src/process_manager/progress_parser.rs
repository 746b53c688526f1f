//! Incremental decoding of worker stdout into progress and log events.
//!
//! Output arrives in arbitrary fragments, so bytes are buffered until a `\n`
//! is seen and only complete lines are classified. Lines are decoded lossily;
//! a multi-byte character split across chunks is reassembled before decoding.

pub const PROGRESS_PREFIX: &str = "PROGRESS:";

/// Unterminated output beyond this is flushed as a line of its own
pub const MAX_PENDING_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Progress(u8),
    /// `PROGRESS:` with a token that is not an integer in `[0, 100]`
    MalformedProgress(String),
    Log(String),
}

/// Classify one complete line. Blank lines yield nothing.
pub fn classify_line(line: &str) -> Option<ParsedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Some(token) = trimmed.strip_prefix(PROGRESS_PREFIX) else {
        return Some(ParsedLine::Log(trimmed.to_string()));
    };

    let token = token.trim();
    match token.parse::<i64>() {
        Ok(value) if (0..=100).contains(&value) => Some(ParsedLine::Progress(value as u8)),
        _ => Some(ParsedLine::MalformedProgress(token.to_string())),
    }
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(decode_line(&self.pending));
            self.pending.clear();
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        if self.pending.len() >= MAX_PENDING_LINE_BYTES {
            lines.push(self.flush_overlong());
        }

        lines
    }

    /// Cut the pending bytes into a line, holding back a trailing partial
    /// UTF-8 sequence for the next chunk.
    fn flush_overlong(&mut self) -> String {
        let cut = match std::str::from_utf8(&self.pending) {
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            _ => self.pending.len(),
        };
        let tail = self.pending.split_off(cut);
        let line = decode_line(&self.pending);
        self.pending = tail;
        line
    }

    /// Flush an unterminated trailing line at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    Progress(u8),
    MalformedProgress(String),
    Log(String),
}

/// Line buffering plus classification, with percent kept non-decreasing
#[derive(Debug, Default)]
pub struct ProgressParser {
    lines: LineBuffer,
    last_percent: Option<u8>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParserEvent> {
        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            self.handle_line(&line, &mut events);
        }
        events
    }

    pub fn finish(&mut self) -> Vec<ParserEvent> {
        let mut events = Vec::new();
        if let Some(line) = self.lines.finish() {
            self.handle_line(&line, &mut events);
        }
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<ParserEvent>) {
        match classify_line(line) {
            None => {}
            Some(ParsedLine::Progress(percent)) => {
                if self.last_percent.is_some_and(|last| percent < last) {
                    log::debug!(
                        "Ignoring out-of-order progress {} (last {:?})",
                        percent,
                        self.last_percent
                    );
                    return;
                }
                self.last_percent = Some(percent);
                events.push(ParserEvent::Progress(percent));
            }
            Some(ParsedLine::MalformedProgress(token)) => {
                events.push(ParserEvent::MalformedProgress(token));
            }
            Some(ParsedLine::Log(text)) => events.push(ParserEvent::Log(text)),
        }
    }
}

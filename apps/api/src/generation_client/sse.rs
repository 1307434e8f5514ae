//! Incremental decoder for the writer's `text/event-stream` output.
//!
//! Bytes arrive in arbitrary chunks; complete lines are parsed as they become
//! available and a blank line closes the current event. The event type is kept
//! across events until a new `event:` field replaces it.

/// Event type that carries content.
pub const EVENT_ADD: &str = "add";
/// Event type that terminates the stream.
pub const EVENT_END: &str = "end";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Joined `data:` lines of one content event.
    Data(String),
    End,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event_type: String,
    data_lines: Vec<String>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the frames completed by `chunk`. Input after an `end` event
    /// is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    let end = frame == SseFrame::End;
                    frames.push(frame);
                    if end {
                        self.finished = true;
                        self.buffer.clear();
                        break;
                    }
                }
                continue;
            }

            if let Some((field, value)) = line.split_once(':') {
                match field.trim() {
                    "event" => self.event_type = value.trim().to_string(),
                    "data" => self.data_lines.push(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let lines = std::mem::take(&mut self.data_lines);
        match self.event_type.as_str() {
            EVENT_ADD if !lines.is_empty() => Some(SseFrame::Data(lines.join("\n"))),
            EVENT_END => Some(SseFrame::End),
            _ => None,
        }
    }
}

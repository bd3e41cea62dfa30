//! Where user-visible output goes: streamed fragments, sentinels, command
//! echoes and the command-cap warning.

use std::io::Write;
use std::sync::Mutex;

pub trait OutputSink: Send + Sync {
    fn emit(&self, text: &str);

    fn emit_line(&self, text: &str) {
        self.emit(text);
        self.emit("\n");
    }
}

/// Writes straight to the terminal, flushing after every fragment.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Collects output in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl OutputSink for BufferSink {
    fn emit(&self, text: &str) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_str(text);
        }
    }
}

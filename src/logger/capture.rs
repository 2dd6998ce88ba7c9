//! In-memory log sink for tests

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Cloneable writer; every clone appends to the same buffer
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    /// Parsed JSON lines written so far
    pub fn lines(&self) -> Vec<serde_json::Value> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for CaptureSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

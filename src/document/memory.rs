//! In-memory text buffer. Used by tests and by embedders that own their text.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{apply_edit, DocumentResult, Edit, TextBuffer};

#[derive(Debug)]
pub struct MemoryBuffer {
    uri: String,
    text: Mutex<String>,
}

impl MemoryBuffer {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: Mutex::new(text.into()),
        }
    }

    /// Current text, read synchronously.
    pub fn snapshot(&self) -> String {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TextBuffer for MemoryBuffer {
    fn uri(&self) -> String {
        self.uri.clone()
    }

    async fn text(&self) -> DocumentResult<String> {
        Ok(self.snapshot())
    }

    async fn apply(&self, edit: Edit) -> DocumentResult<()> {
        let mut text = self.text.lock().unwrap_or_else(|e| e.into_inner());
        *text = apply_edit(&text, &edit)?;
        Ok(())
    }
}

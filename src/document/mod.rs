//! Document editing — append generated text to the end of an open buffer.
//!
//! The host editor's buffer is a black box behind [`TextBuffer`]: it hands out
//! the text and applies one atomic [`Edit`] at a time. [`DocumentEditor`] builds
//! the append operations on top and serializes them per document.

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

pub use file::FileBuffer;
pub use memory::MemoryBuffer;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to persist edit: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("line {line} out of range (document has {line_count} lines)")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("column {column} is not a valid position on line {line}")]
    InvalidColumn { line: usize, column: usize },
}

pub type DocumentResult<T> = Result<T, DocumentError>;

// ── Edits ──

/// Zero-based line, byte column within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A single buffer edit. Applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { at: Position, text: String },
    Replace { start: Position, end: Position, text: String },
}

/// Host text buffer: read the text, apply one edit atomically.
#[async_trait]
pub trait TextBuffer: Send + Sync {
    /// Stable URI for the document (used to derive its identifier).
    fn uri(&self) -> String;

    /// Full current text.
    async fn text(&self) -> DocumentResult<String>;

    /// Apply an edit. Either the whole edit lands or nothing changes.
    async fn apply(&self, edit: Edit) -> DocumentResult<()>;
}

/// Byte offset of `pos` in `text`, validating line and column.
fn offset_of(text: &str, pos: Position) -> DocumentResult<usize> {
    let mut line_start = 0;
    let mut lines = text.split('\n');
    let line_count = text.split('\n').count();

    for _ in 0..pos.line {
        match lines.next() {
            Some(l) => line_start += l.len() + 1,
            None => break,
        }
    }
    let line = lines.next().ok_or(DocumentError::LineOutOfRange {
        line: pos.line,
        line_count,
    })?;

    if pos.column > line.len() || !line.is_char_boundary(pos.column) {
        return Err(DocumentError::InvalidColumn {
            line: pos.line,
            column: pos.column,
        });
    }
    Ok(line_start + pos.column)
}

/// Compute the text that results from applying `edit`. Pure; buffers call this
/// and then swap the result in.
pub fn apply_edit(text: &str, edit: &Edit) -> DocumentResult<String> {
    match edit {
        Edit::Insert { at, text: insert } => {
            let at = offset_of(text, *at)?;
            let mut out = String::with_capacity(text.len() + insert.len());
            out.push_str(&text[..at]);
            out.push_str(insert);
            out.push_str(&text[at..]);
            Ok(out)
        }
        Edit::Replace {
            start,
            end,
            text: replacement,
        } => {
            let start = offset_of(text, *start)?;
            let end = offset_of(text, *end)?;
            let (start, end) = if start <= end { (start, end) } else { (end, start) };
            let mut out = String::with_capacity(text.len() + replacement.len());
            out.push_str(&text[..start]);
            out.push_str(replacement);
            out.push_str(&text[end..]);
            Ok(out)
        }
    }
}

/// Position of byte `offset` in `text`. `offset` must be a char boundary.
fn position_at(text: &str, offset: usize) -> Position {
    let head = &text[..offset];
    let line = head.matches('\n').count();
    let line_start = head.rfind('\n').map(|i| i + 1).unwrap_or(0);
    Position::new(line, offset - line_start)
}

/// One edit replacing the whitespace tail of `text` with separator + `block`.
fn spaced_tail_edit(text: &str, block: &str) -> Edit {
    let content_end = text.trim_end().len();
    let separator = if content_end == 0 { "" } else { "\n\n" };
    Edit::Replace {
        start: position_at(text, content_end),
        end: position_at(text, text.len()),
        text: format!("{separator}{block}"),
    }
}

// ── Editor ──

/// Append operations over a [`TextBuffer`].
///
/// Cloning shares the buffer and the append lock, so every clone for the same
/// document serializes against the others.
#[derive(Clone)]
pub struct DocumentEditor {
    buffer: Arc<dyn TextBuffer>,
    append_lock: Arc<Mutex<()>>,
}

impl DocumentEditor {
    pub fn new(buffer: Arc<dyn TextBuffer>) -> Self {
        Self {
            buffer,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn uri(&self) -> String {
        self.buffer.uri()
    }

    pub async fn text(&self) -> DocumentResult<String> {
        self.buffer.text().await
    }

    /// Text of zero-based `line`, without the line terminator.
    pub async fn line_at(&self, line: usize) -> DocumentResult<String> {
        let text = self.buffer.text().await?;
        let line_count = text.split('\n').count();
        text.split('\n')
            .nth(line)
            .map(|l| l.trim_end_matches('\r').to_string())
            .ok_or(DocumentError::LineOutOfRange { line, line_count })
    }

    /// Insert `text` right after the last character of the last line.
    pub async fn append_raw(&self, text: &str) -> DocumentResult<()> {
        let _guard = self.append_lock.lock().await;
        self.append_raw_locked(text).await
    }

    /// Replace the last line with its trimmed form.
    pub async fn normalize_trailing_whitespace(&self) -> DocumentResult<()> {
        let _guard = self.append_lock.lock().await;
        self.normalize_locked().await
    }

    /// Append `text` as its own block, preceded by exactly one blank line.
    ///
    /// Trailing whitespace and blank lines at the end of the document are folded
    /// into the separator first, so repeated appends never accumulate padding.
    /// The whole tail is rewritten with a single edit: it lands entirely or not
    /// at all. An empty document gets the text with no separator.
    pub async fn append_with_spacing(&self, text: &str) -> DocumentResult<()> {
        let _guard = self.append_lock.lock().await;
        let current = self.buffer.text().await?;
        self.buffer.apply(spaced_tail_edit(&current, text)).await
    }

    async fn end_of_document(&self) -> DocumentResult<(usize, String)> {
        let text = self.buffer.text().await?;
        let last_line = text.split('\n').count() - 1;
        let last = text.rsplit('\n').next().unwrap_or_default().to_string();
        Ok((last_line, last))
    }

    async fn append_raw_locked(&self, text: &str) -> DocumentResult<()> {
        let (line, last) = self.end_of_document().await?;
        self.buffer
            .apply(Edit::Insert {
                at: Position::new(line, last.len()),
                text: text.to_string(),
            })
            .await
    }

    async fn normalize_locked(&self) -> DocumentResult<()> {
        let (line, last) = self.end_of_document().await?;
        let trimmed = last.trim();
        if trimmed == last {
            return Ok(());
        }
        self.buffer
            .apply(Edit::Replace {
                start: Position::new(line, 0),
                end: Position::new(line, last.len()),
                text: trimmed.to_string(),
            })
            .await
    }
}

impl std::fmt::Debug for DocumentEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentEditor")
            .field("uri", &self.buffer.uri())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(text: &str) -> (Arc<MemoryBuffer>, DocumentEditor) {
        let buffer = Arc::new(MemoryBuffer::new("memory://test.py", text));
        (buffer.clone(), DocumentEditor::new(buffer))
    }

    #[test]
    fn apply_insert_mid_line() {
        let out = apply_edit(
            "abc\ndef",
            &Edit::Insert {
                at: Position::new(1, 1),
                text: "XX".into(),
            },
        )
        .unwrap();
        assert_eq!(out, "abc\ndXXef");
    }

    #[test]
    fn apply_replace_range() {
        let out = apply_edit(
            "abc\n  def  ",
            &Edit::Replace {
                start: Position::new(1, 0),
                end: Position::new(1, 7),
                text: "def".into(),
            },
        )
        .unwrap();
        assert_eq!(out, "abc\ndef");
    }

    #[test]
    fn apply_rejects_bad_positions() {
        let err = apply_edit(
            "abc",
            &Edit::Insert {
                at: Position::new(3, 0),
                text: "x".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::LineOutOfRange { line: 3, line_count: 1 }));

        let err = apply_edit(
            "é",
            &Edit::Insert {
                at: Position::new(0, 1),
                text: "x".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidColumn { .. }));
    }

    #[tokio::test]
    async fn append_raw_goes_to_end() {
        let (buffer, editor) = editor("def foo():\n    return 1");
        editor.append_raw("\n# tail").await.unwrap();
        assert_eq!(buffer.snapshot(), "def foo():\n    return 1\n# tail");
    }

    #[tokio::test]
    async fn normalize_trims_last_line() {
        let (buffer, editor) = editor("x = 1\n   y = 2   ");
        editor.normalize_trailing_whitespace().await.unwrap();
        assert_eq!(buffer.snapshot(), "x = 1\ny = 2");
    }

    #[tokio::test]
    async fn append_with_spacing_single_separator() {
        let (buffer, editor) = editor("def foo():\n    return 1");
        editor.append_with_spacing("def test_foo():\n    assert foo() == 1").await.unwrap();
        assert_eq!(
            buffer.snapshot(),
            "def foo():\n    return 1\n\ndef test_foo():\n    assert foo() == 1"
        );
    }

    #[tokio::test]
    async fn append_with_spacing_twice_keeps_structure() {
        let (buffer, editor) = editor("def foo():\n    return 1");
        editor.append_with_spacing("A").await.unwrap();
        editor.append_with_spacing("B").await.unwrap();
        let text = buffer.snapshot();
        assert_eq!(text, "def foo():\n    return 1\n\nA\n\nB");
        assert!(!text.contains("\n\n\n"));
    }

    #[tokio::test]
    async fn append_with_spacing_drops_trailing_whitespace() {
        let (buffer, editor) = editor("def foo():\n    return 1   \n    \n\n");
        editor.append_with_spacing("A").await.unwrap();
        assert_eq!(buffer.snapshot(), "def foo():\n    return 1\n\nA");
    }

    #[tokio::test]
    async fn append_with_spacing_folds_trailing_newlines() {
        // POSIX files end in a newline, and so do most generated payloads.
        let (buffer, editor) = editor("def foo():\n    return 1\n");
        editor
            .append_with_spacing("def test_foo():\n    assert foo() == 1\n")
            .await
            .unwrap();
        assert_eq!(
            buffer.snapshot(),
            "def foo():\n    return 1\n\ndef test_foo():\n    assert foo() == 1\n"
        );

        editor.append_with_spacing("B").await.unwrap();
        let text = buffer.snapshot();
        assert_eq!(
            text,
            "def foo():\n    return 1\n\ndef test_foo():\n    assert foo() == 1\n\nB"
        );
        assert!(!text.contains("\n\n\n"));
    }

    #[tokio::test]
    async fn append_with_spacing_on_empty_document() {
        let (buffer, editor) = editor("  \n");
        editor.append_with_spacing("A").await.unwrap();
        assert_eq!(buffer.snapshot(), "A");
    }

    /// Counts edits; optionally refuses every one of them.
    struct CountingBuffer {
        inner: MemoryBuffer,
        applies: std::sync::atomic::AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TextBuffer for CountingBuffer {
        fn uri(&self) -> String {
            self.inner.uri()
        }

        async fn text(&self) -> DocumentResult<String> {
            self.inner.text().await
        }

        async fn apply(&self, edit: Edit) -> DocumentResult<()> {
            self.applies.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.apply(edit).await
        }
    }

    #[tokio::test]
    async fn append_with_spacing_is_a_single_edit() {
        let buffer = Arc::new(CountingBuffer {
            inner: MemoryBuffer::new("memory://c.py", "x = 1\n\n"),
            applies: Default::default(),
            fail: false,
        });
        let editor = DocumentEditor::new(buffer.clone());
        editor.append_with_spacing("y = 2").await.unwrap();
        assert_eq!(buffer.applies.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(buffer.inner.snapshot(), "x = 1\n\ny = 2");
    }

    #[tokio::test]
    async fn failed_append_leaves_document_untouched() {
        let buffer = Arc::new(CountingBuffer {
            inner: MemoryBuffer::new("memory://c.py", "x = 1\n"),
            applies: Default::default(),
            fail: true,
        });
        let editor = DocumentEditor::new(buffer.clone());
        assert!(editor.append_with_spacing("y = 2").await.is_err());
        assert_eq!(buffer.inner.snapshot(), "x = 1\n");
    }

    #[tokio::test]
    async fn line_at_reads_lines() {
        let (_, editor) = editor("a\r\nb\nc");
        assert_eq!(editor.line_at(0).await.unwrap(), "a");
        assert_eq!(editor.line_at(2).await.unwrap(), "c");
        assert!(editor.line_at(3).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let (buffer, editor) = editor("start");
        let mut handles = Vec::new();
        for i in 0..8 {
            let editor = editor.clone();
            handles.push(tokio::spawn(async move {
                editor.append_with_spacing(&format!("block{i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let text = buffer.snapshot();
        // Every block sits on its own line, separated by exactly one blank line.
        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 9);
        assert_eq!(blocks[0], "start");
        assert!(blocks[1..].iter().all(|b| b.starts_with("block") && !b.contains('\n')));
    }
}

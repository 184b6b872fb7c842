//! File-backed text buffer — what the CLI edits in place of an open editor tab.
//!
//! Every edit is written to a tempfile next to the target and persisted over it,
//! so readers see either the old file or the new one, never a partial write.
//! The tempfile takes the target's permissions before the rename.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{apply_edit, DocumentResult, Edit, TextBuffer};

#[derive(Debug, Clone)]
pub struct FileBuffer {
    path: PathBuf,
}

impl FileBuffer {
    /// Open an existing file. The path is canonicalized so the URI is stable.
    pub fn open(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let path = std::fs::canonicalize(path.as_ref())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking: write `content` to a sibling tempfile and rename it over `path`.
    fn write_atomic(path: &Path, content: &str) -> DocumentResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let permissions = std::fs::metadata(path)?.permissions();
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.as_file().set_permissions(permissions)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)?;
        Ok(())
    }
}

#[async_trait]
impl TextBuffer for FileBuffer {
    fn uri(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn text(&self) -> DocumentResult<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    async fn apply(&self, edit: Edit) -> DocumentResult<()> {
        let current = tokio::fs::read_to_string(&self.path).await?;
        let updated = apply_edit(&current, &edit)?;
        let bytes = updated.len();

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::write_atomic(&path, &updated))
            .await
            .map_err(std::io::Error::other)??;

        debug!(path = %self.path.display(), bytes, "applied edit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentEditor, Position};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn edits_land_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calc.py");
        std::fs::write(&path, "def add(a, b):\n    return a + b").unwrap();

        let buffer = FileBuffer::open(&path).unwrap();
        assert!(buffer.uri().starts_with("file://"));
        assert!(buffer.uri().ends_with("calc.py"));

        buffer
            .apply(Edit::Insert {
                at: Position::new(1, 16),
                text: "\n# end".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "def add(a, b):\n    return a + b\n# end"
        );
    }

    #[tokio::test]
    async fn editor_over_file_appends_with_spacing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calc.py");
        std::fs::write(&path, "def add(a, b):\n    return a + b\n  ").unwrap();

        let editor = DocumentEditor::new(Arc::new(FileBuffer::open(&path).unwrap()));
        editor.append_with_spacing("def test_add():\n    assert add(1, 2) == 3").await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("\n\ndef test_add():\n    assert add(1, 2) == 3"));
    }

    #[tokio::test]
    async fn bad_edit_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.py");
        std::fs::write(&path, "x = 1").unwrap();

        let buffer = FileBuffer::open(&path).unwrap();
        let result = buffer
            .apply(Edit::Insert {
                at: Position::new(0, 99),
                text: "!".into(),
            })
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1");
    }

    #[tokio::test]
    async fn trailing_newline_file_gets_one_separator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calc.py");
        std::fs::write(&path, "def add(a, b):\n    return a + b\n").unwrap();

        let editor = DocumentEditor::new(Arc::new(FileBuffer::open(&path).unwrap()));
        editor.append_with_spacing("def test_add():\n    assert add(1, 2) == 3\n").await.unwrap();
        editor.append_with_spacing("# more").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "def add(a, b):\n    return a + b\n\ndef test_add():\n    assert add(1, 2) == 3\n\n# more"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn edits_keep_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        for mode in [0o644, 0o755] {
            let path = dir.path().join(format!("script_{mode:o}.py"));
            std::fs::write(&path, "def main():\n    pass\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();

            let editor = DocumentEditor::new(Arc::new(FileBuffer::open(&path).unwrap()));
            editor.append_with_spacing("# x").await.unwrap();

            let after = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(after, mode);
        }
    }

    #[test]
    fn open_missing_file_errors() {
        assert!(FileBuffer::open("/nonexistent/dir/file.py").is_err());
    }
}

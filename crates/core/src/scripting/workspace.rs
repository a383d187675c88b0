//! Per-attempt temporary workspace.
//!
//! A [`Workspace`] is created for exactly one execution attempt and removed
//! when it is closed or dropped, including during unwinding and on early
//! returns. Nothing written into it outlives the attempt.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Directory name prefix, so leaked directories are recognisable.
pub const WORKSPACE_PREFIX: &str = "scriptforge-run-";

/// Exclusively-owned temporary directory for one execution attempt.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under the system temp dir.
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir()?;
        Ok(Self { dir })
    }

    /// Create a fresh directory under `parent` (which must exist).
    pub fn create_in(parent: impl AsRef<Path>) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `file_name` inside the workspace.
    pub async fn write_file(&self, file_name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(file_name);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// Remove the directory now and report failures. Dropping the workspace
    /// also removes it, but silently.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_removes_directory_and_files() {
        let ws = Workspace::create().expect("create");
        let path = ws.path().to_path_buf();
        let file = ws.write_file("script.py", "print(1)").await.expect("write");
        assert!(file.exists());
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(WORKSPACE_PREFIX)));

        ws.close().expect("close");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_directory() {
        let path = {
            let ws = Workspace::create().expect("create");
            ws.write_file("data.txt", "x").await.expect("write");
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn panic_still_removes_directory() {
        let parent = tempfile::tempdir().expect("parent");
        let parent_path = parent.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let _ws = Workspace::create_in(&parent_path).expect("create");
            panic!("setup exploded");
        });
        assert!(result.is_err());
        let leftovers = std::fs::read_dir(parent.path()).expect("read parent").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn create_in_missing_parent_fails() {
        let result = Workspace::create_in("/definitely/not/a/real/parent/dir");
        assert!(result.is_err());
    }

    #[test]
    fn workspaces_are_distinct() {
        let a = Workspace::create().expect("a");
        let b = Workspace::create().expect("b");
        assert_ne!(a.path(), b.path());
    }
}

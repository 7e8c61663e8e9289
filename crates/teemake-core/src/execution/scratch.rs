use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::execution::ExecutionResult;
use crate::models::CoreError;

/// On-disk capture of one task's merged output.
///
/// The file is deleted by [`ScratchBuffer::discard`] or, on any early return,
/// when the value is dropped.
pub struct ScratchBuffer {
    file: NamedTempFile,
}

impl ScratchBuffer {
    pub fn create() -> ExecutionResult<Self> {
        Self::build(tempfile::Builder::new().prefix("teemake-").suffix(".log").tempfile())
    }

    pub fn create_in(dir: impl AsRef<Path>) -> ExecutionResult<Self> {
        Self::build(
            tempfile::Builder::new()
                .prefix("teemake-")
                .suffix(".log")
                .tempfile_in(dir),
        )
    }

    fn build(file: std::io::Result<NamedTempFile>) -> ExecutionResult<Self> {
        file.map(|file| Self { file })
            .map_err(|error| CoreError::io("failed to create scratch buffer", error))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A handle sharing this buffer's write position, for a child's stdio.
    pub fn writer(&self) -> ExecutionResult<File> {
        self.file
            .as_file()
            .try_clone()
            .map_err(|error| CoreError::io("failed to share scratch buffer", error))
    }

    pub fn append_line(&mut self, line: &str) -> ExecutionResult<()> {
        writeln!(self.file, "{line}")
            .map_err(|error| CoreError::io("failed to write scratch buffer", error))
    }

    pub fn lines(&self) -> ExecutionResult<Vec<String>> {
        let bytes = std::fs::read(self.file.path())
            .map_err(|error| CoreError::io("failed to read scratch buffer", error))?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }

    pub fn discard(self) -> ExecutionResult<()> {
        self.file
            .close()
            .map_err(|error| CoreError::io("failed to remove scratch buffer", error))
    }
}

/// The last `count` lines, in their original order.
pub fn tail_lines(lines: &[String], count: usize) -> &[String] {
    &lines[lines.len().saturating_sub(count)..]
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{ScratchBuffer, tail_lines};

    #[test]
    fn child_handle_and_appends_share_one_buffer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scratch = ScratchBuffer::create_in(dir.path()).expect("scratch");

        let mut child_side = scratch.writer().expect("writer");
        child_side.write_all(b"from child\n").expect("write");
        scratch.append_line("from runner").expect("append");

        assert_eq!(
            scratch.lines().expect("lines"),
            vec!["from child".to_string(), "from runner".to_string()]
        );
    }

    #[test]
    fn discard_and_drop_both_remove_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");

        let scratch = ScratchBuffer::create_in(dir.path()).expect("scratch");
        let discarded = scratch.path().to_path_buf();
        scratch.discard().expect("discard");
        assert!(!discarded.exists());

        let dropped = {
            let scratch = ScratchBuffer::create_in(dir.path()).expect("scratch");
            scratch.path().to_path_buf()
        };
        assert!(!dropped.exists());
    }

    #[test]
    fn tail_keeps_last_lines_in_order() {
        let lines: Vec<String> = (1..=8).map(|n| format!("line {n}")).collect();
        assert_eq!(
            tail_lines(&lines, 5),
            &lines[3..],
            "expected lines 4 through 8"
        );
        assert_eq!(tail_lines(&lines[..2], 5), &lines[..2]);
        assert!(tail_lines(&[], 5).is_empty());
    }
}

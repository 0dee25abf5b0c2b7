//! Receiver-side file persistence.
//!
//! A file under construction lives as `<name>.tmp` in the destination folder
//! and grows by appending fragments in delivery order. FINISH renames it to
//! its final name; dropping an unfinalized writer removes the temporary file.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::{info, warn};

/// Incrementally writes one received file.
#[derive(Debug)]
pub struct FileWriter {
    file: File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    finalized: bool,
}

/// Reduces a peer-supplied file name to a bare, non-empty file name.
fn sanitize_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|base| base.to_string_lossy().into_owned())
        .unwrap_or_default()
        .trim()
        .to_string()
}

impl FileWriter {
    /// Opens `<name>.tmp` under `destination`, creating the folder if needed.
    pub fn create(destination: &Path, name: &str) -> io::Result<Self> {
        let mut base = sanitize_name(name);
        if base.is_empty() {
            base = "unnamed".to_string();
        }

        fs::create_dir_all(destination)?;
        let final_path = destination.join(&base);
        let temp_path = destination.join(format!("{}.tmp", base));
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&temp_path)?;
        info!(path = %temp_path.display(), "temporary file initialized");

        Ok(Self { file, temp_path, final_path, bytes_written: 0, finalized: false })
    }

    /// Appends one fragment of file content at the current position.
    pub fn append(&mut self, fragment: &[u8]) -> io::Result<()> {
        self.file.write_all(fragment)?;
        self.bytes_written += fragment.len() as u64;
        Ok(())
    }

    /// Content bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flushes, renames the temporary file to its final name and returns the
    /// final path.
    pub fn finalize(mut self) -> io::Result<PathBuf> {
        self.file.flush()?;
        self.finalized = true;

        let temp_path = self.temp_path.clone();
        let final_path = self.final_path.clone();
        drop(self);

        fs::rename(&temp_path, &final_path)?;
        info!(path = %final_path.display(), "file transfer completed");
        Ok(final_path)
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                warn!(path = %self.temp_path.display(), error = %e, "could not remove temporary file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_finalize_renames_to_the_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FileWriter::create(dir.path(), "report.pdf").unwrap();
        writer.append(b"part one, ").unwrap();
        writer.append(b"part two").unwrap();
        assert_eq!(writer.bytes_written(), 18);

        assert!(dir.path().join("report.pdf.tmp").exists());
        let final_path = writer.finalize().unwrap();
        assert_eq!(final_path, dir.path().join("report.pdf"));
        assert_eq!(fs::read(&final_path).unwrap(), b"part one, part two");
        assert!(!dir.path().join("report.pdf.tmp").exists());
    }

    #[test]
    fn dropping_an_unfinalized_writer_removes_the_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FileWriter::create(dir.path(), "partial.bin").unwrap();
        writer.append(b"half").unwrap();
        drop(writer);
        assert!(!dir.path().join("partial.bin.tmp").exists());
        assert!(!dir.path().join("partial.bin").exists());
    }

    #[test]
    fn peer_supplied_paths_are_reduced_to_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::create(dir.path(), "../../etc/passwd").unwrap();
        let final_path = writer.finalize().unwrap();
        assert_eq!(final_path, dir.path().join("passwd"));
    }

    #[test]
    fn empty_names_fall_back_to_a_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::create(dir.path(), "").unwrap();
        let final_path = writer.finalize().unwrap();
        assert_eq!(final_path, dir.path().join("unnamed"));
    }

    #[test]
    fn destination_folder_is_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let writer = FileWriter::create(&nested, "x.txt").unwrap();
        writer.finalize().unwrap();
        assert!(nested.join("x.txt").exists());
    }
}

//! Low-level durability helpers shared by the queue, ledger, and cursor stores.
//!
//! # Why Directory fsync?
//!
//! On POSIX systems, creating or renaming a file updates the directory entry.
//! Without fsync on the directory, this entry may not survive a power loss
//! even if the file contents were synced. This is a common source of data loss.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory to disk, ensuring directory entries are durable.
///
/// Required after create/rename/delete. Without this:
/// - A newly created file might be lost (directory entry not persisted)
/// - A renamed file might revert to its old name
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

/// Replaces a file's contents atomically.
///
/// Write-to-temp-then-rename:
/// 1. Write `<path>.tmp`
/// 2. fsync the temp file
/// 3. Rename onto `<path>`
/// 4. fsync the parent directory
///
/// A crash at any point leaves either the old contents or the new contents,
/// never a torn file. Orphaned `.tmp` files are overwritten on the next call.
pub fn atomic_replace(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(contents)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fsync_file_works() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");

        let mut file = File::create(&path).unwrap();
        file.write_all(b"test data").unwrap();

        fsync_file(&file).unwrap();
    }

    #[test]
    fn fsync_dir_works() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("test.txt")).unwrap();
        fsync_dir(dir.path()).unwrap();
    }

    #[test]
    fn fsync_dir_fails_on_nonexistent() {
        let result = fsync_dir(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(result.is_err());
    }

    #[test]
    fn atomic_replace_writes_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.csv");

        atomic_replace(&path, b"hello").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn atomic_replace_overwrites_and_removes_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.csv");

        atomic_replace(&path, b"first").unwrap();
        atomic_replace(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!path.with_extension("csv.tmp").exists());
    }
}

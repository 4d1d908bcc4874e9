use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Pick a free name for `file_name` inside `dir`.
///
/// `report.pdf` becomes `report (1).pdf`, `report (2).pdf`, ... until a name
/// that does not exist is found. An existing file is never overwritten.
pub fn unique_destination(dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = dir.join(file_name);
    if fs::symlink_metadata(&candidate).is_err() {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| file_name.as_os_str().to_os_string());
    let extension = file_name.extension();

    (1u64..)
        .map(|n| {
            let mut name = OsString::from(&stem);
            name.push(format!(" ({})", n));
            if let Some(ext) = extension {
                name.push(".");
                name.push(ext);
            }
            dir.join(name)
        })
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
        .unwrap_or(candidate)
}

/// Move `path` into `quarantine_dir`, keeping its base name.
pub fn move_to_quarantine(path: &Path, quarantine_dir: &Path) -> Result<PathBuf, Error> {
    let fail = |source: io::Error| Error::QuarantineMoveFailed {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path.file_name().ok_or_else(|| {
        fail(io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))
    })?;
    let metadata = fs::symlink_metadata(path).map_err(fail)?;
    if metadata.is_dir() {
        return Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to quarantine a directory",
        )));
    }

    let destination = unique_destination(quarantine_dir, Path::new(file_name));
    move_file(path, &destination).map_err(fail)?;
    Ok(destination)
}

// `rename` fails across filesystems; fall back to copy + remove.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if rename_err.kind() == io::ErrorKind::NotFound {
        return Err(rename_err);
    }

    if let Err(copy_err) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(copy_err);
    }
    if let Err(remove_err) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(remove_err);
    }
    Ok(())
}

pub fn delete_file(path: &Path) -> Result<(), Error> {
    fs::remove_file(path).map_err(|source| Error::DeleteFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let dir = tempdir().unwrap();
        let quarantine = dir.path().join("q");
        fs::create_dir_all(&quarantine).unwrap();
        fs::write(quarantine.join("payload.exe"), "old").unwrap();
        fs::write(quarantine.join("payload (1).exe"), "older").unwrap();

        let dest = unique_destination(&quarantine, Path::new("payload.exe"));
        assert_eq!(dest, quarantine.join("payload (2).exe"));

        let dest = unique_destination(&quarantine, Path::new("fresh.exe"));
        assert_eq!(dest, quarantine.join("fresh.exe"));
    }

    #[test]
    fn test_suffix_without_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Makefile"), "x").unwrap();
        let dest = unique_destination(dir.path(), Path::new("Makefile"));
        assert_eq!(dest, dir.path().join("Makefile (1)"));
    }

    #[test]
    fn test_move_never_overwrites() {
        let dir = tempdir().unwrap();
        let quarantine = dir.path().join("q");
        fs::create_dir_all(&quarantine).unwrap();
        fs::write(quarantine.join("same.bin"), "first").unwrap();

        let src = dir.path().join("same.bin");
        fs::write(&src, "second").unwrap();

        let dest = move_to_quarantine(&src, &quarantine).unwrap();
        assert_eq!(dest, quarantine.join("same (1).bin"));
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(quarantine.join("same.bin")).unwrap(), "first");
        assert_eq!(fs::read_to_string(dest).unwrap(), "second");
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = tempdir().unwrap();
        let err = move_to_quarantine(&dir.path().join("gone.bin"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::QuarantineMoveFailed { .. }));
    }

    #[test]
    fn test_delete_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = delete_file(&dir.path().join("gone.bin")).unwrap_err();
        assert!(matches!(err, Error::DeleteFailed { .. }));
    }
}

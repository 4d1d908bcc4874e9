use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

/// Lazily enumerates regular files under a root, depth-unbounded.
///
/// Entries are visited in file-name order within each directory, so two
/// walks of an unchanged tree yield the same sequence. Symlinks are not
/// followed by default; a symlink is then neither descended into nor
/// yielded. With `follow_symlinks`, walkdir's ancestor check stops
/// directory cycles and the looping entry is skipped.
#[derive(Debug, Clone, Default)]
pub struct DirectoryWalker {
    ignore_patterns: Vec<Pattern>,
    follow_symlinks: bool,
}

impl DirectoryWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_patterns(mut self, globs: &[String]) -> Self {
        self.ignore_patterns = globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Start a fresh walk. Paths are absolute when `root` can be resolved.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_ignored(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    match err.path() {
                        Some(path) => warn!("Skipping {}: {}", path.display(), err),
                        None => warn!("Skipping entry: {}", err),
                    }
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
    }

    pub fn count(&self, root: &Path) -> usize {
        self.walk(root).count()
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(entry.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn build_tree(root: &Path) -> HashSet<PathBuf> {
        let files = [
            "top.txt",
            "a/one.bin",
            "a/two.bin",
            "a/deeper/still/three.txt",
            "b/four.txt",
        ];
        for rel in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, rel).unwrap();
        }
        fs::create_dir_all(root.join("empty/nested")).unwrap();

        let root = fs::canonicalize(root).unwrap();
        files.iter().map(|rel| root.join(rel)).collect()
    }

    #[test]
    fn test_walk_yields_every_file_once() {
        let dir = tempdir().unwrap();
        let expected = build_tree(dir.path());

        let walked: Vec<PathBuf> = DirectoryWalker::new().walk(dir.path()).collect();
        let unique: HashSet<PathBuf> = walked.iter().cloned().collect();
        assert_eq!(walked.len(), unique.len());
        assert_eq!(unique, expected);
        assert!(walked.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_walk_is_restartable_and_ordered() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let walker = DirectoryWalker::new();
        let first: Vec<PathBuf> = walker.walk(dir.path()).collect();
        let second: Vec<PathBuf> = walker.walk(dir.path()).collect();
        assert_eq!(first, second);
        assert_eq!(walker.count(dir.path()), 5);
    }

    #[test]
    fn test_walk_is_lazy() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let walker = DirectoryWalker::new();
        let mut iter = walker.walk(dir.path());
        let first = iter.next().unwrap();
        assert!(first.ends_with("a/deeper/still/three.txt"));
        assert_eq!(iter.count(), 4);
    }

    #[test]
    fn test_ignore_patterns_prune_subtrees() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let walker = DirectoryWalker::new().with_ignore_patterns(&[
            "**/a".to_string(),
            "[invalid".to_string(),
        ]);
        let walked: Vec<PathBuf> = walker.walk(dir.path()).collect();
        assert_eq!(walked.len(), 2);
        assert!(walked.iter().all(|p| !p.to_string_lossy().contains("/a/")));
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let dir = tempdir().unwrap();
        let walker = DirectoryWalker::new();
        assert_eq!(walker.walk(&dir.path().join("nope")).count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a/loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("top.txt"), dir.path().join("b/link.txt"))
            .unwrap();

        let skipping = DirectoryWalker::new();
        assert_eq!(skipping.walk(dir.path()).count(), 5);

        let following = DirectoryWalker::new().follow_symlinks(true);
        let walked: Vec<PathBuf> = following.walk(dir.path()).collect();
        assert_eq!(walked.len(), 6);
    }
}

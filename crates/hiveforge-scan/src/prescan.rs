//! Up-front file and byte count for progress totals.

use std::path::Path;

use jwalk::WalkDir;
use tokio_util::sync::CancellationToken;

/// Regular files and bytes found under a root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrescanTotals {
    /// Number of regular files.
    pub files: u64,
    /// Sum of their sizes.
    pub bytes: u64,
}

/// Count regular files and bytes under `root` using a parallel walk.
///
/// Ignore rules are not applied and unreadable entries are skipped, so the
/// result is an estimate for display only. Cancelling `cancel` stops the
/// count and returns what was found so far.
pub fn prescan(root: &Path, cancel: &CancellationToken) -> PrescanTotals {
    let walker = WalkDir::new(root).skip_hidden(false).follow_links(false);

    let mut totals = PrescanTotals::default();
    for entry in walker.into_iter().flatten() {
        if cancel.is_cancelled() {
            tracing::debug!(files = totals.files, "prescan cancelled");
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            totals.files += 1;
            totals.bytes += metadata.len();
        }
    }

    tracing::debug!(files = totals.files, bytes = totals.bytes, "prescan finished");
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_prescan_counts_nested_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("one.txt"), "12345").unwrap();
        fs::write(root.join("a/.hidden"), "123").unwrap();
        fs::write(root.join("a/b/two.txt"), "12").unwrap();

        let totals = prescan(root, &CancellationToken::new());
        assert_eq!(totals, PrescanTotals { files: 3, bytes: 10 });
    }

    #[test]
    fn test_prescan_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let totals = prescan(&temp.path().join("missing"), &CancellationToken::new());
        assert_eq!(totals, PrescanTotals::default());
    }

    #[test]
    fn test_prescan_stops_when_cancelled() {
        let temp = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(temp.path().join(format!("f{i}")), "x").unwrap();
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(prescan(temp.path(), &cancel), PrescanTotals::default());
    }
}

//! Per-directory ignore rules.
//!
//! Every directory may carry a rule file (`.hiveignore` by default). Its
//! patterns apply to that directory and everything below it, on top of the
//! patterns inherited from the parent directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

/// Which part of the relative path a pattern is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// No `/` in the pattern: the entry's base name.
    BaseName,
    /// Leading `/`: the full root-relative path only.
    Anchored,
    /// Inner `/`: the full path or any of its trailing segments.
    AnyDepth,
}

/// One compiled pattern line.
#[derive(Debug, Clone)]
struct IgnorePattern {
    raw: String,
    source: PathBuf,
    dir_only: bool,
    scope: Scope,
    matcher: GlobMatcher,
}

impl IgnorePattern {
    fn parse(line: &str, source: &Path) -> Option<Self> {
        let raw = line.to_string();
        let mut body = line;

        let dir_only = body.ends_with('/');
        if dir_only {
            body = body.trim_end_matches('/');
        }

        let scope = if let Some(rest) = body.strip_prefix('/') {
            body = rest;
            Scope::Anchored
        } else if body.contains('/') {
            Scope::AnyDepth
        } else {
            Scope::BaseName
        };

        if body.is_empty() {
            return None;
        }

        let matcher = match GlobBuilder::new(body).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher(),
            Err(err) => {
                tracing::warn!(
                    pattern = %raw,
                    source = %source.display(),
                    error = %err,
                    "skipping invalid ignore pattern"
                );
                return None;
            }
        };

        Some(Self {
            raw,
            source: source.to_path_buf(),
            dir_only,
            scope,
            matcher,
        })
    }

    fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }

        match self.scope {
            Scope::BaseName => {
                let base = rel_path.rsplit('/').next().unwrap_or(rel_path);
                self.matcher.is_match(base)
            }
            Scope::Anchored => self.matcher.is_match(rel_path),
            Scope::AnyDepth => {
                let mut rest = rel_path;
                loop {
                    if self.matcher.is_match(rest) {
                        return true;
                    }
                    match rest.find('/') {
                        Some(i) => rest = &rest[i + 1..],
                        None => return false,
                    }
                }
            }
        }
    }
}

/// Ordered, immutable set of ignore patterns in effect for one directory.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreRules {
    /// Rules for a directory with nothing inherited.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Rules for `dir`: the parent's rules plus those in `dir/<file_name>`.
    ///
    /// Without a readable rule file the parent's set is returned as-is.
    pub fn load(dir: &Path, parent: &Arc<Self>, file_name: &str) -> Arc<Self> {
        let path = dir.join(file_name);
        match fs::read_to_string(&path) {
            Ok(contents) => Arc::new(parent.extend(&contents, &path)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Arc::clone(parent),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot read ignore file");
                Arc::clone(parent)
            }
        }
    }

    /// Copy of these rules with the patterns from `contents` appended.
    pub fn extend(&self, contents: &str, source: &Path) -> Self {
        let mut patterns = self.patterns.clone();
        patterns.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .filter_map(|line| IgnorePattern::parse(line, source)),
        );
        tracing::debug!(source = %source.display(), total = patterns.len(), "loaded ignore rules");
        Self { patterns }
    }

    /// Check a root-relative, `/`-separated path against the rules.
    ///
    /// Returns the reason for the first matching pattern.
    pub fn should_ignore(&self, rel_path: &str, is_dir: bool) -> Option<String> {
        self.patterns
            .iter()
            .find(|p| p.matches(rel_path, is_dir))
            .map(|p| format!("Matched pattern '{}' from {}", p.raw, p.source.display()))
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if no patterns are in effect.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[cfg(test)]
    fn layout(&self) -> Vec<(&str, &Path, bool, Scope)> {
        self.patterns
            .iter()
            .map(|p| (p.raw.as_str(), p.source.as_path(), p.dir_only, p.scope))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules(contents: &str) -> IgnoreRules {
        IgnoreRules::default().extend(contents, Path::new("/r/.hiveignore"))
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let r = rules("# comment\n\n   \n*.log\n");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_base_name_pattern_matches_at_any_depth() {
        let r = rules("*.tmp");
        assert!(r.should_ignore("a.tmp", false).is_some());
        assert!(r.should_ignore("x/y/a.tmp", false).is_some());
        assert!(r.should_ignore("a.tmpl", false).is_none());
    }

    #[test]
    fn test_reason_names_pattern_and_source() {
        let r = rules("*.tmp");
        assert_eq!(
            r.should_ignore("a.tmp", false).unwrap(),
            "Matched pattern '*.tmp' from /r/.hiveignore"
        );
    }

    #[test]
    fn test_directory_only_pattern() {
        let r = rules("build/");
        assert!(r.should_ignore("build", true).is_some());
        assert!(r.should_ignore("src/build", true).is_some());
        assert!(r.should_ignore("build", false).is_none());
    }

    #[test]
    fn test_anchored_pattern() {
        let r = rules("/build/");
        assert!(r.should_ignore("build", true).is_some());
        assert!(r.should_ignore("src/build", true).is_none());
    }

    #[test]
    fn test_inner_slash_matches_suffixes() {
        let r = rules("docs/*.md");
        assert!(r.should_ignore("docs/a.md", false).is_some());
        assert!(r.should_ignore("pkg/docs/a.md", false).is_some());
        assert!(r.should_ignore("docs/sub/a.md", false).is_none());
    }

    #[test]
    fn test_wildcards_do_not_cross_separator() {
        let r = rules("/src/*");
        assert!(r.should_ignore("src/main.rs", false).is_some());
        assert!(r.should_ignore("src/a/main.rs", false).is_none());
    }

    #[test]
    fn test_invalid_glob_is_skipped() {
        let r = rules("[unclosed\n*.bak");
        assert_eq!(r.len(), 1);
        assert!(r.should_ignore("x.bak", false).is_some());
    }

    #[test]
    fn test_first_match_wins() {
        let r = IgnoreRules::default()
            .extend("*.o", Path::new("/r/.hiveignore"))
            .extend("obj/*.o", Path::new("/r/sub/.hiveignore"));
        let reason = r.should_ignore("obj/a.o", false).unwrap();
        assert!(reason.contains("'*.o'"));
    }

    #[test]
    fn test_load_without_file_shares_parent() {
        let temp = TempDir::new().unwrap();
        let parent = Arc::new(rules("*.tmp"));
        let child = IgnoreRules::load(temp.path(), &parent, ".hiveignore");
        assert!(Arc::ptr_eq(&parent, &child));
    }

    #[test]
    fn test_load_appends_to_parent() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".hiveignore"), "*.bak\n").unwrap();
        let parent = Arc::new(rules("*.tmp"));
        let child = IgnoreRules::load(temp.path(), &parent, ".hiveignore");

        assert_eq!(child.len(), 2);
        assert_eq!(parent.len(), 1);
        assert!(child.should_ignore("a.tmp", false).is_some());
        let reason = child.should_ignore("a.bak", false).unwrap();
        assert!(reason.ends_with(&temp.path().join(".hiveignore").display().to_string()));
    }

    #[test]
    fn test_load_twice_from_same_parent_is_identical() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".hiveignore"), "/build/\ndocs/*.md\n*.bak\n").unwrap();
        let parent = Arc::new(rules("*.tmp\nlogs/"));
        let before: Vec<String> = parent.layout().iter().map(|p| p.0.to_string()).collect();

        let first = IgnoreRules::load(temp.path(), &parent, ".hiveignore");
        let second = IgnoreRules::load(temp.path(), &parent, ".hiveignore");

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.layout(), second.layout());
        assert_eq!(first.len(), 5);

        let source = temp.path().join(".hiveignore");
        assert_eq!(
            &first.layout()[2..],
            [
                ("/build/", source.as_path(), true, Scope::Anchored),
                ("docs/*.md", source.as_path(), false, Scope::AnyDepth),
                ("*.bak", source.as_path(), false, Scope::BaseName),
            ]
        );

        assert_eq!(parent.len(), 2);
        let after: Vec<String> = parent.layout().iter().map(|p| p.0.to_string()).collect();
        assert_eq!(before, after);
    }
}

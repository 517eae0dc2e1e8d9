//! Directory tree snapshots of dataset contents.
//!
//! A [`DirTree`] is stored as JSON in `studies.dataset_content` and rendered
//! in the style of UNIX `tree` when a tar2bids run needs its output logged.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

const SPACE: &str = "    ";
const BRANCH: &str = "│   ";
const TEE: &str = "├── ";
const LAST: &str = "└── ";

/// Entries never included in a dataset snapshot.
pub const DATASET_IGNORE: [&str; 2] = [".git", ".datalad"];

/// Files and subdirectories of a single directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTree {
    pub files: Vec<String>,
    pub dirs: BTreeMap<String, DirTree>,
}

impl DirTree {
    /// Walk `path`, skipping any entry whose name is in `ignore`.
    ///
    /// Symlinks count as files, which matters for git-annex content that
    /// has not been fetched.
    pub fn from_path(path: &Path, ignore: &[&str]) -> std::io::Result<Self> {
        let mut tree = DirTree::default();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if ignore.contains(&name.as_str()) {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                tree.dirs
                    .insert(name, DirTree::from_path(&entry.path(), ignore)?);
            } else {
                tree.files.push(name);
            }
        }
        tree.files.sort();
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Render as `tree`-style lines: files first, then directories.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.render_into("", &mut lines);
        lines
    }

    fn render_into(&self, prefix: &str, lines: &mut Vec<String>) {
        let total = self.files.len() + self.dirs.len();
        let pointer = |idx: usize| if idx + 1 == total { LAST } else { TEE };

        for (idx, file) in self.files.iter().enumerate() {
            lines.push(format!("{prefix}{}{file}", pointer(idx)));
        }
        for (offset, (name, child)) in self.dirs.iter().enumerate() {
            let p = pointer(self.files.len() + offset);
            lines.push(format!("{prefix}{p}{name}"));
            let extension = if p == TEE { BRANCH } else { SPACE };
            child.render_into(&format!("{prefix}{extension}"), lines);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

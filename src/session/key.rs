//! Resource key type.

use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

/// Identity of a session, derived from the resource it opens.
///
/// The key is the canonical path when the resource exists on disk, and the
/// lexically normalised path otherwise. Two different paths therefore never
/// alias the same session, and `a/./b.odt` and `a/b.odt` always do.
///
/// The path is kept as raw OS bytes. `Display` and serialization are lossy
/// for names that are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(PathBuf);

impl ResourceKey {
    /// Derive the key for a resource path.
    pub fn new(resource: impl AsRef<Path>) -> Self {
        let path = resource.as_ref();
        let normalized = std::fs::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path));
        Self(normalized)
    }

    /// Get the key as a filesystem path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Final path component, used in status output.
    pub fn file_name(&self) -> Cow<'_, str> {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| self.0.to_string_lossy())
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.display())
    }
}

impl From<&Path> for ResourceKey {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for ResourceKey {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for ResourceKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

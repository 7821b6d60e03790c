//! Domain newtypes with validation
//!
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Path types
// ============================================================================

/// A validated absolute path on the local mirror
///
/// MirrorPath ensures the path is:
/// - Absolute (starts with /)
/// - Normalized (no . or .. components)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct MirrorPath(PathBuf);

impl MirrorPath {
    /// Create a new MirrorPath, validating it is absolute
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute or
    /// climbs above the filesystem root
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }

        // Lexical normalization only; the path usually does not exist yet
        let normalized = Self::normalize_path(&path)?;
        Ok(Self(normalized))
    }

    /// Resolve a possibly relative directory against the working directory
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the working directory cannot be
    /// determined or the path is empty
    pub fn from_local_root(root: &Path) -> Result<Self, DomainError> {
        let absolute = std::path::absolute(root).map_err(|e| {
            DomainError::InvalidPath(format!("Cannot resolve {}: {e}", root.display()))
        })?;
        Self::new(absolute)
    }

    /// Get the inner PathBuf reference
    #[must_use]
    pub fn as_path(&self) -> &PathBuf {
        &self.0
    }

    /// Convert to owned PathBuf
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Append the `/`-separated remainder of an object key
    ///
    /// Empty and `.` segments are dropped, `..` pops a previously pushed
    /// segment. The result always names an entry strictly below `self`.
    ///
    /// # Errors
    /// - `DomainError::PathOutsideRoot` if a `..` segment would climb above `self`
    /// - `DomainError::InvalidPath` if the suffix names `self` itself
    pub fn join_key_suffix(&self, suffix: &str) -> Result<Self, DomainError> {
        let mut joined = self.0.clone();
        let mut depth = 0usize;

        for segment in suffix.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if depth == 0 {
                        return Err(DomainError::PathOutsideRoot(format!(
                            "'{suffix}' climbs above {}",
                            self.0.display()
                        )));
                    }
                    joined.pop();
                    depth -= 1;
                }
                name => {
                    joined.push(name);
                    depth += 1;
                }
            }
        }

        if depth == 0 {
            return Err(DomainError::InvalidPath(format!(
                "'{suffix}' does not name an entry below {}",
                self.0.display()
            )));
        }

        Ok(Self(joined))
    }

    /// Normalize a path by resolving . and .. components
    fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidPath(
                            "Path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }

        Ok(normalized)
    }
}

impl Display for MirrorPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for MirrorPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<MirrorPath> for PathBuf {
    fn from(mirror_path: MirrorPath) -> Self {
        mirror_path.0
    }
}

impl AsRef<Path> for MirrorPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

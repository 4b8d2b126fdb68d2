//! Access policy and file reference resolution.
//!
//! The policy is fixed when the process starts and handed to the gateway by value. Resolution
//! is purely lexical: no filesystem access happens here, existence and readability are the
//! loader's concern.

use std::path::{Component, Path, PathBuf};

use csvq_result::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Every reference must already be absolute.
    Unrestricted,
    /// Relative references are joined onto `root`; absolute references pass through.
    Scoped { root: PathBuf },
}

impl AccessPolicy {
    /// Build a scoped policy. `root` must be absolute.
    pub fn scoped(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(Error::PolicyViolation(format!(
                "scoped root '{}' must be an absolute path",
                root.display()
            )));
        }
        Ok(AccessPolicy::Scoped { root })
    }

    pub fn root(&self) -> Option<&Path> {
        match self {
            AccessPolicy::Unrestricted => None,
            AccessPolicy::Scoped { root } => Some(root),
        }
    }

    pub fn resolve(&self, reference: &str) -> Result<ResolvedPath> {
        resolve(reference, self)
    }
}

/// An absolute path that has passed the active policy.
///
/// Only [`resolve`] constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

pub fn resolve(reference: &str, policy: &AccessPolicy) -> Result<ResolvedPath> {
    if reference.is_empty() {
        return Err(Error::PolicyViolation("empty file reference".into()));
    }

    let path = Path::new(reference);
    if path.is_absolute() {
        return Ok(ResolvedPath(path.to_path_buf()));
    }

    match policy {
        AccessPolicy::Unrestricted => Err(Error::PolicyViolation(format!(
            "relative reference '{reference}' not permitted outside scoped mode; use an absolute path"
        ))),
        AccessPolicy::Scoped { root } => {
            if escapes_root(path) {
                return Err(Error::PolicyViolation(format!(
                    "reference '{reference}' escapes the files directory"
                )));
            }
            Ok(ResolvedPath(root.join(path)))
        }
    }
}

/// Walk the components lexically; `..` past the starting point escapes.
fn escapes_root(relative: &Path) -> bool {
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            // Drive-relative forms such as `C:foo` carry a prefix without being absolute.
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

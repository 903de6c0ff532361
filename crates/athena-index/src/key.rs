use std::fmt;
use std::path::{Component, Path};

use crate::error::{IndexError, Result};

/// Logical name and version addressing one persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub name: String,
    pub version: String,
}

impl IndexKey {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Both parts must be a single plain path component, so the key can never address a
    /// location outside the storage base.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` naming the offending part.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_name(&self.version)
    }

    /// Directory name under the local storage base: `{name}-{version}`.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Object prefix in the cloud bucket: `{name}/{version}/index`.
    #[must_use]
    pub fn object_prefix(&self) -> String {
        format!("{}/{}/index", self.name, self.version)
    }
}

/// Accept only names that are one `Component::Normal` without separators.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    );
    if single && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(IndexError::InvalidName(name.to_owned()))
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

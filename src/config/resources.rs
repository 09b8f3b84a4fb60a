//! Resource discovery from text, files and the environment.

use crate::core::{FetchError, FetchResult, Resource};

use std::path::Path;

/// A list of egress resources to load into a pool.
///
/// ```rust
/// use patentbridge::config::ResourceList;
///
/// let list = ResourceList::parse("
///     # datacenter
///     http://10.0.0.1:8080, http://10.0.0.2:8080
///     socks5://10.0.0.3:1080
/// ");
/// assert_eq!(list.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceList {
    resources: Vec<Resource>,
}

impl ResourceList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a newline or comma separated list.
    ///
    /// Blank entries and lines starting with `#` are skipped. Duplicates keep
    /// their first position.
    pub fn parse(text: &str) -> Self {
        let mut list = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            for entry in line.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                list.push(Resource::new(entry));
            }
        }
        list
    }

    /// Reads a list from a file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> FetchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FetchError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(Self::parse(&text))
    }

    /// Reads a list from an environment variable.
    ///
    /// An unset variable yields an empty list.
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                tracing::debug!(var = var, "Resource variable not set");
                Self::new()
            }
        }
    }

    /// Turns raw API keys into credential resources (`scheme://KEY`).
    pub fn from_api_keys<I, S>(scheme: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for key in keys {
            let key = key.as_ref().trim();
            if !key.is_empty() {
                list.push(Resource::credential(scheme, key));
            }
        }
        list
    }

    /// Appends a resource unless it is already listed.
    pub fn push(&mut self, resource: Resource) -> bool {
        if self.resources.contains(&resource) {
            return false;
        }
        self.resources.push(resource);
        true
    }

    /// Appends every resource of `other`.
    pub fn merge(mut self, other: ResourceList) -> Self {
        for resource in other.resources {
            self.push(resource);
        }
        self
    }

    /// Returns the resources.
    pub fn as_slice(&self) -> &[Resource] {
        &self.resources
    }

    /// Returns redacted labels for logging.
    pub fn labels(&self) -> Vec<String> {
        self.resources.iter().map(Resource::label).collect()
    }

    /// Returns the number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl IntoIterator for ResourceList {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.into_iter()
    }
}

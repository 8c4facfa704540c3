//! Mapping between caller-relative paths and repository paths.

const SEPARATOR: char = '/';

/// Prepends a configured root to caller paths and normalizes separators.
///
/// Repository paths never carry a leading or trailing slash; the repository
/// root itself is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathPrefixer {
    prefix: String,
}

impl PathPrefixer {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: normalize(prefix) }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a caller-relative path to its location in the repository.
    pub fn prefix_path(&self, path: &str) -> String {
        let relative = normalize(path);
        match (self.prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative,
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}{}{}", self.prefix, SEPARATOR, relative),
        }
    }

    /// Inverse of [`prefix_path`](Self::prefix_path) for paths reported by the repository.
    pub fn strip_prefix(&self, location: &str) -> String {
        let location = normalize(location);
        if self.prefix.is_empty() {
            return location;
        }
        if location == self.prefix {
            return String::new();
        }
        match location.strip_prefix(&self.prefix) {
            Some(rest) if rest.starts_with(SEPARATOR) => rest[1..].to_string(),
            _ => location,
        }
    }
}

/// Join a directory path and a child name using repository separators.
pub fn join(directory: &str, name: &str) -> String {
    let directory = normalize(directory);
    let name = normalize(name);
    if directory.is_empty() {
        name
    } else if name.is_empty() {
        directory
    } else {
        format!("{}{}{}", directory, SEPARATOR, name)
    }
}

/// Collapse `\`, repeated separators and `.` segments; trim both ends.
pub fn normalize(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

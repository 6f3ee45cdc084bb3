//! Hierarchical location of a module inside nested containers.

use std::fmt;

/// Separator used when none is configured.
pub const DEFAULT_SEPARATOR: char = '/';

/// Immutable list of path components joined by a separator.
///
/// The empty path has no components and renders as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPath {
    components: Vec<String>,
    separator: char,
}

impl DataPath {
    /// Path without components.
    pub fn empty(separator: char) -> Self {
        Self {
            components: Vec::new(),
            separator,
        }
    }

    /// Split `text` on `separator`, dropping empty components.
    pub fn parse(text: &str, separator: char) -> Self {
        Self {
            components: split(text, separator),
            separator,
        }
    }

    /// New path with the components of `component` appended.
    pub fn append(&self, component: &str) -> Self {
        let mut components = self.components.clone();
        components.extend(split(component, self.separator));
        Self {
            components,
            separator: self.separator,
        }
    }

    /// Remaining components when `prefix` is a component-wise leading part of this path.
    ///
    /// ```
    /// use chipscan::DataPath;
    ///
    /// let path = DataPath::parse("disk.scl/SONG.C/#2", '/');
    /// assert_eq!(path.extract("disk.scl").unwrap().as_string(), "SONG.C/#2");
    /// assert!(path.extract("disk").is_none());
    /// ```
    pub fn extract(&self, prefix: &str) -> Option<Self> {
        let prefix = split(prefix, self.separator);
        if prefix.len() > self.components.len() || self.components[..prefix.len()] != prefix[..] {
            return None;
        }
        Some(Self {
            components: self.components[prefix.len()..].to_vec(),
            separator: self.separator,
        })
    }

    /// Whether `other` is a component-wise prefix of this path.
    pub fn starts_with(&self, other: &DataPath) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    /// Components joined with the separator.
    pub fn as_string(&self) -> String {
        let mut separator = [0u8; 4];
        self.components.join(self.separator.encode_utf8(&mut separator))
    }

    /// First component, if any.
    pub fn first_component(&self) -> Option<&str> {
        self.components.first().map(String::as_str)
    }

    /// Path without its last component; the empty path is its own parent.
    pub fn parent(&self) -> Self {
        let keep = self.components.len().saturating_sub(1);
        Self {
            components: self.components[..keep].to_vec(),
            separator: self.separator,
        }
    }

    /// All components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Separator character.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Whether this is the empty path.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for DataPath {
    fn default() -> Self {
        Self::empty(DEFAULT_SEPARATOR)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

fn split(text: &str, separator: char) -> Vec<String> {
    text.split(separator)
        .filter(|component| !component.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_components() {
        let path = DataPath::parse("/first//second/", '/');
        assert_eq!(path.components(), &["first", "second"]);
        assert_eq!(path.as_string(), "first/second");
        assert!(DataPath::parse("///", '/').is_empty());
        assert_eq!(DataPath::parse("", '/').as_string(), "");
    }

    #[test]
    fn append_to_empty_equals_parse() {
        let empty = DataPath::empty('/');
        assert_eq!(empty.append("a/b"), DataPath::parse("a/b", '/'));
        let path = DataPath::parse("a", '/').append("b/c");
        assert_eq!(path.components(), &["a", "b", "c"]);
    }

    #[test]
    fn extract_literal_prefix() {
        let path = DataPath::parse("first/second/third", '/');
        assert_eq!(path.extract("first"), Some(DataPath::parse("second/third", '/')));
        assert_eq!(path.extract("first/second/third"), Some(DataPath::empty('/')));
        assert_eq!(path.extract(""), Some(path.clone()));
    }

    #[test]
    fn extract_rejects_non_prefix() {
        let path = DataPath::parse("first/second", '/');
        assert_eq!(path.extract("second"), None);
        assert_eq!(path.extract("fir"), None);
        assert_eq!(path.extract("first/second/third"), None);
    }

    #[test]
    fn parent_and_first_component() {
        let path = DataPath::parse("a/b/c", '/');
        assert_eq!(path.first_component(), Some("a"));
        assert_eq!(path.parent().as_string(), "a/b");
        assert!(DataPath::empty('/').parent().is_empty());
        assert_eq!(DataPath::empty('/').first_component(), None);
    }

    #[test]
    fn custom_separator() {
        let path = DataPath::parse("disk.trd|SONG.C", '|');
        assert_eq!(path.append("#1").to_string(), "disk.trd|SONG.C|#1");
        assert!(path.starts_with(&DataPath::parse("disk.trd", '|')));
    }
}

//! Locations of modules: `path/to/file.ext?sub/path`.

use std::fmt;

/// Delimiter between the file path and the subpath inside it.
pub const SUBPATH_DELIMITER: char = '?';

/// Parsed module location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Identifier {
    path: String,
    subpath: String,
}

impl Identifier {
    /// Split `location` at the first `?`.
    ///
    /// ```
    /// use chipscan::Identifier;
    ///
    /// let id = Identifier::parse("music/disk.scl?SONG.C/#2");
    /// assert_eq!(id.path(), "music/disk.scl");
    /// assert_eq!(id.subpath(), "SONG.C/#2");
    /// assert_eq!(id.filename(), "disk.scl");
    /// assert_eq!(id.extension(), "scl");
    /// ```
    pub fn parse(location: &str) -> Self {
        match location.split_once(SUBPATH_DELIMITER) {
            Some((path, subpath)) => Self {
                path: path.to_string(),
                subpath: subpath.to_string(),
            },
            None => Self {
                path: location.to_string(),
                subpath: String::new(),
            },
        }
    }

    /// Same file, different subpath.
    pub fn with_subpath(&self, subpath: &str) -> Self {
        Self {
            path: self.path.clone(),
            subpath: subpath.to_string(),
        }
    }

    /// File path part.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Location inside the file, empty for the file itself.
    pub fn subpath(&self) -> &str {
        &self.subpath
    }

    /// Path and subpath joined with `?`; just the path if there is no subpath.
    pub fn full(&self) -> String {
        if self.subpath.is_empty() {
            self.path.clone()
        } else {
            format!("{}{SUBPATH_DELIMITER}{}", self.path, self.subpath)
        }
    }

    /// Last component of the path (either separator style).
    pub fn filename(&self) -> &str {
        self.path
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
    }

    /// Filename text after the last dot, empty if there is none.
    pub fn extension(&self) -> &str {
        match self.filename().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext,
            _ => "",
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path() {
        let id = Identifier::parse("C:\\music\\tune.ym");
        assert_eq!(id.filename(), "tune.ym");
        assert_eq!(id.extension(), "ym");
        assert_eq!(id.subpath(), "");
        assert_eq!(id.full(), "C:\\music\\tune.ym");
    }

    #[test]
    fn subpath_round_trip() {
        let id = Identifier::parse("a/b.trd").with_subpath("+512/#3");
        assert_eq!(id.full(), "a/b.trd?+512/#3");
        assert_eq!(Identifier::parse(&id.full()), id);
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert_eq!(Identifier::parse(".hidden").extension(), "");
        assert_eq!(Identifier::parse("noext").extension(), "");
        assert_eq!(Identifier::parse("").filename(), "");
    }
}

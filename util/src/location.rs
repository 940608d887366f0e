use std::fmt;
use std::path::{Path, PathBuf};

/// A position in a source file. `line` and `column` are zero-based; `-1`
/// means "not set" (a file-level location has no line, a line-level location
/// may have no column). Printing is one-based.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Location {
    path: PathBuf,
    line: i32,
    column: i32,
}

impl Location {
    pub fn new<P: Into<PathBuf>>(path: P) -> Location {
        Location {
            path: path.into(),
            line: -1,
            column: -1,
        }
    }

    pub fn at<P: Into<PathBuf>>(path: P, line: i32) -> Location {
        Location {
            path: path.into(),
            line,
            column: -1,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&self) -> i32 {
        self.line
    }

    pub fn column(&self) -> i32 {
        self.column
    }

    /// Chainable column update, used as `loc.copy().with_column(n)`.
    pub fn with_column(mut self, column: i32) -> Location {
        self.column = column;
        self
    }

    pub fn with_line(mut self, line: i32) -> Location {
        self.line = line;
        self
    }

    pub fn set_column(&mut self, column: i32) {
        self.column = column;
    }

    pub fn copy(&self) -> Location {
        self.clone()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if self.line > -1 {
            write!(f, ":{}", self.line + 1)?;
            if self.column > -1 {
                write!(f, ":{}", self.column + 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_is_one_based() {
        let loc = Location::at("prog.asm", 4).with_column(2);
        assert_eq!(loc.to_string(), "prog.asm:5:3");
    }

    #[test]
    fn file_level_location_has_no_line() {
        let loc = Location::new("prog.asm");
        assert_eq!(loc.to_string(), "prog.asm");
    }

    #[test]
    fn copy_with_column_leaves_original() {
        let loc = Location::at("prog.asm", 1);
        let moved = loc.copy().with_column(7);
        assert_eq!(loc.column(), -1);
        assert_eq!(moved.column(), 7);
    }
}

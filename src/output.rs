use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::Error;

pub const HARNESS_FILE: &str = "fuzz.rs";
pub const MANIFEST_FILE: &str = "Cargo.toml";

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct GeneratedFile {
    pub path:     PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    /// Writes the file, creating missing parent directories and replacing any previous contents.
    pub fn write(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(Error::fs(parent))?;
            }
        }

        fs::write(&self.path, &self.contents).map_err(Error::fs(&self.path))
    }
}

/// Name of the harness for `symbol`, e.g. `fuzz_add` or `fuzz_ops__add`.
pub fn harness_name(symbol: &str) -> String {
    format!("fuzz_{}", symbol.replace("::", "__"))
}

pub fn harness_dir(package_dir: &Path, symbol: &str) -> PathBuf {
    package_dir.join(harness_name(symbol))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn names() {
        assert_eq!(harness_name("add"), "fuzz_add");
        assert_eq!(harness_name("ops::checked::add"), "fuzz_ops__checked__add");
        assert_eq!(
            harness_dir(Path::new("math"), "add"),
            PathBuf::from("math").join("fuzz_add")
        );
    }

    #[test]
    fn write_creates_dirs_and_overwrites() {
        let tempdir = tempdir().unwrap();
        let path = tempdir.path().join("fuzz_add").join(HARNESS_FILE);
        let mut file = GeneratedFile {
            path:     path.clone(),
            contents: "first".to_owned(),
        };

        file.write().unwrap();
        file.contents = "second".to_owned();
        file.write().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn write_fails_under_a_file() {
        let tempdir = tempdir().unwrap();
        let blocker = tempdir.path().join("blocker");

        fs::write(&blocker, "").unwrap();

        let file = GeneratedFile {
            path:     blocker.join("fuzz.rs"),
            contents: String::new(),
        };

        assert!(matches!(file.write(), Err(Error::FileSystem { .. })));
    }
}

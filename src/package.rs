//! Cargo manifest discovery.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::Error;

const MANIFEST: &str = "Cargo.toml";
const GLOB_CHARS: [char; 3] = ['*', '?', '['];

/// A Cargo package with a library target.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Package {
    /// Package name from `Cargo.toml`.
    pub name:       String,
    /// Library crate name as written in Rust paths.
    pub crate_name: String,
    /// Directory holding `Cargo.toml`.
    pub dir:        PathBuf,
    /// Root source file of the library target.
    pub lib_root:   PathBuf,
}

impl Package {
    /// Loads the single package at `location`, a package directory or its `Cargo.toml`.
    pub fn load(location: &Path) -> Result<Self, Error> {
        let mut members = discover(location)?;

        if members.len() != 1 {
            return Err(Error::AmbiguousPackage {
                location: location.to_path_buf(),
                packages: members.iter().map(|m| m.package.name.clone()).collect(),
            });
        }

        let Member { dir, package, lib } = members.remove(0);
        let lib_root = match &lib {
            | Some(ManifestTarget { path: Some(path), .. }) => dir.join(path),
            | Some(_) => dir.join("src").join("lib.rs"),
            | None if package.autolib != Some(false) && dir.join("src").join("lib.rs").is_file() => {
                dir.join("src").join("lib.rs")
            },
            | None => return Err(Error::MainPackage { package: package.name }),
        };
        let crate_name = lib
            .and_then(|lib| lib.name)
            .unwrap_or_else(|| package.name.replace('-', "_"));

        tracing::debug!(
            package = %package.name,
            lib_root = %lib_root.display(),
            "Loaded package."
        );

        Ok(Self {
            name: package.name,
            crate_name,
            dir,
            lib_root,
        })
    }
}

#[derive(Deserialize, Debug)]
struct Manifest {
    package:   Option<ManifestPackage>,
    lib:       Option<ManifestTarget>,
    workspace: Option<ManifestWorkspace>,
}

#[derive(Deserialize, Debug)]
struct ManifestPackage {
    name:    String,
    autolib: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct ManifestTarget {
    name: Option<String>,
    path: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct ManifestWorkspace {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug)]
struct Member {
    dir:     PathBuf,
    package: ManifestPackage,
    lib:     Option<ManifestTarget>,
}

fn discover(location: &Path) -> Result<Vec<Member>, Error> {
    let manifest_path = if location.is_file() {
        if location.file_name().map_or(true, |name| name != MANIFEST) {
            tracing::debug!(location = %location.display(), "Not a Cargo manifest.");

            return Ok(Vec::new());
        }

        location.to_path_buf()
    } else {
        location.join(MANIFEST)
    };

    if !manifest_path.is_file() {
        return Ok(Vec::new());
    }

    let dir = match manifest_path.parent() {
        | Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        | _ => PathBuf::from("."),
    };
    let manifest = read_manifest(&manifest_path)?;

    if let Some(package) = manifest.package {
        return Ok(vec![Member {
            dir,
            package,
            lib: manifest.lib,
        }]);
    }

    let Some(workspace) = manifest.workspace else {
        return Ok(Vec::new());
    };
    let excluded = workspace
        .exclude
        .iter()
        .map(|path| dir.join(path))
        .collect::<Vec<_>>();
    let mut members = Vec::new();

    for pattern in &workspace.members {
        for member_dir in expand_member(&dir, pattern)? {
            if excluded.contains(&member_dir) {
                continue;
            }

            let member_manifest = member_dir.join(MANIFEST);

            if !member_manifest.is_file() {
                continue;
            }

            let manifest = read_manifest(&member_manifest)?;

            if let Some(package) = manifest.package {
                members.push(Member {
                    dir: member_dir,
                    package,
                    lib: manifest.lib,
                });
            }
        }
    }

    Ok(members)
}

/// Expands a workspace member entry.
///
/// A single `*` is understood in the last path component, e.g. `crates/*` or
/// `crates/codec-*`. Other glob forms are skipped with a warning.
fn expand_member(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let pattern = pattern.trim_end_matches('/');
    let (parent, last) = match pattern.rsplit_once('/') {
        | Some((parent, last)) => (parent, last),
        | None => ("", pattern),
    };

    if parent.contains(GLOB_CHARS) || last.contains(['?', '[']) || last.matches('*').count() > 1 {
        tracing::warn!(pattern, "Unsupported workspace member glob, skipping.");

        return Ok(Vec::new());
    }

    let Some((prefix, suffix)) = last.split_once('*') else {
        return Ok(vec![root.join(pattern)]);
    };
    let parent = root.join(parent);

    if !parent.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();

    for entry in fs::read_dir(&parent).map_err(Error::fs(&parent))? {
        let entry = entry.map_err(Error::fs(&parent))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if name.len() >= prefix.len() + suffix.len()
            && name.starts_with(prefix)
            && name.ends_with(suffix)
            && entry.path().is_dir()
        {
            dirs.push(entry.path());
        }
    }

    dirs.sort();

    Ok(dirs)
}

fn read_manifest(path: &Path) -> Result<Manifest, Error> {
    let content = fs::read_to_string(path).map_err(Error::fs(path))?;

    toml::from_str(&content).map_err(|source| Error::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn library() {
        let tempdir = tempdir().unwrap();

        write(
            &tempdir.path().join("Cargo.toml"),
            "[package]\nname = \"math-utils\"\nversion = \"0.1.0\"\n",
        );
        write(&tempdir.path().join("src").join("lib.rs"), "");

        let package = Package::load(tempdir.path()).unwrap();

        assert_eq!(package.name, "math-utils");
        assert_eq!(package.crate_name, "math_utils");
        assert_eq!(package.dir, tempdir.path());
        assert_eq!(package.lib_root, tempdir.path().join("src").join("lib.rs"));
    }

    #[test]
    fn lib_table() {
        let tempdir = tempdir().unwrap();

        write(
            &tempdir.path().join("Cargo.toml"),
            "[package]\nname = \"codec\"\n\n[lib]\nname = \"wire\"\npath = \"lib/wire.rs\"\n",
        );

        let package = Package::load(&tempdir.path().join("Cargo.toml")).unwrap();

        assert_eq!(package.crate_name, "wire");
        assert_eq!(package.lib_root, tempdir.path().join("lib/wire.rs"));
    }

    #[test]
    fn binary_only() {
        let tempdir = tempdir().unwrap();

        write(
            &tempdir.path().join("Cargo.toml"),
            "[package]\nname = \"tool\"\n",
        );
        write(&tempdir.path().join("src").join("main.rs"), "fn main() {}");

        assert!(matches!(
            Package::load(tempdir.path()),
            Err(Error::MainPackage { package }) if package == "tool"
        ));
    }

    #[test]
    fn no_manifest() {
        let tempdir = tempdir().unwrap();

        assert!(matches!(
            Package::load(tempdir.path()),
            Err(Error::AmbiguousPackage { packages, .. }) if packages.is_empty()
        ));
    }

    #[test]
    fn workspace() {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path();

        write(
            &root.join("Cargo.toml"),
            "[workspace]\nmembers = [\"crates/*\", \"tools/gen\"]\n",
        );
        write(&root.join("crates/a/Cargo.toml"), "[package]\nname = \"a\"\n");
        write(&root.join("crates/b/Cargo.toml"), "[package]\nname = \"b\"\n");
        write(&root.join("tools/gen/Cargo.toml"), "[package]\nname = \"gen\"\n");

        match Package::load(root) {
            | Err(Error::AmbiguousPackage { packages, .. }) => {
                assert_eq!(packages, vec!["a", "b", "gen"]);
            },
            | other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn single_member_workspace() {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path();

        write(&root.join("Cargo.toml"), "[workspace]\nmembers = [\"core\"]\n");
        write(&root.join("core/Cargo.toml"), "[package]\nname = \"core-lib\"\n");
        write(&root.join("core/src/lib.rs"), "");

        let package = Package::load(root).unwrap();

        assert_eq!(package.name, "core-lib");
        assert_eq!(package.dir, root.join("core"));
    }

    #[test]
    fn bad_manifest() {
        let tempdir = tempdir().unwrap();

        write(&tempdir.path().join("Cargo.toml"), "[package\n");

        assert!(matches!(
            Package::load(tempdir.path()),
            Err(Error::Manifest { .. })
        ));
    }

    #[test]
    fn workspace_globs() {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path();

        write(
            &root.join("Cargo.toml"),
            "[workspace]\nmembers = [\"crates/codec-*\", \"tools/*/\", \"*/nested\"]\n\
             exclude = [\"tools/scratch\"]\n",
        );
        write(&root.join("crates/codec-json/Cargo.toml"), "[package]\nname = \"json\"\n");
        write(&root.join("crates/codec-toml/Cargo.toml"), "[package]\nname = \"toml\"\n");
        write(&root.join("crates/runtime/Cargo.toml"), "[package]\nname = \"runtime\"\n");
        write(&root.join("tools/gen/Cargo.toml"), "[package]\nname = \"gen\"\n");
        write(&root.join("tools/scratch/Cargo.toml"), "[package]\nname = \"scratch\"\n");
        write(&root.join("misc/nested/Cargo.toml"), "[package]\nname = \"nested\"\n");

        match Package::load(root) {
            | Err(Error::AmbiguousPackage { packages, .. }) => {
                assert_eq!(packages, vec!["json", "toml", "gen"]);
            },
            | other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn excluded_member() {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path();

        write(
            &root.join("Cargo.toml"),
            "[workspace]\nmembers = [\"crates/*\"]\nexclude = [\"crates/bench\"]\n",
        );
        write(&root.join("crates/core/Cargo.toml"), "[package]\nname = \"core-lib\"\n");
        write(&root.join("crates/core/src/lib.rs"), "");
        write(&root.join("crates/bench/Cargo.toml"), "[package]\nname = \"bench\"\n");

        let package = Package::load(root).unwrap();

        assert_eq!(package.name, "core-lib");
    }

    #[test]
    fn source_file_location() {
        let tempdir = tempdir().unwrap();
        let lib = tempdir.path().join("src").join("lib.rs");

        write(&tempdir.path().join("Cargo.toml"), "[package]\nname = \"math\"\n");
        write(&lib, "pub fn add(x: i32) -> i32 { x }\n");

        assert!(matches!(
            Package::load(&lib),
            Err(Error::AmbiguousPackage { packages, .. }) if packages.is_empty()
        ));
    }
}

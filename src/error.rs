use std::{fmt, io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "expected exactly one package under {}, found {}: [{}]",
        .location.display(),
        .packages.len(),
        .packages.join(", ")
    )]
    AmbiguousPackage {
        location: PathBuf,
        packages: Vec<String>,
    },

    #[error("cannot fuzz package `{package}`: it has no library target")]
    MainPackage { package: String },

    #[error("didn't find `{symbol}` in package `{package}`")]
    SymbolNotFound { package: String, symbol: String },

    #[error("`{symbol}` in package `{package}` is a {kind}, not a function")]
    NotAFunction {
        package: String,
        symbol:  String,
        kind:    SymbolKind,
    },

    #[error("`{symbol}` in package `{package}` is not public")]
    NotPublic { package: String, symbol: String },

    #[error("cannot generate a harness for `{symbol}`: {reason}")]
    UnsupportedSignature { symbol: String, reason: String },

    #[error("file system error at {}", .path.display())]
    FileSystem {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest {}", .path.display())]
    Manifest {
        path:   PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path:   PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("failed to render harness")]
    Render(#[from] tera::Error),
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();

        move |source| Self::FileSystem { path, source }
    }
}

/// Kind of a named item that was found where a function was expected.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SymbolKind {
    Const,
    Static,
    Struct,
    Enum,
    Union,
    TypeAlias,
    Trait,
    TraitAlias,
    Module,
    Macro,
    ExternCrate,
    Import,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            | SymbolKind::Const => "constant",
            | SymbolKind::Static => "static",
            | SymbolKind::Struct => "struct",
            | SymbolKind::Enum => "enum",
            | SymbolKind::Union => "union",
            | SymbolKind::TypeAlias => "type alias",
            | SymbolKind::Trait => "trait",
            | SymbolKind::TraitAlias => "trait alias",
            | SymbolKind::Module => "module",
            | SymbolKind::Macro => "macro",
            | SymbolKind::ExternCrate => "extern crate",
            | SymbolKind::Import => "use import",
        })
    }
}

//! Function symbol lookup in a library crate.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use syn::{Attribute, Item, ItemFn, ItemMod, Meta, UseTree, Visibility};

use crate::{package::Package, Error, SymbolKind};

/// A public free function inside a library crate.
#[derive(Clone, Debug)]
pub struct ResolvedFunction {
    pub package:     Package,
    /// Modules between the crate root and the function.
    pub module_path: Vec<String>,
    pub item:        ItemFn,
}

impl ResolvedFunction {
    pub fn name(&self) -> String {
        self.item.sig.ident.to_string()
    }

    /// Path of the function relative to the crate root, e.g. `ops::add`.
    pub fn symbol(&self) -> String {
        self.module_path
            .iter()
            .cloned()
            .chain(std::iter::once(self.name()))
            .collect::<Vec<_>>()
            .join("::")
    }
}

/// Loaded packages and parsed source files for one run.
///
/// Everything is read at most once and never changes afterwards.
#[derive(Default, Debug)]
pub struct Session {
    packages: HashMap<PathBuf, Package>,
    files:    HashMap<PathBuf, Rc<syn::File>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(&mut self, location: &Path) -> Result<Package, Error> {
        if let Some(package) = self.packages.get(location) {
            return Ok(package.clone());
        }

        let package = Package::load(location)?;

        self.packages
            .insert(location.to_path_buf(), package.clone());

        Ok(package)
    }

    /// Resolves `function`, a name or `::`-separated module path, in the package at `location`.
    pub fn resolve(&mut self, location: &Path, function: &str) -> Result<ResolvedFunction, Error> {
        let package = self.package(location)?;
        let not_found = || Error::SymbolNotFound {
            package: package.name.clone(),
            symbol:  function.to_owned(),
        };
        let path = function.trim();
        let path = path.strip_prefix("crate::").unwrap_or(path);
        let segments = path.split("::").map(str::trim).collect::<Vec<_>>();

        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(not_found());
        }

        let (name, modules) = segments.split_last().ok_or_else(not_found)?;
        let mut scope = Scope {
            items:     self.file(&package.lib_root)?.items.clone(),
            file_dir:  parent_dir(&package.lib_root),
            child_dir: parent_dir(&package.lib_root),
        };

        for (i, module) in modules.iter().enumerate() {
            let item = find(&scope.items, module)
                .into_iter()
                .find_map(|item| match item {
                    | Item::Mod(item) => Some(item),
                    | _ => None,
                })
                .ok_or_else(not_found)?;

            if !is_public(&item.vis) {
                return Err(Error::NotPublic {
                    package: package.name.clone(),
                    symbol:  modules[..=i].join("::"),
                });
            }

            scope = self.enter(&scope, item)?;
        }

        let candidates = find(&scope.items, name);
        let functions = candidates
            .iter()
            .filter_map(|item| match item {
                | Item::Fn(item) => Some(item),
                | _ => None,
            })
            .collect::<Vec<_>>();

        if functions.len() > 1 {
            tracing::debug!(
                package = %package.name,
                symbol = path,
                count = functions.len(),
                "Several cfg-gated definitions, preferring one outside `cfg(test)`."
            );
        }

        let item = match functions
            .iter()
            .find(|item| !is_test_only(&item.attrs))
            .or_else(|| functions.first())
        {
            | Some(item) => *item,
            | None => {
                return Err(match candidates.first() {
                    | Some(item) => Error::NotAFunction {
                        package: package.name.clone(),
                        symbol:  path.to_owned(),
                        kind:    kind_of(item),
                    },
                    | None => not_found(),
                })
            },
        };

        if !is_public(&item.vis) {
            return Err(Error::NotPublic {
                package: package.name.clone(),
                symbol:  path.to_owned(),
            });
        }

        tracing::debug!(package = %package.name, symbol = path, "Resolved function.");

        Ok(ResolvedFunction {
            module_path: modules.iter().map(|m| m.to_string()).collect(),
            item: item.clone(),
            package,
        })
    }

    fn file(&mut self, path: &Path) -> Result<Rc<syn::File>, Error> {
        if let Some(file) = self.files.get(path) {
            return Ok(file.clone());
        }

        let content = fs::read_to_string(path).map_err(Error::fs(path))?;
        let file = Rc::new(syn::parse_file(&content).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?);

        self.files.insert(path.to_path_buf(), file.clone());

        Ok(file)
    }

    fn enter(&mut self, scope: &Scope, item: &ItemMod) -> Result<Scope, Error> {
        let name = item.ident.to_string();
        let custom_path = path_attr(item);

        if let Some((_, items)) = &item.content {
            let child_dir = match &custom_path {
                | Some(path) => scope.child_dir.join(path),
                | None => scope.child_dir.join(&name),
            };

            return Ok(Scope {
                items:     items.clone(),
                file_dir:  child_dir.clone(),
                child_dir,
            });
        }

        let file = match &custom_path {
            | Some(path) => scope.file_dir.join(path),
            | None => {
                let flat = scope.child_dir.join(format!("{name}.rs"));

                if flat.is_file() {
                    flat
                } else {
                    scope.child_dir.join(&name).join("mod.rs")
                }
            },
        };
        let child_dir = if file.file_name().is_some_and(|f| f == "mod.rs") || custom_path.is_some() {
            parent_dir(&file)
        } else {
            scope.child_dir.join(&name)
        };

        Ok(Scope {
            items: self.file(&file)?.items.clone(),
            file_dir: parent_dir(&file),
            child_dir,
        })
    }
}

struct Scope {
    items:     Vec<Item>,
    /// Directory `#[path]` attributes are relative to.
    file_dir:  PathBuf,
    /// Directory holding the files of child modules.
    child_dir: PathBuf,
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn path_attr(item: &ItemMod) -> Option<String> {
    item.attrs.iter().find_map(|attr| {
        let Meta::NameValue(meta) = &attr.meta else {
            return None;
        };

        if !meta.path.is_ident("path") {
            return None;
        }

        match &meta.value {
            | syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(s),
                ..
            }) => Some(s.value()),
            | _ => None,
        }
    })
}

/// Whether `attrs` carry `#[cfg(test)]`.
fn is_test_only(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| match &attr.meta {
        | Meta::List(list) if list.path.is_ident("cfg") => list.tokens.to_string() == "test",
        | _ => false,
    })
}

fn is_public(vis: &Visibility) -> bool {
    matches!(vis, Visibility::Public(_))
}

/// Items in `items` that declare `name`, in source order.
fn find<'i>(items: &'i [Item], name: &str) -> Vec<&'i Item> {
    items
        .iter()
        .filter(|item| declares(item, name))
        .collect()
}

fn declares(item: &Item, name: &str) -> bool {
    let ident = match item {
        | Item::Fn(item) => &item.sig.ident,
        | Item::Const(item) => &item.ident,
        | Item::Static(item) => &item.ident,
        | Item::Struct(item) => &item.ident,
        | Item::Enum(item) => &item.ident,
        | Item::Union(item) => &item.ident,
        | Item::Type(item) => &item.ident,
        | Item::Trait(item) => &item.ident,
        | Item::TraitAlias(item) => &item.ident,
        | Item::Mod(item) => &item.ident,
        | Item::ExternCrate(item) => match &item.rename {
            | Some((_, rename)) => rename,
            | None => &item.ident,
        },
        | Item::Macro(item) => match &item.ident {
            | Some(ident) => ident,
            | None => return false,
        },
        | Item::Use(item) => return use_declares(&item.tree, name),
        | _ => return false,
    };

    ident == name
}

fn use_declares(tree: &UseTree, name: &str) -> bool {
    match tree {
        | UseTree::Path(path) => use_declares(&path.tree, name),
        | UseTree::Name(use_name) => use_name.ident == name,
        | UseTree::Rename(rename) => rename.rename == name,
        | UseTree::Glob(_) => false,
        | UseTree::Group(group) => group.items.iter().any(|tree| use_declares(tree, name)),
    }
}

fn kind_of(item: &Item) -> SymbolKind {
    match item {
        | Item::Const(_) => SymbolKind::Const,
        | Item::Static(_) => SymbolKind::Static,
        | Item::Struct(_) => SymbolKind::Struct,
        | Item::Enum(_) => SymbolKind::Enum,
        | Item::Union(_) => SymbolKind::Union,
        | Item::Type(_) => SymbolKind::TypeAlias,
        | Item::Trait(_) => SymbolKind::Trait,
        | Item::TraitAlias(_) => SymbolKind::TraitAlias,
        | Item::Mod(_) => SymbolKind::Module,
        | Item::Macro(_) => SymbolKind::Macro,
        | Item::ExternCrate(_) => SymbolKind::ExternCrate,
        | _ => SymbolKind::Import,
    }
}

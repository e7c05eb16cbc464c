//! Splits a resolved function's signature into harness parameters.

use std::collections::HashSet;

use harnessgen_render::{Fill, ParameterSpec, Pass, RESERVED_IDENTS};
use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use syn::{
    FnArg,
    GenericArgument,
    GenericParam,
    Lifetime,
    Pat,
    PathArguments,
    ReturnType,
    Type,
    TypeParamBound,
};

use crate::{resolve::ResolvedFunction, Error};

/// Parameters of `resolved` in declaration order.
///
/// A function without parameters yields an empty list.
pub fn decompose(resolved: &ResolvedFunction) -> Result<Vec<ParameterSpec>, Error> {
    let sig = &resolved.item.sig;
    let unsupported = |reason: &str| Error::UnsupportedSignature {
        symbol: resolved.symbol(),
        reason: reason.to_owned(),
    };

    if sig.asyncness.is_some() {
        return Err(unsupported("async functions need an executor"));
    }

    if sig.variadic.is_some() {
        return Err(unsupported("variadic functions are not supported"));
    }

    if sig
        .generics
        .params
        .iter()
        .any(|param| !matches!(param, GenericParam::Lifetime(_)))
    {
        return Err(unsupported("generic functions are not supported"));
    }

    let mut taken = HashSet::new();
    let mut params = Vec::with_capacity(sig.inputs.len());

    for (i, input) in sig.inputs.iter().enumerate() {
        let FnArg::Typed(arg) = input else {
            return Err(unsupported("functions with a receiver are not supported"));
        };
        let name = unique_name(binding_name(&arg.pat, i), &mut taken);
        let (local_type, pass, fill) = binding(&arg.ty).map_err(|reason| unsupported(&reason))?;

        params.push(ParameterSpec {
            name,
            type_name: type_name(&arg.ty, false),
            local_type,
            pass,
            fill,
        });
    }

    tracing::debug!(
        symbol = %resolved.symbol(),
        params = ?params.iter().map(|p| format!("{}: {}", p.name, p.type_name)).collect::<Vec<_>>(),
        "Decomposed signature."
    );

    Ok(params)
}

fn binding_name(pat: &Pat, i: usize) -> String {
    match pat {
        | Pat::Ident(pat) if pat.subpat.is_none() => {
            let name = pat.ident.to_string();

            if RESERVED_IDENTS.contains(&name.as_str()) {
                format!("{name}_arg")
            } else {
                name
            }
        },
        | _ => format!("arg{i}"),
    }
}

fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 1;

    while !taken.insert(candidate.clone()) {
        candidate = format!("{name}_{n}");
        n += 1;
    }

    candidate
}

/// Local type, passing mode and fill for a parameter of type `ty`.
fn binding(ty: &Type) -> Result<(String, Pass, Fill), String> {
    if mentions_static(ty.to_token_stream()) {
        return Err("`'static` borrows cannot be drawn from the fuzzer input".to_owned());
    }

    match ty {
        | Type::ImplTrait(_) => Err("`impl Trait` parameters are not supported".to_owned()),
        | Type::Group(group) => binding(&group.elem),
        | Type::Paren(paren) => binding(&paren.elem),
        | Type::Reference(reference) => {
            let pass = if reference.mutability.is_some() {
                Pass::RefMut
            } else {
                Pass::Ref
            };

            match (&*reference.elem, pass) {
                | (Type::TraitObject(_) | Type::ImplTrait(_), _) => {
                    Err("trait object parameters are not supported".to_owned())
                },
                | (elem, Pass::Ref) if is_borrowed_input(elem) => {
                    Ok((type_name(ty, true), Pass::Value, Fill::Arbitrary))
                },
                | (elem, Pass::RefMut) if is_path(elem, "str") => {
                    Err("`&mut str` parameters are not supported".to_owned())
                },
                | (Type::Slice(slice), pass) => {
                    Ok((format!("Vec<{}>", type_name(&slice.elem, true)), pass, Fill::Arbitrary))
                },
                | (elem, pass) if option_inner(elem).is_some() => {
                    Ok((type_name(elem, true), pass, Fill::Some))
                },
                | (elem, pass) => Ok((type_name(elem, true), pass, Fill::Arbitrary)),
            }
        },
        | ty if option_inner(ty).is_some() => Ok((type_name(ty, true), Pass::Value, Fill::Some)),
        | ty => Ok((type_name(ty, true), Pass::Value, Fill::Arbitrary)),
    }
}

fn mentions_static(tokens: TokenStream) -> bool {
    let mut after_quote = false;

    for token in tokens {
        match token {
            | TokenTree::Punct(punct) if punct.as_char() == '\'' => {
                after_quote = true;
                continue;
            },
            | TokenTree::Ident(ident) if after_quote && ident == "static" => return true,
            | TokenTree::Group(group) if mentions_static(group.stream()) => return true,
            | _ => (),
        }

        after_quote = false;
    }

    false
}

/// `str` and `[u8]` borrow straight from the fuzzer input.
fn is_borrowed_input(ty: &Type) -> bool {
    match ty {
        | Type::Slice(slice) => is_path(&slice.elem, "u8"),
        | ty => is_path(ty, "str"),
    }
}

fn is_path(ty: &Type, ident: &str) -> bool {
    matches!(ty, Type::Path(path) if path.qself.is_none() && path.path.is_ident(ident))
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;

    if path.qself.is_some() || segment.ident != "Option" {
        return None;
    }

    match &segment.arguments {
        | PathArguments::AngleBracketed(args) if args.args.len() == 1 => match &args.args[0] {
            | GenericArgument::Type(inner) => Some(inner),
            | _ => None,
        },
        | _ => None,
    }
}

/// Canonical spelling of `ty`. Named lifetimes are dropped when `erase` is set.
fn type_name(ty: &Type, erase: bool) -> String {
    match ty {
        | Type::Path(path) if path.qself.is_none() => path_name(&path.path, erase),
        | Type::Reference(reference) => {
            let mut s = String::from("&");

            if let Some(lifetime) = &reference.lifetime {
                if !(erase && is_erasable(lifetime)) {
                    s.push_str(&format!("{lifetime} "));
                }
            }

            if reference.mutability.is_some() {
                s.push_str("mut ");
            }

            s.push_str(&type_name(&reference.elem, erase));
            s
        },
        | Type::Slice(slice) => format!("[{}]", type_name(&slice.elem, erase)),
        | Type::Array(array) => format!(
            "[{}; {}]",
            type_name(&array.elem, erase),
            tokens(&array.len)
        ),
        | Type::Tuple(tuple) => {
            let elems = tuple
                .elems
                .iter()
                .map(|elem| type_name(elem, erase))
                .collect::<Vec<_>>();

            match elems.len() {
                | 1 => format!("({},)", elems[0]),
                | _ => format!("({})", elems.join(", ")),
            }
        },
        | Type::Ptr(ptr) => format!(
            "*{} {}",
            if ptr.mutability.is_some() { "mut" } else { "const" },
            type_name(&ptr.elem, erase)
        ),
        | Type::Paren(paren) => format!("({})", type_name(&paren.elem, erase)),
        | Type::Group(group) => type_name(&group.elem, erase),
        | Type::Never(_) => "!".to_owned(),
        | Type::Infer(_) => "_".to_owned(),
        | Type::TraitObject(object) => format!("dyn {}", bounds_name(object.bounds.iter(), erase)),
        | Type::ImplTrait(object) => format!("impl {}", bounds_name(object.bounds.iter(), erase)),
        | ty => tokens(ty),
    }
}

fn path_name(path: &syn::Path, erase: bool) -> String {
    let mut s = String::new();

    if path.leading_colon.is_some() {
        s.push_str("::");
    }

    for (i, segment) in path.segments.iter().enumerate() {
        if i > 0 {
            s.push_str("::");
        }

        s.push_str(&segment.ident.to_string());

        match &segment.arguments {
            | PathArguments::None => (),
            | PathArguments::AngleBracketed(args) => {
                let args = args
                    .args
                    .iter()
                    .map(|arg| match arg {
                        | GenericArgument::Lifetime(lifetime) if erase && is_erasable(lifetime) => {
                            "'_".to_owned()
                        },
                        | GenericArgument::Lifetime(lifetime) => lifetime.to_string(),
                        | GenericArgument::Type(ty) => type_name(ty, erase),
                        | GenericArgument::AssocType(assoc) => {
                            format!("{} = {}", assoc.ident, type_name(&assoc.ty, erase))
                        },
                        | arg => tokens(arg),
                    })
                    .collect::<Vec<_>>();

                s.push_str(&format!("<{}>", args.join(", ")));
            },
            | PathArguments::Parenthesized(args) => {
                let inputs = args
                    .inputs
                    .iter()
                    .map(|ty| type_name(ty, erase))
                    .collect::<Vec<_>>();

                s.push_str(&format!("({})", inputs.join(", ")));

                if let ReturnType::Type(_, ty) = &args.output {
                    s.push_str(&format!(" -> {}", type_name(ty, erase)));
                }
            },
        }
    }

    s
}

fn bounds_name<'b>(bounds: impl Iterator<Item = &'b TypeParamBound>, erase: bool) -> String {
    bounds
        .map(|bound| match bound {
            | TypeParamBound::Trait(bound) if bound.lifetimes.is_none() => {
                let modifier = match bound.modifier {
                    | syn::TraitBoundModifier::None => "",
                    | syn::TraitBoundModifier::Maybe(_) => "?",
                };

                format!("{modifier}{}", path_name(&bound.path, erase))
            },
            | TypeParamBound::Lifetime(lifetime) => lifetime.to_string(),
            | bound => tokens(bound),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn is_erasable(lifetime: &Lifetime) -> bool {
    lifetime.ident != "static"
}

fn tokens(node: &impl ToTokens) -> String {
    node.to_token_stream().to_string()
}

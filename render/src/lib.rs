//! Renders `cargo fuzz` harnesses for a single library function.
//!
//! Rendering is a pure function of its request: the same [`HarnessRequest`]
//! always produces the same text.

use serde::Serialize;
use tera::Tera;

/// Identifiers the harness template declares itself. Parameters must not use them.
pub const RESERVED_IDENTS: &[&str] = &["fuzz_bytes", "fuzz_input"];

static HARNESS_TMPL: &str = include_str!("fuzz.rs.tera.tmpl");
static MANIFEST_TMPL: &str = include_str!("Cargo.toml.tera.tmpl");

/// How the harness local is handed to the target function.
#[derive(Serialize, PartialEq, Eq, Clone, Copy, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Value,
    Ref,
    RefMut,
}

/// How the harness local is drawn from the fuzzer input.
#[derive(Serialize, PartialEq, Eq, Clone, Copy, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Arbitrary,
    /// `Option<T>` parameters are wrapped so they are never `None`.
    Some,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ParameterSpec {
    pub name:       String,
    /// The declared type, e.g. `&'a [u8]` or `Option<u32>`.
    pub type_name:  String,
    /// The type of the harness local holding the value.
    pub local_type: String,
    pub pass:       Pass,
    pub fill:       Fill,
}

impl ParameterSpec {
    /// A parameter taken by value and drawn directly.
    #[cfg(test)]
    fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();

        Self {
            name: name.into(),
            local_type: type_name.clone(),
            type_name,
            pass: Pass::Value,
            fill: Fill::Arbitrary,
        }
    }

    fn arg_expr(&self) -> String {
        match self.pass {
            | Pass::Value => self.name.clone(),
            | Pass::Ref => format!("&{}", self.name),
            | Pass::RefMut => format!("&mut {}", self.name),
        }
    }

    fn fill_expr(&self) -> &'static str {
        match self.fill {
            | Fill::Arbitrary => "fill!(fuzz_input)",
            | Fill::Some => "Some(fill!(fuzz_input))",
        }
    }
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct HarnessRequest {
    /// Library crate name as written in Rust paths.
    pub crate_name:    String,
    /// Modules between the crate root and the function.
    pub module_path:   Vec<String>,
    pub function_name: String,
    pub parameters:    Vec<ParameterSpec>,
    pub is_unsafe:     bool,
}

impl HarnessRequest {
    /// Path used to glob-import the function's module.
    pub fn import_path(&self) -> String {
        std::iter::once(self.crate_name.as_str())
            .chain(self.module_path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("::")
    }

    pub fn call_path(&self) -> String {
        format!("{}::{}", self.import_path(), self.function_name)
    }

    fn call_expr(&self) -> String {
        let args = self
            .parameters
            .iter()
            .map(ParameterSpec::arg_expr)
            .collect::<Vec<_>>()
            .join(", ");
        let call = format!("{}({args})", self.call_path());

        if self.is_unsafe {
            format!("unsafe {{ {call} }}")
        } else {
            call
        }
    }
}

#[derive(Serialize)]
struct HarnessContext<'r> {
    import_path:   String,
    call_path:     String,
    call_expr:     String,
    function_name: &'r str,
    parameters:    Vec<ParameterContext<'r>>,
}

#[derive(Serialize)]
struct ParameterContext<'r> {
    name:       &'r str,
    local_type: &'r str,
    pass:       Pass,
    fill_expr:  &'static str,
}

pub fn render(request: &HarnessRequest) -> Result<String, tera::Error> {
    let ctx = HarnessContext {
        import_path:   request.import_path(),
        call_path:     request.call_path(),
        call_expr:     request.call_expr(),
        function_name: &request.function_name,
        parameters:    request
            .parameters
            .iter()
            .map(|param| ParameterContext {
                name:       &param.name,
                local_type: &param.local_type,
                pass:       param.pass,
                fill_expr:  param.fill_expr(),
            })
            .collect(),
    };

    Tera::one_off(HARNESS_TMPL, &tera::Context::from_serialize(&ctx)?, false)
}

/// Input for the `Cargo.toml` of a generated harness package.
#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ManifestRequest {
    /// Cargo package name of the fuzzed library.
    pub package_name: String,
    /// Name of the harness binary, e.g. `fuzz_add`.
    pub harness_name: String,
    /// Path from the harness directory to the fuzzed package.
    pub package_path: String,
    /// Harness source file, relative to the harness directory.
    pub harness_file: String,
}

pub fn render_manifest(request: &ManifestRequest) -> Result<String, tera::Error> {
    Tera::one_off(
        MANIFEST_TMPL,
        &tera::Context::from_serialize(request)?,
        false,
    )
}

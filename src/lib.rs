pub mod decompose;
pub mod output;
pub mod package;
pub mod resolve;

mod error;

use std::path::PathBuf;

pub use error::{Error, SymbolKind};
pub use harnessgen_render::{HarnessRequest, ParameterSpec};
use output::GeneratedFile;
use resolve::Session;

/// What happens to the remaining functions of a batch after one fails.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum FailurePolicy {
    #[default]
    FailFast,
    KeepGoing,
}

/// Rendered output for one function.
#[derive(Clone, Debug)]
pub struct Harness {
    pub request: HarnessRequest,
    pub files:   Vec<GeneratedFile>,
}

#[derive(Debug)]
pub enum Outcome {
    Generated(Harness),
    Failed(Error),
    /// Not attempted because an earlier function failed.
    Skipped,
}

#[derive(Debug)]
pub struct FunctionReport {
    pub function: String,
    pub outcome:  Outcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub functions: Vec<FunctionReport>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.functions
            .iter()
            .all(|f| matches!(f.outcome, Outcome::Generated(_)))
    }

    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.functions.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Generates harnesses for functions of the package at one location.
#[derive(Debug)]
pub struct Generator {
    session:  Session,
    location: PathBuf,
    output:   Option<PathBuf>,
}

impl Generator {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            session:  Session::new(),
            location: location.into(),
            output:   None,
        }
    }

    /// Writes only the harness source, to exactly `path`.
    ///
    /// Meant for a single function; every harness would land on the same path.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Resolves, decomposes and renders `function` without touching the file system.
    pub fn plan(&mut self, function: &str) -> Result<Harness, Error> {
        let resolved = self.session.resolve(&self.location, function)?;
        let parameters = decompose::decompose(&resolved)?;
        let request = HarnessRequest {
            crate_name: resolved.package.crate_name.clone(),
            module_path: resolved.module_path.clone(),
            function_name: resolved.name(),
            parameters,
            is_unsafe: resolved.item.sig.unsafety.is_some(),
        };
        let source = harnessgen_render::render(&request)?;

        tracing::info!(
            package = %resolved.package.name,
            function = %resolved.symbol(),
            params = request.parameters.len(),
            "Rendered harness."
        );

        if let Some(path) = &self.output {
            return Ok(Harness {
                request,
                files: vec![GeneratedFile {
                    path:     path.clone(),
                    contents: source,
                }],
            });
        }

        let symbol = resolved.symbol();
        let dir = output::harness_dir(&resolved.package.dir, &symbol);
        let manifest = harnessgen_render::render_manifest(&harnessgen_render::ManifestRequest {
            package_name: resolved.package.name.clone(),
            harness_name: output::harness_name(&symbol),
            package_path: "..".to_owned(),
            harness_file: output::HARNESS_FILE.to_owned(),
        })?;

        Ok(Harness {
            request,
            files: vec![
                GeneratedFile {
                    path:     dir.join(output::HARNESS_FILE),
                    contents: source,
                },
                GeneratedFile {
                    path:     dir.join(output::MANIFEST_FILE),
                    contents: manifest,
                },
            ],
        })
    }

    pub fn generate(&mut self, function: &str) -> Result<Harness, Error> {
        let harness = self.plan(function)?;

        for file in &harness.files {
            file.write()?;
        }

        Ok(harness)
    }

    /// Generates each function in order, honouring `policy` on failure.
    pub fn generate_all<S: AsRef<str>>(
        &mut self,
        functions: &[S],
        policy: FailurePolicy,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut failed = false;

        for function in functions {
            let function = function.as_ref().trim().to_owned();
            let outcome = if failed && policy == FailurePolicy::FailFast {
                Outcome::Skipped
            } else {
                match self.generate(&function) {
                    | Ok(harness) => Outcome::Generated(harness),
                    | Err(err) => {
                        tracing::warn!(function = %function, "Failed to generate harness.");
                        failed = true;
                        Outcome::Failed(err)
                    },
                }
            };

            report.functions.push(FunctionReport { function, outcome });
        }

        report
    }
}

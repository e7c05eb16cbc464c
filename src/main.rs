use std::{
    io::{self, stderr, IsTerminal},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use eyre::{eyre as err, Context as _};
use harnessgen::{FailurePolicy, Generator, Outcome};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt as _, EnvFilter};

/// Generate `cargo fuzz` harnesses for library functions.
#[derive(Parser, Debug)]
struct Cmd {
    /// Package directory, or its `Cargo.toml`.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Comma-separated functions, e.g. `add,ops::sub`.
    #[arg(long, short = 'f', value_delimiter = ',', required = true)]
    functions: Vec<String>,

    /// Write the harness source to this path. Only valid for a single function.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Keep generating the remaining functions after a failure.
    #[arg(long, default_value_t = false)]
    keep_going: bool,

    #[arg(long, default_value_t = false)]
    silent: bool,
}

fn main() -> Result<ExitCode, eyre::Error> {
    color_eyre::install()?;

    let cmd = Cmd::parse();

    if !cmd.silent {
        let mut subscriber = tracing_subscriber::fmt::layer().with_writer(io::stderr);

        if !stderr().is_terminal() {
            subscriber.set_ansi(false);
        }

        tracing::subscriber::set_global_default(
            tracing_subscriber::Registry::default()
                .with(
                    EnvFilter::builder()
                        .with_env_var("HARNESSGEN_LOG")
                        .with_default_directive(LevelFilter::INFO.into())
                        .from_env_lossy(),
                )
                .with(ErrorLayer::default())
                .with(subscriber),
        )
        .wrap_err("failed to configure tracing")?;
    }

    let functions = cmd
        .functions
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>();

    if functions.is_empty() {
        return Err(err!("no function names given"));
    }

    let mut generator = Generator::new(&cmd.dir);

    if let Some(output) = cmd.output {
        if functions.len() != 1 {
            return Err(err!(
                "--output needs exactly one function, got {}",
                functions.len()
            ));
        }

        generator = generator.with_output(output);
    }

    let policy = if cmd.keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::FailFast
    };

    tracing::info!(dir = %cmd.dir.display(), ?functions, "Generating harnesses.");

    let report = generator.generate_all(&functions, policy);

    for function in &report.functions {
        match &function.outcome {
            | Outcome::Generated(harness) => {
                for file in &harness.files {
                    println!(
                        "generated {} for `{}`",
                        file.path.display(),
                        function.function
                    );
                }
            },
            | Outcome::Failed(e) => eprintln!("error: {}: {}", function.function, chain(e)),
            | Outcome::Skipped => (),
        }
    }

    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }

    if report.functions.len() > 1 {
        eprintln!(
            "{} generated, {} failed, {} skipped",
            report.count(|o| matches!(o, Outcome::Generated(_))),
            report.count(|o| matches!(o, Outcome::Failed(_))),
            report.count(|o| matches!(o, Outcome::Skipped)),
        );
    }

    Ok(ExitCode::FAILURE)
}

/// Error message with its sources, on one line.
fn chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();

    while let Some(e) = source {
        msg.push_str(&format!(": {e}"));
        source = e.source();
    }

    msg
}

//! `procgen-run`: interpret a program file and print one line per emission.

use clap::Parser;
use procgen_host::{scene_session, ControlMessage, HostConfig, HostError, HostResult};
use procgen_types::ast::Descriptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "procgen-run", version, about = "Interpret a procgen program and stream scene snapshots")]
struct Args {
    /// Program JSON: a map of description id to description.
    program: PathBuf,

    /// Simulated seconds to interpret up to.
    #[arg(long)]
    progress: f64,

    /// Engine and scene configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the SHA-256 of each result instead of the emission itself.
    #[arg(long)]
    digest: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("procgen=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "procgen-run failed");
            ExitCode::FAILURE
        }
    }
}

fn read(path: &Path) -> HostResult<String> {
    std::fs::read_to_string(path).map_err(|source| HostError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run(args: &Args) -> HostResult<()> {
    let descriptions = Descriptions::from_json(&read(&args.program)?)?;
    let config = match &args.config {
        Some(path) => HostConfig::from_json(&read(path)?)?,
        None => HostConfig::default(),
    };
    info!(
        program = %args.program.display(),
        descriptions = descriptions.len(),
        progress = args.progress,
        "loaded program"
    );

    let mut session = scene_session(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let write_error = |source| HostError::Io {
        path: PathBuf::from("<stdout>"),
        source,
    };

    let mut next = session.handle(ControlMessage::Interprete {
        descriptions,
        requested_progress: args.progress,
    })?;
    while let Some(emission) = next {
        let line = if args.digest {
            emission.digest()
        } else {
            serde_json::to_string(&emission)?
        };
        writeln!(out, "{line}").map_err(write_error)?;
        next = session.poll()?;
    }
    out.flush().map_err(write_error)?;
    Ok(())
}

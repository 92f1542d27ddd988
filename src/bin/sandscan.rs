use anyhow::{Context, Result};
use clap::Parser;
use sandscan::backends::MockEngine;
use sandscan::core::{ArcEngine, ExitStatus, FatalError, ScanFlags};
use sandscan::dispatch::{ArchiveFormat, UnpackerConfig};
use sandscan::{ScanOptions, ScanOrchestrator, ScanSummary};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sandscan")]
#[command(about = "Scan files and archives, unpacking archives in a sandbox")]
#[command(version)]
struct Cli {
    /// Files or directories to scan; `-` reads standard input
    paths: Vec<PathBuf>,

    /// TOML file with scan options; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Remove infected files
    #[arg(long)]
    remove: bool,

    /// Move infected files into DIR
    #[arg(long = "move", value_name = "DIR")]
    move_to: Option<PathBuf>,

    /// Skip paths matching REGEX
    #[arg(long, value_name = "REGEX")]
    exclude: Vec<String>,

    /// Only scan paths matching REGEX
    #[arg(long, value_name = "REGEX")]
    include: Vec<String>,

    /// Unpack FORMAT with an external program, optionally overriding it
    /// (`zip`, `tgz=/opt/bin/gtar`, or `all`)
    #[arg(long, value_name = "FORMAT[=PROGRAM]")]
    unpack: Vec<String>,

    /// Kill an extractor that writes more than N files
    #[arg(long, value_name = "N")]
    max_files: Option<u64>,

    /// Kill an extractor that writes more than BYTES
    #[arg(long, value_name = "BYTES")]
    max_space: Option<u64>,

    /// Milliseconds between quota checks
    #[arg(long, value_name = "MS")]
    poll_interval: Option<u64>,

    /// Deepest archive nesting to unpack
    #[arg(long, value_name = "N")]
    max_recursion: Option<u32>,

    /// Do not let the engine unpack archives itself
    #[arg(long)]
    no_archive: bool,

    /// Create scratch directories under DIR
    #[arg(long, value_name = "DIR")]
    tempdir: Option<PathBuf>,

    /// Keep scratch directories
    #[arg(long)]
    leave_temps: bool,

    /// Run extractors as USER when started by root
    #[arg(long, value_name = "USER")]
    user: Option<String>,

    /// Byte signature for the built-in engine
    #[arg(long = "signature", value_name = "NAME=PATTERN")]
    signatures: Vec<String>,

    /// Scan through clamd listening on SOCKET
    #[cfg(feature = "clamav")]
    #[arg(long, value_name = "SOCKET")]
    clamd: Option<PathBuf>,

    /// Only log warnings and silence extractors
    #[arg(short, long)]
    quiet: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Do not print the summary
    #[arg(long)]
    no_summary: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let code = match run(&cli) {
        Ok(summary) => {
            if let Err(e) = print_summary(&cli, &summary) {
                eprintln!("ERROR: {:#}", e);
            }
            summary.exit_code
        }
        Err(err) => {
            let status = err
                .downcast_ref::<FatalError>()
                .map(FatalError::exit_status)
                .unwrap_or(ExitStatus::InvalidConfiguration);
            eprintln!("ERROR: {:#}", err);
            status.code()
        }
    };
    std::process::exit(code);
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<ScanSummary> {
    let options = options(cli)?;
    let orchestrator = ScanOrchestrator::builder()
        .with_arc_engine(engine(cli)?)
        .with_options(options)
        .build()?;
    Ok(orchestrator.run(&cli.paths)?)
}

fn options(cli: &Cli) -> Result<ScanOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            toml::from_str::<ScanOptions>(&text)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => ScanOptions::default(),
    };

    options.remove |= cli.remove;
    if let Some(dir) = &cli.move_to {
        options.quarantine_dir = Some(dir.clone());
    }
    options.include.extend(cli.include.iter().cloned());
    options.exclude.extend(cli.exclude.iter().cloned());

    for spec in &cli.unpack {
        if spec.eq_ignore_ascii_case("all") {
            let all = UnpackerConfig::all();
            options.unpackers.enabled.extend(all.enabled);
            continue;
        }
        let (name, program) = match spec.split_once('=') {
            Some((name, program)) => (name, Some(program.to_string())),
            None => (spec.as_str(), None),
        };
        let format = ArchiveFormat::from_name(name)
            .ok_or_else(|| FatalError::configuration(format!("unknown archive format '{}'", name)))?;
        options = options.with_unpacker(format, program);
    }

    if let Some(n) = cli.max_files {
        options.quota = options.quota.with_max_files(n);
    }
    if let Some(bytes) = cli.max_space {
        options.quota = options.quota.with_max_bytes(bytes);
    }
    if let Some(ms) = cli.poll_interval {
        options.poll_interval = Duration::from_millis(ms);
    }
    if let Some(depth) = cli.max_recursion {
        options.max_recursion = depth;
    }
    if cli.no_archive {
        options.flags = options.flags.without(ScanFlags::ARCHIVE);
    }
    if let Some(dir) = &cli.tempdir {
        options.temp_root = Some(dir.clone());
    }
    options.leave_temps |= cli.leave_temps;
    options.quiet_unpackers |= cli.quiet;
    if let Some(user) = &cli.user {
        options.unprivileged_user = Some(user.clone());
    }

    Ok(options)
}

fn engine(cli: &Cli) -> Result<ArcEngine> {
    if let Some(engine) = clamd_engine(cli)? {
        return Ok(engine);
    }

    let mut engine = MockEngine::new().with_name("signatures");
    for spec in &cli.signatures {
        let (name, pattern) = spec
            .split_once('=')
            .filter(|(name, pattern)| !name.is_empty() && !pattern.is_empty())
            .ok_or_else(|| {
                FatalError::configuration(format!(
                    "invalid signature '{}', expected NAME=PATTERN",
                    spec
                ))
            })?;
        engine = engine.with_signature(name, pattern.as_bytes());
    }
    Ok(Arc::new(engine))
}

#[cfg(feature = "clamav")]
fn clamd_engine(cli: &Cli) -> Result<Option<ArcEngine>> {
    use sandscan::backends::{ClamdConfig, ClamdEngine};

    let Some(socket) = &cli.clamd else {
        return Ok(None);
    };
    let engine = ClamdEngine::connect(ClamdConfig::new().with_socket(socket)).map_err(|e| {
        FatalError::EngineInit {
            message: e.to_string(),
        }
    })?;
    Ok(Some(Arc::new(engine)))
}

#[cfg(not(feature = "clamav"))]
fn clamd_engine(_cli: &Cli) -> Result<Option<ArcEngine>> {
    Ok(None)
}

fn print_summary(cli: &Cli, summary: &ScanSummary) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else if !cli.no_summary {
        println!("\n{}", summary);
    }
    Ok(())
}

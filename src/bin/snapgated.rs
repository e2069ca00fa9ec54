//! snapgate daemon
//!
//! Reads line-delimited check events from stdin or a file (typically a FIFO
//! written by the monitoring core's broker) and publishes snapshots.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use snapgate::diag::bounded_line;
use snapgate::source::channel::DEFAULT_CAPACITY;
use snapgate::source::wire::spawn_line_reader;
use snapgate::{
    objects_cache, ChannelSource, EnrichmentLookup, EventGate, GatewayConfig, GatewayResult, NoEnrichment,
};

struct Cli {
    module_args: String,
    objects_cache: Option<PathBuf>,
    input: Option<PathBuf>,
    queue_capacity: usize,
}

fn usage() {
    println!("snapgated - check-result snapshot gateway");
    println!();
    println!("USAGE:");
    println!("    snapgated [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -a, --args <ARGS>             Module arguments, e.g. \"-basedir /srv/snap -subprefix dc1\"");
    println!("    -o, --objects-cache <PATH>    Read notes and icon_image from an object cache file");
    println!("    -i, --input <PATH>            Read events from PATH instead of stdin");
    println!("    -q, --queue <N>               Event queue capacity [default: {DEFAULT_CAPACITY}]");
    println!("    -h, --help                    Print help information");
    println!();
    println!("Log verbosity follows RUST_LOG [default: snapgate=info].");
}

fn parse_args() -> Result<Cli, String> {
    let mut cli = Cli {
        module_args: String::new(),
        objects_cache: None,
        input: None,
        queue_capacity: DEFAULT_CAPACITY,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().ok_or_else(|| format!("{name} requires a value"));
        match arg.as_str() {
            "--args" | "-a" => cli.module_args = value("--args")?,
            "--objects-cache" | "-o" => cli.objects_cache = Some(PathBuf::from(value("--objects-cache")?)),
            "--input" | "-i" => cli.input = Some(PathBuf::from(value("--input")?)),
            "--queue" | "-q" => {
                let v = value("--queue")?;
                cli.queue_capacity = v.parse().map_err(|_| format!("invalid queue capacity: {v}"))?;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(cli)
}

fn load_enrichment(path: Option<&PathBuf>) -> Arc<dyn EnrichmentLookup> {
    let Some(path) = path else {
        return Arc::new(NoEnrichment);
    };
    match objects_cache::load(path) {
        Ok(table) => Arc::new(table),
        Err(e) => {
            let msg = format!("object cache {} unreadable, snapshots carry no enrichment: {e}", path.display());
            warn!("{}", bounded_line(&msg));
            Arc::new(NoEnrichment)
        }
    }
}

fn open_input(path: Option<&PathBuf>) -> io::Result<Box<dyn BufRead + Send>> {
    Ok(match path {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn run(cli: &Cli) -> GatewayResult<()> {
    let config = Arc::new(GatewayConfig::from_module_args(&cli.module_args)?);
    config.log_summary();

    let gate = Arc::new(EventGate::new(
        Arc::clone(&config),
        load_enrichment(cli.objects_cache.as_ref()),
    ));

    // Publishing still fails per event if this does, which the gate logs.
    if let Err(e) = gate.publisher().prepare() {
        let msg = format!("cannot create output directory {}: {e}", config.basedir().display());
        warn!("{}", bounded_line(&msg));
    }
    if let Some(max_age) = config.staging_max_age() {
        match gate.publisher().sweep_stale_staging(max_age) {
            Ok(report) => info!(removed = report.removed.len(), kept = report.kept, "staging sweep done"),
            Err(e) => warn!("{}", bounded_line(&format!("staging sweep failed: {e}"))),
        }
    }

    let (source, sender) = ChannelSource::bounded(cli.queue_capacity);
    let attachment = gate.attach(&source);

    let input = open_input(cli.input.as_ref())?;
    let reader = spawn_line_reader(input, sender)?;
    info!("snapgated running");

    source.run();

    match reader.join() {
        Ok(stats) => info!(lines = stats.lines, events = stats.events, skipped = stats.skipped, "input closed"),
        Err(_) => error!("event reader thread panicked"),
    }
    attachment.detach();

    let stats = gate.stats();
    info!(
        published = stats.published,
        ignored = stats.ignored,
        dropped = stats.dropped,
        staging_collisions = stats.staging_collisions,
        queue_drops = source.dropped(),
        "snapgated stopped"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snapgate=info,snapgated=info")))
        .with_writer(io::stderr)
        .init();

    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        // Bad module arguments, or the event input could not be opened.
        Err(e) => {
            error!("{}", e.diagnostic());
            ExitCode::FAILURE
        }
    }
}

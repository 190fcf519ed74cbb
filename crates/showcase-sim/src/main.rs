use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use showcase_proto::config::Config;
use showcase_proto::diagnostics::Diagnostics;
use showcase_proto::platform::HostEnv;
use showcase_proto::sources::SourceResolver;
use showcase_sim::{spawn_script, Scenario, SimCore, SimEvent};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "showcase-sim")]
#[command(about = "Replay a scroll scenario against the showcase loading controller")]
#[command(version)]
struct Args {
    /// Scenario file (tiles, media profile, timed steps)
    #[arg(short, long)]
    scenario: PathBuf,

    /// Config file; defaults to the per-user showcase config
    #[arg(short, long, env = "SHOWCASE_CONFIG")]
    config: Option<PathBuf>,

    /// RNG seed; overrides the scenario's seed
    #[arg(long)]
    seed: Option<u64>,

    /// Hostname the simulated page is served from
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load().unwrap_or_default(),
    };

    // ── Logging ──────────────────────────────────────────────────────────────
    // Allow RUST_LOG override; otherwise the level follows the host, verbose
    // on development hosts and quiet everywhere else.
    let env = HostEnv::detect(&args.host, &config.sources.local_hosts);
    let diagnostics = Diagnostics::for_host(&env, &config.diagnostics);
    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| diagnostics.filter_directive());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter.as_str())
        .init();

    info!("showcase-sim starting (host {}, verbose {})", env.hostname, diagnostics.verbose);

    // ── Scenario + sources ───────────────────────────────────────────────────
    let mut scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    let resolver = SourceResolver::new(&config.sources, &env);
    let rewritten = resolver.apply(&mut scenario.tiles);
    if rewritten > 0 {
        info!("{} sources pointed at the cloud base", rewritten);
    }
    let seed = args
        .seed
        .or(scenario.seed)
        .unwrap_or_else(rand::random::<u64>);

    // ── SimEvent channel (script + host tasks → SimCore) ─────────────────────
    let (event_tx, event_rx) = mpsc::channel::<SimEvent>(1024);

    let core = SimCore::new(
        &config,
        scenario.tiles.clone(),
        scenario.media.clone(),
        seed,
        event_tx.clone(),
    )?;
    let steps = core.resolve_steps(&scenario.steps)?;
    spawn_script(steps, scenario.settle, event_tx);

    let report = core.run(event_rx).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary());
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} invariant violation(s); rerun with --seed {}",
            report.violations.len(),
            report.seed
        );
    }
    Ok(())
}

use crate::backoff::{clamp_retries, ExponentialBackoff, JITTER, RATE};
use crate::config::Config;
use crate::output::{emit_data, ms, OutputFormat};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Longest schedule `schedule --retries` will print.
pub const MAX_SCHEDULE_RETRIES: u32 = 10_000;

#[derive(Parser, Debug)]
#[command(
    name = "retry-backoff",
    about = "Inspect jittered exponential backoff delays",
    disable_help_subcommand = true,
    after_help = r#"Examples:
  retry-backoff delay 3
  retry-backoff delay 5 --samples 10 --json
  retry-backoff --min-ms 100 --max-ms 30000 schedule --retries 20
  retry-backoff --seed 7 stats 100
  retry-backoff config init"#
)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// JSON output
    #[arg(long, global = true)]
    pub json: bool,
    /// Raw output (strings bare, arrays one item per line, objects as compact JSON)
    #[arg(long, global = true)]
    pub raw: bool,
    /// Minimum delay in milliseconds
    #[arg(long = "min-ms", global = true)]
    pub min_ms: Option<u64>,
    /// Maximum delay in milliseconds
    #[arg(long = "max-ms", global = true)]
    pub max_ms: Option<u64>,
    /// Config file (defaults to the per-user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Seed the jitter source for reproducible output
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    /// Verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,
    /// Color control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ColorChoice {
    Always,
    Auto,
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample the delay after a number of retries
    Delay(DelayArgs),
    /// One delay per retry count, from zero up
    Schedule(ScheduleArgs),
    /// Summarize many samples for one retry count
    Stats(StatsArgs),
    /// Show the effective policy
    Inspect,
    Config(ConfigCmd),
}

#[derive(Args, Debug)]
pub struct DelayArgs {
    /// Retries so far; negative counts as zero
    #[arg(allow_negative_numbers = true)]
    pub retries: i64,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub samples: u32,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Last retry count to show
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_SCHEDULE_RETRIES))
    )]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(allow_negative_numbers = true)]
    pub retries: i64,
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u32).range(1..))]
    pub samples: u32,
}

#[derive(Args, Debug)]
pub struct ConfigCmd {
    #[command(subcommand)]
    sub: ConfigSub,
}
#[derive(Subcommand, Debug)]
pub enum ConfigSub {
    Path,
    Show,
    /// Write the effective bounds to the config file
    Init {
        #[arg(long)]
        force: bool,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::load().context("load config")?,
    };
    cfg.apply_cli(&cli);

    let mut rng = jitter_source(cli.seed);
    let fmt = fmt_from_cli(&cli);

    let data = match &cli.command {
        Commands::Config(cmd) => return run_config(cmd, &cfg, &cli),
        Commands::Delay(args) => build_delay(&policy(&cfg)?, args.retries, args.samples, &mut *rng),
        Commands::Schedule(args) => build_schedule(&policy(&cfg)?, args.retries, rng),
        Commands::Stats(args) => build_stats(&policy(&cfg)?, args.retries, args.samples, &mut *rng),
        Commands::Inspect => build_inspect(&policy(&cfg)?),
    };
    emit_data(&fmt, &data)
}

fn policy(cfg: &Config) -> Result<ExponentialBackoff> {
    let policy = cfg.policy().context("invalid backoff bounds")?;
    info!(min = ?policy.min(), max = ?policy.max(), "effective policy");
    Ok(policy)
}

fn fmt_from_cli(cli: &Cli) -> OutputFormat {
    if cli.raw {
        OutputFormat::Raw
    } else if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    }
}

/// Seeded generator when asked for, the thread-local one otherwise.
pub fn jitter_source(seed: Option<u64>) -> Box<dyn RngCore> {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(thread_rng()),
    }
}

pub fn build_delay<R: Rng + ?Sized>(
    policy: &ExponentialBackoff,
    retries: i64,
    samples: u32,
    rng: &mut R,
) -> JsonValue {
    let n = clamp_retries(retries);
    let delays: Vec<f64> = (0..samples).map(|_| ms(policy.delay_with(n, &mut *rng))).collect();
    debug!(retries = n, samples, "sampled delays");
    if delays.len() == 1 {
        json!({ "retries": n, "delay_ms": delays[0] })
    } else {
        json!({ "retries": n, "delays_ms": delays })
    }
}

pub fn build_schedule<R: Rng>(policy: &ExponentialBackoff, last: u32, rng: R) -> JsonValue {
    let last = last.min(MAX_SCHEDULE_RETRIES);
    let steps: Vec<JsonValue> = policy
        .delays(rng)
        .take(last as usize + 1)
        .enumerate()
        .map(|(retries, d)| json!({ "retries": retries, "delay_ms": ms(d) }))
        .collect();
    JsonValue::Array(steps)
}

pub fn build_stats<R: Rng + ?Sized>(
    policy: &ExponentialBackoff,
    retries: i64,
    samples: u32,
    rng: &mut R,
) -> JsonValue {
    let n = clamp_retries(retries);
    let mut seen = BTreeSet::new();
    let mut total = Duration::ZERO;
    for _ in 0..samples {
        let d = policy.delay_with(n, &mut *rng);
        total = total.saturating_add(d);
        seen.insert(d);
    }
    // samples >= 1, enforced by the arg parser
    let lo = seen.first().copied().unwrap_or_default();
    let hi = seen.last().copied().unwrap_or_default();
    let mean = ms(total) / f64::from(samples.max(1));
    json!({
        "retries": n,
        "samples": samples,
        "min_ms": ms(lo),
        "mean_ms": mean,
        "max_ms": ms(hi),
        "distinct": seen.len(),
    })
}

pub fn build_inspect(policy: &ExponentialBackoff) -> JsonValue {
    let max = ms(policy.max());
    json!({
        "min_ms": ms(policy.min()),
        "max_ms": max,
        "rate": RATE,
        "jitter": JITTER,
        "saturation_retries": policy.saturation_retries(),
        "saturated_range_ms": [max * (1.0 - JITTER), max],
    })
}

fn run_config(cmd: &ConfigCmd, cfg: &Config, cli: &Cli) -> Result<()> {
    let path = match &cli.config {
        Some(p) => p.clone(),
        None => Config::config_path()?,
    };
    match &cmd.sub {
        ConfigSub::Path => emit_data(&OutputFormat::Raw, &JsonValue::String(path.display().to_string())),
        ConfigSub::Show => {
            let data = serde_json::to_value(cfg.resolved()).context("serialize config")?;
            emit_data(&fmt_from_cli(cli), &data)
        }
        ConfigSub::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!("config file {} already exists; pass --force to overwrite", path.display());
            }
            let resolved = cfg.resolved();
            resolved.policy().context("invalid backoff bounds")?;
            resolved.save_to(&path)?;
            info!(path = %path.display(), "wrote config");
            emit_data(
                &fmt_from_cli(cli),
                &json!({ "status": "ok", "path": path.display().to_string() }),
            )
        }
    }
}

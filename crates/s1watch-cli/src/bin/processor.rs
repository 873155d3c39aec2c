//! Processing daemon: pulls batches from the spool, runs the decode /
//! correlate / rules pipeline, and emits events to stdout and a JSONL file.
//! Dumps the UE table on exit.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use s1watch_cli::signal::install_signal_handlers;
use s1watch_engine::pipeline::{Pipeline, PipelineConfig};
use s1watch_engine::ruleset::load_ruleset_from_yaml;
use s1watch_engine::sinks::{JsonlSink, StdoutSink};
use s1watch_engine::spool::SpoolConfig;

#[derive(Parser)]
#[command(name = "processor", about = "s1watch processing daemon")]
struct Cli {
    /// Spool directory to consume from.
    #[arg(default_value = "spool_data")]
    spool_dir: PathBuf,

    /// Ruleset YAML file.
    #[arg(default_value = "config/rulesets/mobility.yaml")]
    ruleset_yaml: PathBuf,

    /// Events output file (JSON lines).
    #[arg(default_value = "events.jsonl")]
    events_output: PathBuf,

    /// Run continuously (`true`) or process one batch and exit (`false`).
    #[arg(default_value_t = true, action = clap::ArgAction::Set)]
    continuous: bool,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("processor: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    info!(
        "processor starting (spool: {}, ruleset: {}, output: {})",
        cli.spool_dir.display(),
        cli.ruleset_yaml.display(),
        cli.events_output.display()
    );

    let config = PipelineConfig {
        spool: SpoolConfig {
            base_dir: cli.spool_dir.clone(),
            ..SpoolConfig::default()
        },
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(config).context("opening pipeline")?;

    let ruleset = load_ruleset_from_yaml(&cli.ruleset_yaml)
        .with_context(|| format!("loading ruleset {}", cli.ruleset_yaml.display()))?;
    pipeline.load_ruleset(ruleset);

    pipeline.add_sink(Box::new(StdoutSink::new()));
    pipeline.add_sink(Box::new(
        JsonlSink::new(Path::new(&cli.events_output)).context("opening events output")?,
    ));

    let running = install_signal_handlers();

    if cli.continuous {
        pipeline.run_continuous(&running);
    } else {
        let emitted = pipeline.process_batch().context("processing batch")?;
        info!("processor emitted {emitted} event(s)");
        pipeline.shutdown();
    }

    // UE table on stdout for the operator.
    let mut stdout = std::io::stdout().lock();
    pipeline
        .dump_ue_records(&mut stdout)
        .context("dumping UE records")?;
    Ok(())
}

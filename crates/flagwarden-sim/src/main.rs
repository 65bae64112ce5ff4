use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use flagwarden_core::Variant;
use flagwarden_sim::{init_logging, run_batch, run_scenario, BatchSummary, LogFormat, Scenario};

#[derive(Parser)]
#[command(name = "flagwarden-sim", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Human, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Play a scripted scenario file
    Run {
        /// Path to the scenario JSON
        scenario: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play seeded random matches
    Autoplay {
        /// Variant to play
        #[arg(long, value_enum, default_value_t = VariantArg::Ctf)]
        variant: VariantArg,

        /// Number of seeds (one match each)
        #[arg(long, default_value_t = 100)]
        seeds: u64,

        /// Seed of the first match; the rest follow consecutively
        #[arg(long, default_value_t = 0, env = "FLAGWARDEN_SEED")]
        first_seed: u64,

        /// Print every result and the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Ctf,
    RoundCtf,
    Gauntlet,
    FlagRun,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Ctf => Self::Ctf,
            VariantArg::RoundCtf => Self::RoundCtf,
            VariantArg::Gauntlet => Self::Gauntlet,
            VariantArg::FlagRun => Self::FlagRun,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    match cli.command {
        Command::Run { scenario, json } => {
            let loaded = Scenario::load(&scenario)?;
            let report = run_scenario(&loaded)
                .with_context(|| format!("running {}", scenario.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Command::Autoplay {
            variant,
            seeds,
            first_seed,
            json,
        } => {
            let variant = Variant::from(variant);
            let last_seed = first_seed
                .checked_add(seeds)
                .context("seed range overflows u64")?;
            let results = run_batch(variant, first_seed..last_seed)
                .with_context(|| format!("autoplaying {variant}"))?;
            let summary = BatchSummary::from_results(variant, &results);
            if json {
                let body = serde_json::json!({ "results": results, "summary": summary });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print!("{summary}");
            }
        }
    }
    Ok(())
}

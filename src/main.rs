use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use podium::candidate::Roster;
use podium::config::{CONFIG_FILE, PodiumConfig};
use podium::driver::{DriverKind, Intensity};
use podium::export::RankingDoc;
use podium::interactive;
use podium::session::RANKING_KEY;
use podium::sim;
use podium::store::{FileStore, StateStore};
use podium::telemetry;

/// Rank anything by answering one question at a time
///
/// podium turns a roster file (one candidate per line; `ordinal,name`
/// lines carry a hidden true rank for simulation) into a full ranking
/// through short interactive sessions. Quit whenever — every judgment
/// autosaves, and the next run resumes at the exact question you left
/// off on. `b` steps back through your answers one judgment at a time.
///
/// DRIVERS:
///   merge    full order with the fewest questions (default)
///   elo      pairwise ratings under a fixed question budget
///   picker   keep-your-favorites elimination rounds
///
/// QUICK START:
///
///   podium rank movies.txt
///   podium status movies.txt
///   podium tiers movies.txt
///   podium export -o ranking.json
#[derive(Parser)]
#[command(name = "podium")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'podium <command> --help' for more information on a specific command.")]
struct Cli {
    /// Config file (defaults to ./podium.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding session state and finished rankings
    #[arg(long, global = true, env = "PODIUM_STATE_DIR", value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume a ranking session
    Rank {
        /// Roster file, one candidate per line
        roster: PathBuf,

        /// Ranking driver: merge, elo, or picker
        #[arg(long)]
        driver: Option<DriverKind>,

        /// ELO question budget: fast, balanced, or accurate
        #[arg(long)]
        intensity: Option<Intensity>,

        /// Shuffle seed for a reproducible question order
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Report progress of the saved session
    Status {
        /// Roster file the session was started from
        roster: PathBuf,
    },

    /// Cut a finished ranking into labeled tiers
    Tiers {
        /// Roster file the ranking was built from
        roster: PathBuf,
    },

    /// Print or write the finished ranking document
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Load a ranking document saved by export
    Import {
        /// Roster file the document must match
        roster: PathBuf,

        /// Ranking document to load
        input: PathBuf,
    },

    /// Replay scripted sessions and report judgment counts
    ///
    /// Requires `ordinal,name` roster lines; the ordinal stands in for
    /// the human's true preference.
    Simulate {
        /// Roster file with `ordinal,name` lines
        roster: PathBuf,

        /// Ranking driver: merge, elo, or picker
        #[arg(long)]
        driver: Option<DriverKind>,

        /// ELO question budget: fast, balanced, or accurate
        #[arg(long)]
        intensity: Option<Intensity>,

        /// Sessions to replay
        #[arg(long, default_value_t = 25)]
        attempts: usize,

        /// Base shuffle seed; each attempt offsets from it
        #[arg(long, default_value_t = 1337)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(|| config.storage.dir.clone());
    let store = FileStore::new(state_dir);

    match cli.command {
        Commands::Rank {
            roster,
            driver,
            intensity,
            seed,
        } => interactive::run_rank(
            read_roster(&roster)?,
            driver.unwrap_or(config.session.driver),
            intensity.unwrap_or(config.session.intensity),
            seed.or(config.session.seed),
            config.storage.autosave_ms,
            store,
        ),
        Commands::Status { roster } => interactive::run_status(read_roster(&roster)?, store),
        Commands::Tiers { roster } => {
            interactive::run_tiers(&read_roster(&roster)?, store, config.tiers.labels)
        }
        Commands::Export { output } => run_export(&store, output.as_deref()),
        Commands::Import { roster, input } => run_import(&read_roster(&roster)?, store, &input),
        Commands::Simulate {
            roster,
            driver,
            intensity,
            attempts,
            seed,
        } => run_simulate(
            &read_roster(&roster)?,
            driver.unwrap_or(config.session.driver),
            intensity.unwrap_or(config.session.intensity),
            attempts,
            seed,
        ),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<PodiumConfig> {
    let path = explicit.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
    if explicit.is_some() && !path.exists() {
        bail!("config file {} not found", path.display());
    }
    Ok(PodiumConfig::load(&path)?)
}

fn read_roster(path: &Path) -> Result<Roster> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read roster {}", path.display()))?;
    Roster::parse(&text).with_context(|| format!("parse roster {}", path.display()))
}

fn run_export(store: &FileStore, output: Option<&Path>) -> Result<()> {
    let Some(blob) = store.get(RANKING_KEY)? else {
        bail!("no finished ranking; complete a run first");
    };
    match output {
        Some(path) => {
            fs::write(path, &blob).with_context(|| format!("write {}", path.display()))?;
            println!("Exported ranking to {}.", path.display());
        }
        None => println!("{blob}"),
    }
    Ok(())
}

fn run_import(roster: &Roster, mut store: FileStore, input: &Path) -> Result<()> {
    let text =
        fs::read_to_string(input).with_context(|| format!("read {}", input.display()))?;
    let doc = RankingDoc::from_json(&text)?;
    doc.validate(roster)
        .with_context(|| format!("{} does not match the roster", input.display()))?;
    // Re-encode so the stored blob is always in canonical form.
    let json = doc.to_json()?;
    store.set(RANKING_KEY, &json)?;
    println!("Imported ranking of {} candidates.", doc.order.len());
    Ok(())
}

fn run_simulate(
    roster: &Roster,
    kind: DriverKind,
    intensity: Intensity,
    attempts: usize,
    seed: u64,
) -> Result<()> {
    let summary = sim::simulate(roster, kind, intensity, attempts, seed)?;
    println!(
        "{kind} driver, {} candidates, {} attempts:",
        roster.len(),
        summary.attempts
    );
    println!(
        "  judgments per run: min {}  mean {:.1}  max {}",
        summary.min, summary.mean, summary.max
    );
    Ok(())
}

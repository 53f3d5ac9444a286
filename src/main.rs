use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use powertopo::config::ReaderConfig;
use powertopo::export::{pf_results_to_table, topology_to_json};
use powertopo::reader::{FAULT_CLOSED_RESISTANCE, FAULT_OPEN_RESISTANCE, Reader};
use powertopo::server::run_server;
use powertopo::topology::{Domain, LogLevel};

/// MATPOWER cases to simulation topologies.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Write the log to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log debug messages.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the topology of a case and write it as JSON
    Convert(ConvertArgs),

    /// Print the power flow solution stored in a case
    Results(ResultsArgs),

    /// Serve the HTTP API
    Serve(ServeArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// The case file (.m or .mat)
    #[arg(required = true)]
    case: PathBuf,

    /// Dynamic data file, required outside power flow.
    #[arg(long = "dyn")]
    dyn_case: Option<PathBuf>,

    /// JSON reader configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulation domain: pf, sp, dp or emt.
    #[arg(long)]
    domain: Option<Domain>,

    /// System frequency in Hz.
    #[arg(long)]
    frequency: Option<f64>,

    #[arg(long, default_value_t = false)]
    no_pss: bool,

    #[arg(long, default_value_t = false)]
    no_avr: bool,

    #[arg(long, default_value_t = false)]
    no_tg: bool,

    /// Initialize node voltages and generator powers from the case solution.
    #[arg(long, default_value_t = false)]
    init_from_pf: bool,

    /// Add a three-phase fault switch at this node. Repeatable.
    #[arg(long = "fault", value_name = "NODE")]
    faults: Vec<String>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ResultsArgs {
    /// The case file (.m or .mat)
    #[arg(required = true)]
    case: PathBuf,

    /// JSON reader configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

impl Cli {
    fn config_path(&self) -> Option<&Path> {
        match &self.command {
            Commands::Convert(args) => args.config.as_deref(),
            Commands::Results(args) => args.config.as_deref(),
            Commands::Serve(_) => None,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config_path()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = init_logger(cli.log_file.as_deref(), log_level(config.log_level, cli.verbose)) {
        eprintln!("error: {:#}", err);
        std::process::exit(2);
    }

    match execute(&cli, config) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("error: {:#}", err);
            std::process::exit(2);
        }
    }
}

/// `--verbose` raises the configured level to at least debug.
fn log_level(configured: LogLevel, verbose: bool) -> log::LevelFilter {
    let level = configured.to_level_filter();
    if verbose {
        level.max(log::LevelFilter::Debug)
    } else {
        level
    }
}

fn init_logger(log_file: Option<&Path>, level: log::LevelFilter) -> Result<()> {
    // RUST_LOG overrides both the config and the command line
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    if let Some(path) = log_file {
        let file = fs::File::create(path)
            .with_context(|| format!("could not create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ReaderConfig> {
    match path {
        Some(path) => ReaderConfig::from_file(path)
            .with_context(|| format!("could not load config {}", path.display())),
        None => Ok(ReaderConfig::default()),
    }
}

fn execute(cli: &Cli, config: ReaderConfig) -> Result<()> {
    match &cli.command {
        Commands::Convert(args) => convert(args, config),
        Commands::Results(args) => results(args, config),
        Commands::Serve(args) => {
            let runtime = tokio::runtime::Runtime::new().context("could not start runtime")?;
            runtime
                .block_on(run_server(&args.addr))
                .with_context(|| format!("server on {} failed", args.addr))
        }
    }
}

fn convert(args: &ConvertArgs, mut config: ReaderConfig) -> Result<()> {
    if let Some(domain) = args.domain {
        config.domain = domain;
    }
    if let Some(frequency) = args.frequency {
        config.frequency = frequency;
    }
    config.with_pss &= !args.no_pss;
    config.with_avr &= !args.no_avr;
    config.with_tg &= !args.no_tg;

    info!("Beginning conversion of {}", args.case.display());

    let mut reader = Reader::open(&args.case, args.dyn_case.as_deref(), config.clone())
        .with_context(|| format!("could not read case {}", args.case.display()))?;
    reader.load_mpc(&config)?;

    if args.init_from_pf {
        reader.init_from_pf_results()?;
    }
    for node in &args.faults {
        reader.add_three_phase_fault(node, FAULT_CLOSED_RESISTANCE, FAULT_OPEN_RESISTANCE)?;
    }

    let system = reader.system().context("no topology was created")?;
    let json = topology_to_json(system)?;

    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("could not write {}", path.display()))?;
            info!("Topology written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn results(args: &ResultsArgs, config: ReaderConfig) -> Result<()> {
    let reader = Reader::open(&args.case, None, config)
        .with_context(|| format!("could not read case {}", args.case.display()))?;

    print!("{}", pf_results_to_table(&reader.pf_results()));
    Ok(())
}

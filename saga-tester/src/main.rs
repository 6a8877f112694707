mod game_tester;
mod reports;
mod scenarios;
mod util;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use saga_engine::{GameConfig, validate_config};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use game_tester::{GameTester, ScenarioResult};
use scenarios::{Scenario, get_scenario, list_scenarios, load_scenario_file};
use util::split_csv;

const BUNDLED_GAME: &str = include_str!("../../assets/demo-game.json");

#[derive(Debug, Parser)]
#[command(name = "saga-tester", version = "0.1.0")]
#[command(about = "Headless scenario runner for scan-driven audio adventures")]
struct Args {
    /// Game config to test (defaults to the bundled demo game)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in scenarios to run (comma-separated, or "all")
    #[arg(long)]
    scenarios: Option<String>,

    /// JSON file holding an array of extra scenarios
    #[arg(long)]
    scenario_file: Option<PathBuf>,

    /// List all built-in scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Check the game config and exit without running scenarios
    #[arg(long)]
    validate_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let (config_name, config) = load_config(&args)?;
    let issues = validate_config(&config);
    for issue in &issues {
        log::warn!("{config_name}: {issue}");
    }

    if args.validate_only {
        let mut output_target = OutputTarget::new(args.output.clone())?;
        reports::generate_validation_report(&mut output_target, &config_name, &issues)?;
        output_target.flush_inner()?;
        if !issues.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let start_time = Instant::now();
    let scenarios = collect_scenarios(&args)?;
    let seeds = parse_seeds(&args.seeds)?;
    let game_tester = GameTester::new(config, args.verbose);

    let results = run_scenarios(&game_tester, &scenarios, &seeds)?;
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .try_init();
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

// Progress goes to stderr so a JSON report on stdout stays parseable.
fn announce_banner() {
    eprintln!("{}", "🎧 Saga Scenario Tester".bright_cyan().bold());
    eprintln!("{}", "================================".cyan());
}

fn load_config(args: &Args) -> Result<(String, GameConfig)> {
    let (source, text) = match &args.config {
        Some(path) => (
            path.display().to_string(),
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => ("bundled demo".to_string(), BUNDLED_GAME.to_string()),
    };
    let config =
        GameConfig::from_json(&text).with_context(|| format!("failed to parse {source}"))?;
    let name = if config.name.is_empty() {
        source
    } else {
        config.name.clone()
    };
    Ok((name, config))
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        scenarios.extend(list_scenarios().into_iter().map(|(name, _)| name));
    }
    scenarios
}

/// Built-in scenarios named on the command line followed by any from the
/// scenario file. Without either flag the smoke scenario runs.
fn collect_scenarios(args: &Args) -> Result<Vec<Scenario>> {
    let names = match (&args.scenarios, &args.scenario_file) {
        (Some(list), _) => expand_scenarios(list),
        (None, Some(_)) => Vec::new(),
        (None, None) => vec!["smoke".to_string()],
    };

    let mut scenarios = Vec::new();
    for name in names {
        if let Some(scenario) = get_scenario(&name) {
            scenarios.push(scenario);
        } else {
            eprintln!("⚠️  Unknown scenario: {}", name.yellow());
        }
    }
    if let Some(path) = &args.scenario_file {
        scenarios.extend(load_scenario_file(path)?);
    }
    Ok(scenarios)
}

fn parse_seeds(seeds_arg: &str) -> Result<Vec<u64>> {
    let seeds = split_csv(seeds_arg)
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed {token:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if seeds.is_empty() {
        bail!("at least one seed is required");
    }
    Ok(seeds)
}

fn run_scenarios(
    game_tester: &GameTester,
    scenarios: &[Scenario],
    seeds: &[u64],
) -> Result<Vec<ScenarioResult>> {
    eprintln!(
        "{} {}",
        "🧭 Running scenarios against".bright_yellow().bold(),
        game_tester.config().name.bold()
    );
    eprintln!("{}", "-".repeat(30).yellow());

    let mut results = Vec::new();
    for scenario in scenarios {
        for &seed in seeds {
            let result = game_tester
                .run_scenario(scenario, seed)
                .context("failed to build scenario runtime")?;
            let mark = if result.passed {
                "✅".green()
            } else {
                "❌".red()
            };
            eprintln!(
                "{mark} [seed {seed}] {} - {:?}",
                scenario.name, result.game_time
            );
            results.push(result);
        }
    }
    Ok(results)
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Saga Scenario Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                reports::generate_console_report(&mut output_target, results, duration)?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use roundabout_sched::format::{parse_problem, parse_schedule, schedule_to_json, write_problem, write_schedule};
use roundabout_sched::generate::{generate_problem, GeneratorConfig};
use roundabout_sched::validate::validate;
use roundabout_sched::{Scheduler, SchedulerConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Plans collision-free motion profiles for vehicles crossing a roundabout.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Logs more detail; repeat for trace output
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Path to a JSON scheduler configuration
    #[clap(long, value_parser, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Schedules the vehicles of a problem file
    Solve {
        #[clap(value_parser)]
        input: PathBuf,
        /// Writes the schedule here instead of standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,
        /// Writes the full per-section schedule as JSON
        #[clap(long, action)]
        json: bool,
    },
    /// Checks a schedule file against its problem file
    Validate {
        #[clap(value_parser)]
        input: PathBuf,
        #[clap(value_parser)]
        schedule: PathBuf,
    },
    /// Generates a random problem with Poisson arrivals
    Generate {
        #[clap(long, value_parser)]
        seed: Option<u64>,
        /// Lets journeys cross the seam of the ring
        #[clap(long, action)]
        wrap_around: bool,
        /// Draws initial velocities below this bound in m/s
        #[clap(long, value_parser, default_value_t = 0.0)]
        max_initial_vel: f64,
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,
    },
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn emit(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, content).with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    let config: SchedulerConfig = match &cli.config {
        Some(path) => serde_json::from_str(&read(path)?)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        None => SchedulerConfig::default(),
    };

    match cli.command {
        Command::Solve { input, output, json } => {
            let problem = parse_problem(&read(&input)?, &config.limits)
                .with_context(|| format!("Invalid problem in {}", input.display()))?;
            let mut scheduler = Scheduler::new(problem.ring, &problem.vehicles, config)?;
            let schedule = scheduler.solve().context("Scheduling failed")?;
            info!("{:?}", schedule.stats);
            info!(
                "Total travel time {:.3} s against an unobstructed {:.3} s",
                schedule.total_travel_time(),
                schedule.ideal_travel_time()
            );
            let content = if json {
                schedule_to_json(&schedule)?
            } else {
                write_schedule(&schedule)
            };
            emit(output.as_deref(), &content)?;
        }
        Command::Validate { input, schedule } => {
            let problem = parse_problem(&read(&input)?, &config.limits)
                .with_context(|| format!("Invalid problem in {}", input.display()))?;
            let lines = parse_schedule(&read(&schedule)?)
                .with_context(|| format!("Invalid schedule in {}", schedule.display()))?;
            let violations = validate(&problem, &lines, &config.limits);
            for violation in &violations {
                println!("{}", violation);
            }
            if !violations.is_empty() {
                bail!("Found {} violations", violations.len());
            }
            println!("Schedule is valid");
        }
        Command::Generate {
            seed,
            wrap_around,
            max_initial_vel,
            output,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let generator = GeneratorConfig {
                wrap_around,
                max_initial_vel: max_initial_vel.min(config.limits.max_vel),
                ..Default::default()
            };
            let problem = generate_problem(&mut rng, &generator)?;
            emit(output.as_deref(), &write_problem(&problem))?;
        }
    }
    Ok(())
}

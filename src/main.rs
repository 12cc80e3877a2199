use chrono::Local;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use dotenv::dotenv;
use powersum::store::write_store;
use powersum::summary::Summary;
use powersum::{Config, PowersumError, RunOutcome, RunRequest, generate_partitions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Find prime power sums (n = p^j + q^k) for a batch of primes.
#[derive(Parser, Debug)]
#[command(name = "powersum", version)]
struct Cli {
    /// Number of primes to process, starting from 2 (or after the stored ones with --resume).
    #[arg(long, default_value_t = 1000)]
    num_primes: u64,

    /// Number of primes per batch; must divide --num-primes. Defaults to the configured size.
    #[arg(long)]
    batch_size: Option<u64>,

    /// Worker count. Defaults to the number of physical cores.
    #[arg(long)]
    num_processes: Option<usize>,

    /// Output CSV path; relative paths land in the configured output directory.
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Append further primes to the existing store.
    #[arg(long)]
    resume: bool,

    /// Path to a powersum.toml file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip the summary report.
    #[arg(long)]
    no_summary: bool,
}

fn resolve_output_path(cli: &Cli, config: &Config) -> PathBuf {
    match &cli.output_file {
        Some(p) if p.is_absolute() => p.clone(),
        Some(p) => config.output_dir.join(p),
        None if cli.resume => config.data_path(),
        None => {
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            config.temp_dir.join(format!("partition_data_{}.csv", stamp))
        }
    }
}

fn run(cli: &Cli, config: &Config, batch_size: u64) -> Result<(), PowersumError> {
    let output = resolve_output_path(cli, config);
    let request = RunRequest {
        num_primes: cli.num_primes,
        batch_size,
        workers: cli.num_processes.unwrap_or_else(num_cpus::get_physical),
        resume: cli.resume,
        store_path: Some(output.clone()),
    };

    if !cli.resume {
        println!("[powersum] Generating partitions for the first {} primes...", cli.num_primes);
    }

    let outcome = generate_partitions(&request, config)?;
    let dict = match &outcome {
        RunOutcome::NothingToDo => {
            println!("[powersum] No primes requested, nothing written.");
            return Ok(());
        }
        RunOutcome::Completed { start_index, resumed, dict } => {
            if let Some(point) = resumed {
                println!(
                    "[powersum] Resumed after prime {} (index {})",
                    point.last_prime, start_index
                );
                if let Some(backup) = &point.backup {
                    println!("[powersum] Backup created: {}", backup.display());
                }
            }
            dict
        }
    };

    write_store(dict, &output, cli.resume)?;
    println!("[powersum] Output successfully saved to {}", output.display());

    if !cli.no_summary {
        println!("\n{}", Summary::from_dict(dict));
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    powersum::init_tracing("powersum");
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[powersum] {}", e);
            return ExitCode::FAILURE;
        }
    };

    let batch_size = cli.batch_size.unwrap_or(config.batch_size);
    if batch_size == 0 || cli.num_primes % batch_size != 0 {
        Cli::command()
            .error(
                ErrorKind::ValueValidation,
                format!(
                    "num_primes ({}) must be strictly divisible by batch_size ({}).",
                    cli.num_primes, batch_size
                ),
            )
            .exit();
    }

    match run(&cli, &config, batch_size) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[powersum] {}", e);
            if cli.resume {
                eprintln!("[powersum] Check the data file path or run without --resume to start fresh.");
            }
            ExitCode::FAILURE
        }
    }
}

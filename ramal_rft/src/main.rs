use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use ramal_rft::factors::{FactorError, Factors};
use ramal_rft::generator::generate_fault_tree;
use ramal_rft::summary::{write_info, write_summary};
use tracing_subscriber::EnvFilter;

/// CMD Arguments
#[derive(Parser, Debug)]
#[command(version, about = "Complex-Fault-Tree Generator")]
struct Args {
    /// Name for the fault tree.
    #[arg(long = "ft-name", default_value = "Autogenerated", value_name = "NCNAME")]
    ft_name: String,
    /// Name for the root gate.
    #[arg(long, default_value = "root", value_name = "NCNAME")]
    root: String,
    /// Seed for the PRNG.
    #[arg(long, default_value_t = 123)]
    seed: u64,
    /// Number of basic events.
    #[arg(short = 'b', long = "num-basic", default_value_t = 100)]
    num_basic: usize,
    /// Average number of gate arguments.
    #[arg(short = 'a', long = "num-args", default_value_t = 3.0)]
    num_args: f64,
    /// Weights for [AND, OR, K/N, NOT, XOR] gates.
    #[arg(
        long = "weights-g",
        value_delimiter = ' ',
        num_args = 1..=5,
        default_values_t = vec![1.0, 1.0, 0.0, 0.0, 0.0]
    )]
    weights_g: Vec<f64>,
    /// Average percentage of common basic events per gate.
    #[arg(long = "common-b", default_value_t = 0.1)]
    common_b: f64,
    /// Average percentage of common gates per gate.
    #[arg(long = "common-g", default_value_t = 0.1)]
    common_g: f64,
    /// Average number of parents for common basic events.
    #[arg(long = "parents-b", default_value_t = 2.0)]
    parents_b: f64,
    /// Average number of parents for common gates.
    #[arg(long = "parents-g", default_value_t = 2.0)]
    parents_g: f64,
    /// Number of gates; if set, discards parents-b/g and common-b/g.
    #[arg(short = 'g', long = "num-gate", default_value_t = 0)]
    num_gate: usize,
    /// Minimum probability for basic events.
    #[arg(long = "min-prob", default_value_t = 0.01)]
    min_prob: f64,
    /// Maximum probability for basic events.
    #[arg(long = "max-prob", default_value_t = 0.1)]
    max_prob: f64,
    /// Number of house events.
    #[arg(long = "num-house", default_value_t = 0)]
    num_house: usize,
    /// Number of CCF groups.
    #[arg(long = "num-ccf", default_value_t = 0)]
    num_ccf: usize,
    /// A file to write the fault tree.
    #[arg(short, long, default_value = "fault_tree.xml")]
    out: PathBuf,
    /// Apply the Aralia format to the output.
    #[arg(long, default_value_t = false)]
    aralia: bool,
    /// Nestedness of Boolean formulae in the XML output.
    #[arg(long, default_value_t = 0)]
    nest: usize,
}

fn setup_factors(args: &Args) -> Result<Factors, FactorError> {
    let mut factors = Factors::new();
    factors.set_min_max_prob(args.min_prob, args.max_prob)?;
    factors.set_common_event_factors(
        args.common_b,
        args.common_g,
        args.parents_b,
        args.parents_g,
    )?;
    factors.set_num_factors(args.num_args, args.num_basic, args.num_house, args.num_ccf)?;
    factors.set_gate_weights(args.weights_g.clone())?;
    if args.num_gate > 0 {
        factors.constrain_num_gate(args.num_gate)?;
    }
    factors.calculate();
    Ok(factors)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let mut args = Args::parse();
    if args.aralia {
        if args.nest > 0 {
            eprintln!("no support for nested formulae in the Aralia format");
            std::process::exit(2);
        }
        if args.out == PathBuf::from("fault_tree.xml") {
            args.out = PathBuf::from("fault_tree.txt");
        }
    }

    let factors = match setup_factors(&args) {
        Ok(factors) => factors,
        Err(error) => {
            eprintln!("error in factors:\n{error}");
            std::process::exit(1);
        }
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let start = Instant::now();
    let result = generate_fault_tree(&factors, &args.ft_name, &args.root, &mut rng)
        .map_err(ramal_fta::Error::from)
        .and_then(|fault_tree| {
            // The whole document goes through memory first so an error
            // cannot leave a partial output file.
            let mut buffer = Vec::new();
            if args.aralia {
                fault_tree.to_aralia(&mut buffer)?;
            } else {
                writeln!(buffer, "<?xml version=\"1.0\"?>")?;
                write_info(&mut buffer, &fault_tree, &factors, args.seed)?;
                write_summary(&mut buffer, &fault_tree)?;
                fault_tree.write_mef(&mut buffer, args.nest)?;
            }
            fs::write(&args.out, buffer)?;
            Ok(fault_tree)
        });
    match result {
        Ok(fault_tree) => {
            let duration = start.elapsed();
            println!(
                "{}",
                json!({
                    "seed": args.seed,
                    "output": args.out.display().to_string(),
                    "duration": format!("{duration:?}"),
                    "report": ramal_fta::report::json_report(&fault_tree),
                })
            );
        }
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}

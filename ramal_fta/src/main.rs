use std::fs;
use std::path::PathBuf;

use clap::Parser;
use ramal_fta::error::Error;
use ramal_fta::shorthand;
use tracing_subscriber::EnvFilter;

/// CMD Arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Converts the shorthand notation for fault trees into the Open-PSA MEF XML format."
)]
struct Args {
    /// Input file with the shorthand notation.
    input: PathBuf,
    /// Allow multiple top gates in the input.
    #[arg(long, default_value_t = false)]
    multi_top: bool,
    /// Output file. Defaults to the input file name with the xml (or txt)
    /// extension.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Emit the Aralia format instead of XML.
    #[arg(long, default_value_t = false)]
    aralia: bool,
    /// Nesting depth for inlining private NOT gates in the XML output.
    #[arg(long, default_value_t = 0)]
    nest: usize,
}

fn run(args: Args) -> Result<(), Error> {
    let fault_tree = shorthand::parse_file(&args.input, args.multi_top)?;
    let out_path = args.out.unwrap_or_else(|| {
        args.input
            .with_extension(if args.aralia { "txt" } else { "xml" })
    });
    // Serialize into memory first; a failed validation or a mid-write
    // error must not leave a partial file behind.
    let mut buffer = Vec::new();
    if args.aralia {
        fault_tree.to_aralia(&mut buffer)?;
    } else {
        fault_tree.to_xml(&mut buffer, args.nest)?;
    }
    fs::write(out_path, buffer)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    if args.aralia && args.nest > 0 {
        eprintln!("no support for nested formulae in the Aralia format");
        std::process::exit(2);
    }
    if let Err(error) = run(args) {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

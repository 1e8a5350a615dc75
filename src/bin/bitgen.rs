//! Bitfield accessor generator binary.
//!
//! Reads a record description from a file (or stdin), writes the generated
//! Rust accessor source to a file (or stdout). With one or more `--prune`
//! files, only the definitions named in those files are emitted.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

#[derive(Parser)]
#[command(name = "bitgen", about = "Generate Rust accessors for bit-level record layouts")]
struct Args {
    /// Input description file; stdin when omitted.
    input: Option<PathBuf>,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source file to scan for used accessor names; repeatable. Only the
    /// definitions found in these files are generated.
    #[arg(long = "prune", value_name = "FILE")]
    prune: Vec<PathBuf>,
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let text = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut corpus = Vec::new();
    for path in &args.prune {
        corpus.push(fs::read_to_string(path)?);
    }

    let generated = bitgen::generate(&text, &corpus)?;

    match &args.output {
        Some(path) => fs::write(path, generated)?,
        None => io::stdout().write_all(generated.as_bytes())?,
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

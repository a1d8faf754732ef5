#![deny(clippy::all)]

use anyhow::Context;
use semu::{Emulator, MachineSpec};
use serde::de::DeserializeOwned;
use std::{fs, path::PathBuf, process};
use structopt::StructOpt;

/// The sub-command to execute.
#[derive(Debug, StructOpt)]
enum Command {
    /// Load a program document and print its listing.
    #[structopt(name = "show")]
    Show {
        /// Path to the program document
        #[structopt(parse(from_os_str), long = "program", short = "p")]
        program_path: PathBuf,
        /// Expansion depth to display at (clamped to the program's maximum)
        #[structopt(long = "depth", short = "d", default_value = "0")]
        depth: u32,
    },

    /// Load and execute a program document.
    #[structopt(name = "run")]
    Run {
        /// Path to the machine spec file, in JSON format. If not provided, a
        /// default spec will be used.
        #[structopt(parse(from_os_str), long = "spec")]
        machine_spec_path: Option<PathBuf>,
        /// Path to the program document
        #[structopt(parse(from_os_str), long = "program", short = "p")]
        program_path: PathBuf,
        /// Expansion depth to run at (clamped to the program's maximum)
        #[structopt(long = "depth", short = "d", default_value = "0")]
        depth: u32,
        /// Input values, bound to x1, x2, ... in order
        inputs: Vec<i64>,
    },
}

/// S-language emulator, for loading and executing S-Program documents
#[derive(Debug, StructOpt)]
#[structopt(name = "semu")]
struct Opt {
    #[structopt(subcommand)]
    cmd: Command,
}

fn read_file(path: &PathBuf) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file {:?}", path))
}

/// Loads a machine spec from a file. If the path is None, returns the
/// default value instead.
fn load_spec<T: Default + DeserializeOwned>(
    path_opt: &Option<PathBuf>,
) -> anyhow::Result<T> {
    match path_opt {
        None => Ok(T::default()),
        Some(path) => {
            let spec_str = read_file(path)?;
            Ok(serde_json::from_str(&spec_str)?)
        }
    }
}

fn run(opt: Opt) -> anyhow::Result<()> {
    match opt.cmd {
        Command::Show {
            program_path,
            depth,
        } => {
            let source = read_file(&program_path)?;
            let emulator = Emulator::load(source)?;
            print!("{}", emulator.display(depth));
        }

        Command::Run {
            machine_spec_path,
            program_path,
            depth,
            inputs,
        } => {
            let spec: MachineSpec = load_spec(&machine_spec_path)?;
            let source = read_file(&program_path)?;
            let mut emulator = Emulator::load(source)?.with_spec(spec);
            let result = emulator.run(&inputs, depth)?;

            println!("y: {}", result.y_value);
            println!("Variables:");
            for (var, value) in &result.variables {
                println!("  {} = {}", var, value);
            }
            println!("Cycles: {}", result.cycles);
        }
    }
    Ok(())
}

fn main() {
    let exit_code = match run(Opt::from_args()) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    };
    process::exit(exit_code);
}

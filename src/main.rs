//! Rowlab CLI - edit tabular data with natural-language instructions
//!
//! # Main Commands
//!
//! ```bash
//! rowlab serve                                  # Start HTTP server (port 3000)
//! rowlab apply input.csv -i "trim all names"    # Apply instructions headlessly
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! rowlab parse input.csv            # Just parse a file to JSON rows
//! rowlab operations                 # Show available value operations
//! rowlab example-program            # Show an example row program
//! ```

use clap::{Parser, Subcommand};
use rowlab::pipeline::{apply_instructions, ApplyOptions};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rowlab")]
#[command(about = "Edit tabular data with natural-language instructions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV or Excel file and output JSON rows
    Parse {
        /// Input file (.csv, .xlsx or .xls)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply instructions to a file: parse, interpret, execute, export
    Apply {
        /// Input file (.csv, .xlsx or .xls)
        input: PathBuf,

        /// An instruction in natural language (repeatable, applied in order)
        #[arg(short, long = "instruction", required = true)]
        instructions: Vec<String>,

        /// Write the edited dataset to this .xlsx file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the interpreter model
        #[arg(long)]
        model: Option<String>,
    },

    /// Show an example row program
    ExampleProgram,

    /// Show available value operations
    Operations,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Apply {
            input,
            instructions,
            output,
            model,
        } => cmd_apply(&input, instructions, output, model).await,

        Commands::ExampleProgram => cmd_example_program(),

        Commands::Operations => cmd_operations(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Parsing: {}", input.display());

    let dataset = rowlab::parse_path(input)?;

    eprintln!("   Columns: {}", dataset.headers.join(", "));
    eprintln!("Parsed {} rows", dataset.row_count());

    let json = serde_json::to_string_pretty(&dataset.rows)?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_apply(
    input: &Path,
    instructions: Vec<String>,
    output: Option<PathBuf>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Processing: {}", input.display());

    let options = ApplyOptions { output, model };
    let outcome = apply_instructions(input, &instructions, options).await?;

    eprintln!(
        "Applied {} instructions; {} rows, {} columns remain",
        outcome.applied,
        outcome.dataset.row_count(),
        outcome.dataset.headers.len()
    );

    Ok(())
}

fn cmd_example_program() -> Result<(), Box<dyn std::error::Error>> {
    let program = rowlab::example_program();
    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", rowlab::operations_description());
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    rowlab::server::start_server(port).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

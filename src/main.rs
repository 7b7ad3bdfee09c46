use clap::{Parser, Subcommand};
use docx_stylefix::{FixOptions, Session, classify};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docx-stylefix", about = "Check and fix DOCX files against the house style")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report nonconformities without changing the file
    Check {
        /// Input DOCX file
        input: PathBuf,
    },
    /// Write a fixed copy next to the input
    Fix {
        /// Input DOCX file
        input: PathBuf,
        /// Output DOCX file (defaults to <stem><suffix>.docx)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Suffix appended to the file stem of the output
        #[arg(long, default_value = "_fixed")]
        suffix: String,
        /// Skip the timestamped backup of the original
        #[arg(long)]
        no_backup: bool,
        /// strftime pattern replacing [DATE] in headers and footers
        #[arg(long, default_value = "%B %d, %Y")]
        date_format: String,
    },
    /// Print how each table would be classified
    Tables {
        /// Input DOCX file
        input: PathBuf,
    },
}

fn require_file(path: &Path) {
    if !path.exists() {
        eprintln!("Error: file not found: {}", path.display());
        std::process::exit(1);
    }
    if !path.is_file() {
        eprintln!("Error: not a file: {}", path.display());
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<i32, docx_stylefix::Error> {
    match command {
        Command::Check { input } => {
            require_file(&input);
            let mut session = Session::open(&input, FixOptions::default())?;
            let issues = session.check()?;
            for issue in issues {
                println!("{issue}");
            }
            let fixable = issues.iter().filter(|i| i.is_nonconformity()).count();
            println!(
                "{} issue(s), {fixable} fixable, {} table(s) to reformat",
                issues.len(),
                issues.len() - fixable
            );
            Ok(if fixable > 0 { 2 } else { 0 })
        }
        Command::Fix {
            input,
            output,
            suffix,
            no_backup,
            date_format,
        } => {
            require_file(&input);
            let options = FixOptions {
                output_suffix: suffix,
                output,
                backup: !no_backup,
                date_format,
            };
            let mut session = Session::open(&input, options)?;
            session.check()?;
            match session.fix()? {
                Some(outcome) => {
                    if let Some(backup) = &outcome.backup {
                        println!("backup: {}", backup.display());
                    }
                    println!("output: {}", outcome.output.display());
                    println!("{} fix(es) applied", outcome.applied);
                }
                None => println!("nothing to fix"),
            }
            Ok(0)
        }
        Command::Tables { input } => {
            require_file(&input);
            let session = Session::open(&input, FixOptions::default())?;
            for (i, (table, preceding)) in session.document().tables_with_context().into_iter().enumerate() {
                let config = classify::classify(table, &preceding);
                println!(
                    "table {}: {} (header {:?}, body {:?}, special {:?})",
                    i + 1,
                    config.table_type,
                    config.header_align,
                    config.body_align,
                    config.special
                );
            }
            Ok(0)
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match run(args.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use groundcontrol::autofix::auto_fix_project;
use groundcontrol::config::ValidatorConfig;
use groundcontrol::orchestrator::Validator;
use groundcontrol::report::ReportGenerator;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "groundcontrol",
    about = "Validation and auto-repair for AI-generated web projects",
    version
)]
struct Args {
    #[command(subcommand)]
    command: CommandKind,
}

#[derive(Subcommand, Debug)]
enum CommandKind {
    /// Run the validation pipeline and print a report
    Validate {
        /// Path to the project (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Stop after the fast syntax pass
        #[arg(long)]
        syntax_only: bool,

        /// Render the machine-actionable fix-task report instead of the
        /// verbose one
        #[arg(long)]
        fix_task: bool,
    },
    /// Attempt automatic repair, then print what changed
    Fix {
        /// Path to the project (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        CommandKind::Validate {
            path,
            syntax_only,
            fix_task,
        } => {
            let path = path.canonicalize()?;
            let config = ValidatorConfig::load(&path);
            let validator = Validator::new(config);

            let result = validator.validate_project(&path, syntax_only).await?;
            let report = ReportGenerator::new().generate_error_report(&path, &result, fix_task);
            println!("{}", report);

            if !result.is_valid {
                std::process::exit(1);
            }
        }
        CommandKind::Fix { path } => {
            let path = path.canonicalize()?;
            let config = ValidatorConfig::load(&path);
            let validator = Validator::new(config);

            let fix = auto_fix_project(&path, validator.config(), &validator.lock_manager()).await?;
            if fix.changed_files.is_empty() {
                println!("No files needed changes.");
            } else {
                println!("Changed {} file(s):", fix.changed_files.len());
                for file in &fix.changed_files {
                    println!("  {}", file);
                }
            }
            if !fix.remaining_errors.is_empty() {
                println!("{} error(s) remain after auto-fix.", fix.remaining_errors.len());
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

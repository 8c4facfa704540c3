//! CLI Adapter.

mod stat;

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use crate::adapters::HttpRepositoryClient;
use crate::app::GitFilesystem;
use crate::app::load_config::{CONFIG_ENV, load_config};
use crate::domain::{AppError, WriteConfig};
use crate::ports::FilesystemAdapter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "REPOFS_LOG";

#[derive(Parser)]
#[command(name = "repofs")]
#[command(version)]
#[command(about = "Treat a hosted Git repository branch as a filesystem", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ./repofs.toml)
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether a file (or, with --dir, a directory) exists
    Exists {
        path: String,
        /// Check for a directory instead of a file
        #[arg(short, long)]
        dir: bool,
    },
    /// Print a file's content
    Cat { path: String },
    /// Write a file from --file or stdin, creating or updating it
    Put {
        path: String,
        /// Local file to upload instead of reading stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete a file
    Rm { path: String },
    /// Create an empty directory
    Mkdir {
        path: String,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete the files directly inside a directory
    Rmdir {
        path: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Move a file
    #[clap(visible_alias = "move")]
    Mv {
        source: String,
        destination: String,
        /// Commit message for both the upload and the delete of the source
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Copy a file
    #[clap(visible_alias = "copy")]
    Cp {
        source: String,
        destination: String,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List directory contents
    Ls {
        #[arg(default_value = "")]
        path: String,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Print one JSON object per entry
        #[arg(long)]
        json: bool,
    },
    /// Show size, MIME type, last modification and checksum of a file
    Stat { path: String },
}

/// Entry point for the CLI.
pub fn run() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let directives = std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().parse_lossy(directives))
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<(), AppError> {
    let loaded = load_config(cli.config.as_deref())?;
    let client = HttpRepositoryClient::new(&loaded.repository, loaded.token)?;
    let fs = GitFilesystem::with_prefix(client, &loaded.repository.prefix);

    match cli.command {
        Commands::Exists { path, dir } => {
            let exists = if dir { fs.directory_exists(&path)? } else { fs.file_exists(&path)? };
            println!("{}", exists);
        }
        Commands::Cat { path } => {
            let contents = fs.read(&path)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&contents)?;
            stdout.flush()?;
        }
        Commands::Put { path, file, message } => {
            let contents: Box<dyn io::Read + Send> = match file {
                Some(file) => Box::new(File::open(file)?),
                None => Box::new(io::stdin()),
            };
            fs.write_stream(&path, contents, &write_config(message))?;
            println!("✅ Wrote {}", path);
        }
        Commands::Rm { path } => {
            fs.delete(&path)?;
            println!("✅ Deleted {}", path);
        }
        Commands::Mkdir { path, message } => {
            fs.create_directory(&path, &write_config(message))?;
            println!("✅ Created directory {}/", path);
        }
        Commands::Rmdir { path, yes } => {
            if !yes && !confirm_delete_directory(&path)? {
                println!("Aborted");
                return Ok(());
            }
            fs.delete_directory(&path)?;
            println!("✅ Deleted directory {}/", path);
        }
        Commands::Mv { source, destination, message } => {
            fs.move_file(&source, &destination, &write_config(message))?;
            println!("✅ Moved {} to {}", source, destination);
        }
        Commands::Cp { source, destination, message } => {
            fs.copy(&source, &destination, &write_config(message))?;
            println!("✅ Copied {} to {}", source, destination);
        }
        Commands::Ls { path, recursive, json } => {
            for entry in fs.list_contents(&path, recursive) {
                let entry = entry?;
                if json {
                    let line = serde_json::to_string(&entry)
                        .map_err(|err| AppError::Io(io::Error::other(err)))?;
                    println!("{}", line);
                } else {
                    println!("{:<4} {}", entry.type_name(), entry.path());
                }
            }
        }
        Commands::Stat { path } => {
            let report = stat::collect(&fs, &path)?;
            print!("{}", report);
        }
    }

    Ok(())
}

fn write_config(message: Option<String>) -> WriteConfig {
    WriteConfig { commit_message: message }
}

fn confirm_delete_directory(path: &str) -> Result<bool, AppError> {
    let answer = Confirm::new()
        .with_prompt(format!("Delete every file directly inside '{}'?", path))
        .default(false)
        .interact_opt()
        .map_err(|err| AppError::Prompt(format!("Failed to confirm: {}", err)))?;
    Ok(answer.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ls_defaults_to_repository_root() {
        let cli = Cli::try_parse_from(["repofs", "ls", "--recursive"]).unwrap();
        match cli.command {
            Commands::Ls { path, recursive, json } => {
                assert_eq!(path, "");
                assert!(recursive);
                assert!(!json);
            }
            _ => panic!("expected ls"),
        }
    }

    #[test]
    fn put_accepts_file_and_message() {
        let cli =
            Cli::try_parse_from(["repofs", "put", "notes.md", "--file", "local.md", "-m", "Add"])
                .unwrap();
        match cli.command {
            Commands::Put { path, file, message } => {
                assert_eq!(path, "notes.md");
                assert_eq!(file, Some(PathBuf::from("local.md")));
                assert_eq!(message.as_deref(), Some("Add"));
            }
            _ => panic!("expected put"),
        }
    }

    #[test]
    fn missing_commit_message_falls_back_to_default() {
        assert!(write_config(None).commit_message.is_none());
    }
}

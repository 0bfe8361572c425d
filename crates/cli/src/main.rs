//! agentlink CLI
//!
//! Chat with an agent backend and browse its workspace from the terminal.

mod cmd_chat;
mod cmd_files;
mod cmd_projects;
mod cmd_sessions;
mod logging;
mod paths;
mod render;
mod settings;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use agentlink_client::ApiClient;

use crate::paths::DataDir;
use crate::settings::{Settings, SERVER_URL_ENV};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "agentlink", version = VERSION)]
#[command(about = "Chat with an agent backend and browse its workspace", long_about = None)]
struct Cli {
    /// Data directory (default: ~/.agentlink)
    #[arg(long, global = true, env = "AGENTLINK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Server base URL, e.g. https://agent.example.com
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat,
    /// List sessions
    Sessions,
    /// Browse and manage workspace files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
    /// List projects available to you
    Projects,
    /// Show the agent configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum FilesAction {
    /// Print the workspace tree
    Tree {
        #[arg(long)]
        path: Option<String>,
    },
    /// Print a file's content
    Cat { path: String },
    /// Delete a file
    Rm { path: String },
    /// Download a file, or a folder as zip
    Download {
        path: String,
        #[arg(long)]
        folder: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "agentlink", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    data_dir.ensure_dirs()?;
    let _logging = logging::init_logging(&data_dir)?;

    let settings = Settings::load(&data_dir.config_path())?
        .with_server_override(std::env::var(SERVER_URL_ENV).ok(), cli.server);

    match cli.command {
        Commands::Chat => cmd_chat::run(&settings).await,
        Commands::Sessions => cmd_sessions::run(&settings).await,
        Commands::Files { action } => {
            let api = ApiClient::new(&settings.server_url)?;
            match action {
                FilesAction::Tree { path } => cmd_files::tree(&api, path.as_deref()).await,
                FilesAction::Cat { path } => cmd_files::cat(&api, &path).await,
                FilesAction::Rm { path } => cmd_files::rm(&api, &path).await,
                FilesAction::Download {
                    path,
                    folder,
                    output,
                } => cmd_files::download(&api, &path, folder, output.as_deref()).await,
            }
        }
        Commands::Projects => cmd_projects::projects(&ApiClient::new(&settings.server_url)?).await,
        Commands::Config => cmd_projects::config(&ApiClient::new(&settings.server_url)?).await,
        Commands::Completions { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn download_flags_parse() {
        let cli = Cli::try_parse_from([
            "agentlink",
            "--server",
            "http://h:1",
            "files",
            "download",
            "/w/out",
            "--folder",
            "-o",
            "out.zip",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://h:1"));
        match cli.command {
            Commands::Files {
                action:
                    FilesAction::Download {
                        path,
                        folder,
                        output,
                    },
            } => {
                assert_eq!(path, "/w/out");
                assert!(folder);
                assert_eq!(output, Some(PathBuf::from("out.zip")));
            }
            _ => panic!("expected files download"),
        }
    }
}

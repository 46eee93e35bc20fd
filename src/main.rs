use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use protobuilder_common::PortMapping;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "protobuilder")]
#[command(version, about = "Turn an app idea into a running prototype")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Also write logs to <LOG_DIR>/runtime.log
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run commands against a source tree inside a fresh container
    Run {
        /// Directory copied into the container's working directory
        #[arg(long)]
        source: PathBuf,

        /// Shell command to run (repeatable, chained in order)
        #[arg(short = 'c', long = "command", required = true)]
        commands: Vec<String>,

        /// Image catalog key or image reference
        #[arg(long)]
        image: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        workdir: Option<String>,

        #[arg(long)]
        name: Option<String>,

        /// Publish a port, HOST:CONTAINER (repeatable)
        #[arg(short, long = "port")]
        ports: Vec<PortMapping>,

        /// Run every command even if an earlier one fails
        #[arg(long)]
        keep_going: bool,

        /// Leave the container running afterwards
        #[arg(long)]
        keep: bool,

        /// Skip the configured bootstrap commands
        #[arg(long)]
        no_bootstrap: bool,
    },
    /// Show the tail of a container's run log
    Logs {
        /// Container id or name
        container: String,

        #[arg(short = 'n', long)]
        lines: Option<usize>,

        #[arg(long)]
        workdir: Option<String>,
    },
    /// List running containers
    Ps {
        /// Only containers running this catalog image
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove leftover containers by label or published host port
    Cleanup {
        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// Write a project from a developer XML document
    Materialize {
        xml_file: PathBuf,

        /// Output directory (default: current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a prototype from an idea with the agent pipeline
    Generate {
        /// The idea; prompts interactively when omitted
        #[arg(long)]
        idea: Option<String>,

        #[arg(long)]
        out: Option<PathBuf>,

        /// Deploy the prototype into a container afterwards
        #[arg(long)]
        run: bool,

        /// Image used with --run
        #[arg(long)]
        image: Option<String>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write default config files to .protobuilder/
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = protobuilder::logging::init(&protobuilder::logging::LogOptions {
        verbose: cli.verbose,
        json: cli.json_logs,
        file_dir: cli.log_dir.clone(),
    })?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run {
            source,
            commands,
            image,
            tag,
            workdir,
            name,
            ports,
            keep_going,
            keep,
            no_bootstrap,
        } => {
            let args = cmd::run::RunArgs {
                source: source.clone(),
                commands: commands.clone(),
                image: image.clone(),
                tag: tag.clone(),
                workdir: workdir.clone(),
                name: name.clone(),
                ports: ports.clone(),
                keep_going: *keep_going,
                keep: *keep,
                no_bootstrap: *no_bootstrap,
            };
            cmd::cmd_run(&project_dir, args).await?;
        }
        Commands::Logs {
            container,
            lines,
            workdir,
        } => cmd::cmd_logs(&project_dir, container, *lines, workdir.as_deref()).await?,
        Commands::Ps { image } => cmd::cmd_ps(&project_dir, image.as_deref()).await?,
        Commands::Cleanup { label, port } => {
            cmd::cmd_cleanup(&project_dir, label.as_deref(), *port).await?
        }
        Commands::Materialize { xml_file, out } => {
            cmd::cmd_materialize(&project_dir, xml_file, out.as_deref())?
        }
        Commands::Generate {
            idea,
            out,
            run,
            image,
        } => {
            cmd::cmd_generate(
                &project_dir,
                idea.as_deref(),
                out.as_deref(),
                *run,
                image.as_deref(),
            )
            .await?
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}

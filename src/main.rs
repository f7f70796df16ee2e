use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use flow_studio::{
    protocol::local_endpoint, BridgeClient, BridgeServer, ClientOptions, CommandOpener,
    FileOpener, Result, ServerOptions, DEFAULT_PORT,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow-studio")]
#[command(about = "Open call-activity sub-processes from a BPMN editor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge server next to the editor
    Serve(ServeArgs),
    /// Print the config document as the server sees it
    Config {
        #[command(flatten)]
        client: ClientArgs,
        /// Path to the project config
        #[arg(default_value = "./config.json")]
        config_path: String,
    },
    /// Print the diagram a process key resolves to
    Resolve(LookupArgs),
    /// Ask the server to open the diagram for a process key in the editor
    Open(LookupArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Editor executable used to open diagrams
    #[arg(long)]
    open_command: Option<PathBuf>,
    /// Extra arguments passed to the editor before the file paths
    #[arg(long = "open-arg", allow_hyphen_values = true)]
    open_args: Vec<String>,
    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Seconds to wait for a reply
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Args)]
struct LookupArgs {
    #[command(flatten)]
    client: ClientArgs,
    /// Path to the project config
    #[arg(long = "config", default_value = "./config.json")]
    config_path: String,
    /// Process key, as referenced by the call activity's `calledElement`
    key: String,
}

impl ClientArgs {
    fn connect_options(&self) -> ClientOptions {
        ClientOptions {
            endpoint: local_endpoint(self.port),
            request_timeout: Duration::from_secs(self.timeout),
            ..ClientOptions::default()
        }
    }
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flow-studio/flow-studio.log")
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flow_studio=info"))
}

/// Server logs go to a file; client subcommands keep stdout clean for output.
fn init_tracing(log_file: Option<&Path>) {
    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return;
    };

    match open_log_file(path) {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(file)
            .with_ansi(false)
            .with_target(false)
            .init(),
        Err(e) => {
            eprintln!("Cannot write log file {}: {e}; logging to stderr", path.display());
            init_tracing(None);
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let opener = args.open_command.map(|program| {
        Arc::new(CommandOpener::new(program).with_args(args.open_args)) as Arc<dyn FileOpener>
    });
    let server = BridgeServer::new(
        ServerOptions {
            host: args.host,
            port: args.port,
        },
        opener,
    );

    let addr = server.listen().await?;
    eprintln!("flow-studio listening on ws://{addr}");

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}

async fn connected(args: &ClientArgs) -> Result<BridgeClient> {
    let client = BridgeClient::new(args.connect_options());
    client.connect().await?;
    Ok(client)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Serve(args) => serve(args).await,
        Commands::Config {
            client,
            config_path,
        } => {
            let reply = connected(&client).await?.get_config(config_path).await?;
            print_json(&reply.config)
        }
        Commands::Resolve(args) => {
            let reply = connected(&args.client)
                .await?
                .get_bpmn_file(args.config_path, args.key)
                .await?;
            print_json(&reply)
        }
        Commands::Open(args) => {
            let reply = connected(&args.client)
                .await?
                .open_bpmn_file(args.config_path, args.key)
                .await?;
            print_json(&reply)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve(args) => {
            let path = args.log_file.clone().unwrap_or_else(default_log_path);
            init_tracing(Some(&path));
        }
        _ => init_tracing(None),
    }

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

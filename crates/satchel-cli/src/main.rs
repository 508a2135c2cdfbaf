use clap::{Parser, Subcommand};
use satchel::{
    commands::{init, install, list, remove},
    GlobalOpts,
};
use satchel_logger as logger;

#[derive(Parser)]
#[command(name = "satchel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Plugin installer for agent projects",
    long_about = "Satchel is a CLI tool for installing versioned plugin packages (skills, commands, rules, MCP servers) into a project, shaped for its host platform."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter satchel.toml in the project
    Init,
    /// Install plugins (all declared ones, or the named specs)
    Install {
        /// Plugins to install: `name` or `name@version`
        plugins: Vec<String>,
        /// Install from a direct source locator (path, URL, git+..., s3://...)
        #[arg(long)]
        source: Option<String>,
        /// Resolve against a named registry or registry URL
        #[arg(long)]
        registry: Option<String>,
        /// Skip lockfile reads and writes
        #[arg(long)]
        no_lock: bool,
        /// Overwrite conflicting files satchel does not manage
        #[arg(short, long)]
        force: bool,
    },
    /// Remove an installed plugin and everything it placed in the project
    Remove { plugin: String },
    /// List installed plugins
    List,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SATCHEL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => init::init_project(&cli.global),
        Commands::Install {
            plugins,
            source,
            registry,
            no_lock,
            force,
        } => install::install_plugins(
            install::InstallArgs {
                plugins,
                source,
                registry,
                no_lock,
                force,
            },
            &cli.global,
        ),
        Commands::Remove { plugin } => remove::remove_plugin(&plugin, &cli.global),
        Commands::List => list::list_plugins(&cli.global),
    };

    if let Err(e) = result {
        logger::error(&e);
        logger::show_log_path();
        std::process::exit(1);
    }
}

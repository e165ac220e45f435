mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_FAILURE, EXIT_SUCCESS};
use std::path::PathBuf;
use std::process::ExitCode;
use strata_core::{install_signal_handler, Repository};

#[derive(Debug, Parser)]
#[command(
    name = "strata",
    version,
    about = "Content-addressable layers and composable runtime environments"
)]
struct Cli {
    /// Path to the repository root.
    #[arg(long, default_value = "~/.local/share/strata")]
    repo: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize a new repository.
    Init,
    /// Commit a directory as a new layer.
    Commit {
        /// Directory to commit.
        path: PathBuf,
        /// Tag name to point at the new layer.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Point a tag at an existing object.
    Tag {
        /// Reference to resolve (tag, digest, or digest prefix).
        reference: String,
        /// Tag name to create or advance.
        name: String,
    },
    /// List tag streams and their latest targets.
    Tags,
    /// Show an object's kind, digest, and children.
    Show {
        /// Reference to resolve.
        reference: String,
    },
    /// Compare the file trees of two references.
    Diff {
        /// Base reference.
        base: String,
        /// Top reference.
        top: String,
    },
    /// List runtimes and their state.
    Runtimes,
    /// Remove objects unreachable from any tag or runtime.
    Gc {
        /// Only report what would be removed.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Verify repository integrity.
    Check,
    /// Push a reference to a named remote.
    Push {
        /// Reference to push.
        reference: String,
        /// Remote name from the repository config.
        #[arg(long)]
        remote: String,
    },
    /// Pull a reference from a named remote.
    Pull {
        /// Reference to pull.
        reference: String,
        /// Remote name from the repository config.
        #[arg(long)]
        remote: String,
    },
    /// Expire old tag versions by age and count policy.
    Prune {
        /// Prune versions older than this many days.
        #[arg(long)]
        older_than_days: Option<u64>,
        /// Always keep versions newer than this many days.
        #[arg(long)]
        keep_newer_than_days: Option<u64>,
        /// Prune only streams holding more than this many versions.
        #[arg(long)]
        more_than: Option<u64>,
        /// Always keep the newest N versions of every stream.
        #[arg(long)]
        keep_less_than: Option<u64>,
        /// Only report what would be pruned.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STRATA_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let repo_path = expand_tilde(&cli.repo);
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => commands::init::run(&repo_path, json),
        command => {
            let repo = match Repository::open(&repo_path) {
                Ok(repo) => repo,
                Err(e) => {
                    eprintln!("error: cannot open repository at {}: {e}", repo_path.display());
                    return ExitCode::from(EXIT_FAILURE);
                }
            };
            dispatch(command, &repo, json)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn dispatch(command: Commands, repo: &Repository, json: bool) -> Result<u8, String> {
    match command {
        Commands::Init => Ok(EXIT_SUCCESS),
        Commands::Commit { path, tag } => commands::commit::run(repo, &path, tag.as_deref(), json),
        Commands::Tag { reference, name } => commands::tag::run(repo, &reference, &name, json),
        Commands::Tags => commands::tags::run(repo, json),
        Commands::Show { reference } => commands::show::run(repo, &reference, json),
        Commands::Diff { base, top } => commands::diff::run(repo, &base, &top, json),
        Commands::Runtimes => commands::runtimes::run(repo, json),
        Commands::Gc { dry_run } => commands::gc::run(repo, dry_run, json),
        Commands::Check => commands::check::run(repo, json),
        Commands::Push { reference, remote } => {
            commands::push::run(repo, &reference, &remote, json)
        }
        Commands::Pull { reference, remote } => {
            commands::pull::run(repo, &reference, &remote, json)
        }
        Commands::Prune {
            older_than_days,
            keep_newer_than_days,
            more_than,
            keep_less_than,
            dry_run,
        } => commands::prune::run(
            repo,
            &commands::prune::Policy {
                older_than_days,
                keep_newer_than_days,
                more_than,
                keep_less_than,
            },
            dry_run,
            json,
        ),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

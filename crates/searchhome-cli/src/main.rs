use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use searchhome_cli::commands::run::RunOptions;
use searchhome_cli::{OutputFormat, TrackerArgs, commands, preferences_path};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "searchhome")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Detects your local search domain and keeps your search home up to date",
    long_about = "searchhome asks the search provider which country domain serves you, \
                  remembers it, and when it changes asks you on your next search whether to switch."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    format: OutputFormat,

    /// Preference file (default: ~/.searchhome/prefs.json)
    #[arg(long, global = true, env = "SEARCHHOME_PREFS", value_name = "FILE")]
    prefs: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch Chrome and track the search domain while you browse
    Run {
        /// Path to the Chrome binary
        #[arg(long, value_name = "PATH")]
        chrome_path: Option<PathBuf>,

        /// Named Chrome profile under ~/.searchhome/profiles (temporary if omitted)
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,

        /// Page to open at startup (defaults to the current search domain)
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Run without a browser: wait for one probe, report, and exit
        #[arg(long, conflicts_with_all = ["chrome_path", "profile", "url"])]
        headless_check: bool,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Probe once right now and show what the tracker would decide
    Check {
        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Show or reset stored preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },

    /// Generate shell completion scripts
    #[command(long_about = "Generate shell completion scripts for searchhome.

SUPPORTED SHELLS:
    bash, zsh, fish, powershell, elvish

INSTALLATION:
    Bash:
        searchhome completion --shell bash > ~/.local/share/bash-completion/completions/searchhome
        # or add to ~/.bashrc:
        eval \"$(searchhome completion --shell bash)\"

    Zsh:
        searchhome completion --shell zsh > \"${fpath[1]}/_searchhome\"
        # or add to ~/.zshrc:
        eval \"$(searchhome completion --shell zsh)\"

    Fish:
        searchhome completion --shell fish > ~/.config/fish/completions/searchhome.fish

    PowerShell:
        searchhome completion --shell powershell >> $PROFILE")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show the stored search domain preferences
    Show,

    /// Clear all stored preferences
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            chrome_path,
            profile,
            url,
            headless_check,
            tracker,
        } => commands::run::execute(
            &preferences_path(cli.prefs)?,
            &tracker,
            RunOptions {
                chrome_path,
                profile,
                url,
                headless_check,
            },
        ),
        Commands::Check { tracker } => {
            commands::check::execute(&preferences_path(cli.prefs)?, &tracker, cli.format)
        }
        Commands::Prefs { command } => {
            let path = preferences_path(cli.prefs)?;
            match command {
                PrefsCommands::Show => commands::prefs::show(&path, cli.format),
                PrefsCommands::Reset => commands::prefs::reset(&path),
            }
        }
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "searchhome=debug,searchhome_cli=debug,searchhome_core=debug,searchhome_net=debug,searchhome_browser=debug",
        )
    } else {
        EnvFilter::new("searchhome=info,searchhome_cli=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

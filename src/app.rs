//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to the
//! appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A terminal live signal scope for audio inputs
#[derive(Parser)]
#[command(name = "sigscope")]
#[command(version)]
#[command(about = "Terminal live audio signal scope")]
#[command(
    long_about = "A terminal live signal scope for audio inputs. Continuously samples an\naudio device and renders either a scrolling waveform or an autoscaled\npower spectrum on a braille canvas.\n\nDEFAULT COMMAND:\n    If no command is specified, 'view' is used by default.\n    View options (-d) can be used without explicitly saying 'view'.\n\nKEYS:\n    Space        freeze / resume\n    m            toggle frequency / time display\n    + / -        zoom in / out\n    l            log / linear amplitude (frequency mode)\n    left click   closeup around the clicked frequency\n    q, Esc       quit\n\nEXAMPLES:\n    # View the default input device\n    $ sigscope\n\n    # View a specific device\n    $ sigscope -d 2\n    $ sigscope view -d 'USB Audio'\n\n    # List capture devices\n    $ sigscope list-devices\n\n    # Show recent logs\n    $ sigscope logs"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/sigscope/sigscope.toml\n    Logs:               ~/.local/state/sigscope/sigscope.log.*\n\nFor more information, visit: https://github.com/sigscope/sigscope"
)]
struct Cli {
    /// Audio input device: "default", an index, or a name (view default command)
    #[arg(short, long, value_name = "DEVICE", global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// View the live signal (default)
    ///
    /// Renders the input as a power spectrum or waveform. Press 'm' to
    /// switch displays, Space to freeze, 'q' to quit.
    #[command(visible_alias = "v")]
    View {
        /// Audio input device: "default", an index, or a name
        #[arg(short, long, value_name = "DEVICE")]
        device: Option<String>,
    },

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in sigscope.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    ///
    /// Examples:
    ///   sigscope completions bash > sigscope.bash
    ///   sigscope completions zsh > _sigscope
    ///   sigscope completions fish > sigscope.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "sigscope", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::View { .. }) => {
            // Default command is view. An explicit view subcommand's
            // device option takes precedence over the top-level one.
            let device = match cli.command {
                Some(Commands::View { device }) => device.or(cli.device),
                None => cli.device,
                _ => unreachable!(),
            };
            commands::handle_view(device).await?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

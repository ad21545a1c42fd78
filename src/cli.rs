use clap::{Parser, Subcommand};

/// Watches cron jobs and flags the runs that never happened
#[derive(Debug, Parser)]
#[command(name = "cron-monitor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run migrations, start the HTTP API and the missed job scheduler (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Run a single missed job check now, print the report and exit
    Check,
}

impl Cli {
    /// The requested subcommand, `serve` when none was given
    pub fn selected(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}

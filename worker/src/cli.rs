//! CLI argument parsing for the leker-worker binary.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "leker-worker", about = "Field sales visit scheduling worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Plan a schedule offline from a JSON client list and print the summary
    Plan {
        /// JSON file with an array of clients
        #[arg(long)]
        input: PathBuf,
        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Vendor the clients belong to
        #[arg(long)]
        vendor: Option<Uuid>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["leker-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["leker-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_plan_command_parses() {
        let cli = Cli::parse_from([
            "leker-worker",
            "plan",
            "--input",
            "clients.json",
            "--start",
            "2026-03-02",
            "--end",
            "2026-03-06",
        ]);
        match cli.command {
            Some(Command::Plan { input, start, end, vendor }) => {
                assert_eq!(input, PathBuf::from("clients.json"));
                assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
                assert_eq!(end, NaiveDate::from_ymd_opt(2026, 3, 6).unwrap());
                assert!(vendor.is_none());
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn test_cli_plan_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "leker-worker",
            "plan",
            "--input",
            "clients.json",
            "--start",
            "02/03/2026",
            "--end",
            "2026-03-06",
        ]);
        assert!(result.is_err());
    }
}

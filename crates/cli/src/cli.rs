use std::path::PathBuf;

use bulkload_ingest::JobKind;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "bulkload",
    version,
    about = "Stream large CSV exports into a store and query what was imported"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import one file and print the final progress snapshot
    Import(ImportArgs),
    /// Print one page of stored records
    List(ListArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Kind {
    Pipeline,
    BalanceDrop,
    Rfmt,
}

impl From<Kind> for JobKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Pipeline => Self::Pipeline,
            Kind::BalanceDrop => Self::BalanceDrop,
            Kind::Rfmt => Self::Rfmt,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, value_enum)]
    pub kind: Kind,

    /// SQLite database; records are kept in memory when omitted
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub kind: Kind,

    #[arg(long)]
    pub db: PathBuf,

    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: u64,

    #[arg(long, default_value_t = 10)]
    pub page_size: u64,

    /// Oldest records first
    #[arg(long, default_value_t = false)]
    pub oldest_first: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_args() {
        let cli = Cli::try_parse_from([
            "bulkload",
            "import",
            "--kind",
            "balance-drop",
            "--db",
            "data.db",
            "di319.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(JobKind::from(args.kind), JobKind::BalanceDrop);
                assert_eq!(args.db, Some(PathBuf::from("data.db")));
                assert_eq!(args.file, PathBuf::from("di319.csv"));
            }
            Commands::List(_) => panic!("expected import"),
        }
    }

    #[test]
    fn test_rfmt_kind() {
        let cli =
            Cli::try_parse_from(["bulkload", "import", "--kind", "rfmt", "staff.csv"]).unwrap();
        match cli.command {
            Commands::Import(args) => assert_eq!(JobKind::from(args.kind), JobKind::Rfmt),
            Commands::List(_) => panic!("expected import"),
        }
    }

    #[test]
    fn test_list_requires_db() {
        assert!(Cli::try_parse_from(["bulkload", "list", "--kind", "pipeline"]).is_err());

        let cli = Cli::try_parse_from([
            "bulkload", "list", "--kind", "pipeline", "--db", "x.db", "--page-size", "50",
        ])
        .unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.page, 1);
                assert_eq!(args.page_size, 50);
                assert!(args.search.is_none());
            }
            Commands::Import(_) => panic!("expected list"),
        }
    }
}

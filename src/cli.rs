//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use bibharmony::harmonize::HarmonizeMode;
use bibharmony::vault::VaultId;
use bibharmony::Format;
use clap::{Args as ClapArgs, Parser, Subcommand};

/// Default location of the citation vault.
pub const DEFAULT_VAULT_PATH: &str = "vault/citations.json";

/// Harmonize Scopus and Web of Science exports and curate a citation vault.
///
/// Reads raw database exports, merges them into one deduplicated corpus with
/// a conflict report, and keeps selected records in a persistent vault that
/// exports as BibTeX or RIS.
#[derive(Parser, Debug)]
#[command(name = "bibharmony")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML file with column mappings and matcher thresholds
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge exports into one deduplicated corpus
    Harmonize(HarmonizeArgs),

    /// Manage the citation vault
    Vault {
        /// Vault file
        #[arg(long, default_value = DEFAULT_VAULT_PATH, value_name = "FILE")]
        vault: PathBuf,

        #[command(subcommand)]
        command: VaultCommand,
    },
}

#[derive(ClapArgs, Debug)]
pub struct HarmonizeArgs {
    /// Scopus CSV export (repeatable)
    #[arg(long, value_name = "FILE")]
    pub scopus: Vec<PathBuf>,

    /// Web of Science tab-delimited export (repeatable)
    #[arg(long, value_name = "FILE")]
    pub wos: Vec<PathBuf>,

    /// Which databases to include: scopus, wos or combined
    #[arg(long, default_value_t = HarmonizeMode::Combined)]
    pub mode: HarmonizeMode,

    /// Corpus CSV to write
    #[arg(short, long, default_value = "harmonized.csv", value_name = "FILE")]
    pub out: PathBuf,

    /// Prepend a UTF-8 byte order mark to the corpus CSV
    #[arg(long)]
    pub bom: bool,

    /// Write the conflict report as CSV
    #[arg(long, value_name = "FILE")]
    pub conflicts: Option<PathBuf>,

    /// Write corpus indicators as JSON
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Add every harmonized record to this vault
    #[arg(long, value_name = "VAULT")]
    pub promote: Option<PathBuf>,

    /// Score candidate pairs on a single thread
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Add the records of a BibTeX or RIS file
    Import {
        file: PathBuf,

        /// Input format; guessed from the extension when omitted
        #[arg(long)]
        format: Option<Format>,
    },

    /// Print entries as APA-style previews
    List {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Write the vault as BibTeX or RIS
    Export {
        /// Output file; the format's extension is added when missing
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,

        /// Output format; guessed from the extension when omitted
        #[arg(long)]
        format: Option<Format>,
    },

    /// Find entries by title, author, journal, keyword, DOI or notes
    Search { query: String },

    /// Overwrite fields of an entry
    Update {
        id: VaultId,

        #[arg(long)]
        title: Option<String>,

        /// Publication year; `none` clears it
        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        journal: Option<String>,

        /// DOI; `none` clears it
        #[arg(long)]
        doi: Option<String>,

        #[arg(long)]
        citations: Option<u32>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an entry; its id is never reused
    Remove { id: VaultId },

    /// Write a timestamped copy of the vault
    Backup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_harmonize_defaults() {
        let args = Args::try_parse_from(["bibharmony", "harmonize", "--scopus", "s.csv"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        let Command::Harmonize(harmonize) = args.command else {
            panic!("expected harmonize");
        };
        assert_eq!(harmonize.scopus, vec![PathBuf::from("s.csv")]);
        assert!(harmonize.wos.is_empty());
        assert_eq!(harmonize.mode, HarmonizeMode::Combined);
        assert_eq!(harmonize.out, PathBuf::from("harmonized.csv"));
        assert!(!harmonize.sequential);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["bibharmony", "harmonize", "-vv", "--config", "c.toml"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_cli_mode_parses() {
        let args =
            Args::try_parse_from(["bibharmony", "harmonize", "--mode", "wos"]).unwrap();
        let Command::Harmonize(harmonize) = args.command else {
            panic!("expected harmonize");
        };
        assert_eq!(harmonize.mode, HarmonizeMode::WosOnly);

        let result = Args::try_parse_from(["bibharmony", "harmonize", "--mode", "pubmed"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_vault_update() {
        let args = Args::try_parse_from([
            "bibharmony", "vault", "--vault", "v.json", "update", "V000003", "--year", "2021",
        ])
        .unwrap();
        let Command::Vault { vault, command } = args.command else {
            panic!("expected vault");
        };
        assert_eq!(vault, PathBuf::from("v.json"));
        let VaultCommand::Update { id, year, title, .. } = command else {
            panic!("expected update");
        };
        assert_eq!(id, VaultId(3));
        assert_eq!(year.as_deref(), Some("2021"));
        assert_eq!(title, None);
    }

    #[test]
    fn test_cli_vault_default_path() {
        let args = Args::try_parse_from(["bibharmony", "vault", "backup"]).unwrap();
        let Command::Vault { vault, .. } = args.command else {
            panic!("expected vault");
        };
        assert_eq!(vault, PathBuf::from(DEFAULT_VAULT_PATH));
    }

    #[test]
    fn test_cli_missing_subcommand_is_an_error() {
        let result = Args::try_parse_from(["bibharmony"]);
        assert!(result.is_err());
    }
}

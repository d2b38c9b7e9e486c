//! CLI entry point for bibharmony.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, bail};
use bibharmony::bridge::{CorpusSummary, write_corpus_csv_file, write_summary_json};
use bibharmony::config::Config;
use bibharmony::export::read_export_file;
use bibharmony::harmonize::{HarmonizationResult, Harmonizer, HarmonizerConfig, SourceSet};
use bibharmony::schema::SchemaNormalizer;
use bibharmony::vault::{Vault, VaultPatch, format_apa};
use bibharmony::{Format, Origin, Source};
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command, HarmonizeArgs, VaultCommand};

fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match args.command {
        Command::Harmonize(harmonize_args) => harmonize(&config, harmonize_args),
        Command::Vault { vault, command } => {
            let vault = Vault::open(&vault)
                .with_context(|| format!("failed to open vault {}", vault.display()))?;
            run_vault(&vault, command)
        }
    }
}

fn harmonize(config: &Config, args: HarmonizeArgs) -> Result<()> {
    if args.scopus.is_empty() && args.wos.is_empty() {
        bail!("no input files: pass --scopus and/or --wos");
    }

    let normalizer = SchemaNormalizer::from_config(config);
    let mut sets = Vec::new();
    for (source, paths) in [(Source::Scopus, &args.scopus), (Source::Wos, &args.wos)] {
        for path in paths {
            let (source, rows) = read_export_file(path, Some(source))
                .with_context(|| format!("failed to read {}", path.display()))?;
            let batch = normalizer.normalize_all(&rows, source);
            info!(
                path = %path.display(),
                source = %source,
                records = batch.records.len(),
                dropped = batch.dropped_count(),
                "Normalized export"
            );
            sets.push(SourceSet::new(Origin::from(source), batch.records));
        }
    }
    let sets = args.mode.select(sets);
    if sets.is_empty() {
        warn!(mode = %args.mode, "No input matches the selected mode");
    }

    let harmonizer = Harmonizer::new().with_config(HarmonizerConfig {
        run_in_parallel: !args.sequential,
        matcher: config.matcher,
    });
    let HarmonizationResult { records, conflicts } = harmonizer.harmonize(&sets);

    write_corpus_csv_file(&args.out, &records, args.bom)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    if let Some(path) = &args.conflicts {
        write_conflicts(path, &conflicts.conflicts)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    if !conflicts.is_empty() {
        warn!(conflicts = conflicts.len(), "Some record pairs need manual review");
    }

    if let Some(path) = &args.summary {
        let summary = CorpusSummary::from_records(&records);
        let file = BufWriter::new(File::create(path)?);
        write_summary_json(file, &summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if let Some(path) = &args.promote {
        let vault = Vault::open(path)?;
        let (added, skipped) = vault.add_all(records.into_iter().map(|h| h.record))?;
        info!(added = added.len(), skipped, vault = %path.display(), "Promoted records");
    }

    Ok(())
}

fn write_conflicts<T: serde::Serialize>(path: &Path, conflicts: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for conflict in conflicts {
        writer.serialize(conflict)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_vault(vault: &Vault, command: VaultCommand) -> Result<()> {
    match command {
        VaultCommand::Import { file, format } => {
            let format = resolve_format(&file, format)?;
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records = format.decode(&text)?;
            let (added, skipped) = vault.add_all(records)?;
            info!(added = added.len(), skipped, format = %format, "Imported records");
        }
        VaultCommand::List { limit } => {
            let listing = vault.list();
            for entry in listing.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{}  {}", entry.vault_id, format_apa(entry));
            }
        }
        VaultCommand::Export { out, format } => {
            let format = resolve_format(&out, format).unwrap_or(Format::BibTex);
            vault.export_to(&out, format)?;
        }
        VaultCommand::Search { query } => {
            for entry in vault.search(&query) {
                println!("{}  {}", entry.vault_id, format_apa(&entry));
            }
        }
        VaultCommand::Update {
            id,
            title,
            year,
            journal,
            doi,
            citations,
            notes,
        } => {
            let year = match year.as_deref() {
                None => None,
                Some("none") => Some(None),
                Some(value) => Some(Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid year '{value}'"))?,
                )),
            };
            let doi = doi.map(|value| (value != "none").then_some(value));
            let patch = VaultPatch {
                title,
                year,
                source_title: journal,
                doi,
                citation_count: citations,
                notes,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("nothing to update: pass at least one field");
            }
            let entry = vault.update(id, patch)?;
            println!("{}  {}", entry.vault_id, format_apa(&entry));
        }
        VaultCommand::Remove { id } => {
            let entry = vault.remove(id)?;
            println!("removed {}  {}", entry.vault_id, entry.record.title);
        }
        VaultCommand::Backup => {
            let path = vault.backup()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn resolve_format(path: &Path, format: Option<Format>) -> Result<Format> {
    match format.or_else(|| Format::from_path(path)) {
        Some(format) => Ok(format),
        None => bail!(
            "cannot tell the format of {}; pass --format bibtex or --format ris",
            path.display()
        ),
    }
}

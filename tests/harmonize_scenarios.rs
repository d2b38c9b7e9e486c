//! End-to-end runs: raw exports through harmonization into the vault and back.

use bibharmony::bridge::{CorpusSummary, write_corpus_csv_file};
use bibharmony::export::{read_export, read_export_auto};
use bibharmony::harmonize::{HarmonizeMode, Harmonizer, HarmonizerConfig, SourceSet};
use bibharmony::schema::SchemaNormalizer;
use bibharmony::vault::Vault;
use bibharmony::{CanonicalRecord, Format, Origin, Source};
use pretty_assertions::assert_eq;

const SCOPUS_EXPORT: &str = "\u{feff}Authors,Title,Year,Source title,DOI,Affiliations,Author Keywords,Cited by,EID
\"Hassan M.; Kabir M.E.\",Mapping the Machine Learning Landscape in Autonomous Vehicles,2025,IEEE Access,10.1109/ACCESS.2025.3620637,\"Chulalongkorn University, Bangkok, Thailand\",Machine Learning; Autonomous Vehicles,12,2-s2.0-1
Smith J.,Deep Reinforcement Learning for Traffic Signal Control,2021,Transportation Research Part C,,\"Stanford University, Stanford, CA 94305, United States\",,40,2-s2.0-2
Doe A.,Graph Neural Networks for Road Safety,2020,Accident Analysis and Prevention,,,,3,2-s2.0-3
,,2019,,,,,,2-s2.0-4
";

const WOS_EXPORT: &str = "PT\tAU\tTI\tSO\tPY\tDI\tC1\tDE\tTC\tUT
J\tHassan, M; Kabir, ME\tMapping the machine learning landscape in autonomous vehicles\tIEEE ACCESS\t2025\t10.1109/access.2025.3620637\t[Hassan, M; Kabir, ME] Chulalongkorn Univ, Bangkok, Thailand.\tmachine learning\t15\tWOS:001
J\tSmith, J\tDeep reinforcement learning for traffic signal control\tTRANSPORT RES C-EMER\t2022\t\t\t\t38\tWOS:002
";

fn harmonize_exports(mode: HarmonizeMode) -> (Vec<SourceSet>, usize) {
    let normalizer = SchemaNormalizer::new();

    let scopus_rows = read_export(SCOPUS_EXPORT, Source::Scopus).unwrap();
    let scopus = normalizer.normalize_all(&scopus_rows, Source::Scopus);

    let (source, wos_rows) = read_export_auto(WOS_EXPORT).unwrap();
    assert_eq!(source, Source::Wos);
    let wos = normalizer.normalize_all(&wos_rows, Source::Wos);

    let dropped = scopus.dropped_count() + wos.dropped_count();
    let sets = mode.select(vec![
        SourceSet::new(Origin::Scopus, scopus.records),
        SourceSet::new(Origin::Wos, wos.records),
    ]);
    (sets, dropped)
}

#[test]
fn test_combined_run_merges_across_databases() {
    let (sets, dropped) = harmonize_exports(HarmonizeMode::Combined);
    assert_eq!(dropped, 1);

    let result = Harmonizer::new().harmonize(&sets);
    assert!(result.conflicts.is_empty());

    let titles: Vec<&str> = result
        .records
        .iter()
        .map(|h| h.record.title.as_str())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Deep Reinforcement Learning for Traffic Signal Control",
            "Graph Neural Networks for Road Safety",
            "Mapping the Machine Learning Landscape in Autonomous Vehicles",
        ]
    );

    // Matched on title, one year apart
    let deep = &result.records[0];
    assert_eq!(deep.source_count, 2);
    assert_eq!(deep.record.origin, Origin::Combined);
    assert_eq!(deep.record.year, Some(2021));
    assert_eq!(deep.record.citation_count, 40);
    assert_eq!(deep.members, vec!["2-s2.0-2", "WOS:002"]);

    let graph = &result.records[1];
    assert_eq!(graph.source_count, 1);
    assert_eq!(graph.record.origin, Origin::Scopus);

    // Matched on DOI
    let mapping = &result.records[2];
    assert_eq!(mapping.source_count, 2);
    assert_eq!(mapping.record.origin, Origin::Combined);
    assert_eq!(mapping.record.citation_count, 15);
    assert_eq!(
        mapping.record.doi_key().as_deref(),
        Some("10.1109/access.2025.3620637")
    );
    assert!(mapping.record.countries.contains("Thailand"));
    assert!(mapping.record.keywords.contains("machine learning"));
    assert!(mapping.record.keywords.contains("autonomous vehicles"));
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let (sets, _) = harmonize_exports(HarmonizeMode::Combined);
    let parallel = Harmonizer::new().harmonize(&sets);
    let sequential = Harmonizer::new()
        .with_config(HarmonizerConfig {
            run_in_parallel: false,
            ..Default::default()
        })
        .harmonize(&sets);
    assert_eq!(parallel, sequential);
}

#[test]
fn test_single_database_mode() {
    let (sets, _) = harmonize_exports(HarmonizeMode::WosOnly);
    let result = Harmonizer::new().harmonize(&sets);
    assert_eq!(result.records.len(), 2);
    assert!(result.records.iter().all(|h| h.record.origin == Origin::Wos));
}

#[test]
fn test_corpus_outputs() {
    let (sets, _) = harmonize_exports(HarmonizeMode::Combined);
    let result = Harmonizer::new().harmonize(&sets);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("corpus.csv");
    write_corpus_csv_file(&path, &result.records, true).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("\u{feff}title,"));
    assert_eq!(text.lines().count(), 4);

    let summary = CorpusSummary::from_records(&result.records);
    assert_eq!(summary.total_publications, 3);
    assert_eq!(summary.total_citations, 58);
    assert_eq!(summary.first_year, Some(2020));
    assert_eq!(summary.latest_year, Some(2025));
    assert_eq!(summary.by_origin.get(&Origin::Combined), Some(&2));
    assert_eq!(summary.by_origin.get(&Origin::Scopus), Some(&1));
}

#[test]
fn test_promote_to_vault_and_exchange() {
    let (sets, _) = harmonize_exports(HarmonizeMode::Combined);
    let result = Harmonizer::new().harmonize(&sets);
    let records: Vec<CanonicalRecord> = result.records.into_iter().map(|h| h.record).collect();

    let dir = tempfile::tempdir().unwrap();
    let vault = Vault::open(dir.path().join("vault").join("citations.json")).unwrap();
    let (added, skipped) = vault.add_all(records.clone()).unwrap();
    assert_eq!(added.len(), 3);
    assert_eq!(skipped, 0);

    // Only the record with a DOI is recognized as already present
    let (added, skipped) = vault.add_all(records.clone()).unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(skipped, 1);
    assert_eq!(vault.len(), 5);

    for format in [Format::BibTex, Format::Ris] {
        let text = vault.export(format);
        let decoded = format.decode(&text).unwrap();
        let stored: Vec<CanonicalRecord> = vault.list().iter().map(|e| e.record.clone()).collect();
        assert_eq!(decoded, stored, "{format} round trip");
    }

    let reopened = Vault::open(vault.path()).unwrap();
    assert_eq!(reopened.len(), 5);
    assert_eq!(reopened.search("reinforcement").len(), 2);
}

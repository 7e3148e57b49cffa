use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{GenesetType, Organism};
use crate::error::KeggError;
use crate::kegg::KeggClient;
use crate::parser::{
    DuplicatePolicy, GenesetEntry, GenesetInfoMap, GenesetMap, parse_entry_info, parse_geneset_file,
    parse_link_response, parse_list_response, parse_release,
};
use crate::record::{GenesetRecord, build_record};
use crate::resolver::{GeneQueryService, index_by_source, resolve_genes};

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub records: Vec<GenesetRecord>,
    pub failures: Vec<LoadFailure>,
}

/// A unit of work (organism, list or file) that was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub unit: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<K: KeggClient, G: GeneQueryService> {
    kegg: K,
    genes: G,
    today: NaiveDate,
}

impl<K: KeggClient, G: GeneQueryService> App<K, G> {
    pub fn new(kegg: K, genes: G) -> Self {
        Self {
            kegg,
            genes,
            today: Local::now().date_naive(),
        }
    }

    /// Stamps records with `date` instead of today.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = date;
        self
    }

    /// Builds records for `organisms` from the KEGG REST API. A failing
    /// source (list or link) is recorded and skipped; a failing gene
    /// resolution drops the whole organism.
    pub fn load(
        &self,
        config: &ResolvedConfig,
        organisms: &[Organism],
        sink: &dyn ProgressSink,
    ) -> LoadResult {
        let mut failures = Vec::new();
        let mut shared = GenesetInfoMap::new();
        for geneset_type in &config.shared_geneset_types {
            let source_name = format!("list/{geneset_type}");
            let parsed = self.kegg.list(geneset_type).and_then(|text| {
                parse_list_response(&text, geneset_type, &source_name, DuplicatePolicy::KeepLast)
            });
            match parsed {
                Ok(infos) => shared.extend(infos),
                Err(err) => skip_source(&mut failures, source_name, err),
            }
        }

        let mut records = Vec::new();
        for organism in organisms {
            info!("{}", "=".repeat(60));
            info!(
                "Parsing genesets for {} (taxid={}) ...",
                organism.name, organism.tax_id
            );
            let started = Instant::now();
            match self.load_organism(organism, &shared, &mut failures, sink) {
                Ok(built) => {
                    sink.event(ProgressEvent {
                        message: format!(
                            "phase=Done; {} genesets for {}",
                            built.len(),
                            organism.organism_code
                        ),
                        elapsed: Some(started.elapsed()),
                    });
                    records.extend(built);
                }
                Err(err) => {
                    error!("organism {} failed: {err}", organism.organism_code);
                    failures.push(LoadFailure {
                        unit: organism.organism_code.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        LoadResult { records, failures }
    }

    fn load_organism(
        &self,
        organism: &Organism,
        shared: &GenesetInfoMap,
        failures: &mut Vec<LoadFailure>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<GenesetRecord>, KeggError> {
        let code = organism.organism_code.as_str();
        let mut infos = shared.clone();
        if organism.geneset_types.contains(&GenesetType::Pathway) {
            let source_name = format!("list/pathway/{code}");
            let parsed = self
                .kegg
                .list_for_organism(&GenesetType::Pathway, code)
                .and_then(|text| {
                    parse_list_response(
                        &text,
                        &GenesetType::Pathway,
                        &source_name,
                        DuplicatePolicy::Reject,
                    )
                });
            match parsed {
                Ok(pathways) => infos.extend(pathways),
                Err(err) => skip_source(failures, source_name, err),
            }
        }

        let mut genesets = GenesetMap::new();
        for geneset_type in &organism.geneset_types {
            let source_name = format!("link/{code}/{geneset_type}");
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; {source_name}"),
                elapsed: None,
            });
            let parsed = self
                .kegg
                .link(code, geneset_type)
                .and_then(|text| parse_link_response(&text, geneset_type, &source_name));
            match parsed {
                Ok(linked) => genesets.merge(linked),
                Err(err) => skip_source(failures, source_name, err),
            }
        }

        for entry in genesets.iter() {
            if !infos.contains_key(&entry.id) {
                warn!("no name listed for {} {}", entry.geneset_type, entry.id);
            }
        }
        self.build_records(genesets, organism, sink, |entry| {
            entry.name = infos.get(&entry.id).map(|info| info.name.clone());
        })
    }

    /// Builds records from KEGG link flat files. A file that fails to parse
    /// is recorded and skipped; names come from each entry's `get` page.
    pub fn load_files(
        &self,
        paths: &[Utf8PathBuf],
        organism: &Organism,
        sink: &dyn ProgressSink,
    ) -> Result<LoadResult, KeggError> {
        let mut failures = Vec::new();
        let mut genesets = GenesetMap::new();
        for path in paths {
            sink.event(ProgressEvent {
                message: format!("phase=Parse; {path}"),
                elapsed: None,
            });
            match parse_geneset_file(path) {
                Ok(parsed) => genesets.merge(parsed),
                Err(err) => skip_source(&mut failures, path.to_string(), err),
            }
        }

        let records = self.build_records(genesets, organism, sink, |entry| {
            let info = match self.kegg.get_entry(&entry.id) {
                Ok(text) => parse_entry_info(&text),
                Err(err) => {
                    warn!("no entry info for {}: {err}", entry.id);
                    return;
                }
            };
            entry.name = info.name;
            // Unknown namespaces take their database from the ENTRY line.
            match info.geneset_type {
                Some(kind) if matches!(entry.geneset_type, GenesetType::Other(_)) => {
                    entry.geneset_type = kind;
                }
                Some(kind) if kind != entry.geneset_type => warn!(
                    "{} is listed as {} but its entry says {kind}",
                    entry.id, entry.geneset_type
                ),
                _ => {}
            }
        })?;
        Ok(LoadResult { records, failures })
    }

    pub fn release(&self) -> Result<Option<String>, KeggError> {
        Ok(parse_release(&self.kegg.info()?))
    }

    fn build_records<F>(
        &self,
        genesets: GenesetMap,
        organism: &Organism,
        sink: &dyn ProgressSink,
        mut annotate: F,
    ) -> Result<Vec<GenesetRecord>, KeggError>
    where
        F: FnMut(&mut GenesetEntry),
    {
        let gene_ids = genesets.unique_genes();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} genes in {} genesets",
                gene_ids.len(),
                genesets.len()
            ),
            elapsed: None,
        });
        let started = Instant::now();
        let identities = resolve_genes(
            &self.genes,
            gene_ids,
            organism.tax_id,
            &organism.gene_id_types,
        )?;
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} identities", identities.len()),
            elapsed: Some(started.elapsed()),
        });
        let identities = index_by_source(identities);

        Ok(genesets
            .into_iter()
            .map(|mut entry| {
                annotate(&mut entry);
                build_record(&entry, &identities, organism, self.today)
            })
            .collect())
    }
}

fn skip_source(failures: &mut Vec<LoadFailure>, unit: String, err: KeggError) {
    error!("skipping {unit}: {err}");
    failures.push(LoadFailure {
        unit,
        error: err.to_string(),
    });
}

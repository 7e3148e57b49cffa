//! Cascading multi-scope gene identity resolution.
//!
//! Every input identifier is tried against each scope in order until it is
//! matched or the scopes run out. Ambiguous matches abort the whole batch.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::KeggError;

/// Fields requested from the identity service for every lookup.
pub const RESOLVE_FIELDS: [&str; 5] = ["_id", "entrezgene", "ensembl.gene", "symbol", "uniprot"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniprotIds {
    #[serde(rename = "Swiss-Prot", default)]
    pub swiss_prot: Vec<String>,
    #[serde(rename = "TrEMBL", default)]
    pub trembl: Vec<String>,
}

impl UniprotIds {
    pub fn is_empty(&self) -> bool {
        self.swiss_prot.is_empty() && self.trembl.is_empty()
    }
}

/// Identity fields of one matched gene record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneHit {
    pub canonical_id: Option<String>,
    pub ncbi_gene_id: Option<String>,
    pub ensembl_gene_ids: Vec<String>,
    pub symbol: Option<String>,
    pub uniprot: Option<UniprotIds>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Found(GeneHit),
    Missing,
    /// The query matched this many records.
    Duplicate(usize),
}

/// The service's answer for one queried identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedQuery {
    pub query: String,
    pub outcome: QueryOutcome,
}

impl ScopedQuery {
    pub fn found(query: impl Into<String>, hit: GeneHit) -> Self {
        Self {
            query: query.into(),
            outcome: QueryOutcome::Found(hit),
        }
    }

    pub fn missing(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            outcome: QueryOutcome::Missing,
        }
    }

    pub fn duplicate(query: impl Into<String>, matches: usize) -> Self {
        Self {
            query: query.into(),
            outcome: QueryOutcome::Duplicate(matches),
        }
    }
}

/// Batch gene lookup constrained to one scope and one taxon.
pub trait GeneQueryService: Send + Sync {
    fn query_many(
        &self,
        queries: &[String],
        scope: &str,
        tax_id: u32,
        fields: &[&str],
    ) -> Result<Vec<ScopedQuery>, KeggError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedGeneIdentity {
    pub source: String,
    #[serde(rename = "mygene")]
    pub canonical_id: Option<String>,
    #[serde(rename = "ncbigene")]
    pub ncbi_gene_id: Option<String>,
    #[serde(rename = "ensemblgene")]
    pub ensembl_gene_id: Vec<String>,
    pub symbol: Option<String>,
    pub uniprot: Option<UniprotIds>,
}

impl ResolvedGeneIdentity {
    pub fn from_hit(source: String, hit: GeneHit) -> Self {
        Self {
            source,
            canonical_id: hit.canonical_id,
            ncbi_gene_id: hit.ncbi_gene_id,
            ensembl_gene_id: hit.ensembl_gene_ids,
            symbol: hit.symbol,
            uniprot: hit.uniprot,
        }
    }

    /// Identity for an id no scope could match: only `source` is set.
    pub fn unresolved(source: String) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.canonical_id.is_some()
            || self.ncbi_gene_id.is_some()
            || !self.ensembl_gene_id.is_empty()
            || self.symbol.is_some()
            || self.uniprot.as_ref().is_some_and(|ids| !ids.is_empty())
    }
}

pub fn resolve_genes<S, I>(
    service: &S,
    gene_ids: I,
    tax_id: u32,
    scopes: &[String],
) -> Result<Vec<ResolvedGeneIdentity>, KeggError>
where
    S: GeneQueryService + ?Sized,
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut remaining = gene_ids
        .into_iter()
        .map(Into::into)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect::<Vec<_>>();
    let mut resolved = Vec::new();
    if remaining.is_empty() {
        return Ok(resolved);
    }
    if scopes.is_empty() {
        return Err(KeggError::NoScopes(format!("taxon {tax_id}")));
    }

    for (pos, scope) in scopes.iter().enumerate() {
        let is_last = pos + 1 == scopes.len();
        info!(scope = %scope, queries = remaining.len(), "querying gene identities");
        let answers = service.query_many(&remaining, scope, tax_id, &RESOLVE_FIELDS)?;

        let mut found = Vec::new();
        let mut missing = Vec::new();
        let mut duplicates = Vec::new();
        for ScopedQuery { query, outcome } in account_for(&remaining, answers) {
            match outcome {
                QueryOutcome::Found(hit) => found.push(ResolvedGeneIdentity::from_hit(query, hit)),
                QueryOutcome::Missing => missing.push(query),
                QueryOutcome::Duplicate(_) => duplicates.push(query),
            }
        }
        if !duplicates.is_empty() {
            return Err(KeggError::DuplicateMatch {
                scope: scope.clone(),
                queries: duplicates,
            });
        }

        resolved.extend(found);
        if is_last {
            resolved.extend(missing.iter().cloned().map(ResolvedGeneIdentity::unresolved));
        }
        remaining = missing;
        if remaining.is_empty() {
            break;
        }
    }

    if !remaining.is_empty() {
        info!(
            "{} gene(s) missed when tax_id={tax_id}: {:?}",
            remaining.len(),
            remaining
        );
    }
    log_shared_canonical_ids(&resolved);
    Ok(resolved)
}

/// Keys identities by the raw id that produced them.
pub fn index_by_source(
    identities: Vec<ResolvedGeneIdentity>,
) -> HashMap<String, ResolvedGeneIdentity> {
    identities
        .into_iter()
        .map(|identity| (identity.source.clone(), identity))
        .collect()
}

// Orders the answers like `queries`. Queries the service left out count as
// missing and a query answered twice counts as a duplicate.
fn account_for(queries: &[String], answers: Vec<ScopedQuery>) -> Vec<ScopedQuery> {
    let mut by_query: HashMap<String, QueryOutcome> = HashMap::new();
    for ScopedQuery { query, outcome } in answers {
        let merged = match by_query.remove(&query) {
            None => outcome,
            Some(previous) => match match_count(&previous) + match_count(&outcome) {
                0 => QueryOutcome::Missing,
                1 if matches!(previous, QueryOutcome::Found(_)) => previous,
                1 => outcome,
                total => QueryOutcome::Duplicate(total),
            },
        };
        by_query.insert(query, merged);
    }
    queries
        .iter()
        .map(|query| ScopedQuery {
            query: query.clone(),
            outcome: by_query.remove(query).unwrap_or(QueryOutcome::Missing),
        })
        .collect()
}

fn match_count(outcome: &QueryOutcome) -> usize {
    match outcome {
        QueryOutcome::Found(_) => 1,
        QueryOutcome::Missing => 0,
        QueryOutcome::Duplicate(n) => *n,
    }
}

fn log_shared_canonical_ids(identities: &[ResolvedGeneIdentity]) {
    let mut by_canonical: HashMap<&str, &str> = HashMap::new();
    for identity in identities {
        let Some(canonical) = identity.canonical_id.as_deref() else {
            continue;
        };
        match by_canonical.get(canonical) {
            Some(first) => debug!(
                "queries {first} and {} share canonical id {canonical}",
                identity.source
            ),
            None => {
                by_canonical.insert(canonical, identity.source.as_str());
            }
        }
    }
}

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::KeggError;
use crate::resolver::{GeneHit, GeneQueryService, ScopedQuery, UniprotIds};

pub const DEFAULT_MYGENE_URL: &str = "https://mygene.info/v3";

/// Largest batch MyGene.info accepts in a single POST query.
const MAX_BATCH: usize = 1000;

#[derive(Clone)]
pub struct MyGeneHttpClient {
    client: Client,
    base_url: String,
}

impl MyGeneHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, KeggError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kegg-geneset/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KeggError::MyGeneHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KeggError::MyGeneHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn post_query(
        &self,
        chunk: &[String],
        scope: &str,
        tax_id: u32,
        fields: &[&str],
    ) -> Result<Value, KeggError> {
        let url = format!("{}/query", self.base_url);
        let params = [
            ("q", chunk.join(",")),
            ("scopes", scope.to_string()),
            ("fields", fields.join(",")),
            ("species", tax_id.to_string()),
        ];
        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .map_err(|err| KeggError::MyGeneHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "MyGene.info request failed".to_string());
            return Err(KeggError::MyGeneStatus { status, message });
        }
        response
            .json()
            .map_err(|err| KeggError::MyGeneDecode(err.to_string()))
    }
}

impl GeneQueryService for MyGeneHttpClient {
    fn query_many(
        &self,
        queries: &[String],
        scope: &str,
        tax_id: u32,
        fields: &[&str],
    ) -> Result<Vec<ScopedQuery>, KeggError> {
        let mut answers = Vec::with_capacity(queries.len());
        for (batch, chunk) in queries.chunks(MAX_BATCH).enumerate() {
            debug!(batch, size = chunk.len(), scope, "posting MyGene.info batch");
            let body = self.post_query(chunk, scope, tax_id, fields)?;
            answers.extend(partition_hits(&body)?);
        }
        Ok(answers)
    }
}

#[derive(Debug, Deserialize)]
struct RawHit {
    query: String,
    #[serde(default)]
    notfound: bool,
    #[serde(rename = "_id")]
    id: Option<String>,
    entrezgene: Option<Value>,
    ensembl: Option<Value>,
    symbol: Option<String>,
    uniprot: Option<Value>,
}

/// Groups the hit array of a query response per query string, keeping the
/// order in which queries first appear.
pub fn partition_hits(body: &Value) -> Result<Vec<ScopedQuery>, KeggError> {
    let hits: Vec<RawHit> = serde_json::from_value(body.clone())
        .map_err(|err| KeggError::MyGeneDecode(err.to_string()))?;

    let mut grouped: Vec<(String, Vec<GeneHit>)> = Vec::new();
    for hit in hits {
        let pos = match grouped.iter().position(|(query, _)| *query == hit.query) {
            Some(pos) => pos,
            None => {
                grouped.push((hit.query.clone(), Vec::new()));
                grouped.len() - 1
            }
        };
        if !hit.notfound {
            grouped[pos].1.push(to_gene_hit(hit));
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(query, mut found)| match found.len() {
            0 => ScopedQuery::missing(query),
            1 => ScopedQuery::found(query, found.remove(0)),
            n => ScopedQuery::duplicate(query, n),
        })
        .collect())
}

fn to_gene_hit(hit: RawHit) -> GeneHit {
    let ncbi_gene_id = hit.entrezgene.as_ref().and_then(scalar_string);
    let ensembl_gene_ids = hit
        .ensembl
        .as_ref()
        .map(|value| {
            one_or_many(value)
                .into_iter()
                .filter_map(|item| item.get("gene"))
                .flat_map(string_list)
                .collect()
        })
        .unwrap_or_default();
    let uniprot = hit
        .uniprot
        .as_ref()
        .map(|value| UniprotIds {
            swiss_prot: value.get("Swiss-Prot").map(string_list).unwrap_or_default(),
            trembl: value.get("TrEMBL").map(string_list).unwrap_or_default(),
        })
        .filter(|ids| !ids.is_empty());
    GeneHit {
        canonical_id: hit.id,
        ncbi_gene_id,
        ensembl_gene_ids,
        symbol: hit.symbol,
        uniprot,
    }
}

fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn string_list(value: &Value) -> Vec<String> {
    one_or_many(value)
        .into_iter()
        .filter_map(scalar_string)
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resolver::QueryOutcome;

    #[test]
    fn entrezgene_numbers_become_strings() {
        let body = json!([{ "query": "1017", "_id": "1017", "entrezgene": 1017 }]);
        let parsed = partition_hits(&body).unwrap();
        match &parsed[0].outcome {
            QueryOutcome::Found(hit) => assert_eq!(hit.ncbi_gene_id.as_deref(), Some("1017")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn ensembl_list_is_flattened() {
        let body = json!([{
            "query": "CDK2",
            "_id": "1017",
            "ensembl": [{ "gene": "ENSG00000123374" }, { "gene": ["ENSG1", "ENSG2"] }]
        }]);
        let parsed = partition_hits(&body).unwrap();
        let QueryOutcome::Found(hit) = &parsed[0].outcome else {
            panic!("expected a match");
        };
        assert_eq!(hit.ensembl_gene_ids, vec!["ENSG00000123374", "ENSG1", "ENSG2"]);
    }

    #[test]
    fn rejects_non_array_body() {
        assert!(partition_hits(&json!({ "error": "bad" })).is_err());
    }
}

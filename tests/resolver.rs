use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;

use kegg_geneset::error::KeggError;
use kegg_geneset::resolver::{
    GeneHit, GeneQueryService, QueryOutcome, RESOLVE_FIELDS, ScopedQuery, index_by_source,
    resolve_genes,
};

/// Answers from a fixed table per scope and records every call.
#[derive(Default)]
struct MockGenes {
    table: HashMap<String, Vec<ScopedQuery>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockGenes {
    fn with_scope(mut self, scope: &str, answers: Vec<ScopedQuery>) -> Self {
        self.table.insert(scope.to_string(), answers);
        self
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl GeneQueryService for MockGenes {
    fn query_many(
        &self,
        queries: &[String],
        scope: &str,
        tax_id: u32,
        fields: &[&str],
    ) -> Result<Vec<ScopedQuery>, KeggError> {
        assert_eq!(tax_id, 9606);
        assert_eq!(fields, &RESOLVE_FIELDS[..]);
        self.calls
            .lock()
            .unwrap()
            .push((scope.to_string(), queries.to_vec()));
        Ok(self
            .table
            .get(scope)
            .map(|answers| {
                answers
                    .iter()
                    .filter(|answer| queries.contains(&answer.query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn hit(id: &str, symbol: &str) -> GeneHit {
    GeneHit {
        canonical_id: Some(id.to_string()),
        ncbi_gene_id: Some(id.to_string()),
        symbol: Some(symbol.to_string()),
        ..GeneHit::default()
    }
}

fn scopes(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn second_scope_only_sees_missing_ids() {
    let service = MockGenes::default()
        .with_scope(
            "entrezgene",
            vec![
                ScopedQuery::found("g1", hit("1", "A")),
                ScopedQuery::found("g2", hit("2", "B")),
                ScopedQuery::missing("g3"),
            ],
        )
        .with_scope("symbol", vec![ScopedQuery::found("g3", hit("3", "C"))]);

    let resolved = resolve_genes(
        &service,
        ["g1", "g2", "g3"],
        9606,
        &scopes(&["entrezgene", "symbol"]),
    )
    .unwrap();

    let calls = service.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], ("symbol".to_string(), vec!["g3".to_string()]));

    assert_eq!(resolved.len(), 3);
    let by_source = index_by_source(resolved);
    for (source, symbol) in [("g1", "A"), ("g2", "B"), ("g3", "C")] {
        assert_eq!(by_source[source].source, source);
        assert_eq!(by_source[source].symbol.as_deref(), Some(symbol));
    }
}

#[test]
fn duplicate_match_aborts_without_partial_result() {
    let service = MockGenes::default().with_scope(
        "entrezgene",
        vec![
            ScopedQuery::duplicate("g1", 2),
            ScopedQuery::found("g2", hit("2", "B")),
        ],
    );

    let err = resolve_genes(
        &service,
        ["g1", "g2"],
        9606,
        &scopes(&["entrezgene", "symbol"]),
    )
    .unwrap_err();

    assert_matches!(
        err,
        KeggError::DuplicateMatch { ref scope, ref queries }
            if scope == "entrezgene" && queries == &vec!["g1".to_string()]
    );
    assert_eq!(service.calls().len(), 1);
}

#[test]
fn ids_missing_after_last_scope_keep_only_source() {
    let service = MockGenes::default()
        .with_scope(
            "entrezgene",
            vec![ScopedQuery::found("g1", hit("1", "A")), ScopedQuery::missing("g2")],
        )
        .with_scope("symbol", vec![ScopedQuery::missing("g2")]);

    let resolved = resolve_genes(
        &service,
        ["g1", "g2"],
        9606,
        &scopes(&["entrezgene", "symbol"]),
    )
    .unwrap();

    assert_eq!(resolved.len(), 2);
    let by_source = index_by_source(resolved);
    let missing = &by_source["g2"];
    assert!(!missing.is_resolved());
    assert_eq!(missing.canonical_id, None);
    assert!(by_source["g1"].is_resolved());
}

#[test]
fn ids_left_out_by_the_last_scope_count_as_missing() {
    // `g2` is reported missing by the first scope and silently left out by
    // the second: it still ends up as a source-only record.
    let service = MockGenes::default()
        .with_scope("entrezgene", vec![ScopedQuery::missing("g2")])
        .with_scope("symbol", vec![]);

    let resolved = resolve_genes(
        &service,
        ["g2"],
        9606,
        &scopes(&["entrezgene", "symbol"]),
    )
    .unwrap();

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].source, "g2");
    assert!(!resolved[0].is_resolved());
}

#[test]
fn stops_once_everything_resolved() {
    let service = MockGenes::default().with_scope(
        "entrezgene",
        vec![ScopedQuery::found("g1", hit("1", "A"))],
    );

    let resolved = resolve_genes(
        &service,
        ["g1", "g1"],
        9606,
        &scopes(&["entrezgene", "symbol", "alias"]),
    )
    .unwrap();

    assert_eq!(resolved.len(), 1);
    assert_eq!(service.calls().len(), 1);
}

#[test]
fn separate_sources_sharing_a_canonical_id_stay_separate() {
    let service = MockGenes::default().with_scope(
        "entrezgene",
        vec![
            ScopedQuery::found("g1", hit("7", "A")),
            ScopedQuery::found("old-g1", hit("7", "A")),
        ],
    );

    let resolved = resolve_genes(&service, ["g1", "old-g1"], 9606, &scopes(&["entrezgene"]))
        .unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(index_by_source(resolved).len(), 2);
}

#[test]
fn empty_input_makes_no_calls() {
    let service = MockGenes::default();
    let resolved =
        resolve_genes(&service, Vec::<String>::new(), 9606, &scopes(&["entrezgene"])).unwrap();
    assert!(resolved.is_empty());
    assert!(service.calls().is_empty());
}

#[test]
fn no_scopes_is_an_error() {
    let service = MockGenes::default();
    let err = resolve_genes(&service, ["g1"], 9606, &[]).unwrap_err();
    assert_matches!(err, KeggError::NoScopes(_));
}

#[test]
fn outcome_is_a_single_enum_per_query() {
    let answer = ScopedQuery::duplicate("g1", 3);
    assert_eq!(answer.outcome, QueryOutcome::Duplicate(3));
}

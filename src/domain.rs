use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeggError;

/// KEGG database a geneset comes from. Decides how entry ids are normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GenesetType {
    Pathway,
    Module,
    Disease,
    Other(String),
}

impl GenesetType {
    /// Maps a KEGG entry namespace (`path`, `md`, `ds`) to its database.
    pub fn from_namespace(namespace: &str) -> Self {
        match namespace {
            "path" => GenesetType::Pathway,
            "md" => GenesetType::Module,
            "ds" => GenesetType::Disease,
            other => GenesetType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GenesetType::Pathway => "pathway",
            GenesetType::Module => "module",
            GenesetType::Disease => "disease",
            GenesetType::Other(name) => name,
        }
    }

    /// Module entries carry an organism prefix (`hsa_M00001`); only the
    /// trailing segment identifies the module.
    pub fn normalize_entry<'a>(&self, entry: &'a str) -> &'a str {
        match self {
            GenesetType::Module => entry.rsplit('_').next().unwrap_or(entry),
            _ => entry,
        }
    }
}

impl fmt::Display for GenesetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GenesetType {
    type Err = KeggError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(KeggError::InvalidGenesetType(value.to_string()));
        }
        Ok(match normalized.as_str() {
            "pathway" => GenesetType::Pathway,
            "module" => GenesetType::Module,
            "disease" => GenesetType::Disease,
            _ => GenesetType::Other(normalized),
        })
    }
}

impl TryFrom<String> for GenesetType {
    type Error = KeggError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GenesetType> for String {
    fn from(value: GenesetType) -> Self {
        value.as_str().to_string()
    }
}

/// One organism to build genesets for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organism {
    pub name: String,
    pub tax_id: u32,
    pub organism_code: String,
    pub geneset_types: Vec<GenesetType>,
    /// MyGene.info scopes, tried in order.
    pub gene_id_types: Vec<String>,
}

/// Splits a `<namespace>:<id>` token. Both sides must be non-empty.
pub fn split_kegg_ref(token: &str) -> Option<(&str, &str)> {
    let (namespace, id) = token.split_once(':')?;
    if namespace.is_empty() || id.is_empty() {
        return None;
    }
    Some((namespace, id))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn module_entries_drop_organism_prefix() {
        assert_eq!(GenesetType::Module.normalize_entry("hsa_M00001"), "M00001");
        assert_eq!(GenesetType::Module.normalize_entry("M00001"), "M00001");
        assert_eq!(GenesetType::Pathway.normalize_entry("hsa_00010"), "hsa_00010");
    }

    #[test]
    fn namespaces_map_to_databases() {
        assert_eq!(GenesetType::from_namespace("md"), GenesetType::Module);
        assert_eq!(GenesetType::from_namespace("path"), GenesetType::Pathway);
        assert_eq!(
            GenesetType::from_namespace("br"),
            GenesetType::Other("br".to_string())
        );
    }

    #[test]
    fn parse_geneset_type() {
        let kind: GenesetType = "Pathway".parse().unwrap();
        assert_eq!(kind, GenesetType::Pathway);
        let err = "path way".parse::<GenesetType>().unwrap_err();
        assert_matches!(err, KeggError::InvalidGenesetType(_));
    }

    #[test]
    fn split_refs() {
        assert_eq!(split_kegg_ref("hsa:10327"), Some(("hsa", "10327")));
        assert_eq!(split_kegg_ref("hsa10327"), None);
        assert_eq!(split_kegg_ref("hsa:"), None);
    }
}

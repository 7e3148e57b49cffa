use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{GenesetType, Organism};
use crate::error::KeggError;
use crate::kegg::DEFAULT_KEGG_URL;
use crate::mygene::DEFAULT_MYGENE_URL;

pub const CONFIG_FILE: &str = "kegg-geneset.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub kegg_base_url: Option<String>,
    #[serde(default)]
    pub mygene_base_url: Option<String>,
    #[serde(default)]
    pub shared_geneset_types: Option<Vec<String>>,
    #[serde(default)]
    pub organisms: Vec<OrganismEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OrganismEntry {
    Shorthand(String),
    Detailed(OrganismEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrganismEntryObject {
    pub organism_code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<u32>,
    #[serde(default)]
    pub geneset_types: Option<Vec<String>>,
    #[serde(default)]
    pub gene_id_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub kegg_base_url: String,
    pub mygene_base_url: String,
    /// Organism-independent lists whose names every organism shares.
    pub shared_geneset_types: Vec<GenesetType>,
    pub organisms: Vec<Organism>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            kegg_base_url: DEFAULT_KEGG_URL.to_string(),
            mygene_base_url: DEFAULT_MYGENE_URL.to_string(),
            shared_geneset_types: default_shared_types(),
            organisms: builtin_organism("hsa").into_iter().collect(),
        }
    }
}

impl ResolvedConfig {
    /// Keeps only the organisms named in `codes`, taking unconfigured codes
    /// from the built-in table.
    pub fn restrict_to(&self, codes: &[String]) -> Result<Vec<Organism>, KeggError> {
        if codes.is_empty() {
            return Ok(self.organisms.clone());
        }
        codes
            .iter()
            .map(|code| {
                self.organism(code)
                    .cloned()
                    .or_else(|| builtin_organism(code))
                    .ok_or_else(|| KeggError::UnknownOrganism(code.clone()))
            })
            .collect()
    }

    pub fn organism(&self, code: &str) -> Option<&Organism> {
        self.organisms
            .iter()
            .find(|organism| organism.organism_code == code)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KeggError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::discover().ok_or(KeggError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KeggError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KeggError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// `kegg-geneset.json` in the working directory, then the user config dir.
    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "kegg-geneset")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KeggError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let shared_geneset_types = match config.shared_geneset_types {
            Some(types) => parse_types(&types)?,
            None => default_shared_types(),
        };

        let organisms = config
            .organisms
            .into_iter()
            .map(|entry| match entry {
                OrganismEntry::Shorthand(code) => {
                    builtin_organism(&code).ok_or(KeggError::UnknownOrganism(code))
                }
                OrganismEntry::Detailed(obj) => resolve_detailed(obj),
            })
            .collect::<Result<Vec<_>, KeggError>>()?;

        let defaults = ResolvedConfig::default();
        Ok(ResolvedConfig {
            schema_version,
            kegg_base_url: config.kegg_base_url.unwrap_or(defaults.kegg_base_url),
            mygene_base_url: config.mygene_base_url.unwrap_or(defaults.mygene_base_url),
            shared_geneset_types,
            organisms: if organisms.is_empty() {
                defaults.organisms
            } else {
                organisms
            },
        })
    }
}

fn resolve_detailed(obj: OrganismEntryObject) -> Result<Organism, KeggError> {
    let builtin = builtin_organism(&obj.organism_code);
    let (name, tax_id) = match (obj.name, obj.tax_id, &builtin) {
        (Some(name), Some(tax_id), _) => (name, tax_id),
        (name, tax_id, Some(known)) => (
            name.unwrap_or_else(|| known.name.clone()),
            tax_id.unwrap_or(known.tax_id),
        ),
        _ => return Err(KeggError::UnknownOrganism(obj.organism_code)),
    };
    let geneset_types = match obj.geneset_types {
        Some(types) => parse_types(&types)?,
        None => builtin
            .as_ref()
            .map(|known| known.geneset_types.clone())
            .unwrap_or_else(default_geneset_types),
    };
    let gene_id_types = match obj.gene_id_types {
        Some(scopes) => scopes,
        None => builtin
            .map(|known| known.gene_id_types)
            .unwrap_or_else(locus_scopes),
    };
    if gene_id_types.is_empty() {
        return Err(KeggError::NoScopes(obj.organism_code));
    }
    Ok(Organism {
        name,
        tax_id,
        organism_code: obj.organism_code,
        geneset_types,
        gene_id_types,
    })
}

fn parse_types(types: &[String]) -> Result<Vec<GenesetType>, KeggError> {
    types.iter().map(|value| value.parse()).collect()
}

pub fn default_shared_types() -> Vec<GenesetType> {
    vec![GenesetType::Disease, GenesetType::Module]
}

pub fn default_geneset_types() -> Vec<GenesetType> {
    vec![GenesetType::Pathway, GenesetType::Module]
}

fn entrez_scopes() -> Vec<String> {
    vec!["entrezgene".to_string(), "retired".to_string()]
}

fn locus_scopes() -> Vec<String> {
    vec![
        "ensembl.gene".to_string(),
        "symbol".to_string(),
        "alias".to_string(),
    ]
}

/// Organisms known without configuration, keyed by KEGG organism code.
pub fn builtin_organism(code: &str) -> Option<Organism> {
    let (name, tax_id, scopes) = match code {
        "hsa" => ("Homo sapiens", 9606, entrez_scopes()),
        "mmu" => ("Mus musculus", 10090, entrez_scopes()),
        "rno" => ("Rattus norvegicus", 10116, entrez_scopes()),
        "dre" => ("Danio rerio", 7955, entrez_scopes()),
        "dme" => ("Drosophila melanogaster", 7227, locus_scopes()),
        "cel" => ("Caenorhabditis elegans", 6239, locus_scopes()),
        "sce" => ("Saccharomyces cerevisiae", 559292, locus_scopes()),
        "ath" => ("Arabidopsis thaliana", 3702, locus_scopes()),
        "eco" => (
            "Escherichia coli K-12 MG1655",
            511145,
            vec!["locus_tag".to_string(), "symbol".to_string()],
        ),
        _ => return None,
    };
    let mut geneset_types = default_geneset_types();
    // KEGG DISEASE only links human genes.
    if code == "hsa" {
        geneset_types.push(GenesetType::Disease);
    }
    Some(Organism {
        name: name.to_string(),
        tax_id,
        organism_code: code.to_string(),
        geneset_types,
        gene_id_types: scopes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            organisms: vec![OrganismEntry::Shorthand("mmu".to_string())],
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.kegg_base_url, DEFAULT_KEGG_URL);
        assert_eq!(resolved.organisms.len(), 1);
        assert_eq!(resolved.organisms[0].tax_id, 10090);
        assert_eq!(resolved.organisms[0].geneset_types, default_geneset_types());
    }

    #[test]
    fn empty_config_falls_back_to_human() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.organisms[0].organism_code, "hsa");
        assert!(
            resolved.organisms[0]
                .geneset_types
                .contains(&GenesetType::Disease)
        );
    }
}

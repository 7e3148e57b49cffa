//! Output records for the knowledge store.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{GenesetType, Organism};
use crate::error::KeggError;
use crate::parser::GenesetEntry;
use crate::resolver::ResolvedGeneIdentity;

pub const CREATOR: &str = "kegg_parser";

#[derive(Debug, Clone, Serialize)]
pub struct GenesetRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub is_public: bool,
    pub taxid: u32,
    pub creator: String,
    pub date: String,
    pub genes: Vec<ResolvedGeneIdentity>,
    pub kegg: KeggAnnotation,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeggAnnotation {
    pub database: String,
    pub entry: String,
    pub name: Option<String>,
    pub organism_code: String,
}

pub fn record_id(geneset_type: &GenesetType, entry: &str, tax_id: u32) -> String {
    format!("KEGG_{geneset_type}_{entry}_{tax_id}")
}

/// Joins identities onto the geneset's members. A member with no identity
/// is carried with only its source id.
pub fn build_record(
    entry: &GenesetEntry,
    identities: &HashMap<String, ResolvedGeneIdentity>,
    organism: &Organism,
    date: NaiveDate,
) -> GenesetRecord {
    let genes = entry
        .members
        .iter()
        .map(|member| {
            identities
                .get(member)
                .cloned()
                .unwrap_or_else(|| ResolvedGeneIdentity::unresolved(member.clone()))
        })
        .collect();
    GenesetRecord {
        id: record_id(&entry.geneset_type, &entry.id, organism.tax_id),
        is_public: true,
        taxid: organism.tax_id,
        creator: CREATOR.to_string(),
        date: date.format("%Y-%m-%d").to_string(),
        genes,
        kegg: KeggAnnotation {
            database: entry.geneset_type.to_string(),
            entry: entry.id.clone(),
            name: entry.name.clone(),
            organism_code: organism.organism_code.clone(),
        },
    }
}

/// Serializes `record` and runs [`clean_record`] over it.
pub fn to_clean_json(record: &GenesetRecord) -> Result<Value, KeggError> {
    let value = serde_json::to_value(record)
        .map_err(|err| KeggError::Serialize(format!("{}: {err}", record.id)))?;
    Ok(clean_record(value))
}

/// Drops null and empty values recursively, then replaces every
/// single-element array with its element.
pub fn clean_record(value: Value) -> Value {
    unlist(sweep(value).unwrap_or(Value::Object(Map::new())))
}

fn sweep(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::Array(items) => {
            let items = items.into_iter().filter_map(sweep).collect::<Vec<_>>();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(fields) => {
            let fields = fields
                .into_iter()
                .filter_map(|(key, value)| sweep(value).map(|value| (key, value)))
                .collect::<Map<_, _>>();
            (!fields.is_empty()).then_some(Value::Object(fields))
        }
        other => Some(other),
    }
}

fn unlist(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => unlist(items.remove(0)),
        Value::Array(items) => Value::Array(items.into_iter().map(unlist).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, unlist(value)))
                .collect(),
        ),
        other => other,
    }
}

//! Parsers for KEGG text: link flat files, REST `list`/`link` bodies, `get`
//! entries and the `info` release banner.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use serde::Serialize;

use crate::domain::{GenesetType, split_kegg_ref};
use crate::error::KeggError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenesetEntry {
    pub id: String,
    pub geneset_type: GenesetType,
    pub name: Option<String>,
    pub members: Vec<String>,
}

impl GenesetEntry {
    pub fn new(id: impl Into<String>, geneset_type: GenesetType) -> Self {
        Self {
            id: id.into(),
            geneset_type,
            name: None,
            members: Vec::new(),
        }
    }

    /// Appends `gene` unless it is already a member. Returns whether it was added.
    pub fn add_member(&mut self, gene: &str) -> bool {
        if self.members.iter().any(|member| member == gene) {
            return false;
        }
        self.members.push(gene.to_string());
        true
    }
}

/// Genesets keyed by id, iterated in first-encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesetMap {
    entries: Vec<GenesetEntry>,
    index: HashMap<String, usize>,
}

impl GenesetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GenesetEntry> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn members(&self, id: &str) -> Option<&[String]> {
        self.get(id).map(|entry| entry.members.as_slice())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GenesetEntry> {
        self.entries.iter()
    }

    /// Union of members across all genesets.
    pub fn unique_genes(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .flat_map(|entry| entry.members.iter().cloned())
            .collect()
    }

    /// Moves every geneset of `other` into `self`, merging members of ids
    /// already present.
    pub fn merge(&mut self, other: GenesetMap) {
        for entry in other.entries {
            let target = self.entry_mut(&entry.id, entry.geneset_type.clone());
            for gene in &entry.members {
                target.add_member(gene);
            }
            if target.name.is_none() {
                target.name = entry.name;
            }
        }
    }

    fn entry_mut(&mut self, id: &str, geneset_type: GenesetType) -> &mut GenesetEntry {
        let pos = match self.index.get(id) {
            Some(&pos) => pos,
            None => {
                self.entries.push(GenesetEntry::new(id, geneset_type));
                let pos = self.entries.len() - 1;
                self.index.insert(id.to_string(), pos);
                pos
            }
        };
        &mut self.entries[pos]
    }
}

impl IntoIterator for GenesetMap {
    type Item = GenesetEntry;
    type IntoIter = std::vec::IntoIter<GenesetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a GenesetMap {
    type Item = &'a GenesetEntry;
    type IntoIter = std::slice::Iter<'a, GenesetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenesetInfo {
    pub geneset_type: GenesetType,
    pub name: String,
}

pub type GenesetInfoMap = HashMap<String, GenesetInfo>;

/// What to do when a `list` response repeats an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    KeepLast,
    Reject,
}

/// Title and database of a single KEGG `get` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryInfo {
    pub geneset_type: Option<GenesetType>,
    pub name: Option<String>,
}

pub fn parse_geneset_file(path: &Utf8Path) -> Result<GenesetMap, KeggError> {
    let file = File::open(path)
        .map_err(|err| KeggError::Filesystem(format!("open {path}: {err}")))?;
    let mut text = String::new();
    let read = if path.extension() == Some("gz") {
        GzDecoder::new(file).read_to_string(&mut text)
    } else {
        let mut file = file;
        file.read_to_string(&mut text)
    };
    read.map_err(|err| KeggError::Filesystem(format!("read {path}: {err}")))?;
    parse_geneset_text(&text)
}

/// Parses whitespace-delimited `<ns>:<geneset> <ns>:<gene>` lines. Repeated
/// genes of a geneset are merged silently.
pub fn parse_geneset_text(text: &str) -> Result<GenesetMap, KeggError> {
    let mut genesets = GenesetMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let Some((geneset_ref, gene)) = split_link_line(idx + 1, raw)? else {
            continue;
        };
        let (namespace, entry) = geneset_ref;
        let geneset_type = GenesetType::from_namespace(namespace);
        let id = geneset_type.normalize_entry(entry).to_string();
        genesets.entry_mut(&id, geneset_type).add_member(gene);
    }
    Ok(genesets)
}

/// Parses a `link/{org}/{type}` body. Unlike flat files, a link repeated
/// verbatim is an error.
pub fn parse_link_response(
    text: &str,
    geneset_type: &GenesetType,
    source_name: &str,
) -> Result<GenesetMap, KeggError> {
    let mut genesets = GenesetMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let Some(((_, entry), gene)) = split_link_line(idx + 1, raw)? else {
            continue;
        };
        let id = geneset_type.normalize_entry(entry);
        if !genesets.entry_mut(id, geneset_type.clone()).add_member(gene) {
            return Err(KeggError::DuplicateEntry {
                source_name: source_name.to_string(),
                entry: format!("{id} -> {gene}"),
            });
        }
    }
    Ok(genesets)
}

/// Parses a tab-delimited `list` body into entry names tagged with `geneset_type`.
pub fn parse_list_response(
    text: &str,
    geneset_type: &GenesetType,
    source_name: &str,
    policy: DuplicatePolicy,
) -> Result<GenesetInfoMap, KeggError> {
    let mut infos = GenesetInfoMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let (token, name) = line.split_once('\t').ok_or_else(|| KeggError::Parse {
            line: idx + 1,
            content: line.to_string(),
            reason: "expected a tab-separated name".to_string(),
        })?;
        // `list/pathway/{org}` answers with bare ids, other lists are prefixed.
        let entry = match token.split_once(':') {
            Some(_) => {
                split_kegg_ref(token)
                    .ok_or_else(|| KeggError::Parse {
                        line: idx + 1,
                        content: line.to_string(),
                        reason: "empty namespace or id".to_string(),
                    })?
                    .1
            }
            None => token.trim(),
        };
        if entry.is_empty() {
            return Err(KeggError::Parse {
                line: idx + 1,
                content: line.to_string(),
                reason: "empty id".to_string(),
            });
        }
        let id = geneset_type.normalize_entry(entry).to_string();
        let info = GenesetInfo {
            geneset_type: geneset_type.clone(),
            name: name.trim().to_string(),
        };
        if infos.insert(id.clone(), info).is_some() && policy == DuplicatePolicy::Reject {
            return Err(KeggError::DuplicateEntry {
                source_name: source_name.to_string(),
                entry: id,
            });
        }
    }
    Ok(infos)
}

pub fn parse_entry_info(text: &str) -> EntryInfo {
    let mut info = EntryInfo::default();
    for line in text.lines() {
        if line.starts_with("ENTRY") {
            info.geneset_type = line
                .split_whitespace()
                .last()
                .and_then(|kind| kind.parse().ok());
        }
        if line.starts_with("NAME") {
            let name = line.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
            if !name.is_empty() {
                info.name = Some(name);
            }
        }
    }
    info
}

/// Extracts `Release ...` from the `info/kegg` banner.
pub fn parse_release(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.len() > 1 && tokens[0] == "kegg" && tokens[1] == "Release" {
            Some(tokens[1..].join(" "))
        } else {
            None
        }
    })
}

type LinkLine<'a> = ((&'a str, &'a str), &'a str);

fn split_link_line(line_no: usize, raw: &str) -> Result<Option<LinkLine<'_>>, KeggError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let malformed = |reason: &str| KeggError::Parse {
        line: line_no,
        content: line.to_string(),
        reason: reason.to_string(),
    };
    let mut tokens = line.split_whitespace();
    let (Some(first), Some(second)) = (tokens.next(), tokens.next()) else {
        return Err(malformed("expected two tokens"));
    };
    let geneset_ref = split_kegg_ref(first).ok_or_else(|| malformed("geneset token lacks `:`"))?;
    let (_, gene) = split_kegg_ref(second).ok_or_else(|| malformed("gene token lacks `:`"))?;
    Ok(Some((geneset_ref, gene)))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn split_link_line_skips_blank() {
        assert_eq!(split_link_line(1, "   ").unwrap(), None);
    }

    #[test]
    fn split_link_line_reports_line_number() {
        let err = split_link_line(7, "path:hsa00010").unwrap_err();
        assert_matches!(err, KeggError::Parse { line: 7, .. });
    }

    #[test]
    fn entry_info_from_get_body() {
        let body = "ENTRY       hsa00010                    Pathway\n\
                    NAME        Glycolysis / Gluconeogenesis - Homo sapiens (human)\n\
                    CLASS       Metabolism; Carbohydrate metabolism\n";
        let info = parse_entry_info(body);
        assert_eq!(info.geneset_type, Some(GenesetType::Pathway));
        assert_eq!(
            info.name.as_deref(),
            Some("Glycolysis / Gluconeogenesis - Homo sapiens (human)")
        );
    }

    #[test]
    fn release_banner() {
        let body = "kegg             Kyoto Encyclopedia of Genes and Genomes\n\
                    kegg             Release 110.0+/05-01, May 24\n";
        assert_eq!(
            parse_release(body).as_deref(),
            Some("Release 110.0+/05-01, May 24")
        );
        assert_eq!(parse_release("nothing here"), None);
    }

    #[test]
    fn merge_keeps_order_and_dedups() {
        let mut left = parse_geneset_text("path:hsa00010 hsa:1\npath:hsa00020 hsa:2\n").unwrap();
        let right = parse_geneset_text("path:hsa00030 hsa:3\npath:hsa00010 hsa:1\n").unwrap();
        left.merge(right);
        assert_eq!(
            left.ids().collect::<Vec<_>>(),
            vec!["hsa00010", "hsa00020", "hsa00030"]
        );
        assert_eq!(left.members("hsa00010").unwrap(), ["1"]);
    }
}

//! The bibliographic record and its fuzzy `ayjid` fingerprint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TethneError};
use crate::field::Field;
use crate::value::Value;

/// Primary key used when a paper has no usable identifier.
pub const UNKNOWN_PAPER: &str = "UNKNOWN PAPER";

/// Build the author-year-journal identifier.
///
/// Absent components render as empty strings, so internal whitespace is
/// preserved (`"SMITH J  NATURE"` when the year is missing).
pub fn ayjid(surname: Option<&str>, initial: Option<&str>, year: Option<i64>, journal: Option<&str>) -> String {
    let absent = |s: Option<&str>| s.map_or(true, |s| s.is_empty());
    if absent(surname) && absent(initial) && year.is_none() && absent(journal) {
        return UNKNOWN_PAPER.to_string();
    }
    let year = year.map(|y| y.to_string()).unwrap_or_default();
    format!(
        "{} {} {} {}",
        surname.unwrap_or(""),
        initial.unwrap_or(""),
        year,
        journal.unwrap_or("")
    )
    .to_uppercase()
}

/// One affiliation parsed from an address block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub institution: String,
    pub country: Option<String>,
    pub raw: String,
}

/// Institutional addresses of a paper's authors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addresses {
    #[default]
    None,
    /// Author name (`"SURNAME FORENAME"`) to affiliations.
    ByAuthor(BTreeMap<String, Vec<Affiliation>>),
    /// Per-author assignment was ambiguous; the `__all__` form.
    All(Vec<Affiliation>),
}

impl Addresses {
    pub fn is_empty(&self) -> bool {
        match self {
            Addresses::None => true,
            Addresses::ByAuthor(map) => map.is_empty(),
            Addresses::All(list) => list.is_empty(),
        }
    }

    /// Every affiliation, in order, regardless of assignment.
    pub fn affiliations(&self) -> Vec<&Affiliation> {
        match self {
            Addresses::None => Vec::new(),
            Addresses::ByAuthor(map) => map.values().flatten().collect(),
            Addresses::All(list) => list.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub aulast: Vec<String>,
    pub auinit: Vec<String>,
    /// `(SURNAME, FORENAME)`, aligned with `aulast`.
    pub authors_full: Vec<(String, String)>,
    pub atitle: Option<String>,
    pub jtitle: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub spage: Option<String>,
    pub epage: Option<String>,
    pub date: Option<i64>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub wosid: Option<String>,
    pub eid: Option<String>,
    pub uri: Option<String>,
    pub accession: Option<String>,
    pub document_type: Option<String>,
    pub addresses: Addresses,
    /// Cited references. Their own `citations` are always empty.
    pub citations: Vec<Paper>,
    pub ayjid: Option<String>,
    pub extras: BTreeMap<String, Value>,
}

fn text(v: &Option<String>) -> Option<Value> {
    v.as_ref().filter(|s| !s.trim().is_empty()).map(|s| Value::Text(s.clone()))
}

fn text_list(items: &[String]) -> Option<Value> {
    if items.is_empty() {
        None
    } else {
        Some(Value::List(items.iter().map(|s| Value::Text(s.clone())).collect()))
    }
}

fn non_empty(v: &Option<String>) -> bool {
    v.as_ref().map_or(false, |s| !s.trim().is_empty())
}

impl Paper {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"SURNAME INITIAL"` for each author, upper-cased.
    pub fn authors(&self) -> Vec<String> {
        self.aulast
            .iter()
            .zip(self.auinit.iter())
            .map(|(last, init)| format!("{} {}", last, init).trim().to_uppercase())
            .collect()
    }

    /// Author identities used for the `authors` feature set: full forenames
    /// when the reader supplied them, initials otherwise.
    pub fn author_elements(&self) -> Vec<Value> {
        if !self.authors_full.is_empty() {
            self.authors_full
                .iter()
                .map(|(last, first)| Value::tuple([last.to_uppercase(), first.to_uppercase()]))
                .collect()
        } else {
            self.aulast
                .iter()
                .zip(self.auinit.iter())
                .map(|(last, init)| Value::tuple([last.to_uppercase(), init.to_uppercase()]))
                .collect()
        }
    }

    /// Recompute `ayjid` from the first author, date and journal.
    pub fn compute_ayjid(&self) -> String {
        ayjid(
            self.aulast.first().map(String::as_str),
            self.auinit.first().map(String::as_str),
            self.date,
            self.jtitle.as_deref(),
        )
    }

    /// The stored fingerprint, or a freshly computed one.
    pub fn fingerprint(&self) -> String {
        match &self.ayjid {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => self.compute_ayjid(),
        }
    }

    /// Fill `ayjid` on this paper and its citations.
    pub fn fill_ayjid(&mut self) {
        if self.ayjid.as_deref().map_or(true, |s| s.trim().is_empty()) {
            self.ayjid = Some(self.compute_ayjid());
        }
        for citation in &mut self.citations {
            citation.citations.clear();
            citation.fill_ayjid();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.aulast.is_empty() && !self.auinit.is_empty() && self.aulast.len() != self.auinit.len() {
            return Err(TethneError::Inconsistency(format!(
                "paper {} has {} surnames but {} initials",
                self.fingerprint(),
                self.aulast.len(),
                self.auinit.len()
            )));
        }
        if !self.authors_full.is_empty() && !self.aulast.is_empty() && self.authors_full.len() != self.aulast.len() {
            return Err(TethneError::Inconsistency(format!(
                "paper {} has {} full names but {} surnames",
                self.fingerprint(),
                self.authors_full.len(),
                self.aulast.len()
            )));
        }
        Ok(())
    }

    /// Value of a field; `None` when absent or empty.
    pub fn get(&self, field: &Field) -> Option<Value> {
        match field {
            Field::Aulast => text_list(&self.aulast),
            Field::Auinit => text_list(&self.auinit),
            Field::Authors => text_list(&self.authors()),
            Field::AuthorsFull => {
                if self.authors_full.is_empty() {
                    None
                } else {
                    Some(Value::List(
                        self.authors_full
                            .iter()
                            .map(|(l, f)| Value::tuple([l.clone(), f.clone()]))
                            .collect(),
                    ))
                }
            }
            Field::Atitle => text(&self.atitle),
            Field::Jtitle => text(&self.jtitle),
            Field::Volume => text(&self.volume),
            Field::Issue => text(&self.issue),
            Field::Spage => text(&self.spage),
            Field::Epage => text(&self.epage),
            Field::Date => self.date.map(Value::Int),
            Field::Abstract => text(&self.abstract_text),
            Field::Doi => text(&self.doi),
            Field::Pmid => text(&self.pmid),
            Field::Wosid => text(&self.wosid),
            Field::Eid => text(&self.eid),
            Field::Uri => text(&self.uri),
            Field::Accession => text(&self.accession),
            Field::DocumentType => text(&self.document_type),
            Field::Ayjid => Some(Value::Text(self.fingerprint())),
            Field::Citations => {
                let ids: Vec<String> = self.citations.iter().map(Paper::fingerprint).collect();
                text_list(&ids)
            }
            Field::Institutions => {
                let mut names: Vec<String> = Vec::new();
                for aff in self.addresses.affiliations() {
                    if !names.contains(&aff.institution) {
                        names.push(aff.institution.clone());
                    }
                }
                text_list(&names)
            }
            Field::Extra(name) => self.extras.get(name).filter(|v| !v.is_empty()).cloned(),
        }
    }

    /// Like [`Paper::get`], but an unrecognised name is an error.
    pub fn field(&self, name: &str) -> Result<Option<Value>> {
        match name.parse::<Field>() {
            Ok(field) => Ok(self.get(&field)),
            Err(_) if self.extras.contains_key(name) => Ok(self.extras.get(name).cloned()),
            Err(e) => Err(e),
        }
    }

    /// Set a scalar or list field from a `Value`. Derived fields are rejected.
    pub fn set(&mut self, field: &Field, value: Value) -> Result<()> {
        let as_string = |v: &Value| -> Option<String> {
            let s = v.to_string();
            if s.trim().is_empty() {
                None
            } else {
                Some(s)
            }
        };
        let as_strings = |v: &Value| -> Vec<String> { v.flatten().iter().map(|v| v.to_string()).collect() };
        match field {
            Field::Aulast => self.aulast = as_strings(&value),
            Field::Auinit => self.auinit = as_strings(&value),
            Field::AuthorsFull => {
                self.authors_full = value
                    .flatten()
                    .iter()
                    .map(|pair| match pair {
                        Value::List(parts) if parts.len() == 2 => Ok((parts[0].to_string(), parts[1].to_string())),
                        other => Err(TethneError::Inconsistency(format!(
                            "authors_full entry is not a (surname, forename) pair: {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            Field::Atitle => self.atitle = as_string(&value),
            Field::Jtitle => self.jtitle = as_string(&value),
            Field::Volume => self.volume = as_string(&value),
            Field::Issue => self.issue = as_string(&value),
            Field::Spage => self.spage = as_string(&value),
            Field::Epage => self.epage = as_string(&value),
            Field::Date => {
                self.date = match &value {
                    Value::Text(s) if s.trim().is_empty() => None,
                    v => Some(v.as_int().ok_or_else(|| {
                        TethneError::Inconsistency(format!("date is not an integer year: {v}"))
                    })?),
                }
            }
            Field::Abstract => self.abstract_text = as_string(&value),
            Field::Doi => self.doi = as_string(&value),
            Field::Pmid => self.pmid = as_string(&value),
            Field::Wosid => self.wosid = as_string(&value),
            Field::Eid => self.eid = as_string(&value),
            Field::Uri => self.uri = as_string(&value),
            Field::Accession => self.accession = as_string(&value),
            Field::DocumentType => self.document_type = as_string(&value),
            Field::Ayjid => self.ayjid = as_string(&value),
            Field::Extra(name) => {
                self.extras.insert(name.clone(), value);
            }
            Field::Authors | Field::Citations | Field::Institutions => {
                return Err(TethneError::Inconsistency(format!("{field} is derived and cannot be set")))
            }
        }
        Ok(())
    }

    /// Copy every non-empty field of `other` over this paper.
    pub fn overlay(&mut self, other: &Paper) {
        if !other.aulast.is_empty() {
            self.aulast = other.aulast.clone();
            self.auinit = other.auinit.clone();
        }
        if !other.authors_full.is_empty() {
            self.authors_full = other.authors_full.clone();
        }
        macro_rules! take {
            ($($f:ident),*) => {
                $(if non_empty(&other.$f) { self.$f = other.$f.clone(); })*
            };
        }
        take!(
            atitle, jtitle, volume, issue, spage, epage, abstract_text, doi, pmid, wosid, eid, uri,
            accession, document_type, ayjid
        );
        if other.date.is_some() {
            self.date = other.date;
        }
        if !other.addresses.is_empty() {
            self.addresses = other.addresses.clone();
        }
        if !other.citations.is_empty() {
            self.citations = other.citations.clone();
        }
        for (k, v) in &other.extras {
            if !v.is_empty() {
                self.extras.insert(k.clone(), v.clone());
            }
        }
    }

    /// Drop everything except `fields`. `ayjid` is always retained.
    pub fn retain_fields(&mut self, fields: &[Field]) {
        let id = self.fingerprint();
        let keep = |f: Field| fields.contains(&f);
        let keep_authors = keep(Field::Aulast) || keep(Field::Auinit) || keep(Field::Authors);
        if !keep_authors {
            self.aulast.clear();
            self.auinit.clear();
        }
        if !keep(Field::AuthorsFull) {
            self.authors_full.clear();
        }
        macro_rules! clear {
            ($($variant:ident => $f:ident),*) => {
                $(if !keep(Field::$variant) { self.$f = None; })*
            };
        }
        clear!(
            Atitle => atitle, Jtitle => jtitle, Volume => volume, Issue => issue, Spage => spage,
            Epage => epage, Date => date, Abstract => abstract_text, Doi => doi, Pmid => pmid,
            Wosid => wosid, Eid => eid, Uri => uri, Accession => accession,
            DocumentType => document_type
        );
        if !keep(Field::Institutions) {
            self.addresses = Addresses::None;
        }
        if !keep(Field::Citations) {
            self.citations.clear();
        }
        self.extras.retain(|k, _| fields.iter().any(|f| f.as_str() == k));
        self.ayjid = Some(id);
    }
}

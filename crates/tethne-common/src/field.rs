//! Names of the recognised paper fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TethneError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Field {
    Aulast,
    Auinit,
    /// Derived: `"SURNAME INITIAL"` per author.
    Authors,
    AuthorsFull,
    Atitle,
    Jtitle,
    Volume,
    Issue,
    Spage,
    Epage,
    Date,
    Abstract,
    Doi,
    Pmid,
    Wosid,
    Eid,
    Uri,
    Accession,
    DocumentType,
    Ayjid,
    /// Derived: the ayjids of the cited references.
    Citations,
    /// Derived: institution names from the address block.
    Institutions,
    /// Reader-specific field kept in `Paper::extras`.
    Extra(String),
}

impl Field {
    pub const CANONICAL: [Field; 22] = [
        Field::Aulast,
        Field::Auinit,
        Field::Authors,
        Field::AuthorsFull,
        Field::Atitle,
        Field::Jtitle,
        Field::Volume,
        Field::Issue,
        Field::Spage,
        Field::Epage,
        Field::Date,
        Field::Abstract,
        Field::Doi,
        Field::Pmid,
        Field::Wosid,
        Field::Eid,
        Field::Uri,
        Field::Accession,
        Field::DocumentType,
        Field::Ayjid,
        Field::Citations,
        Field::Institutions,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Field::Aulast => "aulast",
            Field::Auinit => "auinit",
            Field::Authors => "authors",
            Field::AuthorsFull => "authors_full",
            Field::Atitle => "atitle",
            Field::Jtitle => "jtitle",
            Field::Volume => "volume",
            Field::Issue => "issue",
            Field::Spage => "spage",
            Field::Epage => "epage",
            Field::Date => "date",
            Field::Abstract => "abstract",
            Field::Doi => "doi",
            Field::Pmid => "pmid",
            Field::Wosid => "wosid",
            Field::Eid => "eid",
            Field::Uri => "uri",
            Field::Accession => "accession",
            Field::DocumentType => "documentType",
            Field::Ayjid => "ayjid",
            Field::Citations => "citations",
            Field::Institutions => "institutions",
            Field::Extra(name) => name,
        }
    }

    pub fn is_extra(&self) -> bool {
        matches!(self, Field::Extra(_))
    }

    /// Fields whose value is naturally a list.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            Field::Aulast
                | Field::Auinit
                | Field::Authors
                | Field::AuthorsFull
                | Field::Citations
                | Field::Institutions
        )
    }

    /// Parse a name, mapping anything unrecognised to `Extra`.
    pub fn parse_lenient(name: &str) -> Field {
        name.parse().unwrap_or_else(|_| Field::Extra(name.to_string()))
    }
}

impl FromStr for Field {
    type Err = TethneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "aulast" => Field::Aulast,
            "auinit" => Field::Auinit,
            "authors" => Field::Authors,
            "authors_full" | "authorsFull" => Field::AuthorsFull,
            "atitle" | "title" => Field::Atitle,
            "jtitle" | "journal" => Field::Jtitle,
            "volume" => Field::Volume,
            "issue" => Field::Issue,
            "spage" => Field::Spage,
            "epage" => Field::Epage,
            "date" | "year" => Field::Date,
            "abstract" => Field::Abstract,
            "doi" => Field::Doi,
            "pmid" => Field::Pmid,
            "wosid" => Field::Wosid,
            "eid" => Field::Eid,
            "uri" => Field::Uri,
            "accession" => Field::Accession,
            "documentType" | "document_type" => Field::DocumentType,
            "ayjid" => Field::Ayjid,
            "citations" => Field::Citations,
            "institutions" => Field::Institutions,
            other => return Err(TethneError::UnknownField(other.to_string())),
        };
        Ok(field)
    }
}

impl TryFrom<String> for Field {
    type Error = TethneError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(Field::parse_lenient(&s))
    }
}

impl From<Field> for String {
    fn from(f: Field) -> Self {
        f.as_str().to_string()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_round_trip() {
        for field in Field::CANONICAL.iter() {
            let parsed: Field = field.as_str().parse().unwrap();
            assert_eq!(&parsed, field);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("title".parse::<Field>().unwrap(), Field::Atitle);
        assert_eq!("journal".parse::<Field>().unwrap(), Field::Jtitle);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        assert!(matches!("keywords".parse::<Field>(), Err(TethneError::UnknownField(_))));
        assert_eq!(Field::parse_lenient("keywords"), Field::Extra("keywords".into()));
    }
}

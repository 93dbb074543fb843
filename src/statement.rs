//! Parsed SPARQL statements.

use std::{fmt, str::FromStr};

use spargebra::SparqlParser;

use crate::error::{Error, Result};

/// The four SPARQL query forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
    Construct,
    Describe,
}

impl QueryForm {
    /// CONSTRUCT and DESCRIBE answer with an RDF graph
    pub fn returns_graph(self) -> bool {
        matches!(self, Self::Construct | Self::Describe)
    }
}

impl fmt::Display for QueryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "SELECT",
            Self::Ask => "ASK",
            Self::Construct => "CONSTRUCT",
            Self::Describe => "DESCRIBE",
        })
    }
}

/// A parsed SPARQL query. `Display` yields its canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    inner: spargebra::Query,
}

impl Query {
    pub fn parse(text: &str) -> Result<Self> {
        let inner = SparqlParser::new()
            .parse_query(text)
            .map_err(|e| Error::InvalidQuery {
                reason: format!("Failed to parse SPARQL query: {e}"),
            })?;
        Ok(Self { inner })
    }

    pub fn form(&self) -> QueryForm {
        match &self.inner {
            spargebra::Query::Select { .. } => QueryForm::Select,
            spargebra::Query::Ask { .. } => QueryForm::Ask,
            spargebra::Query::Construct { .. } => QueryForm::Construct,
            spargebra::Query::Describe { .. } => QueryForm::Describe,
        }
    }

    pub fn as_algebra(&self) -> &spargebra::Query {
        &self.inner
    }
}

impl From<spargebra::Query> for Query {
    fn from(inner: spargebra::Query) -> Self {
        Self { inner }
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// One or more parsed SPARQL update operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    inner: spargebra::Update,
}

impl UpdateRequest {
    pub fn parse(text: &str) -> Result<Self> {
        let inner = SparqlParser::new()
            .parse_update(text)
            .map_err(|e| Error::InvalidQuery {
                reason: format!("Failed to parse SPARQL update: {e}"),
            })?;

        if inner.operations.is_empty() {
            return Err(Error::Precondition(
                "update request contains no operations".to_string(),
            ));
        }

        Ok(Self { inner })
    }

    pub fn operation_count(&self) -> usize {
        self.inner.operations.len()
    }
}

impl FromStr for UpdateRequest {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

impl fmt::Display for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

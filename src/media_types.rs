//! Media types for RDF graphs and SPARQL result sets.
//!
//! The registry is a set of constant tables; weights express the preference used
//! when building `Accept` headers for outbound requests.

use std::fmt;

pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_SPARQL_QUERY: &str = "application/sparql-query";
pub const APPLICATION_SPARQL_UPDATE: &str = "application/sparql-update";

pub const APPLICATION_N_TRIPLES: &str = "application/n-triples";
pub const TEXT_TURTLE: &str = "text/turtle";
pub const APPLICATION_RDF_XML: &str = "application/rdf+xml";
pub const APPLICATION_N_QUADS: &str = "application/n-quads";
pub const APPLICATION_TRIG: &str = "application/trig";
pub const TEXT_N3: &str = "text/n3";

pub const APPLICATION_SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
pub const APPLICATION_SPARQL_RESULTS_XML: &str = "application/sparql-results+xml";
pub const TEXT_CSV: &str = "text/csv";
pub const TEXT_TAB_SEPARATED_VALUES: &str = "text/tab-separated-values";

/// A syntax entry of the registry: media type essence plus negotiation weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Syntax {
    pub media_type: &'static str,
    pub quality: f32,
}

const fn syntax(media_type: &'static str, quality: f32) -> Syntax {
    Syntax {
        media_type,
        quality,
    }
}

/// Graph syntaxes we can parse, most efficient first
pub const READABLE_GRAPH: &[Syntax] = &[
    syntax(APPLICATION_N_TRIPLES, 1.0),
    syntax(TEXT_TURTLE, 0.9),
    syntax(APPLICATION_RDF_XML, 0.8),
    syntax(APPLICATION_N_QUADS, 0.7),
    syntax(APPLICATION_TRIG, 0.7),
    syntax(TEXT_N3, 0.6),
];

/// Graph syntaxes we serve
pub const WRITABLE_GRAPH: &[Syntax] = &[
    syntax(APPLICATION_N_TRIPLES, 1.0),
    syntax(TEXT_TURTLE, 1.0),
    syntax(APPLICATION_RDF_XML, 1.0),
];

/// Quad syntaxes for whole-dataset transfers, both read and served
pub const RDF_DATASET: &[Syntax] = &[
    syntax(APPLICATION_N_QUADS, 1.0),
    syntax(APPLICATION_TRIG, 0.9),
];

/// Result-set syntaxes, both read and served
pub const RESULT_SET: &[Syntax] = &[
    syntax(APPLICATION_SPARQL_RESULTS_JSON, 1.0),
    syntax(APPLICATION_SPARQL_RESULTS_XML, 0.9),
    syntax(TEXT_CSV, 0.5),
    syntax(TEXT_TAB_SEPARATED_VALUES, 0.5),
];

/// Boolean (ASK) results cannot be written as CSV/TSV by every service; keep to JSON/XML
pub const BOOLEAN_RESULT: &[Syntax] = &[
    syntax(APPLICATION_SPARQL_RESULTS_JSON, 1.0),
    syntax(APPLICATION_SPARQL_RESULTS_XML, 0.9),
];

/// A single media range with its quality weight, e.g. `text/turtle;q=0.9`.
///
/// Parameters other than `q` (such as `charset`) are not significant for
/// negotiation and are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    essence: String,
    quality: f32,
}

impl MediaType {
    pub fn new(essence: impl AsRef<str>) -> Self {
        Self::with_quality(essence, 1.0)
    }

    pub fn with_quality(essence: impl AsRef<str>, quality: f32) -> Self {
        Self {
            essence: essence.as_ref().trim().to_ascii_lowercase(),
            quality: quality.clamp(0.0, 1.0),
        }
    }

    /// Parse one header item (`type/subtype; param=value; q=0.5`)
    pub fn parse(item: &str) -> Option<Self> {
        let mut segments = item.split(';');
        let essence = segments.next()?.trim();
        if essence.is_empty() || !essence.contains('/') {
            return None;
        }

        let quality = segments
            .filter_map(|seg| seg.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);

        Some(Self::with_quality(essence, quality))
    }

    /// Essence of a `Content-Type` header value, parameters removed
    pub fn essence_of(content_type: &str) -> String {
        content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// True if this range covers the concrete `essence` (wildcards allowed on self)
    pub fn matches(&self, essence: &str) -> bool {
        let essence = essence.to_ascii_lowercase();
        if self.essence == "*/*" || self.essence == essence {
            return true;
        }
        match self.essence.strip_suffix("/*") {
            Some(main_type) => essence.split('/').next() == Some(main_type),
            None => false,
        }
    }

    fn specificity(&self) -> u8 {
        if self.essence == "*/*" {
            0
        } else if self.essence.ends_with("/*") {
            1
        } else {
            2
        }
    }
}

impl From<&Syntax> for MediaType {
    fn from(syntax: &Syntax) -> Self {
        Self::with_quality(syntax.media_type, syntax.quality)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quality < 1.0 {
            write!(f, "{};q={}", self.essence, self.quality)
        } else {
            f.write_str(&self.essence)
        }
    }
}

/// Media types of a syntax table, in table order
pub fn media_types(table: &[Syntax]) -> Vec<MediaType> {
    table.iter().map(MediaType::from).collect()
}

/// Parse an `Accept` header into media ranges, highest quality first.
///
/// Ties keep header order. A missing or empty header accepts anything.
pub fn parse_accept(header: Option<&str>) -> Vec<MediaType> {
    let mut ranges: Vec<MediaType> = header
        .unwrap_or_default()
        .split(',')
        .filter_map(MediaType::parse)
        .collect();

    if ranges.is_empty() {
        ranges.push(MediaType::new("*/*"));
    }

    ranges.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranges
}

/// Render an ordered list of media types as an `Accept` header value
pub fn accept_header(accepted: &[MediaType]) -> String {
    accepted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick the offered syntax the client weighs highest.
///
/// The weight of an offer is the quality of the most specific range that
/// matches it; ranges with `q=0` exclude. Ties resolve to offer order.
pub fn negotiate(accept: &[MediaType], offered: &[Syntax]) -> Option<&'static str> {
    let mut best: Option<(&'static str, f32)> = None;

    for offer in offered {
        let weight = accept
            .iter()
            .filter(|range| range.matches(offer.media_type))
            .max_by_key(|range| range.specificity())
            .map(|range| range.quality)
            .unwrap_or(0.0);

        if weight <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, best_weight)| weight > best_weight) {
            best = Some((offer.media_type, weight));
        }
    }

    best.map(|(media_type, _)| media_type)
}

/// True if the header names one of `table`'s syntaxes explicitly; wildcards do not count.
pub fn names_any(accept: &[MediaType], table: &[Syntax]) -> bool {
    accept.iter().any(|range| {
        range.quality > 0.0 && table.iter().any(|syntax| syntax.media_type == range.essence)
    })
}

/// Accept list for an outbound request: the preferred type first, then the rest of
/// the table with lowered weights.
pub fn preferring(preferred: &str, table: &[Syntax]) -> Vec<MediaType> {
    let mut accepted = vec![MediaType::new(preferred)];
    accepted.extend(
        table
            .iter()
            .filter(|syntax| syntax.media_type != preferred)
            .map(|syntax| MediaType::with_quality(syntax.media_type, syntax.quality * 0.5)),
    );
    accepted
}

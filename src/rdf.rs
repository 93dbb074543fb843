//! Codecs for RDF graphs and SPARQL result sets, keyed by media type.

use oxigraph::{
    io::{RdfFormat, RdfParser, RdfSerializer},
    model::{Dataset, Graph, Term, Triple, Variable},
    sparql::results::{
        QueryResultsFormat, QueryResultsParser, QueryResultsSerializer,
        ReaderQueryResultsParserOutput,
    },
};

use crate::{
    error::{Error, Result},
    media_types::{
        BOOLEAN_RESULT, MediaType, RDF_DATASET, READABLE_GRAPH, RESULT_SET, Syntax, WRITABLE_GRAPH,
    },
};

/// A decoded SELECT result: the projected variables and one row per solution.
///
/// Row cells are aligned with `variables`; `None` marks an unbound variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solutions {
    pub variables: Vec<Variable>,
    pub rows: Vec<Vec<Option<Term>>>,
}

impl Solutions {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value bound to `variable` in row `row`
    pub fn value(&self, row: usize, variable: &str) -> Option<&Term> {
        let column = self
            .variables
            .iter()
            .position(|v| v.as_str() == variable)?;
        self.rows.get(row)?.get(column)?.as_ref()
    }
}

/// A decoded SPARQL results document
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    Solutions(Solutions),
    Boolean(bool),
}

/// Essence of `content_type` when the table lists it
fn registered(content_type: &str, table: &[Syntax], kind: &str) -> Result<String> {
    let essence = MediaType::essence_of(content_type);
    if table.iter().any(|syntax| syntax.media_type == essence) {
        Ok(essence)
    } else {
        Err(Error::UnsupportedMediaType(format!(
            "'{essence}' is not a supported {kind} syntax"
        )))
    }
}

fn rdf_format(content_type: &str, table: &[Syntax], kind: &str) -> Result<RdfFormat> {
    let essence = registered(content_type, table, kind)?;
    RdfFormat::from_media_type(&essence)
        .ok_or_else(|| Error::UnsupportedMediaType(format!("'{essence}' is not an RDF syntax")))
}

fn results_format(content_type: &str, table: &[Syntax]) -> Result<QueryResultsFormat> {
    let essence = registered(content_type, table, "results")?;
    QueryResultsFormat::from_media_type(&essence).ok_or_else(|| {
        Error::UnsupportedMediaType(format!("'{essence}' is not a SPARQL results syntax"))
    })
}

/// Parse an RDF document into a graph.
///
/// Quad syntaxes (N-Quads, TriG) are accepted; graph names are dropped.
pub fn parse_graph(content_type: &str, body: &[u8]) -> Result<Graph> {
    let format = rdf_format(content_type, READABLE_GRAPH, "graph")?;
    let mut graph = Graph::new();

    for parsed in RdfParser::from_format(format).for_reader(body) {
        let quad = parsed.map_err(|e| Error::parse(format!("Invalid {format} document: {e}")))?;
        graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
    }

    Ok(graph)
}

pub fn serialize_graph(graph: &Graph, content_type: &str) -> Result<Vec<u8>> {
    let format = rdf_format(content_type, WRITABLE_GRAPH, "graph")?;
    let mut serializer = RdfSerializer::from_format(format).for_writer(Vec::new());
    for triple in graph.iter() {
        serializer.serialize_triple(triple)?;
    }
    Ok(serializer.finish()?)
}

/// Parse an N-Quads or TriG document, keeping graph names.
pub fn parse_dataset(content_type: &str, body: &[u8]) -> Result<Dataset> {
    let format = rdf_format(content_type, RDF_DATASET, "dataset")?;
    let mut dataset = Dataset::new();

    for parsed in RdfParser::from_format(format).for_reader(body) {
        let quad = parsed.map_err(|e| Error::parse(format!("Invalid {format} document: {e}")))?;
        dataset.insert(&quad);
    }

    Ok(dataset)
}

pub fn serialize_dataset(dataset: &Dataset, content_type: &str) -> Result<Vec<u8>> {
    let format = rdf_format(content_type, RDF_DATASET, "dataset")?;
    let mut serializer = RdfSerializer::from_format(format).for_writer(Vec::new());
    for quad in dataset.iter() {
        serializer.serialize_quad(quad)?;
    }
    Ok(serializer.finish()?)
}

/// Parse a SPARQL results document (solutions or boolean)
pub fn parse_results(content_type: &str, body: &[u8]) -> Result<ResultSet> {
    let format = results_format(content_type, RESULT_SET)?;
    let output = QueryResultsParser::from_format(format)
        .for_reader(body)
        .map_err(|e| Error::parse(format!("Invalid {format} results: {e}")))?;

    match output {
        ReaderQueryResultsParserOutput::Boolean(value) => Ok(ResultSet::Boolean(value)),
        ReaderQueryResultsParserOutput::Solutions(parser) => {
            let variables = parser.variables().to_vec();
            let mut rows = Vec::new();
            for solution in parser {
                let solution =
                    solution.map_err(|e| Error::parse(format!("Invalid {format} results: {e}")))?;
                rows.push(
                    variables
                        .iter()
                        .map(|variable| solution.get(variable).cloned())
                        .collect(),
                );
            }
            Ok(ResultSet::Solutions(Solutions { variables, rows }))
        }
    }
}

pub fn serialize_solutions(solutions: &Solutions, content_type: &str) -> Result<Vec<u8>> {
    let format = results_format(content_type, RESULT_SET)?;
    let mut serializer = QueryResultsSerializer::from_format(format)
        .serialize_solutions_to_writer(Vec::new(), solutions.variables.clone())?;

    for row in &solutions.rows {
        serializer.serialize(
            solutions
                .variables
                .iter()
                .zip(row)
                .filter_map(|(variable, term)| {
                    term.as_ref().map(|term| (variable.as_ref(), term.as_ref()))
                }),
        )?;
    }

    Ok(serializer.finish()?)
}

pub fn serialize_boolean(value: bool, content_type: &str) -> Result<Vec<u8>> {
    let format = results_format(content_type, BOOLEAN_RESULT)?;
    Ok(QueryResultsSerializer::from_format(format).serialize_boolean_to_writer(Vec::new(), value)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::media_types::{
        APPLICATION_N_QUADS, APPLICATION_N_TRIPLES, APPLICATION_RDF_XML,
        APPLICATION_SPARQL_RESULTS_JSON, APPLICATION_SPARQL_RESULTS_XML, APPLICATION_TRIG,
        TEXT_CSV, TEXT_TURTLE,
    };

    const TURTLE: &str = r#"
        @prefix ex: <http://example.org/> .
        ex:alice ex:knows ex:bob ;
                 ex:name "Alice" .
    "#;

    #[test]
    fn parses_turtle_and_reserializes() {
        let graph = parse_graph("text/turtle; charset=utf-8", TURTLE.as_bytes()).unwrap();
        assert_eq!(graph.len(), 2);

        for syntax in [APPLICATION_N_TRIPLES, TEXT_TURTLE, APPLICATION_RDF_XML] {
            let bytes = serialize_graph(&graph, syntax).unwrap();
            let reparsed = parse_graph(syntax, &bytes).unwrap();
            assert_eq!(reparsed, graph, "{syntax}");
        }
    }

    #[test]
    fn flattens_quads_into_triples() {
        let nquads = "<http://a> <http://b> <http://c> <http://g> .\n";
        let graph = parse_graph(APPLICATION_N_QUADS, nquads.as_bytes()).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn keeps_graph_names_of_quads() {
        let nquads = "<http://a> <http://b> <http://c> <http://g> .\n<http://a> <http://b> \"d\" .";
        let dataset = parse_dataset(APPLICATION_N_QUADS, nquads.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 2);

        let trig = serialize_dataset(&dataset, APPLICATION_TRIG).unwrap();
        assert_eq!(parse_dataset(APPLICATION_TRIG, &trig).unwrap(), dataset);
        assert!(matches!(
            parse_dataset(TEXT_TURTLE, b""),
            Err(Error::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn only_registered_syntaxes_are_used() {
        // JSON-LD is known to the parser but not offered here
        assert!(matches!(
            parse_graph("application/json", b"{}"),
            Err(Error::UnsupportedMediaType(_))
        ));
        let graph = parse_graph(TEXT_TURTLE, b"<http://a> <http://b> <http://c> .").unwrap();
        assert!(matches!(
            serialize_graph(&graph, APPLICATION_N_QUADS),
            Err(Error::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            serialize_boolean(true, TEXT_CSV),
            Err(Error::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn rejects_unknown_and_malformed_payloads() {
        assert!(matches!(
            parse_graph("text/html", b"<html/>"),
            Err(Error::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            parse_graph(TEXT_TURTLE, b"this is not turtle"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn parses_json_solutions() {
        let json = r#"{
            "head": { "vars": ["s", "o"] },
            "results": { "bindings": [
                { "s": { "type": "uri", "value": "http://example.org/a" } },
                { "s": { "type": "uri", "value": "http://example.org/b" },
                  "o": { "type": "literal", "value": "x" } }
            ] }
        }"#;

        let ResultSet::Solutions(solutions) =
            parse_results(APPLICATION_SPARQL_RESULTS_JSON, json.as_bytes()).unwrap()
        else {
            panic!("expected solutions");
        };
        assert_eq!(solutions.len(), 2);
        assert!(solutions.value(0, "o").is_none());
        assert_eq!(solutions.value(1, "o").unwrap().to_string(), "\"x\"");

        let xml = serialize_solutions(&solutions, APPLICATION_SPARQL_RESULTS_XML).unwrap();
        let reparsed = parse_results(APPLICATION_SPARQL_RESULTS_XML, &xml).unwrap();
        assert_eq!(reparsed, ResultSet::Solutions(solutions));
    }

    #[test]
    fn boolean_results() {
        let bytes = serialize_boolean(true, APPLICATION_SPARQL_RESULTS_JSON).unwrap();
        assert_eq!(
            parse_results(APPLICATION_SPARQL_RESULTS_JSON, &bytes).unwrap(),
            ResultSet::Boolean(true)
        );
        assert!(matches!(
            parse_results(TEXT_TURTLE, &bytes),
            Err(Error::UnsupportedMediaType(_))
        ));
    }
}

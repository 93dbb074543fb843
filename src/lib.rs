//! Client for the SPARQL 1.1 Protocol and the Graph Store HTTP Protocol, and a
//! mirror that re-issues inbound protocol requests against a dataset.
//!
//! The [`client`] module talks to remote services; [`proxy`] answers inbound
//! requests from a [`dataset::Dataset`], either a remote origin or an in-memory
//! store; [`http_api`] binds the proxy to an HTTP listener.

pub mod client;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod endpoint;
pub mod error;
pub mod hash;
pub mod http_api;
pub mod logger;
pub mod media_types;
pub mod params;
pub mod proxy;
pub mod rdf;
pub mod statement;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;

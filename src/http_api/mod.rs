mod protocol_controller;
mod router;

pub use router::{HttpApiConfig, HttpApiRouter};

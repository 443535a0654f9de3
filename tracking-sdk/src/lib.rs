//! Client and response-shaping pipeline for a JSON:API container tracking service.
//!
//! Raw JSON:API documents are resolved into a [`jsonapi::ResourceGraph`], optionally
//! mapped into domain models, narrowed by [`fields::FieldPaths`] and returned in the
//! [`format::ResponseFormat`] a caller asks for. Listings can be drained page by page
//! and single resources polled until a condition holds.

pub mod client;
pub mod config;
pub mod error;
pub mod fields;
pub mod format;
pub mod jsonapi;
pub mod models;
pub mod pagination;
pub mod polling;
pub mod prelude;
pub mod transport;

pub use client::{ContainerFilters, NewTrackingRequest, ShipmentFilters, TrackingClient};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, Error, MappingError, ParseError, PollError, Result};
pub use fields::{FieldPaths, project_fields};
pub use format::{CallOptions, Formatted, ListOptions, ResponseFormat, resolve};
pub use jsonapi::{
    Document, NodeId, Page, ResourceGraph, ResourceKey, map_collection, map_document, map_page,
};
pub use pagination::{drain, drain_from, drain_stream, write_ndjson};
pub use polling::{PollOptions, UntilCondition, poll_until};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

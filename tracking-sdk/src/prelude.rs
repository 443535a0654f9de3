//! The types most callers of `tracking-sdk` need.

pub use crate::{
    client::{ContainerFilters, ShipmentFilters, TrackingClient},
    config::ClientConfig,
    error::{ApiError, Error, PollError},
    fields::FieldPaths,
    format::{CallOptions, Formatted, ListOptions, ResponseFormat},
    jsonapi::Page,
    models::{Container, Shipment, TrackingRequest},
    polling::{PollOptions, UntilCondition},
};

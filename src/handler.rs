//! Tool surface over [`TrackingClient`].
//!
//! Every tool honours `format` (raw, mapped or both) and `fields` (comma separated dot
//! paths applied to the shaped result). Listing tools either return one page or, with
//! `all`, drain the listing and answer with one JSON line per page.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracking_sdk::client::NewTrackingRequest;
use tracking_sdk::models::{Container, TrackingRequestType};
use tracking_sdk::pagination::{
    DEFAULT_START_PAGE, drain_stream, is_last_page_by_links, write_ndjson,
};
use tracking_sdk::{
    CallOptions, ContainerFilters, FieldPaths, Formatted, ListOptions, Page, PollOptions,
    ResponseFormat, ShipmentFilters, TrackingClient, Transport, UntilCondition, poll_until,
};

use crate::error::ServerError;
use crate::server::ToolHandler;
use crate::tools::{Tool, ToolInputSchema, ToolProperty, ToolResponse};

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 30;

pub struct TrackingToolHandler<T: Transport> {
    client: TrackingClient<T>,
    shutdown: watch::Receiver<bool>,
}

/// Shaping arguments shared by every tool.
struct Shape {
    format: Option<ResponseFormat>,
    fields: FieldPaths,
}

impl Shape {
    fn from_args(args: &Value) -> Result<Self, ServerError> {
        let format = extract_optional!(args, "format", String)
            .map(|format| {
                format.parse::<ResponseFormat>().map_err(|err| ServerError::InvalidParameter {
                    name: "format",
                    reason: err.to_string(),
                })
            })
            .transpose()?;
        let fields = extract_optional!(args, "fields", String)
            .map(|fields| FieldPaths::parse(&fields))
            .unwrap_or_default();
        Ok(Shape { format, fields })
    }

    fn call_options(&self) -> CallOptions {
        CallOptions { format: self.format }
    }

    fn apply<M: Serialize>(&self, result: &Formatted<Value, M>) -> Result<Value, ServerError> {
        Ok(self.fields.project(&result.to_value()?))
    }

    fn respond<M: Serialize>(
        &self,
        result: &Formatted<Value, M>,
    ) -> Result<ToolResponse, ServerError> {
        Ok(ToolResponse::json(&self.apply(result)?)?)
    }
}

fn to_u32(name: &'static str, value: u64) -> Result<u32, ServerError> {
    u32::try_from(value).map_err(|_| ServerError::InvalidParameter {
        name,
        reason: format!("{value} is out of range"),
    })
}

fn split_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).collect()
}

#[async_trait]
impl<T: Transport> ToolHandler for TrackingToolHandler<T> {
    async fn call_tool(&self, name: &str, args: &Value) -> Result<ToolResponse, ServerError> {
        match name {
            "search_container" => self.search_container(args).await,
            "get_container" => self.get_container(args).await,
            "get_shipment" => self.get_shipment(args).await,
            "list_containers" => self.list_containers(args).await,
            "list_shipments" => self.list_shipments(args).await,
            "list_tracking_requests" => self.list_tracking_requests(args).await,
            "list_shipping_lines" => self.list_shipping_lines(args).await,
            "get_container_route" => self.get_container_route(args).await,
            "get_container_transport_events" => self.get_container_transport_events(args).await,
            "track_container" => self.track_container(args).await,
            "wait_for_container" => self.wait_for_container(args).await,
            _ => Err(ServerError::UnknownTool(name.into())),
        }
    }

    async fn on_tool_called(&self, name: &str) {
        info!(tool = name, "Executing tool");
    }

    async fn on_tool_completed(&self, name: &str, success: bool) {
        info!(tool = name, success, "Tool completed");
    }
}

impl<T: Transport> TrackingToolHandler<T> {
    pub fn new(client: TrackingClient<T>, shutdown: watch::Receiver<bool>) -> Self {
        Self { client, shutdown }
    }

    async fn search_container(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let query = extract_required!(args, "query", String);
        let shape = Shape::from_args(args)?;
        let result = self.client.search(&query, shape.call_options()).await?;
        shape.respond(&result)
    }

    async fn get_container(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let id = extract_required!(args, "id", String);
        let include = extract_optional!(args, "include", String);
        let shape = Shape::from_args(args)?;

        let include = include.as_deref().map(split_list);
        let result = self
            .client
            .get_container(&id, include.as_deref(), shape.call_options())
            .await?;
        shape.respond(&result)
    }

    async fn get_shipment(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let id = extract_required!(args, "id", String);
        let include_containers = extract_optional!(args, "include_containers", bool, true);
        let shape = Shape::from_args(args)?;

        let result = self
            .client
            .get_shipment(&id, include_containers, shape.call_options())
            .await?;
        shape.respond(&result)
    }

    async fn get_container_route(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let id = extract_required!(args, "id", String);
        let shape = Shape::from_args(args)?;
        let result = self.client.get_container_route(&id, shape.call_options()).await?;
        shape.respond(&result)
    }

    async fn get_container_transport_events(
        &self,
        args: &Value,
    ) -> Result<ToolResponse, ServerError> {
        let id = extract_required!(args, "id", String);
        let shape = Shape::from_args(args)?;
        let result = self
            .client
            .get_container_transport_events(&id, shape.call_options())
            .await?;
        shape.respond(&result)
    }

    async fn list_shipping_lines(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let search = extract_optional!(args, "search", String);
        let shape = Shape::from_args(args)?;
        let result = self
            .client
            .list_shipping_lines(search.as_deref(), shape.call_options())
            .await?;
        shape.respond(&result)
    }

    async fn list_containers(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let filters = ContainerFilters {
            status: extract_optional!(args, "status", String),
            port: extract_optional!(args, "port", String),
            carrier: extract_optional!(args, "carrier", String),
            updated_after: extract_optional!(args, "updated_after", String),
            include: extract_optional!(args, "include", String),
        };
        let client = &self.client;
        let filters = &filters;
        self.list_tool(args, move |options| client.list_containers(filters, options)).await
    }

    async fn list_shipments(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let filters = ShipmentFilters {
            status: extract_optional!(args, "status", String),
            port: extract_optional!(args, "port", String),
            carrier: extract_optional!(args, "carrier", String),
            updated_after: extract_optional!(args, "updated_after", String),
            include_containers: extract_optional!(args, "include_containers", bool, true),
        };
        let client = &self.client;
        let filters = &filters;
        self.list_tool(args, move |options| client.list_shipments(filters, options)).await
    }

    async fn list_tracking_requests(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let mut filters = Vec::new();
        if let Some(status) = extract_optional!(args, "status", String) {
            filters.push(("filter[status]".to_string(), status));
        }
        if let Some(number) = extract_optional!(args, "request_number", String) {
            filters.push(("filter[request_number]".to_string(), number));
        }
        let client = &self.client;
        let filters = filters.as_slice();
        self.list_tool(args, move |options| client.list_tracking_requests(filters, options))
            .await
    }

    /// One page, or every page when `all` is set, bounded by `max_pages`.
    async fn list_tool<M, F, Fut>(
        &self,
        args: &Value,
        fetch: F,
    ) -> Result<ToolResponse, ServerError>
    where
        M: Serialize,
        F: Fn(ListOptions) -> Fut,
        Fut: Future<Output = Result<Formatted<Value, Page<M>>, tracking_sdk::Error>>,
    {
        let shape = Shape::from_args(args)?;
        let start = extract_optional!(args, "page", u64, DEFAULT_START_PAGE as u64);
        let start = to_u32("page", start)?.max(1);
        let page_size = extract_optional!(args, "page_size", u64)
            .map(|size| to_u32("page_size", size))
            .transpose()?;
        let all = extract_optional!(args, "all", bool, false);

        let base = ListOptions {
            format: shape.format,
            page: None,
            page_size,
        };

        if !all {
            let result = fetch(base.page(start)).await?;
            return shape.respond(&result);
        }

        let max_pages = extract_optional!(args, "max_pages", u64, DEFAULT_MAX_PAGES as u64);
        let max_pages = to_u32("max_pages", max_pages)?.max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let base = base.page_size(page_size);

        let pages = drain_stream(
            |page| fetch(base.page(page)),
            |result: &Formatted<Value, Page<M>>, page| {
                let last = match (result.raw(), result.mapped()) {
                    (Some(raw), _) => is_last_page_by_links(raw, page_size),
                    (None, Some(mapped)) => mapped.is_last(page_size),
                    (None, None) => true,
                };
                if !last && page - start + 1 >= max_pages {
                    warn!(max_pages, "Stopping listing at page cap");
                    return true;
                }
                last
            },
            start,
        )
        .map(|page| page.map_err(ServerError::from).and_then(|result| shape.apply(&result)));

        let mut out = Vec::new();
        let written = write_ndjson(pages, &mut out).await?;
        info!(pages = written, "Listing drained");
        Ok(ToolResponse::new(String::from_utf8_lossy(&out), false))
    }

    async fn track_container(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let request_number = extract_required!(args, "number", String);
        let request_type = extract_optional!(args, "request_type", String)
            .map(|kind| {
                kind.parse::<TrackingRequestType>()
                    .map_err(|err| ServerError::InvalidParameter {
                        name: "request_type",
                        reason: err.to_string(),
                    })
            })
            .transpose()?
            .unwrap_or(TrackingRequestType::Container);
        let ref_numbers = extract_optional!(args, "ref_numbers", String)
            .map(|refs| split_list(&refs).into_iter().map(String::from).collect())
            .unwrap_or_default();
        let params = NewTrackingRequest {
            request_type,
            request_number,
            scac: extract_optional!(args, "scac", String),
            ref_numbers,
            shipment_tags: Vec::new(),
        };
        let shape = Shape::from_args(args)?;

        let result = self
            .client
            .create_tracking_request(&params, shape.call_options())
            .await?;
        shape.respond(&result)
    }

    async fn wait_for_container(&self, args: &Value) -> Result<ToolResponse, ServerError> {
        let id = extract_required!(args, "id", String);
        let until = extract_required!(args, "until", String);
        let until: UntilCondition = until.parse().map_err(|err: tracking_sdk::ParseError| {
            ServerError::InvalidParameter {
                name: "until",
                reason: err.to_string(),
            }
        })?;
        let interval =
            extract_optional!(args, "interval_ms", u64, DEFAULT_WAIT_INTERVAL.as_millis() as u64);
        let max_attempts = to_u32(
            "max_attempts",
            extract_optional!(args, "max_attempts", u64, DEFAULT_WAIT_ATTEMPTS as u64),
        )?;
        let shape = Shape::from_args(args)?;

        let options = PollOptions::new(Duration::from_millis(interval))
            .max_attempts(max_attempts)
            .cancel_on(self.shutdown.clone());
        let client = &self.client;
        let id = id.as_str();

        // The condition is evaluated on the mapped view; the answer keeps the requested shape.
        let result = poll_until(
            move |_| client.get_container(id, None, CallOptions::with_format(ResponseFormat::Both)),
            |result: &Formatted<Value, Option<Container>>| {
                result
                    .mapped()
                    .and_then(|mapped| serde_json::to_value(mapped).ok())
                    .is_some_and(|value| until.matches(&value))
            },
            options,
        )
        .await?;

        let format = shape.call_options().effective_format(self.client.config().default_format);
        shape.respond(&narrow(result, format))
    }
}

/// Reduces a `Both` result to the view `format` asks for.
fn narrow<R, M>(result: Formatted<R, M>, format: ResponseFormat) -> Formatted<R, M> {
    match (result, format) {
        (Formatted::Both { raw, .. }, ResponseFormat::Raw) => Formatted::Raw(raw),
        (Formatted::Both { mapped, .. }, ResponseFormat::Mapped) => Formatted::Mapped(mapped),
        (result, _) => result,
    }
}

fn shaping_properties() -> [(&'static str, ToolProperty); 2] {
    [
        (
            "format",
            ToolProperty::one_of(
                "Response shape: raw JSON:API document, mapped objects, or both",
                &["raw", "mapped", "both"],
            ),
        ),
        (
            "fields",
            ToolProperty::string(
                "Comma separated dot paths to keep, e.g. `number,shipment.billOfLadingNumber`",
            ),
        ),
    ]
}

fn paging_properties() -> [(&'static str, ToolProperty); 4] {
    [
        ("page", ToolProperty::integer("Page number to fetch (default 1)")),
        ("page_size", ToolProperty::integer("Results per page")),
        ("all", ToolProperty::boolean("Fetch every page, one JSON line per page", false)),
        (
            "max_pages",
            ToolProperty::integer("Upper bound on pages fetched with `all` (default 50)"),
        ),
    ]
}

fn filter_properties() -> [(&'static str, ToolProperty); 4] {
    [
        ("status", ToolProperty::string("Filter by status")),
        ("port", ToolProperty::string("Filter by port of discharge UN/LOCODE")),
        ("carrier", ToolProperty::string("Filter by shipping line SCAC")),
        (
            "updated_after",
            ToolProperty::string("Only records updated after this ISO 8601 timestamp"),
        ),
    ]
}

fn tool(
    name: &str,
    description: &str,
    properties: Vec<(&'static str, ToolProperty)>,
    required: &[&str],
) -> Tool {
    let properties = properties.into_iter().chain(shaping_properties());
    Tool {
        name: name.into(),
        description: description.into(),
        input_schema: ToolInputSchema::object(properties, required),
    }
}

pub fn tool_definitions() -> Vec<Tool> {
    let id = || ("id", ToolProperty::string("Tracking API resource ID (UUID)"));
    let include_containers = || {
        (
            "include_containers",
            ToolProperty::boolean("Include the shipment's containers", true),
        )
    };

    vec![
        tool(
            "search_container",
            "Find containers and shipments by container, booking, BL or reference number.",
            vec![(
                "query",
                ToolProperty::string("Container, booking, BL or reference number"),
            )],
            &["query"],
        ),
        tool(
            "get_container",
            "Get a container with its status, holds, last free day and related shipment.",
            vec![
                id(),
                (
                    "include",
                    ToolProperty::string(
                        "Comma separated relationships (default shipment,pod_terminal)",
                    ),
                ),
            ],
            &["id"],
        ),
        tool(
            "get_shipment",
            "Get a shipment with its ports, vessel and (optionally) containers.",
            vec![id(), include_containers()],
            &["id"],
        ),
        tool(
            "list_containers",
            "List tracked containers.",
            filter_properties()
                .into_iter()
                .chain(paging_properties())
                .chain([("include", ToolProperty::string("Comma separated relationships"))])
                .collect(),
            &[],
        ),
        tool(
            "list_shipments",
            "List tracked shipments.",
            filter_properties()
                .into_iter()
                .chain(paging_properties())
                .chain([include_containers()])
                .collect(),
            &[],
        ),
        tool(
            "list_tracking_requests",
            "List tracking requests and their outcome.",
            paging_properties()
                .into_iter()
                .chain([
                    ("status", ToolProperty::string("Filter by request status")),
                    (
                        "request_number",
                        ToolProperty::string("Filter by container, booking or BL number"),
                    ),
                ])
                .collect(),
            &[],
        ),
        tool(
            "list_shipping_lines",
            "List supported shipping lines.",
            vec![("search", ToolProperty::string("Filter by carrier name or SCAC"))],
            &[],
        ),
        tool(
            "get_container_route",
            "Get the multi-leg route of a container with ports and vessels.",
            vec![id()],
            &["id"],
        ),
        tool(
            "get_container_transport_events",
            "Get the milestone events of a container.",
            vec![id()],
            &["id"],
        ),
        tool(
            "track_container",
            "Start tracking a container, bill of lading or booking number.",
            vec![
                ("number", ToolProperty::string("Container, bill of lading or booking number")),
                (
                    "request_type",
                    ToolProperty::one_of(
                        "Kind of number (default container)",
                        &["container", "bill_of_lading", "booking_number"],
                    ),
                ),
                ("scac", ToolProperty::string("Shipping line SCAC")),
                ("ref_numbers", ToolProperty::string("Comma separated reference numbers")),
            ],
            &["number"],
        ),
        tool(
            "wait_for_container",
            "Poll a container until a field reaches a value, e.g. `availableForPickup=true`.",
            vec![
                id(),
                (
                    "until",
                    ToolProperty::string("Condition as path=value over the mapped container"),
                ),
                (
                    "interval_ms",
                    ToolProperty::integer("Delay between attempts (default 2000, minimum 250)"),
                ),
                ("max_attempts", ToolProperty::integer("Attempts before giving up (default 30)")),
            ],
            &["id", "until"],
        ),
    ]
}

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, Error, MappingError, extract_error_message};
use crate::format::{CallOptions, Formatted, ListOptions, resolve};
use crate::jsonapi::{Page, map_collection, map_document, map_page};
use crate::models::{
    Container, DomainObject, Route, Shipment, ShippingLine, TrackingRequest, TrackingRequestType,
    TransportEvent,
};
use crate::transport::{ApiRequest, HttpTransport, Transport};

pub const DEFAULT_CONTAINER_INCLUDE: &[&str] = &["shipment", "pod_terminal"];
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const SHIPMENT_INCLUDE: &str =
    "pod_terminal,port_of_lading,port_of_discharge,destination,destination_terminal";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilters {
    pub status: Option<String>,
    pub port: Option<String>,
    pub carrier: Option<String>,
    pub updated_after: Option<String>,
    /// Comma separated relationships; defaults to `shipment,pod_terminal`.
    pub include: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentFilters {
    pub status: Option<String>,
    pub port: Option<String>,
    pub carrier: Option<String>,
    pub updated_after: Option<String>,
    pub include_containers: bool,
}

impl ContainerFilters {
    fn query_pairs(&self) -> Vec<(String, String)> {
        filter_pairs(&self.status, &self.port, &self.carrier, &self.updated_after)
    }
}

impl ShipmentFilters {
    fn query_pairs(&self) -> Vec<(String, String)> {
        filter_pairs(&self.status, &self.port, &self.carrier, &self.updated_after)
    }
}

impl Default for ShipmentFilters {
    fn default() -> Self {
        Self {
            status: None,
            port: None,
            carrier: None,
            updated_after: None,
            include_containers: true,
        }
    }
}

fn filter_pairs(
    status: &Option<String>,
    port: &Option<String>,
    carrier: &Option<String>,
    updated_after: &Option<String>,
) -> Vec<(String, String)> {
    [
        ("filter[status]", status),
        ("filter[pod_locode]", port),
        ("filter[line_scac]", carrier),
        ("filter[updated_at]", updated_after),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_ref().map(|value| (key.to_string(), value.clone())))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrackingRequest {
    pub request_type: TrackingRequestType,
    pub request_number: String,
    pub scac: Option<String>,
    pub ref_numbers: Vec<String>,
    pub shipment_tags: Vec<String>,
}

/// Client for the container tracking API.
///
/// Every call returns a [`Formatted`] value shaped by the call's format, falling back
/// to [`ClientConfig::default_format`].
#[derive(Debug, Clone)]
pub struct TrackingClient<T: Transport = HttpTransport> {
    transport: T,
    config: ClientConfig,
}

impl TrackingClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> TrackingClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        if config.api_token.trim().is_empty() {
            return Err(ApiError::Authentication {
                status: None,
                message: "API token is required".into(),
            });
        }
        Ok(Self { transport, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a request, retrying rate limits and server errors with exponential backoff.
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let mut attempt = 0;
        loop {
            let response = self.transport.send(&request).await?;
            if response.is_success() {
                return Ok(response.body.unwrap_or(Value::Null));
            }

            let status = response.status;
            if (status == 429 || status >= 500) && attempt < self.config.max_retries {
                let delay = backoff_delay(attempt);
                warn!(status, attempt, ?delay, path = %request.path, "Retrying request");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let message = extract_error_message(response.body.as_ref());
            return Err(ApiError::from_status(status, message, response.body));
        }
    }

    fn shape<M>(
        &self,
        raw: Value,
        options: CallOptions,
        map: impl FnOnce(&Value) -> Result<M, MappingError>,
    ) -> Result<Formatted<Value, M>, Error> {
        let format = options.effective_format(self.config.default_format);
        debug!(%format, "Shaping response");
        Ok(resolve(raw, format, map)?)
    }

    /// Free-text lookup by container, booking, bill of lading or reference number.
    ///
    /// Hits come back as `search_result` resources; older responses carry containers and
    /// shipments directly, so the mapped view dispatches on each resource's type.
    pub async fn search(
        &self,
        query: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Vec<DomainObject>>, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::Validation {
                status: 400,
                message: "Search query is required".into(),
                details: None,
            }
            .into());
        }
        let raw = self.execute(ApiRequest::get("/search").query("query", query)).await?;
        self.shape(raw, options, map_collection)
    }

    pub async fn get_container(
        &self,
        id: &str,
        include: Option<&[&str]>,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<Container>>, Error> {
        let include = include.unwrap_or(DEFAULT_CONTAINER_INCLUDE);
        let mut request = ApiRequest::get(format!("/containers/{id}"));
        if !include.is_empty() {
            request = request.query("include", include.join(","));
        }
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn list_containers(
        &self,
        filters: &ContainerFilters,
        options: ListOptions,
    ) -> Result<Formatted<Value, Page<Container>>, Error> {
        let include = filters
            .include
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTAINER_INCLUDE.join(","));
        let request = ApiRequest::get("/containers")
            .query("include", include)
            .query_pairs(filters.query_pairs())
            .query_pairs(options.query_pairs());
        let raw = self.execute(request).await?;
        self.shape(raw, options.call_options(), map_page)
    }

    pub async fn get_container_transport_events(
        &self,
        id: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Vec<TransportEvent>>, Error> {
        let request = ApiRequest::get(format!("/containers/{id}/transport_events"))
            .query("include", "location,terminal");
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_collection)
    }

    pub async fn get_container_route(
        &self,
        id: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<Route>>, Error> {
        let request = ApiRequest::get(format!("/containers/{id}/route"))
            .query("include", "port,vessel,route_location");
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn refresh_container(
        &self,
        id: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<Value>>, Error> {
        let request = ApiRequest::patch(format!("/containers/{id}/refresh"), None);
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn get_shipment(
        &self,
        id: &str,
        include_containers: bool,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<Shipment>>, Error> {
        let request = ApiRequest::get(format!("/shipments/{id}"))
            .query("include", shipment_include(include_containers));
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn list_shipments(
        &self,
        filters: &ShipmentFilters,
        options: ListOptions,
    ) -> Result<Formatted<Value, Page<Shipment>>, Error> {
        let request = ApiRequest::get("/shipments")
            .query("include", shipment_include(filters.include_containers))
            .query_pairs(filters.query_pairs())
            .query_pairs(options.query_pairs());
        let raw = self.execute(request).await?;
        self.shape(raw, options.call_options(), map_page)
    }

    pub async fn stop_tracking_shipment(
        &self,
        id: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<Shipment>>, Error> {
        let request = ApiRequest::patch(format!("/shipments/{id}/stop_tracking"), None);
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn resume_tracking_shipment(
        &self,
        id: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<Shipment>>, Error> {
        let request = ApiRequest::patch(format!("/shipments/{id}/resume_tracking"), None);
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn list_shipping_lines(
        &self,
        search: Option<&str>,
        options: CallOptions,
    ) -> Result<Formatted<Value, Vec<ShippingLine>>, Error> {
        let mut request = ApiRequest::get("/shipping_lines");
        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            request = request.query("search", search.trim());
        }
        let raw = self.execute(request).await?;
        self.shape(raw, options, map_collection)
    }

    pub async fn list_tracking_requests(
        &self,
        filters: &[(String, String)],
        options: ListOptions,
    ) -> Result<Formatted<Value, Page<TrackingRequest>>, Error> {
        let request = ApiRequest::get("/tracking_requests")
            .query_pairs(filters.iter().cloned())
            .query_pairs(options.query_pairs());
        let raw = self.execute(request).await?;
        self.shape(raw, options.call_options(), map_page)
    }

    pub async fn get_tracking_request(
        &self,
        id: &str,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<TrackingRequest>>, Error> {
        let raw = self.execute(ApiRequest::get(format!("/tracking_requests/{id}"))).await?;
        self.shape(raw, options, map_document)
    }

    pub async fn create_tracking_request(
        &self,
        params: &NewTrackingRequest,
        options: CallOptions,
    ) -> Result<Formatted<Value, Option<TrackingRequest>>, Error> {
        let number = params.request_number.trim();
        if number.is_empty() {
            return Err(ApiError::Validation {
                status: 400,
                message: "request_number is required (/data/attributes/request_number)".into(),
                details: None,
            }
            .into());
        }

        let mut attributes = json!({
            "request_type": params.request_type,
            "request_number": number,
        });
        if let Some(scac) = &params.scac {
            attributes["scac"] = json!(scac);
        }
        if !params.ref_numbers.is_empty() {
            attributes["ref_numbers"] = json!(params.ref_numbers);
        }
        if !params.shipment_tags.is_empty() {
            attributes["shipment_tags"] = json!(params.shipment_tags);
        }
        let body = json!({ "data": { "type": "tracking_request", "attributes": attributes } });

        let raw = self.execute(ApiRequest::post("/tracking_requests", body)).await?;
        self.shape(raw, options, map_document)
    }
}

/// `500ms * 2^attempt`, capped at one minute.
fn backoff_delay(attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| RETRY_BASE_DELAY.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

fn shipment_include(include_containers: bool) -> String {
    if include_containers {
        format!("containers,{SHIPMENT_INCLUDE}")
    } else {
        SHIPMENT_INCLUDE.to_string()
    }
}

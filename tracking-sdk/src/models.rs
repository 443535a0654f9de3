//! Typed domain objects produced from mapped resource nodes.
//!
//! Every model keeps the discriminating `type` and collects attributes it does not
//! name explicitly into `extra`. Relationships that were cut to break a cycle arrive
//! as identity stubs, which deserialize into a model with only `id` and `type` set.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{MappingError, ParseError};

/// To-many relationships without resolvable `data` render as `null`; they read as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub number: Option<String>,
    pub equipment_type: Option<String>,
    pub equipment_length: Option<u32>,
    pub equipment_height: Option<String>,
    pub weight_in_lbs: Option<f64>,
    pub available_for_pickup: Option<bool>,
    pub location_at_pod_terminal: Option<String>,
    pub pod_arrived_at: Option<String>,
    pub pod_discharged_at: Option<String>,
    pub pickup_lfd: Option<String>,
    pub pickup_appointment_at: Option<String>,
    pub holds_at_pod_terminal: Option<Vec<Value>>,
    pub fees_at_pod_terminal: Option<Vec<Value>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub shipment: Option<Box<Shipment>>,
    pub pod_terminal: Option<Box<Terminal>>,
    pub destination_terminal: Option<Box<Terminal>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transport_events: Vec<TransportEvent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub bill_of_lading_number: Option<String>,
    pub normalized_number: Option<String>,
    pub ref_numbers: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub shipping_line_scac: Option<String>,
    pub shipping_line_name: Option<String>,
    pub customer_name: Option<String>,
    pub port_of_lading_locode: Option<String>,
    pub pol_etd_at: Option<String>,
    pub pol_atd_at: Option<String>,
    pub port_of_discharge_locode: Option<String>,
    pub pod_eta_at: Option<String>,
    pub pod_original_eta_at: Option<String>,
    pub pod_ata_at: Option<String>,
    pub pod_vessel_name: Option<String>,
    pub pod_vessel_imo: Option<String>,
    pub pod_voyage_number: Option<String>,
    pub destination_locode: Option<String>,
    pub destination_name: Option<String>,
    pub destination_eta_at: Option<String>,
    pub line_tracking_stopped_at: Option<String>,
    pub line_tracking_stopped_reason: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub containers: Vec<Container>,
    pub port_of_lading: Option<Box<Port>>,
    pub port_of_discharge: Option<Box<Port>>,
    pub pod_terminal: Option<Box<Terminal>>,
    pub destination_terminal: Option<Box<Terminal>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingRequestType {
    Container,
    BillOfLading,
    BookingNumber,
}

impl FromStr for TrackingRequestType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(Self::Container),
            "bill_of_lading" => Ok(Self::BillOfLading),
            "booking" | "booking_number" => Ok(Self::BookingNumber),
            other => Err(ParseError::UnknownRequestType(other.into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequest {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub request_type: Option<String>,
    pub request_number: Option<String>,
    pub status: Option<String>,
    pub scac: Option<String>,
    pub ref_numbers: Option<Vec<String>>,
    pub failed_reason: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub shipment: Option<Box<Shipment>>,
    pub container: Option<Box<Container>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terminal {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub firms_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub locode: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vessel {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: Option<String>,
    pub imo: Option<String>,
    pub mmsi: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingLine {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub scac: Option<String>,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub bol_prefix: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: Option<String>,
    pub locode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEvent {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub event: Option<String>,
    pub voyage_number: Option<String>,
    pub timestamp: Option<String>,
    pub timezone: Option<String>,
    pub location: Option<Box<Location>>,
    pub terminal: Option<Box<Terminal>>,
    pub vessel: Option<Box<Vessel>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLocation {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub inbound_mode: Option<String>,
    pub inbound_scac: Option<String>,
    pub inbound_eta_at: Option<String>,
    pub inbound_ata_at: Option<String>,
    pub outbound_mode: Option<String>,
    pub outbound_scac: Option<String>,
    pub outbound_etd_at: Option<String>,
    pub outbound_atd_at: Option<String>,
    pub port: Option<Box<Port>>,
    pub inbound_vessel: Option<Box<Vessel>>,
    pub outbound_vessel: Option<Box<Vessel>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub route_locations: Vec<RouteLocation>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub company_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hit from the free-text search endpoint; `entity_type` tells containers from shipments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub entity_type: Option<String>,
    pub number: Option<String>,
    pub status: Option<String>,
    pub scac: Option<String>,
    pub ref_numbers: Option<Vec<String>>,
    pub containers_count: Option<u32>,
    pub port_of_lading_name: Option<String>,
    pub port_of_discharge_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Any mapped resource, dispatched on its `type`.
///
/// Types without a dedicated model are kept as their generic field map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainObject {
    Container(Container),
    Shipment(Shipment),
    TrackingRequest(TrackingRequest),
    Terminal(Terminal),
    Port(Port),
    Vessel(Vessel),
    ShippingLine(ShippingLine),
    TransportEvent(TransportEvent),
    Location(Location),
    Route(Route),
    RouteLocation(RouteLocation),
    Party(Party),
    SearchResult(SearchResult),
    Other(Map<String, Value>),
}

impl DomainObject {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(match kind.as_str() {
            "container" => Self::Container(serde_json::from_value(value)?),
            "shipment" => Self::Shipment(serde_json::from_value(value)?),
            "tracking_request" => Self::TrackingRequest(serde_json::from_value(value)?),
            "terminal" => Self::Terminal(serde_json::from_value(value)?),
            "port" => Self::Port(serde_json::from_value(value)?),
            "vessel" => Self::Vessel(serde_json::from_value(value)?),
            "shipping_line" => Self::ShippingLine(serde_json::from_value(value)?),
            "transport_event" => Self::TransportEvent(serde_json::from_value(value)?),
            "location" => Self::Location(serde_json::from_value(value)?),
            "route" => Self::Route(serde_json::from_value(value)?),
            "route_location" => Self::RouteLocation(serde_json::from_value(value)?),
            "party" => Self::Party(serde_json::from_value(value)?),
            "search_result" => Self::SearchResult(serde_json::from_value(value)?),
            _ => Self::Other(serde_json::from_value(value)?),
        })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Container(c) => Some(&c.id),
            Self::Shipment(s) => Some(&s.id),
            Self::TrackingRequest(t) => Some(&t.id),
            Self::Terminal(t) => Some(&t.id),
            Self::Port(p) => Some(&p.id),
            Self::Vessel(v) => Some(&v.id),
            Self::ShippingLine(s) => Some(&s.id),
            Self::TransportEvent(e) => Some(&e.id),
            Self::Location(l) => Some(&l.id),
            Self::Route(r) => Some(&r.id),
            Self::RouteLocation(r) => Some(&r.id),
            Self::Party(p) => Some(&p.id),
            Self::SearchResult(r) => Some(&r.id),
            Self::Other(fields) => fields.get("id").and_then(Value::as_str),
        }
    }
}

impl<'de> Deserialize<'de> for DomainObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        DomainObject::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Typed mapping of any document, one [`DomainObject`] per primary resource.
pub fn map_domain_objects(document: &Value) -> Result<Vec<DomainObject>, MappingError> {
    crate::jsonapi::map_collection(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatches_on_resource_type() {
        let doc = json!({
            "data": [
                { "type": "port", "id": "p1", "attributes": { "locode": "USLAX" } },
                { "type": "metro_area", "id": "m1", "attributes": { "name": "LA" } }
            ]
        });
        let objects = map_domain_objects(&doc).unwrap();
        match &objects[0] {
            DomainObject::Port(port) => assert_eq!(port.locode.as_deref(), Some("USLAX")),
            other => panic!("expected port, got {other:?}"),
        }
        match &objects[1] {
            DomainObject::Other(fields) => assert_eq!(fields["name"], "LA"),
            other => panic!("expected passthrough, got {other:?}"),
        }
        assert_eq!(objects[1].id(), Some("m1"));
    }

    #[test]
    fn search_hits_keep_entity_type() {
        let doc = json!({
            "data": [{
                "type": "search_result",
                "id": "r1",
                "attributes": { "entity_type": "cargo", "number": "CAIU2885402", "scac": "CMDU" }
            }]
        });
        match &map_domain_objects(&doc).unwrap()[0] {
            DomainObject::SearchResult(hit) => {
                assert_eq!(hit.entity_type.as_deref(), Some("cargo"));
                assert_eq!(hit.number.as_deref(), Some("CAIU2885402"));
            }
            other => panic!("expected search result, got {other:?}"),
        }
    }

    #[test]
    fn parses_request_types() {
        assert_eq!(
            "booking".parse::<TrackingRequestType>(),
            Ok(TrackingRequestType::BookingNumber)
        );
        assert_eq!(
            "container".parse::<TrackingRequestType>(),
            Ok(TrackingRequestType::Container)
        );
        assert!("vessel".parse::<TrackingRequestType>().is_err());
    }
}

use serde_json::{Value, json};
use tracking_sdk::jsonapi::{Link, ResourceGraph, ResourceKey, map_collection, map_document};
use tracking_sdk::models::{Container, Route, Shipment};

#[test]
fn mutual_references_terminate() {
    let doc = json!({
        "data": {
            "type": "shipment",
            "id": "s1",
            "relationships": { "containers": { "data": [{ "type": "container", "id": "c1" }] } }
        },
        "included": [{
            "type": "container",
            "id": "c1",
            "attributes": { "number": "TCLU1" },
            "relationships": { "shipment": { "data": { "type": "shipment", "id": "s1" } } }
        }]
    });

    let graph = ResourceGraph::from_value(&doc).unwrap();
    assert_eq!(graph.len(), 2);
    let shipment = graph.roots()[0];
    let container = graph.related_many(shipment, "containers")[0];
    assert_eq!(graph.related_one(container, "shipment"), Some(shipment));

    let rendered = graph.render(shipment);
    assert_eq!(rendered["containers"][0]["number"], "TCLU1");
    assert_eq!(rendered["containers"][0]["shipment"], json!({ "id": "s1", "type": "shipment" }));

    let mapped: Shipment = map_document(&doc).unwrap().unwrap();
    assert_eq!(mapped.containers[0].shipment.as_ref().unwrap().id, "s1");
}

#[test]
fn self_reference_renders_a_stub() {
    let doc = json!({
        "data": {
            "type": "container",
            "id": "c1",
            "relationships": { "previous": { "data": { "type": "container", "id": "c1" } } }
        }
    });
    let value: Value = map_document(&doc).unwrap().unwrap();
    assert_eq!(value["previous"], json!({ "id": "c1", "type": "container" }));
}

#[test]
fn every_included_reference_is_materialized() {
    let doc = json!({
        "data": [{
            "type": "container",
            "id": "c1",
            "relationships": {
                "shipment": { "data": { "type": "shipment", "id": "s1" } },
                "pod_terminal": { "data": { "type": "terminal", "id": "t1" } }
            }
        }],
        "included": [
            {
                "type": "shipment",
                "id": "s1",
                "relationships": { "port_of_discharge": { "data": { "type": "port", "id": "p1" } } }
            },
            { "type": "terminal", "id": "t1", "attributes": { "name": "Fenix" } },
            { "type": "port", "id": "p1", "attributes": { "locode": "USLAX" } }
        ]
    });

    let graph = ResourceGraph::from_value(&doc).unwrap();
    assert_eq!(graph.len(), 4);
    let port = graph.find(&ResourceKey::new("port", "p1")).unwrap();
    assert_eq!(graph.get(port).fields["locode"], "USLAX");

    let containers: Vec<Container> = map_collection(&doc).unwrap();
    let shipment = containers[0].shipment.as_ref().unwrap();
    assert_eq!(shipment.port_of_discharge.as_ref().unwrap().locode.as_deref(), Some("USLAX"));
    assert_eq!(containers[0].pod_terminal.as_ref().unwrap().name.as_deref(), Some("Fenix"));
}

#[test]
fn unresolved_references_become_null_or_are_dropped() {
    let doc = json!({
        "data": {
            "type": "shipment",
            "id": "s1",
            "relationships": {
                "pod_terminal": { "data": { "type": "terminal", "id": "missing" } },
                "containers": { "data": [
                    { "type": "container", "id": "c1" },
                    { "type": "container", "id": "missing" }
                ] }
            }
        },
        "included": [{ "type": "container", "id": "c1" }]
    });

    let graph = ResourceGraph::from_value(&doc).unwrap();
    let root = graph.roots()[0];
    assert_eq!(graph.get(root).links.get("podTerminal"), Some(&Link::One(None)));
    assert_eq!(graph.related_many(root, "containers").len(), 1);

    let value: Value = map_document(&doc).unwrap().unwrap();
    assert_eq!(value["podTerminal"], Value::Null);
    assert_eq!(value["containers"], json!([{ "id": "c1", "type": "container" }]));
}

#[test]
fn null_and_empty_primary_data() {
    let none: Option<Value> = map_document(&json!({ "data": null })).unwrap();
    assert_eq!(none, None);
    let empty: Vec<Value> = map_collection(&json!({ "data": [] })).unwrap();
    assert!(empty.is_empty());
    assert!(map_document::<Value>(&json!({ "data": [] })).is_err());
    assert!(ResourceGraph::from_value(&json!({ "included": [] })).is_err());
}

#[test]
fn to_many_relationships_without_data_map_to_empty() {
    for containers in [
        json!({ "links": { "related": "/v2/shipments/s1/containers" } }),
        json!({ "data": null }),
    ] {
        let doc = json!({
            "data": {
                "type": "shipment",
                "id": "s1",
                "attributes": { "bill_of_lading": "MEDU1" },
                "relationships": { "containers": containers }
            }
        });
        let shipment: Shipment = map_document(&doc).unwrap().unwrap();
        assert_eq!(shipment.bill_of_lading_number.as_deref(), Some("MEDU1"));
        assert!(shipment.containers.is_empty());
    }

    let doc = json!({
        "data": [{
            "type": "container",
            "id": "c1",
            "relationships": { "transport_events": { "data": null } }
        }]
    });
    let containers: Vec<Container> = map_collection(&doc).unwrap();
    assert!(containers[0].transport_events.is_empty());

    let doc = json!({
        "data": { "type": "route", "id": "r1", "relationships": { "route_locations": {} } }
    });
    let route: Route = map_document(&doc).unwrap().unwrap();
    assert!(route.route_locations.is_empty());
}

#[test]
fn shared_terminal_is_filled_in_under_both_containers() {
    let terminal = json!({ "data": { "type": "terminal", "id": "t1" } });
    let doc = json!({
        "data": {
            "type": "shipment",
            "id": "s1",
            "relationships": { "containers": { "data": [
                { "type": "container", "id": "c1" },
                { "type": "container", "id": "c2" }
            ] } }
        },
        "included": [
            { "type": "container", "id": "c1", "relationships": { "pod_terminal": terminal } },
            { "type": "container", "id": "c2", "relationships": { "pod_terminal": terminal } },
            {
                "type": "terminal",
                "id": "t1",
                "attributes": { "name": "Pier 400", "firms_code": "W185" }
            }
        ]
    });

    let graph = ResourceGraph::from_value(&doc).unwrap();
    assert_eq!(graph.len(), 4);

    let shipment: Shipment = map_document(&doc).unwrap().unwrap();
    assert_eq!(shipment.containers.len(), 2);
    for container in &shipment.containers {
        let terminal = container.pod_terminal.as_ref().unwrap();
        assert_eq!(terminal.id, "t1");
        assert_eq!(terminal.name.as_deref(), Some("Pier 400"));
        assert_eq!(terminal.firms_code.as_deref(), Some("W185"));
    }
}

/// Two resources per layer, each pointing at both resources of the next layer.
fn layered_diamond(layers: usize) -> Value {
    let key = |layer: usize, side: &str| {
        json!({ "type": "layer", "id": format!("{layer}-{side}") })
    };
    let resource = |layer: usize, side: &str| {
        let mut resource = json!({
            "type": "layer",
            "id": format!("{layer}-{side}"),
            "attributes": { "depth": layer }
        });
        if layer + 1 < layers {
            resource["relationships"] = json!({
                "next": { "data": [key(layer + 1, "a"), key(layer + 1, "b")] }
            });
        }
        resource
    };
    let included: Vec<Value> = (1..layers)
        .flat_map(|layer| [resource(layer, "a"), resource(layer, "b")])
        .collect();
    json!({ "data": resource(0, "a"), "included": included })
}

#[test]
fn layered_diamonds_render_in_linear_size() {
    let doc = layered_diamond(40);
    let graph = ResourceGraph::from_value(&doc).unwrap();
    assert_eq!(graph.len(), 79);

    let rendered = graph.render(graph.roots()[0]);
    let size = serde_json::to_string(&rendered).unwrap().len();
    assert!(size < 32 * 1024, "rendered {size} bytes");

    // Each resource is expanded once; later references to it carry its fields only.
    assert_eq!(rendered["next"][0]["next"][0]["id"], "2-a");
    assert!(rendered["next"][0]["next"][0]["next"].is_array());
    assert_eq!(
        rendered["next"][1]["next"][0],
        json!({ "id": "2-a", "type": "layer", "depth": 2 })
    );

    let mapped: Option<Value> = map_document(&doc).unwrap();
    assert_eq!(mapped, Some(rendered));
}

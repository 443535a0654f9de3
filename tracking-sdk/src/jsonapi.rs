//! JSON:API compound documents and their resolution into object graphs.
//!
//! A [`Document`] is parsed from the wire shape (`data` plus `included`), then
//! [`ResourceGraph::build`] materializes every resource reachable from the primary
//! data into an arena. Each `(type, id)` identity owns exactly one [`Node`]; relationship
//! references are stored as [`NodeId`] indices into that arena, so shared references
//! and cycles never produce duplicates or unbounded recursion.
//!
//! Rendering a node back to JSON ([`ResourceGraph::render`]) nests related nodes and
//! breaks cycles by emitting an identity stub (`{"id", "type"}`) for any node that is
//! already on the current rendering path. A node reached again by a second path is
//! repeated shallowly, with its fields but without its relationships.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::MappingError;

/// Identity of a resource within one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Relationship {
    One(Option<ResourceKey>),
    Many(Vec<ResourceKey>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceObject {
    pub key: ResourceKey,
    pub attributes: Map<String, Value>,
    pub relationships: BTreeMap<String, Relationship>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryData {
    One(Option<ResourceObject>),
    Many(Vec<ResourceObject>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub data: PrimaryData,
    pub included: Vec<ResourceObject>,
    pub links: Option<Value>,
    pub meta: Option<Value>,
}

impl Document {
    pub fn parse(value: &Value) -> Result<Self, MappingError> {
        let object = value
            .as_object()
            .ok_or_else(|| MappingError::InvalidDocument("document is not an object".into()))?;
        let data = object
            .get("data")
            .ok_or_else(|| MappingError::InvalidDocument("document has no `data` member".into()))?;

        let data = match data {
            Value::Null => PrimaryData::One(None),
            Value::Array(items) => PrimaryData::Many(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| parse_resource(item, &format!("data[{index}]")))
                    .collect::<Result<_, _>>()?,
            ),
            single => PrimaryData::One(Some(parse_resource(single, "data")?)),
        };

        let included = match object.get("included") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_resource(item, &format!("included[{index}]")))
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(MappingError::InvalidDocument(
                    "`included` is not an array".into(),
                ));
            }
        };

        Ok(Document {
            data,
            included,
            links: object.get("links").cloned(),
            meta: object.get("meta").cloned(),
        })
    }
}

fn identity_field(
    value: &Value,
    field: &'static str,
    position: &str,
) -> Result<String, MappingError> {
    match value.get(field) {
        Some(Value::String(text)) if !text.is_empty() => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        _ => Err(MappingError::MissingField {
            position: position.to_string(),
            field,
        }),
    }
}

fn parse_key(value: &Value, position: &str) -> Result<ResourceKey, MappingError> {
    Ok(ResourceKey {
        kind: identity_field(value, "type", position)?,
        id: identity_field(value, "id", position)?,
    })
}

fn parse_resource(value: &Value, position: &str) -> Result<ResourceObject, MappingError> {
    if !value.is_object() {
        return Err(MappingError::InvalidDocument(format!(
            "resource at {position} is not an object"
        )));
    }
    let key = parse_key(value, position)?;

    let attributes = match value.get("attributes") {
        Some(Value::Object(attributes)) => attributes.clone(),
        _ => Map::new(),
    };

    let mut relationships = BTreeMap::new();
    if let Some(Value::Object(links)) = value.get("relationships") {
        for (name, link) in links {
            let at = format!("{position}.relationships.{name}");
            let relationship = match link.get("data") {
                None | Some(Value::Null) => Relationship::One(None),
                Some(Value::Array(refs)) => Relationship::Many(
                    refs.iter()
                        .enumerate()
                        .map(|(index, reference)| parse_key(reference, &format!("{at}[{index}]")))
                        .collect::<Result<_, _>>()?,
                ),
                Some(reference) => Relationship::One(Some(parse_key(reference, &at)?)),
            };
            relationships.insert(name.clone(), relationship);
        }
    }

    Ok(ResourceObject {
        key,
        attributes,
        relationships,
    })
}

/// Index of a node inside a [`ResourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    One(Option<NodeId>),
    Many(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: ResourceKey,
    /// `id`, `type` and the renamed attributes.
    pub fields: Map<String, Value>,
    /// Relationship name (already camelCased) to resolved targets.
    pub links: BTreeMap<String, Link>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    index: HashMap<ResourceKey, NodeId>,
    roots: Vec<NodeId>,
    singular: bool,
    links: Option<Value>,
    meta: Option<Value>,
}

impl ResourceGraph {
    pub fn build(document: &Document) -> Self {
        let mut lookup: HashMap<&ResourceKey, &ResourceObject> = HashMap::new();
        let (primary, singular): (Vec<&ResourceObject>, bool) = match &document.data {
            PrimaryData::One(resource) => (resource.iter().collect(), true),
            PrimaryData::Many(resources) => (resources.iter().collect(), false),
        };
        // First occurrence of an identity wins; primary data is registered before `included`.
        for resource in primary.iter().copied().chain(document.included.iter()) {
            lookup.entry(&resource.key).or_insert(resource);
        }

        let mut builder = GraphBuilder {
            lookup,
            nodes: Vec::new(),
            index: HashMap::new(),
            pending: Vec::new(),
        };
        let roots = primary
            .iter()
            .filter_map(|resource| builder.intern(&resource.key))
            .collect();
        builder.resolve_pending();

        debug!(
            nodes = builder.nodes.len(),
            included = document.included.len(),
            "resolved resource graph"
        );

        ResourceGraph {
            nodes: builder.nodes,
            index: builder.index,
            roots,
            singular,
            links: document.links.clone(),
            meta: document.meta.clone(),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, MappingError> {
        Ok(Self::build(&Document::parse(value)?))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Whether the primary data was a single resource (or null) rather than an array.
    pub fn is_singular(&self) -> bool {
        self.singular
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn find(&self, key: &ResourceKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn document_links(&self) -> Option<&Value> {
        self.links.as_ref()
    }

    pub fn document_meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    pub fn related_one(&self, id: NodeId, relationship: &str) -> Option<NodeId> {
        match self.get(id).links.get(relationship) {
            Some(Link::One(target)) => *target,
            _ => None,
        }
    }

    pub fn related_many(&self, id: NodeId, relationship: &str) -> &[NodeId] {
        match self.get(id).links.get(relationship) {
            Some(Link::Many(targets)) => targets,
            _ => &[],
        }
    }

    /// Renders a node as nested JSON.
    ///
    /// Each node is expanded with its relationships at most once per call. A node that
    /// is already on the current rendering path becomes an identity stub, and a node
    /// that was expanded elsewhere in the same call is repeated with its own fields
    /// only. Output size stays linear in the number of references.
    pub fn render(&self, id: NodeId) -> Value {
        let mut visits = vec![Visit::Unseen; self.nodes.len()];
        self.render_node(id, &mut visits)
    }

    fn render_node(&self, id: NodeId, visits: &mut [Visit]) -> Value {
        let node = self.get(id);
        match visits[id.0] {
            Visit::OnPath => return stub(&node.key),
            Visit::Done => return Value::Object(node.fields.clone()),
            Visit::Unseen => visits[id.0] = Visit::OnPath,
        }

        let mut out = node.fields.clone();
        for (name, link) in &node.links {
            let rendered = match link {
                Link::One(None) => Value::Null,
                Link::One(Some(target)) => self.render_node(*target, visits),
                Link::Many(targets) => Value::Array(
                    targets
                        .iter()
                        .map(|target| self.render_node(*target, visits))
                        .collect(),
                ),
            };
            out.insert(name.clone(), rendered);
        }

        visits[id.0] = Visit::Done;
        Value::Object(out)
    }

    pub fn deserialize_node<T: DeserializeOwned>(&self, id: NodeId) -> Result<T, MappingError> {
        let key = &self.get(id).key;
        serde_json::from_value(self.render(id)).map_err(|source| MappingError::Deserialize {
            kind: key.kind.clone(),
            id: key.id.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    OnPath,
    Done,
}

fn stub(key: &ResourceKey) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), Value::String(key.id.clone()));
    out.insert("type".into(), Value::String(key.kind.clone()));
    Value::Object(out)
}

struct GraphBuilder<'d> {
    lookup: HashMap<&'d ResourceKey, &'d ResourceObject>,
    nodes: Vec<Node>,
    index: HashMap<ResourceKey, NodeId>,
    pending: Vec<(NodeId, &'d ResourceObject)>,
}

impl<'d> GraphBuilder<'d> {
    /// Returns the node for `key`, allocating it on first sight. Relationships of a newly
    /// allocated node are resolved later from `pending`, so a node that is still under
    /// construction is handed out by index instead of being re-entered.
    fn intern(&mut self, key: &ResourceKey) -> Option<NodeId> {
        if let Some(id) = self.index.get(key) {
            return Some(*id);
        }
        let resource = *self.lookup.get(key)?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            key: resource.key.clone(),
            fields: map_attributes(&resource.key, &resource.attributes),
            links: BTreeMap::new(),
        });
        self.index.insert(resource.key.clone(), id);
        self.pending.push((id, resource));
        Some(id)
    }

    fn resolve_pending(&mut self) {
        while let Some((id, resource)) = self.pending.pop() {
            let mut links = BTreeMap::new();
            for (name, relationship) in &resource.relationships {
                let link = match relationship {
                    Relationship::One(None) => Link::One(None),
                    Relationship::One(Some(key)) => Link::One(self.intern(key)),
                    Relationship::Many(keys) => {
                        Link::Many(keys.iter().filter_map(|key| self.intern(key)).collect())
                    }
                };
                links.insert(camel_case(name), link);
            }
            self.nodes[id.0].links = links;
        }
    }
}

/// `container_number` -> `containerNumber`; only `_` followed by a lowercase letter folds.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Extra renames applied on top of camelCasing, keyed by resource type.
fn attribute_aliases(kind: &str) -> &'static [(&'static str, &'static str)] {
    match kind {
        "container" => &[("container_number", "number")],
        "shipment" => &[
            ("bill_of_lading", "billOfLadingNumber"),
            ("bl_number", "billOfLadingNumber"),
        ],
        "shipping_line" => &[("full_name", "name"), ("nickname", "shortName")],
        _ => &[],
    }
}

fn map_attributes(key: &ResourceKey, attributes: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("id".into(), Value::String(key.id.clone()));
    fields.insert("type".into(), Value::String(key.kind.clone()));

    for (name, value) in attributes {
        if name == "id" || name == "type" {
            continue;
        }
        fields.insert(camel_case(name), value.clone());
    }
    for (from, to) in attribute_aliases(&key.kind) {
        if fields.get(*to).is_none_or(Value::is_null) {
            if let Some(value) = attributes.get(*from) {
                fields.insert((*to).to_string(), value.clone());
            }
        }
    }
    fields
}

/// A mapped collection together with the document's pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Maps a document whose primary data is a single resource.
///
/// `data: null` yields `None`. Primary data that is an array is rejected.
pub fn map_document<T: DeserializeOwned>(document: &Value) -> Result<Option<T>, MappingError> {
    let graph = ResourceGraph::from_value(document)?;
    if !graph.is_singular() {
        return Err(MappingError::InvalidDocument(
            "expected a single resource but `data` is an array".into(),
        ));
    }
    graph
        .roots()
        .first()
        .map(|root| graph.deserialize_node(*root))
        .transpose()
}

/// Maps every primary resource of a document, in document order.
///
/// A singular document maps to a one-element sequence and `data: null` to an empty one.
pub fn map_collection<T: DeserializeOwned>(document: &Value) -> Result<Vec<T>, MappingError> {
    let graph = ResourceGraph::from_value(document)?;
    graph
        .roots()
        .iter()
        .map(|root| graph.deserialize_node(*root))
        .collect()
}

pub fn map_page<T: DeserializeOwned>(document: &Value) -> Result<Page<T>, MappingError> {
    let graph = ResourceGraph::from_value(document)?;
    let items = graph
        .roots()
        .iter()
        .map(|root| graph.deserialize_node(*root))
        .collect::<Result<_, _>>()?;
    Ok(Page {
        items,
        links: graph.document_links().cloned(),
        meta: graph.document_meta().cloned(),
    })
}

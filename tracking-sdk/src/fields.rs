//! Field projection over JSON results.
//!
//! A path list such as `id,container.number,nested.deep.code` keeps only the named leaves,
//! preserving the nesting they live in. Paths sharing a prefix merge into one branch.
//! Paths that do not exist in the input are skipped without error.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PathNode {
    /// A path ends here, so the whole subtree is kept.
    terminal: bool,
    children: Vec<(String, PathNode)>,
}

impl PathNode {
    fn child(&mut self, segment: &str) -> &mut PathNode {
        let position = match self.children.iter().position(|(key, _)| key == segment) {
            Some(position) => position,
            None => {
                self.children.push((segment.to_string(), PathNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[position].1
    }
}

/// A parsed, ordered set of dotted projection paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPaths {
    paths: Vec<Vec<String>>,
    root: PathNode,
}

impl FieldPaths {
    pub fn parse(spec: &str) -> Self {
        let mut fields = FieldPaths::default();
        for raw in spec.split(',') {
            let segments: Vec<String> = raw
                .split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(String::from)
                .collect();
            if segments.is_empty() || fields.paths.contains(&segments) {
                continue;
            }

            let mut node = &mut fields.root;
            for segment in &segments {
                node = node.child(segment);
            }
            node.terminal = true;
            fields.paths.push(segments);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
        self.paths.iter().map(|segments| segments.join("."))
    }

    /// Projects `value`. An empty path set leaves the value untouched.
    pub fn project(&self, value: &Value) -> Value {
        if self.is_empty() {
            return value.clone();
        }
        project_node(value, &self.root)
    }
}

fn project_node(value: &Value, node: &PathNode) -> Value {
    match value {
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| project_node(item, node)).collect())
        }
        Value::Object(map) => Value::Object(project_object(map, node)),
        scalar => scalar.clone(),
    }
}

fn project_object(map: &Map<String, Value>, node: &PathNode) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, child) in &node.children {
        let Some(value) = map.get(key) else {
            continue;
        };
        if child.terminal {
            out.insert(key.clone(), value.clone());
            continue;
        }
        match value {
            Value::Object(inner) => {
                let projected = project_object(inner, child);
                if !projected.is_empty() {
                    out.insert(key.clone(), Value::Object(projected));
                }
            }
            Value::Array(items) => {
                out.insert(
                    key.clone(),
                    Value::Array(items.iter().map(|item| project_node(item, child)).collect()),
                );
            }
            // A deeper path through a scalar names nothing.
            _ => {}
        }
    }
    out
}

/// Convenience for a one-off projection from a comma separated path list.
pub fn project_fields(value: &Value, spec: &str) -> Value {
    FieldPaths::parse(spec).project(value)
}

/// Looks up a dotted path in nested objects. Numeric segments index into arrays.
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

use std::collections::HashMap;

use config::{ConfigError, FileStoredFormat, Format, Map, Source, Value, ValueKind};
use kdl::{KdlDocument, KdlNode, KdlValue};

/// Registry settings that always collect into arrays, even when a single
/// value is given, and that may be repeated.
const LIST_KEYS: &[&str] = &["mirrors", "ca", "keypair"];

#[derive(Clone, Debug)]
pub(crate) struct KdlSource(KdlDocument);

impl Source for KdlSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut map = Map::new();
        let mut registries = Map::new();
        for node in self.0.nodes() {
            if node.name().value() == "registry" {
                let host = node
                    .entries()
                    .iter()
                    .find(|e| e.name().is_none())
                    .and_then(|e| e.value().as_string())
                    .ok_or_else(|| {
                        ConfigError::Message(
                            "`registry` nodes need a host name, like `registry \"docker.io\" { ... }`"
                                .into(),
                        )
                    })?;
                let settings = node.children().map(registry_settings).unwrap_or_default();
                registries.insert(
                    host.to_lowercase(),
                    Value::new(None, ValueKind::Table(settings)),
                );
            } else {
                map.insert(node.name().value().to_string(), node_value(node));
            }
        }
        if !registries.is_empty() {
            map.insert(
                "registry".to_string(),
                Value::new(None, ValueKind::Table(registries)),
            );
        }
        Ok(map)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct KdlFormat;

impl Format for KdlFormat {
    fn parse(
        &self,
        _uri: Option<&String>,
        text: &str,
    ) -> Result<Map<String, Value>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(KdlSource(text.parse()?).collect()?)
    }
}

impl FileStoredFormat for KdlFormat {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["kdl"]
    }
}

// registry "docker.io" {
//     mirrors "a.example" "b.example"
//     ca "/etc/ca.pem"
//     keypair key="client.key" cert="client.pem"
//     keypair key="other.key" cert="other.pem"
//     insecure true
// }
// => { mirrors: [a, b], ca: [..], keypair: [{..}, {..}], insecure: true }
fn registry_settings(doc: &KdlDocument) -> Map<String, Value> {
    let mut lists: HashMap<String, Vec<Value>> = HashMap::new();
    let mut settings = Map::new();
    for node in doc.nodes() {
        let name = node.name().value();
        if LIST_KEYS.contains(&name) {
            lists
                .entry(name.to_string())
                .or_default()
                .extend(list_items(node));
        } else {
            settings.insert(name.to_string(), node_value(node));
        }
    }
    for (name, items) in lists {
        settings.insert(name, Value::new(None, ValueKind::Array(items)));
    }
    settings
}

fn list_items(node: &KdlNode) -> Vec<Value> {
    if has_properties(node) {
        vec![properties(node)]
    } else {
        arguments(node)
            .map(|value| Value::new(None, value_kind(value)))
            .collect()
    }
}

fn has_properties(node: &KdlNode) -> bool {
    node.entries().iter().any(|e| e.name().is_some())
}

fn arguments(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

fn properties(node: &KdlNode) -> Value {
    Value::new(
        None,
        ValueKind::Table(
            node.entries()
                .iter()
                .filter_map(|e| {
                    e.name().map(|name| {
                        (
                            name.value().to_string(),
                            Value::new(None, value_kind(e.value())),
                        )
                    })
                })
                .collect(),
        ),
    )
}

fn value_kind(value: &KdlValue) -> ValueKind {
    if let Some(str) = value.as_string() {
        ValueKind::String(str.into())
    } else if let Some(num) = value.as_i64() {
        ValueKind::I64(num)
    } else if let Some(float) = value.as_f64() {
        ValueKind::Float(float)
    } else if let Some(boolean) = value.as_bool() {
        ValueKind::Boolean(boolean)
    } else {
        ValueKind::Nil
    }
}

fn node_value(node: &KdlNode) -> Value {
    if has_properties(node) {
        return properties(node);
    }
    let args = arguments(node).collect::<Vec<_>>();
    match (args.as_slice(), node.children()) {
        // foo 1 => { foo: 1 }
        ([value], _) => Value::new(None, value_kind(value)),
        // foo {
        //     bar 1
        // }
        // => { foo: { bar: 1 } }
        ([], Some(children)) => Value::new(
            None,
            ValueKind::Table(
                children
                    .nodes()
                    .iter()
                    .map(|node| (node.name().value().to_string(), node_value(node)))
                    .collect(),
            ),
        ),
        ([], None) => Value::new(None, ValueKind::Nil),
        // foo 1 2 3 => { foo: [1, 2, 3] }
        (values, _) => Value::new(
            None,
            ValueKind::Array(
                values
                    .iter()
                    .map(|v| Value::new(None, value_kind(v)))
                    .collect(),
            ),
        ),
    }
}

//! Minimal response shaping: allow-list, rename, group, merge.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::template::ast::lookup;

#[derive(Debug, Clone, Default)]
pub struct Shaping {
    allow: Vec<String>,
    mapping: BTreeMap<String, String>,
    group: Option<String>,
}

impl Shaping {
    pub fn new(allow: Vec<String>, mapping: BTreeMap<String, String>, group: Option<String>) -> Self {
        Self {
            allow,
            mapping,
            group,
        }
    }

    /// Filter, then rename, then group.
    pub fn apply(&self, data: Map<String, Value>) -> Map<String, Value> {
        let mut data = if self.allow.is_empty() {
            data
        } else {
            allow_list(&data, &self.allow)
        };

        for (from, to) in &self.mapping {
            if let Some(value) = data.remove(from) {
                data.insert(to.clone(), value);
            }
        }

        match &self.group {
            Some(group) => {
                let mut grouped = Map::new();
                grouped.insert(group.clone(), Value::Object(data));
                grouped
            }
            None => data,
        }
    }
}

/// Shallow merge, later keys win.
pub fn merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        target.insert(key, value);
    }
}

fn allow_list(data: &Map<String, Value>, allow: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    for path in allow {
        if let Some(value) = lookup(data, path) {
            insert_path(&mut out, path, value.clone());
        }
    }
    out
}

fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut current = out;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

// Capability model
// - table.rs: method name -> required capability path
// - merge.rs: structural merge of capability documents

mod merge;
mod table;

use std::collections::HashSet;

use serde_json::{Map, Value};

pub use merge::merge;
pub use table::CapabilityTable;

/// Flattened set of dot-joined capability paths a server declared support for.
pub type CapabilitySet = HashSet<String>;

/// Flatten a capability document into the set of supported paths. A nested
/// document records its own path and recurses; `true` is recorded, `false`
/// and `null` are not; any other non-null value counts as supported.
pub fn collect_supported(capabilities: &Map<String, Value>) -> CapabilitySet {
    let mut supported = CapabilitySet::new();
    collect("", capabilities, &mut supported);
    supported
}

fn collect(prefix: &str, capabilities: &Map<String, Value>, supported: &mut CapabilitySet) {
    for (key, value) in capabilities {
        let path = format!("{prefix}{key}");
        match value {
            Value::Object(nested) => {
                collect(&format!("{path}."), nested, supported);
                supported.insert(path);
            }
            Value::Bool(true) => {
                supported.insert(path);
            }
            Value::Bool(false) | Value::Null => {}
            _ => {
                supported.insert(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        map
    }

    #[test]
    fn collect_supported_flattens_to_dot_paths() {
        let capabilities = as_map(json!({
            "key": true,
            "foo": {
                "bar": true,
                "baz": false,
                "qux": { "deep": true },
            },
            "off": false,
            "absent": null,
            "scalar": "incremental",
            "list": [1, 2],
        }));

        let supported = collect_supported(&capabilities);

        let expected: CapabilitySet = [
            "key",
            "foo",
            "foo.bar",
            "foo.qux",
            "foo.qux.deep",
            "scalar",
            "list",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(supported, expected);
    }

    #[test]
    fn false_and_null_leaves_are_not_supported() {
        let capabilities = as_map(json!({
            "a": true,
            "b": false,
            "c": { "d": true },
            "e": null,
        }));

        let supported = collect_supported(&capabilities);

        let expected: CapabilitySet =
            ["a", "c", "c.d"].into_iter().map(String::from).collect();
        assert_eq!(supported, expected);
    }
}

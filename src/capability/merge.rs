//! Structural merge of capability documents.

use serde_json::map::Entry;
use serde_json::{Map, Value};

/// Merge `src` into `dst`, giving `dst` precedence: keys absent (or null) in
/// `dst` are copied, nested documents merge recursively, arrays union by
/// structural equality with `dst` order preserved, and any other conflict
/// keeps the `dst` value.
pub fn merge(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, src_value) in src {
        match dst.entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(src_value.clone());
            }
            Entry::Occupied(mut entry) => {
                let dst_value = entry.get_mut();
                if dst_value.is_null() {
                    *dst_value = src_value.clone();
                    continue;
                }
                match (dst_value, src_value) {
                    (Value::Object(dst_nested), Value::Object(src_nested)) => {
                        merge(dst_nested, src_nested);
                    }
                    (Value::Array(dst_items), Value::Array(src_items)) => {
                        for item in src_items {
                            if !dst_items.contains(item) {
                                dst_items.push(item.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

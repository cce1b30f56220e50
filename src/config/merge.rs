//! Settings layering
//!
//! Each layer is written over the ones before it. Tables are combined key by
//! key at every depth; any other value, null included, takes the slot.

use serde_json::Value;

/// Write `layer` over `target` in place.
pub fn apply_layer(target: &mut Value, layer: Value) {
    let Value::Object(fields) = layer else {
        *target = layer;
        return;
    };
    let Value::Object(table) = target else {
        *target = Value::Object(fields);
        return;
    };

    for (name, value) in fields {
        match table.get_mut(&name) {
            Some(slot) => apply_layer(slot, value),
            None => {
                table.insert(name, value);
            }
        }
    }
}

/// Collapse layers, lowest precedence first
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Null;
    for layer in layers {
        apply_layer(&mut merged, layer);
    }
    merged
}

//! `json` transmitter: `serde_json` rendering of every response object.
//!
//! Data responses carry their content as a (lossy) UTF-8 string next to the
//! item metadata.

use bes_core::{DispatchError, DispatchResult, RequestContext, ResponseObject};
use serde_json::json;

use super::data_methods;
use crate::registry::{Render, Transmitter};

pub const NAME: &str = "json";

pub fn transmitter() -> Transmitter {
    let mut transmitter = Transmitter::new(NAME);
    for key in super::INFO_METHODS {
        transmitter.add_method(key, Render(render));
    }
    for key in data_methods() {
        transmitter.add_method(key, Render(render));
    }
    transmitter
}

fn render(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    let value = match response {
        ResponseObject::Data(data) => json!({
            "type": "data",
            "kind": data.kind,
            "definition": data.definition,
            "items": data.items.iter().map(|item| json!({
                "container": item.container,
                "content_type": item.content_type,
                "size": item.size,
                "content": String::from_utf8_lossy(&item.content),
            })).collect::<Vec<_>>(),
        }),
        other => serde_json::to_value(other).map_err(|e| {
            DispatchError::Internal(format!("failed to serialize {} response: {e}", other.method_key()))
        })?,
    };

    let mut body = serde_json::to_vec_pretty(&value)
        .map_err(|e| DispatchError::Internal(format!("failed to serialize response: {e}")))?;
    body.push(b'\n');
    Ok(body)
}

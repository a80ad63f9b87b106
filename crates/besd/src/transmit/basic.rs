//! `basic` transmitter: plain text, data bytes passed through.

use bes_core::{DispatchResult, RequestContext, ResponseObject};

use super::{data_methods, unexpected, RawContent};
use crate::registry::{Render, Transmitter};

pub const NAME: &str = "basic";

pub fn transmitter() -> Transmitter {
    let mut transmitter = Transmitter::new(NAME);
    transmitter.add_method("info", Render(render_info));
    transmitter.add_method("version", Render(render_version));
    transmitter.add_method("status", Render(render_status));
    transmitter.add_method("text", Render(render_text));
    transmitter.add_method("error", Render(render_error));
    for key in data_methods() {
        transmitter.add_method(key, RawContent);
    }
    transmitter
}

fn render_info(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    let ResponseObject::Info(info) = response else {
        return Err(unexpected(response, "info"));
    };

    let mut out = format!("{}\n", info.title);
    for section in &info.sections {
        out.push_str(&format!("{}:\n", section.name));
        for entry in &section.entries {
            if entry.value.is_empty() {
                out.push_str(&format!("    {}\n", entry.key));
            } else {
                out.push_str(&format!("    {}: {}\n", entry.key, entry.value));
            }
        }
    }
    Ok(out.into_bytes())
}

fn render_version(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    let ResponseObject::Version(version) = response else {
        return Err(unexpected(response, "version"));
    };
    Ok(version
        .modules
        .iter()
        .map(|m| format!("{}/{}\n", m.name, m.version))
        .collect::<String>()
        .into_bytes())
}

fn render_status(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    let ResponseObject::Status(status) = response else {
        return Err(unexpected(response, "status"));
    };
    Ok(format!(
        "started: {}\nuptime: {}s\nconnections: {}\npid: {}\n",
        status.started.to_rfc3339(),
        status.uptime_secs,
        status.connections,
        status.pid
    )
    .into_bytes())
}

fn render_text(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    let ResponseObject::Text(text) = response else {
        return Err(unexpected(response, "text"));
    };
    let mut out = text.text.clone();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out.into_bytes())
}

fn render_error(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    let ResponseObject::Error(error) = response else {
        return Err(unexpected(response, "error"));
    };
    let mut out = format!("{} error: {}\n", error.kind, error.message);
    if let Some(url) = &error.annotation_url {
        out.push_str(&format!("annotation service: {url}\n"));
    }
    Ok(out.into_bytes())
}

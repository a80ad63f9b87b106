//! `raw` module: treats a container's real name as a plain file.
//!
//! No format is decoded. The file is described as a one-dimensional byte
//! array so the `das`/`dds`/`dmr` responses have something to say, and
//! `data` returns the bytes as they are.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bes_core::{Container, DispatchError, DispatchResult, RequestContext};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::dispatch::SERVER_VERSION;
use crate::registry::RequestHandler;
use crate::transmit::html::escape;

pub const NAME: &str = "raw";

/// Services whose responses this module fills in.
pub const SERVICES: &[&str] = &[crate::commands::DAP_SERVICE];

/// Builds the handler. Relative container paths resolve against `root`
/// when one is configured.
pub fn handler(root: Option<PathBuf>) -> RequestHandler {
    let files = Arc::new(RawFiles { root });
    let mut handler = RequestHandler::new(NAME);

    handler.add_method("show.help", help);
    handler.add_method("show.version", version);

    let f = Arc::clone(&files);
    handler.add_method("das", move |ctx: &mut RequestContext| -> DispatchResult<()> {
        f.respond(ctx, "das", |file| ("text/plain", das(file).into_bytes()))
    });
    let f = Arc::clone(&files);
    handler.add_method("dds", move |ctx: &mut RequestContext| -> DispatchResult<()> {
        f.respond(ctx, "dds", |file| ("text/plain", dds(file).into_bytes()))
    });
    let f = Arc::clone(&files);
    handler.add_method("dmr", move |ctx: &mut RequestContext| -> DispatchResult<()> {
        f.respond(ctx, "dmr", |file| ("application/vnd.opendap.dap4.dataset-metadata+xml", dmr(file).into_bytes()))
    });
    handler.add_method("data", move |ctx: &mut RequestContext| -> DispatchResult<()> {
        files.respond_with_contents(ctx)
    });
    handler
}

fn help(ctx: &mut RequestContext) -> DispatchResult<()> {
    if let Some(info) = ctx.response_mut()?.as_info_mut() {
        info.add(NAME, "get das for <definition>;", "file path, size and modification time");
        info.add(NAME, "get dds for <definition>;", "file as a byte array");
        info.add(NAME, "get dmr for <definition>;", "DAP4 description of the byte array");
        info.add(NAME, "get data for <definition>;", "file contents");
    }
    Ok(())
}

fn version(ctx: &mut RequestContext) -> DispatchResult<()> {
    if let Some(version) = ctx.response_mut()?.as_version_mut() {
        version.add_module(NAME, SERVER_VERSION);
    }
    Ok(())
}

struct RawFiles {
    root: Option<PathBuf>,
}

/// What the metadata responses know about a file.
struct FileInfo<'a> {
    name: &'a str,
    path: PathBuf,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

impl RawFiles {
    fn resolve(&self, real_name: &str) -> Result<PathBuf, String> {
        let requested = Path::new(real_name);
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(format!("path '{real_name}' may not contain '..'"));
        }

        Ok(match &self.root {
            Some(root) => {
                let relative: PathBuf = requested
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                root.join(relative)
            }
            None => requested.to_path_buf(),
        })
    }

    fn stat<'c>(&self, container: &'c Container) -> Result<FileInfo<'c>, String> {
        let path = self.resolve(&container.real_name)?;
        let metadata = fs::metadata(&path).map_err(|e| format!("{}: {e}", path.display()))?;
        if !metadata.is_file() {
            return Err(format!("{} is not a regular file", path.display()));
        }

        Ok(FileInfo {
            name: &container.symbolic_name,
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            path,
        })
    }

    fn respond(
        &self,
        ctx: &mut RequestContext,
        method: &str,
        render: impl Fn(&FileInfo<'_>) -> (&'static str, Vec<u8>),
    ) -> DispatchResult<()> {
        let container = ctx.current_container()?.clone();
        let file = self
            .stat(&container)
            .map_err(|reason| failed(method, reason))?;
        debug!(container = %container.symbolic_name, path = %file.path.display(), method, "Describing file");

        let (content_type, content) = render(&file);
        push(ctx, &container, content_type, content)
    }

    fn respond_with_contents(&self, ctx: &mut RequestContext) -> DispatchResult<()> {
        let container = ctx.current_container()?.clone();
        let file = self
            .stat(&container)
            .map_err(|reason| failed("data", reason))?;
        let content = fs::read(&file.path)
            .map_err(|e| failed("data", format!("{}: {e}", file.path.display())))?;
        debug!(container = %container.symbolic_name, bytes = content.len(), "Read file");

        push(ctx, &container, "application/octet-stream", content)
    }
}

fn push(
    ctx: &mut RequestContext,
    container: &Container,
    content_type: &str,
    content: Vec<u8>,
) -> DispatchResult<()> {
    let data = ctx.response_mut()?.as_data_mut().ok_or_else(|| {
        DispatchError::Internal(format!("{NAME} handler expected a data response"))
    })?;
    data.push(container.symbolic_name.clone(), content_type, content);
    Ok(())
}

fn failed(method: &str, reason: String) -> DispatchError {
    DispatchError::HandlerFailed {
        handler: NAME.to_string(),
        method: method.to_string(),
        reason,
    }
}

fn modified(file: &FileInfo<'_>) -> String {
    file.modified
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn dds(file: &FileInfo<'_>) -> String {
    format!(
        "Dataset {{\n    Byte bytes[bytes = {}];\n}} {};\n",
        file.size, file.name
    )
}

fn das(file: &FileInfo<'_>) -> String {
    format!(
        "Attributes {{\n    bytes {{\n        String path \"{}\";\n        UInt64 size {};\n        String modified \"{}\";\n    }}\n}}\n",
        file.path.display(),
        file.size,
        modified(file)
    )
}

fn dmr(file: &FileInfo<'_>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Dataset name="{name}" dapVersion="4.0" dmrVersion="1.0" xmlns="http://xml.opendap.org/ns/DAP/4.0#">
    <Dimension name="bytes" size="{size}"/>
    <Byte name="bytes">
        <Dim name="/bytes"/>
        <Attribute name="path" type="String"><Value>{path}</Value></Attribute>
        <Attribute name="modified" type="String"><Value>{modified}</Value></Attribute>
    </Byte>
</Dataset>
"#,
        name = escape(file.name),
        size = file.size,
        path = escape(&file.path.display().to_string()),
        modified = modified(file),
    )
}

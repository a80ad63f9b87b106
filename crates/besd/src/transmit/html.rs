//! `html` transmitter: small self-contained HTML pages for info-style
//! responses.

use bes_core::{DispatchResult, RequestContext, ResponseObject};

use super::unexpected;
use crate::registry::{Render, Transmitter};

pub const NAME: &str = "html";

pub fn transmitter() -> Transmitter {
    let mut transmitter = Transmitter::new(NAME);
    transmitter.add_method("info", Render(render));
    transmitter.add_method("version", Render(render));
    transmitter.add_method("status", Render(render));
    transmitter.add_method("text", Render(render));
    transmitter.add_method("error", Render(render));
    transmitter
}

/// Escapes the five XML special characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Vec<u8> {
    let title = escape(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n"
    )
    .into_bytes()
}

fn render(response: &ResponseObject, _ctx: &RequestContext) -> DispatchResult<Vec<u8>> {
    match response {
        ResponseObject::Info(info) => {
            let mut body = String::new();
            for section in &info.sections {
                body.push_str(&format!("<h2>{}</h2>\n<dl>\n", escape(&section.name)));
                for entry in &section.entries {
                    body.push_str(&format!(
                        "<dt>{}</dt><dd>{}</dd>\n",
                        escape(&entry.key),
                        escape(&entry.value)
                    ));
                }
                body.push_str("</dl>\n");
            }
            Ok(page(&info.title, &body))
        }
        ResponseObject::Version(version) => {
            let mut body = String::from("<table>\n");
            for module in &version.modules {
                body.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td></tr>\n",
                    escape(&module.name),
                    escape(&module.version)
                ));
            }
            body.push_str("</table>\n");
            Ok(page("version", &body))
        }
        ResponseObject::Status(status) => {
            let body = format!(
                "<dl>\n<dt>started</dt><dd>{}</dd>\n<dt>uptime</dt><dd>{}s</dd>\n<dt>connections</dt><dd>{}</dd>\n<dt>pid</dt><dd>{}</dd>\n</dl>\n",
                status.started.to_rfc3339(),
                status.uptime_secs,
                status.connections,
                status.pid
            );
            Ok(page("status", &body))
        }
        ResponseObject::Text(text) => Ok(page("text", &format!("<pre>{}</pre>\n", escape(&text.text)))),
        ResponseObject::Error(error) => {
            let mut body = format!("<p class=\"error\">{}</p>\n", escape(&error.message));
            if let Some(url) = &error.annotation_url {
                let url = escape(url);
                body.push_str(&format!("<p><a href=\"{url}\">{url}</a></p>\n"));
            }
            Ok(page(&format!("{} error", error.kind), &body))
        }
        ResponseObject::Data(_) => Err(unexpected(response, "html")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bes_core::InfoResponse;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_info_page_escapes_entries() {
        let mut info = InfoResponse::new("help");
        info.add("usage", "get <type> for <def>;", "a & b");
        let html = String::from_utf8(
            render(&ResponseObject::Info(info), &RequestContext::new("show.help")).unwrap(),
        )
        .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<dt>get &lt;type&gt; for &lt;def&gt;;</dt><dd>a &amp; b</dd>"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}

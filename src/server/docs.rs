//! API documentation served under `/docs/` on the debug surface.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use http::{header, StatusCode};

use crate::config::EndpointSet;
use crate::core::Response;

/// Source of the documentation pages.
#[async_trait]
pub trait DocsProvider: Send + Sync {
    /// Serve `path`, relative to `/docs/` (empty for the index).
    async fn serve(&self, path: &str) -> Response;
}

/// Swagger UI page plus static files from a directory.
///
/// The page loads `swagger.json` from the same directory, points "Try it
/// out" at the public gateway and tags every request with an `X-Source`
/// header naming this service.
#[derive(Debug, Clone)]
pub struct SwaggerDocs {
    dir: PathBuf,
    host: String,
    service_name: String,
}

impl SwaggerDocs {
    pub fn new(dir: impl Into<PathBuf>, endpoints: &EndpointSet) -> Self {
        Self {
            dir: dir.into(),
            host: format!("{}:{}", endpoints.domain, endpoints.http.port()),
            service_name: endpoints.service_name.clone(),
        }
    }

    /// Swagger UI HTML page.
    pub fn index_page(&self) -> String {
        // JSON string literals are valid JS string literals
        let host = serde_json::to_string(&self.host).unwrap_or_else(|_| "\"\"".into());
        let source = serde_json::to_string(&self.service_name).unwrap_or_else(|_| "\"\"".into());

        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Swagger UI</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
const UrlMutatorPlugin = (system) => ({{
  rootInjects: {{
    setHost: (host) => {{
      const jsonSpec = system.getState().toJSON().spec.json;
      return system.specActions.updateJsonSpec(Object.assign({{}}, jsonSpec, {{ host }}));
    }}
  }}
}});
window.onload = () => {{
  window.ui = SwaggerUIBundle({{
    url: "swagger.json",
    dom_id: "#swagger-ui",
    plugins: [UrlMutatorPlugin],
    onComplete: () => {{ window.ui.setHost({host}); }},
    requestInterceptor: (req) => {{ req.headers["X-Source"] = {source}; return req; }}
  }});
}};
</script>
</body>
</html>
"##
        )
    }

    async fn serve_file(&self, path: &str) -> Response {
        let Some(file) = safe_join(&self.dir, path) else {
            return Response::text(StatusCode::BAD_REQUEST, "invalid path\n");
        };

        match tokio::fs::read(&file).await {
            Ok(contents) => {
                let content_type = if file.extension().is_some_and(|ext| ext == "json") {
                    "application/json; charset=utf-8".to_string()
                } else {
                    mime_guess::from_path(&file)
                        .first_or_octet_stream()
                        .to_string()
                };
                Response::ok(contents).with_header(header::CONTENT_TYPE, content_type)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Response::text(StatusCode::NOT_FOUND, "404 page not found\n")
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "failed to read docs file");
                Response::text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error\n")
            }
        }
    }
}

#[async_trait]
impl DocsProvider for SwaggerDocs {
    async fn serve(&self, path: &str) -> Response {
        match path {
            "" | "index.html" => Response::html(StatusCode::OK, self.index_page()),
            _ => self.serve_file(path).await,
        }
    }
}

/// Join `path` onto `root`, refusing anything that could escape it.
fn safe_join(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    let clean = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    clean.then(|| root.join(relative))
}

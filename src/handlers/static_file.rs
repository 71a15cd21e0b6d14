use super::not_found_page;
use crate::error::StaticFileError;
use crate::router::Handler;
use crate::server::{ParsedRequest, Response};
use crate::static_files::StaticFiles;
use http::StatusCode;
use tracing::{debug, warn};

/// Fallback route: serve the request path from the serving root.
pub struct StaticFileHandler {
    files: StaticFiles,
}

impl StaticFileHandler {
    pub fn new(files: StaticFiles) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &StaticFiles {
        &self.files
    }
}

impl Handler for StaticFileHandler {
    fn handle(&self, req: &ParsedRequest) -> Response {
        match self.files.load(&req.path) {
            Ok(file) => {
                debug!(path = %req.path, file = %file.path.display(), "serving file");
                Response::new(StatusCode::OK)
                    .header("Content-Type", file.content_type)
                    .body(file.bytes)
            }
            Err(StaticFileError::Traversal(path)) => {
                warn!(path = %path, "path traversal attempt rejected");
                Response::html(StatusCode::NOT_FOUND, not_found_page(&req.target))
            }
            Err(StaticFileError::NotFound(path)) => {
                debug!(path = %path, "file not found");
                Response::html(StatusCode::NOT_FOUND, not_found_page(&req.target))
            }
            Err(StaticFileError::Io(e)) => {
                warn!(path = %req.path, error = %e, "failed to read file");
                Response::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("500 Internal Server Error: could not read {}\n", req.path),
                )
            }
        }
    }
}

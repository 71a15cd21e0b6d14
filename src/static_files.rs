use crate::error::StaticFileError;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// File served for a request that resolves to a directory.
const INDEX_FILE: &str = "index.html";

/// A file read from the serving root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Serves files from one directory tree.
///
/// Containment is decided on canonicalized absolute paths (symlinks and `..`
/// resolved by the filesystem), compared component by component. A path that
/// resolves outside the root is reported as [`StaticFileError::Traversal`]
/// so it can be logged, but callers answer it exactly like a missing file.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Canonicalize `root`. Fails if it does not exist or is not a directory.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if walking `rel` lexically would climb above its starting point.
    fn escapes_lexically(rel: &Path) -> bool {
        let mut depth: usize = 0;
        for comp in rel.components() {
            match comp {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return true;
                    }
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => return true,
            }
        }
        false
    }

    /// Map a decoded URL path to a canonical file path inside the root.
    pub fn resolve(&self, url_path: &str) -> Result<PathBuf, StaticFileError> {
        let rel = Path::new(url_path.trim_start_matches(['/', '\\']));
        let candidate = self.root.join(rel);
        let canonical = match fs::canonicalize(&candidate) {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(if Self::escapes_lexically(rel) {
                    StaticFileError::Traversal(url_path.to_string())
                } else {
                    StaticFileError::NotFound(url_path.to_string())
                });
            }
            Err(e) => return Err(StaticFileError::Io(e)),
        };
        if !canonical.starts_with(&self.root) {
            return Err(StaticFileError::Traversal(url_path.to_string()));
        }
        if canonical.is_dir() {
            let index = canonical.join(INDEX_FILE);
            return match fs::canonicalize(&index) {
                Ok(p) if p.starts_with(&self.root) && p.is_file() => Ok(p),
                Ok(p) if !p.starts_with(&self.root) => {
                    Err(StaticFileError::Traversal(url_path.to_string()))
                }
                _ => Err(StaticFileError::NotFound(url_path.to_string())),
            };
        }
        if !canonical.is_file() {
            return Err(StaticFileError::NotFound(url_path.to_string()));
        }
        Ok(canonical)
    }

    pub fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" | "mjs" => "application/javascript",
            "json" | "map" => "application/json",
            "txt" => "text/plain",
            "xml" => "application/xml",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "ico" => "image/x-icon",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "wasm" => "application/wasm",
            _ => "application/octet-stream",
        }
    }

    pub fn load(&self, url_path: &str) -> Result<StaticFile, StaticFileError> {
        let path = self.resolve(url_path)?;
        let bytes = fs::read(&path)?;
        let content_type = Self::content_type(&path);
        Ok(StaticFile {
            path,
            bytes,
            content_type,
        })
    }
}

//! Extension → MIME type lookup for uploaded assets.
//!
//! The table is fixed at construction and can be extended per deployment.
//! Unknown extensions map to an empty content-type rather than an error so
//! that an unusual file never blocks a sync.

use std::collections::HashMap;
use std::path::Path;

/// Content-type for files whose extension is not in the table.
pub const UNKNOWN_CONTENT_TYPE: &str = "";

const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("webmanifest", "application/manifest+json"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
];

/// Extension-keyed content-type table.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    by_extension: HashMap<String, String>,
}

impl ContentTypes {
    /// An empty table: every lookup yields [`UNKNOWN_CONTENT_TYPE`].
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Add or replace a mapping. Extensions are matched case-insensitively
    /// and may be given with or without the leading dot.
    pub fn with(mut self, extension: &str, mime: &str) -> Self {
        self.insert(extension, mime);
        self
    }

    pub fn insert(&mut self, extension: &str, mime: &str) {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension.insert(ext, mime.to_string());
    }

    /// Content-type for a file path, by its final extension.
    pub fn for_path(&self, path: &Path) -> &str {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.for_extension(e))
            .unwrap_or(UNKNOWN_CONTENT_TYPE)
    }

    pub fn for_extension(&self, extension: &str) -> &str {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CONTENT_TYPE)
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        let mut table = Self::empty();
        for (ext, mime) in DEFAULT_TYPES {
            table.insert(ext, mime);
        }
        table
    }
}

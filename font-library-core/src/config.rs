use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where font records live in the target application, and which files count as fonts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Record type (doctype) holding one record per font.
    pub doctype: String,
    /// Field holding the font name, the dedup key.
    pub font_name_field: String,
    /// Attach field holding the stored file URL.
    pub attach_field: String,
    /// Extensions accepted by the local scanner, matched case-insensitively.
    pub valid_extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            doctype: "Font Library".to_string(),
            font_name_field: "font_name".to_string(),
            attach_field: "font_file".to_string(),
            valid_extensions: [".ttf", ".otf", ".woff", ".woff2"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl LibraryConfig {
    pub fn trace_loaded(&self) {
        info!(
            doctype = %self.doctype,
            font_name_field = %self.font_name_field,
            attach_field = %self.attach_field,
            extensions = ?self.valid_extensions,
            "Loaded library config"
        );
        debug!(?self, "Library config loaded (full debug)");
    }
}

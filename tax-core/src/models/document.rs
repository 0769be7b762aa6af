use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A receipt, invoice or statement filed under the documents root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    /// External reference such as an invoice number.
    pub doc_ref: Option<String>,
    pub display_name: String,
    /// Location below the documents root.
    pub relative_path: String,
    pub gdrive_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Where the file lives on this machine, given the documents root.
    pub fn full_local_path(
        &self,
        root: &Path,
    ) -> PathBuf {
        root.join(&self.relative_path)
    }
}

/// For creating new documents (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub doc_ref: Option<String>,
    pub display_name: String,
    pub relative_path: String,
    pub gdrive_id: Option<String>,
}

impl NewDocument {
    pub fn new(
        display_name: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            doc_ref: None,
            display_name: display_name.into(),
            relative_path: relative_path.into(),
            gdrive_id: None,
        }
    }
}

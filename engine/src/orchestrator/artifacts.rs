//! Artifact output layout
//!
//! Generated files land under `<output_root>/<session_id>/<category>/` when
//! session scoping is on, or `<output_root>/<category>/` otherwise.

use sdk::errors::EngineError;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::state::ArtifactCategory;

/// Entry artifact the session links to when it exists
pub const ENTRY_FILE: &str = "index.html";

/// Fallback name for labels that reduce to nothing
const UNNAMED_FILE: &str = "unnamed.txt";

/// Root of all generated output
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_root: PathBuf,
    scope_by_session: bool,
    public_base_url: Option<String>,
}

impl ArtifactStore {
    pub fn new(
        output_root: impl Into<PathBuf>,
        scope_by_session: bool,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            scope_by_session,
            public_base_url,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Output directory for one session
    pub fn for_session(&self, session_id: &str) -> ArtifactDir {
        let root = if self.scope_by_session {
            self.output_root.join(session_id)
        } else {
            self.output_root.clone()
        };

        ArtifactDir {
            root,
            output_root: self.output_root.clone(),
            public_base_url: self.public_base_url.clone(),
        }
    }
}

/// Output directory of a single session
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
    output_root: PathBuf,
    public_base_url: Option<String>,
}

impl ArtifactDir {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination for `filename` in `category`
    ///
    /// Only the final path component of `filename` is used, so a label can
    /// never point outside the category directory.
    pub fn path_for(&self, category: ArtifactCategory, filename: &str) -> PathBuf {
        self.root
            .join(category.as_str())
            .join(safe_file_name(filename))
    }

    /// Write one artifact, creating directories as needed
    pub async fn write(
        &self,
        category: ArtifactCategory,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf, EngineError> {
        let path = self.path_for(category, filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::Artifact(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::write(&path, content).await.map_err(|e| {
            EngineError::Artifact(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), bytes = content.len(), "artifact written");
        Ok(path)
    }

    pub fn entry_path(&self) -> PathBuf {
        self.path_for(ArtifactCategory::Frontend, ENTRY_FILE)
    }

    /// Link to the entry artifact, if it exists on disk
    pub fn entry_link(&self) -> Option<String> {
        let entry = self.entry_path();
        if !entry.is_file() {
            return None;
        }

        if let Some(base) = &self.public_base_url {
            let relative = entry.strip_prefix(&self.output_root).ok()?;
            let parts: Vec<String> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            return Some(format!("{}/outputs/{}", base, parts.join("/")));
        }

        let absolute = entry.canonicalize().unwrap_or(entry);
        Some(file_url(&absolute))
    }

    /// Link to the entry artifact, only if it is among `written_paths`
    ///
    /// With unscoped output directories an `index.html` may belong to
    /// another session, so existence on disk is not enough.
    pub fn written_entry_link(&self, written_paths: &BTreeSet<String>) -> Option<String> {
        let entry = self.entry_path().display().to_string();
        if written_paths.contains(&entry) {
            self.entry_link()
        } else {
            None
        }
    }

    /// Closing sentence appended to the final response
    pub fn entry_link_message(&self, written_paths: &BTreeSet<String>) -> Option<String> {
        self.written_entry_link(written_paths).map(|link| {
            format!(
                "\n\nThe website has been generated. [Open website]({})",
                link
            )
        })
    }
}

fn safe_file_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim_matches('.').is_empty())
        .unwrap_or_else(|| UNNAMED_FILE.to_string())
}

fn file_url(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{}", display)
    } else {
        format!("file:///{}", display)
    }
}

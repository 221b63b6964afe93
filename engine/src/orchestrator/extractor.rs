//! Code block extraction
//!
//! Generated text carries files between paired markers such as
//!
//! ```text
//! <!--- index.html_CODE_START --->
//! ...
//! <!--- index.html_CODE_END --->
//! ```
//!
//! A single token regex finds individual markers; pairing happens in
//! [`CodeBlockExtractor::parse`]. A start marker pairs with the next end
//! marker carrying the same label and everything between them, nested
//! markers included, is content. Broken markers become diagnostics and never
//! fail the extraction.

use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::artifacts::ArtifactDir;
use super::state::{ArtifactCategory, ArtifactMap};

const MARKER_PATTERN: &str = r"(?i)(?:<!---|/\*\s*---|//\s*---|--\s*---|#\s*---)\s*([A-Za-z0-9_.\-]+)_CODE_(START|END)\s*(?:--->|---\s*\*/|---)?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Start,
    End,
}

#[derive(Debug, Clone)]
struct Marker {
    label: String,
    kind: MarkerKind,
    start: usize,
    end: usize,
}

/// Problem found while pairing markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    UnterminatedStart(String),
    UnmatchedEnd(String),
    DuplicateLabel(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnterminatedStart(label) => {
                write!(f, "start marker for '{}' has no end marker", label)
            }
            Diagnostic::UnmatchedEnd(label) => {
                write!(f, "end marker for '{}' has no start marker", label)
            }
            Diagnostic::DuplicateLabel(label) => {
                write!(f, "label '{}' appears more than once, keeping the last", label)
            }
        }
    }
}

/// One labelled segment of generated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub label: String,
    pub content: String,
}

/// Result of pairing markers in a text
#[derive(Debug, Clone, Default)]
pub struct ParsedBlocks {
    /// In first-seen order; a repeated label replaces the earlier content
    pub blocks: Vec<CodeBlock>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedBlocks {
    pub fn mapping(&self) -> BTreeMap<String, String> {
        self.blocks
            .iter()
            .map(|b| (b.label.clone(), b.content.clone()))
            .collect()
    }
}

/// A classified block and where it was written
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub label: String,
    pub filename: String,
    pub category: ArtifactCategory,
    pub content: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub blocks: BTreeMap<String, String>,
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExtractionReport {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// filename -> content for one category
    pub fn map_for(&self, category: ArtifactCategory) -> ArtifactMap {
        self.artifacts
            .iter()
            .filter(|a| a.category == category)
            .map(|a| (a.filename.clone(), a.content.clone()))
            .collect()
    }

    /// Categories that received at least one artifact
    pub fn categories(&self) -> Vec<ArtifactCategory> {
        ArtifactCategory::ALL
            .into_iter()
            .filter(|c| self.artifacts.iter().any(|a| a.category == *c))
            .collect()
    }

    pub fn written_paths(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .map(|a| a.path.display().to_string())
            .collect()
    }
}

/// Parses, classifies and persists delimited code blocks
#[derive(Debug, Clone)]
pub struct CodeBlockExtractor {
    marker: Regex,
}

impl CodeBlockExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            marker: Regex::new(MARKER_PATTERN)?,
        })
    }

    fn markers(&self, text: &str) -> Vec<Marker> {
        self.marker
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let label = caps.get(1)?.as_str().to_lowercase();
                let kind = if caps.get(2)?.as_str().eq_ignore_ascii_case("start") {
                    MarkerKind::Start
                } else {
                    MarkerKind::End
                };
                Some(Marker {
                    label,
                    kind,
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect()
    }

    /// Pair markers into labelled blocks
    pub fn parse(&self, text: &str) -> ParsedBlocks {
        let markers = self.markers(text);
        let mut parsed = ParsedBlocks::default();
        let mut i = 0;

        while i < markers.len() {
            let marker = &markers[i];
            if marker.kind == MarkerKind::End {
                parsed
                    .diagnostics
                    .push(Diagnostic::UnmatchedEnd(marker.label.clone()));
                i += 1;
                continue;
            }

            let closing = markers[i + 1..]
                .iter()
                .position(|m| m.kind == MarkerKind::End && m.label == marker.label)
                .map(|offset| i + 1 + offset);

            let Some(j) = closing else {
                parsed
                    .diagnostics
                    .push(Diagnostic::UnterminatedStart(marker.label.clone()));
                i += 1;
                continue;
            };

            let content = text[marker.end..markers[j].start].trim().to_string();
            match parsed.blocks.iter_mut().find(|b| b.label == marker.label) {
                Some(existing) => {
                    parsed
                        .diagnostics
                        .push(Diagnostic::DuplicateLabel(marker.label.clone()));
                    existing.content = content;
                }
                None => parsed.blocks.push(CodeBlock {
                    label: marker.label.clone(),
                    content,
                }),
            }

            i = j + 1;
        }

        parsed
    }

    /// Parse `text`, classify every block and write it under `dir`
    ///
    /// `hint` is the category of the worker that produced the text; it
    /// settles extensions shared between layers.
    pub async fn extract_and_save(
        &self,
        text: &str,
        dir: &ArtifactDir,
        hint: Option<ArtifactCategory>,
    ) -> Result<ExtractionReport> {
        let parsed = self.parse(text);
        for diagnostic in &parsed.diagnostics {
            warn!("Code block extraction: {}", diagnostic);
        }

        let mut report = ExtractionReport {
            blocks: parsed.mapping(),
            artifacts: Vec::with_capacity(parsed.blocks.len()),
            diagnostics: parsed.diagnostics,
        };

        for block in parsed.blocks {
            let (filename, category) = classify(&block.label, hint);
            let path = dir.write(category, &filename, &block.content).await?;
            debug!(label = %block.label, filename = %filename, category = %category, "block classified");

            report
                .artifacts
                .retain(|a| !(a.category == category && a.filename == filename));
            report.artifacts.push(Artifact {
                label: block.label,
                filename,
                category,
                content: block.content,
                path,
            });
        }

        Ok(report)
    }
}

/// Map a label to its filename and category
pub fn classify(label: &str, hint: Option<ArtifactCategory>) -> (String, ArtifactCategory) {
    let label = label.trim().to_lowercase();
    let script_category = hint.unwrap_or(ArtifactCategory::Frontend);

    let known = match label.as_str() {
        "html" => Some(("index.html", ArtifactCategory::Frontend)),
        "css" => Some(("style.css", ArtifactCategory::Frontend)),
        "javascript" | "js" => Some(("script.js", script_category)),
        "python" | "py" => Some(("app.py", ArtifactCategory::Backend)),
        "requirements.txt" => Some(("requirements.txt", ArtifactCategory::Backend)),
        "dockerfile" => Some(("Dockerfile", ArtifactCategory::Backend)),
        "sql" => Some(("schema.sql", ArtifactCategory::Database)),
        _ => None,
    };
    if let Some((filename, category)) = known {
        return (filename.to_string(), category);
    }

    if label.trim_matches('.').is_empty() {
        return ("unnamed.txt".to_string(), ArtifactCategory::Unclassified);
    }

    if let Some((_, extension)) = label.rsplit_once('.') {
        return (label.clone(), category_for_extension(extension, hint));
    }

    match language_extension(&label) {
        Some(extension) => (
            format!("{}.{}", label, extension),
            category_for_extension(extension, hint),
        ),
        None => (format!("{}.txt", label), ArtifactCategory::Unclassified),
    }
}

fn category_for_extension(extension: &str, hint: Option<ArtifactCategory>) -> ArtifactCategory {
    match extension {
        "html" | "htm" | "css" | "scss" | "jsx" | "tsx" | "vue" | "svelte" => {
            ArtifactCategory::Frontend
        }
        "py" | "rb" | "go" | "rs" | "java" | "php" | "kt" | "cs" | "sh" | "toml" => {
            ArtifactCategory::Backend
        }
        "sql" | "cypher" | "cql" | "prisma" => ArtifactCategory::Database,
        "js" | "mjs" | "ts" => hint.unwrap_or(ArtifactCategory::Frontend),
        "json" | "yaml" | "yml" => hint.unwrap_or(ArtifactCategory::Unclassified),
        _ => ArtifactCategory::Unclassified,
    }
}

fn language_extension(language: &str) -> Option<&'static str> {
    let extension = match language {
        "typescript" | "ts" => "ts",
        "rust" | "rs" => "rs",
        "go" | "golang" => "go",
        "java" => "java",
        "ruby" | "rb" => "rb",
        "php" => "php",
        "kotlin" => "kt",
        "csharp" | "cs" => "cs",
        "bash" | "shell" | "sh" => "sh",
        "toml" => "toml",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "scss" => "scss",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "vue" => "vue",
        "svelte" => "svelte",
        "cypher" => "cypher",
        "prisma" => "prisma",
        _ => return None,
    };
    Some(extension)
}

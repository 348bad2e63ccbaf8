//! Corpus preprocessing: turning a directory of pages into text units.

use crate::cache::{fingerprint, CacheFile};
use crate::types::TextUnit;
use kolrag_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bump when the section splitting or document id rules change.
const SNAPSHOT_VERSION: u32 = 2;

const CORPUS_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Produces the text units of a corpus.
#[async_trait::async_trait]
pub trait Preprocessor: Send + Sync {
    fn name(&self) -> &str;

    /// Load the units of the corpus at `corpus`, from cache when possible.
    ///
    /// # Errors
    /// `AppError::CorpusNotFound` when neither the corpus nor a cached
    /// snapshot of it exists; `AppError::CorpusUnavailable` when the corpus
    /// exists but cannot be read.
    async fn load_or_process(&self, corpus: &Path) -> AppResult<Vec<TextUnit>>;
}

/// Splits markdown pages into one unit per section.
///
/// Document id is the page's path relative to the corpus, without its
/// extension and with `/` separators (`100.md` is `100`, `a/x.md` is `a/x`).
/// Sections start at lines beginning with `#`;
/// section ids are the 0-based section positions within the page, blank
/// sections leave gaps. Every unit's content begins with the page title so
/// sections stay attributable on their own.
#[derive(Debug, Clone, Default)]
pub struct MarkdownCorpusPreprocessor {
    cache_dir: Option<PathBuf>,
}

impl MarkdownCorpusPreprocessor {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }

    fn cache_for(&self, corpus: &Path) -> Option<CacheFile> {
        self.cache_dir.as_ref().map(|dir| {
            CacheFile::new(
                dir,
                "corpus",
                &corpus.to_string_lossy(),
                SNAPSHOT_VERSION,
            )
        })
    }

    /// Page files under `corpus`, in a stable order.
    ///
    /// Entries the walk cannot read (broken links, unreadable directories)
    /// are skipped with a warning.
    fn discover(corpus: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(corpus).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable corpus entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_page = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| CORPUS_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if is_page {
                files.push(entry.into_path());
            }
        }
        files
    }

    fn read_pages(corpus: &Path, files: &[PathBuf]) -> AppResult<Vec<(PathBuf, String)>> {
        files
            .iter()
            .map(|path| {
                let text = fs::read_to_string(path).map_err(|e| {
                    AppError::CorpusUnavailable(format!("Failed to read {:?}: {}", path, e))
                })?;
                let relative = path.strip_prefix(corpus).unwrap_or(path).to_path_buf();
                Ok((relative, text))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Preprocessor for MarkdownCorpusPreprocessor {
    fn name(&self) -> &str {
        "markdown"
    }

    #[tracing::instrument(skip(self), fields(preprocessor = "markdown"))]
    async fn load_or_process(&self, corpus: &Path) -> AppResult<Vec<TextUnit>> {
        let cache = self.cache_for(corpus);

        if !corpus.exists() {
            if let Some(cache) = &cache {
                if let Some(units) = cache.load_any::<Vec<TextUnit>>()? {
                    tracing::info!(
                        "Corpus {:?} not present, serving {} cached units",
                        corpus,
                        units.len()
                    );
                    return Ok(units);
                }
            }
            return Err(AppError::CorpusNotFound(corpus.to_path_buf()));
        }
        if !corpus.is_dir() {
            return Err(AppError::CorpusUnavailable(format!(
                "{:?} is not a directory",
                corpus
            )));
        }

        let files = Self::discover(corpus);
        let pages = Self::read_pages(corpus, &files)?;
        let snapshot = fingerprint(pages.iter().flat_map(|(path, text)| {
            [
                path.to_string_lossy().into_owned().into_bytes(),
                text.as_bytes().to_vec(),
            ]
        }));

        if let Some(cache) = &cache {
            if let Some(units) = cache.load::<Vec<TextUnit>>(&snapshot)? {
                tracing::info!("Loaded {} units from corpus cache", units.len());
                return Ok(units);
            }
        }

        let mut units = Vec::new();
        for (path, text) in &pages {
            units.extend(split_page(&document_id(path), text));
        }

        tracing::info!(
            "Processed {} pages into {} units from {:?}",
            pages.len(),
            units.len(),
            corpus
        );

        if let Some(cache) = &cache {
            cache.store(&snapshot, &units)?;
        }
        Ok(units)
    }
}

/// Relative page path without its extension, `/`-separated.
fn document_id(relative: &Path) -> String {
    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split one markdown page into section units.
pub fn split_page(doc_id: &str, text: &str) -> Vec<TextUnit> {
    let text = collapse_blank_lines(&text.replace("\r\n", "\n"));

    let title = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .unwrap_or_default();

    text.split("\n#")
        .enumerate()
        .filter(|(_, section)| !section.trim().is_empty())
        .map(|(i, section)| {
            let section = if i == 0 {
                section.to_string()
            } else {
                format!("#{}", section)
            };
            let (header, body) = section.split_once('\n').unwrap_or((section.as_str(), ""));
            let content = format!("{}\n{}\n{}", title, header.trim(), body.trim());
            TextUnit::new(doc_id, i.to_string(), content.trim_end())
        })
        .collect()
}

/// Collapse runs of three or more newlines into one blank line.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Serves a fixed set of units.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPreprocessor {
    units: Vec<TextUnit>,
}

impl InMemoryPreprocessor {
    pub fn new(units: Vec<TextUnit>) -> Self {
        Self { units }
    }
}

#[async_trait::async_trait]
impl Preprocessor for InMemoryPreprocessor {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load_or_process(&self, _corpus: &Path) -> AppResult<Vec<TextUnit>> {
        Ok(self.units.clone())
    }
}

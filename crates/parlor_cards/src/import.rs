//! Card import
//!
//! Converts card images to canonical JSON files. Output goes next to the
//! source image unless an output directory is set, and never overwrites an
//! existing card: a second `Ava` becomes `Ava_001.json`, then `Ava_002.json`.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::card::{CharacterCard, TavernCard};
use crate::embedded::extract_card_json;
use crate::error::{CardError, CardResult};

/// One successfully imported card
#[derive(Debug, Clone)]
pub struct ImportedCard {
    pub card: CharacterCard,
    pub json_path: PathBuf,
    /// Copy of the source image, when written to a separate output directory
    pub image_path: Option<PathBuf>,
}

/// Outcome of importing a file or directory
#[derive(Debug, Default)]
pub struct ImportReport {
    /// PNG cards converted and written
    pub imported: Vec<ImportedCard>,
    /// Canonical JSON cards that loaded cleanly
    pub loaded: Vec<(PathBuf, CharacterCard)>,
    /// Files that failed, with the reason
    pub failed: Vec<(PathBuf, CardError)>,
    /// Files that are neither PNG nor JSON
    pub skipped: Vec<PathBuf>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CardImporter {
    output_dir: Option<PathBuf>,
}

impl CardImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write cards into `dir` instead of next to their images.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Convert one PNG card and write its canonical JSON.
    pub fn import_png(&self, path: &Path) -> CardResult<ImportedCard> {
        let bytes = std::fs::read(path).map_err(|e| CardError::io(path, e))?;
        let json = extract_card_json(&bytes)?;
        let card = CharacterCard::from(TavernCard::from_json(&json)?);

        let source_dir = path.parent().unwrap_or(Path::new("."));
        let out_dir = self.output_dir.as_deref().unwrap_or(source_dir);
        std::fs::create_dir_all(out_dir).map_err(|e| CardError::io(out_dir, e))?;

        let stem = unique_stem(out_dir, &sanitize_file_stem(&card.char_name));
        let json_path = out_dir.join(format!("{stem}.json"));
        let rendered = serde_json::to_string_pretty(&card)?;
        std::fs::write(&json_path, rendered).map_err(|e| CardError::io(&json_path, e))?;

        let image_path = if self.output_dir.is_some() {
            let image_path = out_dir.join(format!("{stem}.png"));
            std::fs::write(&image_path, &bytes).map_err(|e| CardError::io(&image_path, e))?;
            Some(image_path)
        } else {
            None
        };

        info!(
            "New character '{}' saved to {}",
            card.char_name,
            json_path.display()
        );
        Ok(ImportedCard {
            card,
            json_path,
            image_path,
        })
    }

    /// Import a single card file or every card in a directory.
    pub fn import_path(&self, path: &Path) -> CardResult<ImportReport> {
        if path.is_dir() {
            return self.import_dir(path);
        }
        let mut report = ImportReport::default();
        self.import_entry(path, &mut report);
        Ok(report)
    }

    /// Import every card in `dir`.
    ///
    /// Failures are recorded per file and never stop the batch. Only failing
    /// to list the directory is an error.
    pub fn import_dir(&self, dir: &Path) -> CardResult<ImportReport> {
        let mut entries = std::fs::read_dir(dir)
            .map_err(|e| CardError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        // listed up front so files written during the import are not revisited
        entries.sort();

        let mut report = ImportReport::default();
        for path in entries {
            self.import_entry(&path, &mut report);
        }
        info!(
            imported = report.imported.len(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Card import finished for {}",
            dir.display()
        );
        Ok(report)
    }

    fn import_entry(&self, path: &Path, report: &mut ImportReport) {
        match CardKind::of(path) {
            Some(CardKind::Png) => match self.import_png(path) {
                Ok(imported) => report.imported.push(imported),
                Err(e) => {
                    warn!("Failed to import {}: {}", path.display(), e);
                    report.failed.push((path.to_path_buf(), e));
                }
            },
            Some(CardKind::Json) => match CharacterCard::load(path) {
                Ok(card) => {
                    debug!("Loaded character '{}' from {}", card.char_name, path.display());
                    report.loaded.push((path.to_path_buf(), card));
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", path.display(), e);
                    report.failed.push((path.to_path_buf(), e));
                }
            },
            None => {
                debug!("Unsupported file type: {}", path.display());
                report.skipped.push(path.to_path_buf());
            }
        }
    }
}

enum CardKind {
    Png,
    Json,
}

impl CardKind {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// First free stem in `dir` among `name`, `name_001`, `name_002`, ...
pub fn unique_stem(dir: &Path, name: &str) -> String {
    let taken = |stem: &str| dir.join(format!("{stem}.json")).exists();
    if !taken(name) {
        return name.to_string();
    }
    (1u32..)
        .map(|i| format!("{name}_{i:03}"))
        .find(|stem| !taken(stem))
        .unwrap_or_else(|| name.to_string())
}

/// Make a character name safe to use as a file name.
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "character".to_string()
    } else {
        stem.to_string()
    }
}

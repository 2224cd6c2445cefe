use crate::config::Config;
use crate::model::Analysis;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File-per-id storage for uploaded images and their analyses.
pub struct Library {
    uploads: PathBuf,
    analyses: PathBuf,
}

pub struct AnalysisRecord {
    pub analysis: Analysis,
    pub image_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LibraryItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub image_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

/// Content type by file extension; `None` means the file is not an
/// accepted image format.
pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

impl Library {
    pub fn open(config: &Config) -> Result<Self> {
        let library = Self {
            uploads: PathBuf::from(&config.uploads_folder),
            analyses: PathBuf::from(&config.analyses_folder),
        };
        fs::create_dir_all(&library.uploads)?;
        fs::create_dir_all(&library.analyses)?;
        Ok(library)
    }

    /// Copies an image into the library under a fresh id, keeping the
    /// original extension.
    pub fn import_image(&self, source: &Path) -> Result<String> {
        mime_for(source).ok_or_else(|| {
            anyhow!("Only image files (JPEG, PNG, GIF, WebP) are allowed: {:?}", source)
        })?;

        let id = Uuid::new_v4().to_string();
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let dest = self.uploads.join(format!("{}.{}", id, ext));
        fs::copy(source, &dest)
            .with_context(|| format!("Failed to copy {:?} into the library", source))?;
        Ok(id)
    }

    pub fn save_analysis(&self, id: &str, analysis: &Analysis) -> Result<()> {
        let path = self.analyses.join(format!("{}.json", id));
        let content = serde_json::to_string_pretty(analysis)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<AnalysisRecord> {
        let path = self.analyses.join(format!("{}.json", id));
        let content =
            fs::read_to_string(&path).with_context(|| format!("Analysis not found: {}", id))?;
        let analysis: Analysis = serde_json::from_str(&content)
            .with_context(|| format!("Malformed analysis file: {:?}", path))?;

        let image_path = self
            .find_image(id)?
            .ok_or_else(|| anyhow!("Image not found for analysis {}", id))?;

        Ok(AnalysisRecord {
            analysis,
            image_path,
        })
    }

    /// Directory for synthesized narration chunks belonging to one analysis.
    pub fn narration_dir(&self, id: &str) -> PathBuf {
        self.analyses.join(format!("{}_narration", id))
    }

    fn find_image(&self, id: &str) -> Result<Option<PathBuf>> {
        for entry in fs::read_dir(&self.uploads)? {
            let path = entry?.path();
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if stem == id {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    /// All stored analyses, newest first. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<LibraryItem>> {
        let mut items = Vec::new();

        for entry in fs::read_dir(&self.analyses)? {
            let path = entry?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };

            let analysis: Analysis = match fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str(&c).ok())
            {
                Some(a) => a,
                None => {
                    log::warn!("Skipping malformed analysis file {:?}", path);
                    continue;
                }
            };

            let metadata = fs::metadata(&path)?;
            let created = metadata.created().or_else(|_| metadata.modified())?;

            items.push(LibraryItem {
                image_path: self.find_image(&id)?,
                id,
                title: if analysis.title.is_empty() {
                    "Untitled".to_string()
                } else {
                    analysis.title
                },
                summary: analysis.summary,
                created_at: DateTime::<Utc>::from(created),
            });
        }

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::placeholder_analysis;

    fn library_in(dir: &Path) -> Library {
        let config = Config {
            uploads_folder: dir.join("uploads").to_string_lossy().to_string(),
            analyses_folder: dir.join("analyses").to_string_lossy().to_string(),
            ..serde_yaml_ng::from_str("{}").unwrap()
        };
        Library::open(&config).unwrap()
    }

    #[test]
    fn import_save_load_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = library_in(dir.path());

        let image = dir.path().join("sheet.png");
        fs::write(&image, b"fake png")?;

        let id = library.import_image(&image)?;
        library.save_analysis(&id, &placeholder_analysis())?;

        let record = library.load(&id)?;
        assert_eq!(record.analysis.steps.len(), 1);
        assert!(record.image_path.ends_with(format!("{}.png", id)));
        Ok(())
    }

    #[test]
    fn import_rejects_non_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = library_in(dir.path());

        let file = dir.path().join("notes.txt");
        fs::write(&file, b"hello")?;
        assert!(library.import_image(&file).is_err());
        Ok(())
    }

    #[test]
    fn load_unknown_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_in(dir.path());
        assert!(library.load("missing").is_err());
    }

    #[test]
    fn list_skips_malformed_and_sorts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = library_in(dir.path());

        let image = dir.path().join("a.jpg");
        fs::write(&image, b"jpeg")?;
        let id = library.import_image(&image)?;
        library.save_analysis(&id, &placeholder_analysis())?;

        fs::write(dir.path().join("analyses").join("broken.json"), b"{nope")?;

        let items = library.list()?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert!(items[0].image_path.is_some());
        Ok(())
    }
}

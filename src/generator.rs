use anyhow::Result;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{load_template, Assets, Layout};
use crate::draft::{document_file_name, GeneratedDocument, PrescriptionDraft};
use crate::error::GenerateError;
use crate::pdf::compose;

/// Composes drafts against the bundled template and persists the result.
#[derive(Debug, Clone)]
pub struct PrescriptionGenerator {
    template_path: PathBuf,
    layout: Layout,
}

impl PrescriptionGenerator {
    /// Generator for the template and layout in `assets`.
    pub fn from_assets(assets: &Assets) -> Result<Self> {
        Ok(Self::new(assets.template_path(), assets.load_layout()?))
    }

    pub fn new(template_path: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            template_path: template_path.into(),
            layout,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Compose `draft` into PDF bytes without writing anything.
    pub fn compose(&self, draft: &PrescriptionDraft) -> Result<Vec<u8>, GenerateError> {
        let template = load_template(&self.template_path)?;
        compose(&template, draft, &self.layout)
    }

    /// Compose `draft` and write it to `documents_dir` as
    /// `receita_<name>_<timestamp>.pdf`.
    ///
    /// On any failure no file is left in `documents_dir`.
    pub fn generate(
        &self,
        draft: &PrescriptionDraft,
        documents_dir: &Path,
        now: NaiveDateTime,
    ) -> Result<GeneratedDocument, GenerateError> {
        let bytes = self.compose(draft)?;

        let file_path = documents_dir.join(document_file_name(&draft.patient_name, now));
        if !documents_dir.is_dir() {
            return Err(GenerateError::Write {
                path: file_path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "documents directory is unavailable",
                ),
            });
        }

        write_atomic(&file_path, &bytes)?;
        let document = GeneratedDocument { bytes, file_path };
        tracing::info!(
            "PDF saved at {:?} ({} bytes)",
            document.file_path,
            document.bytes.len()
        );

        Ok(document)
    }
}

/// Write through a temporary sibling file, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GenerateError> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp_path = path.with_file_name(tmp_name);

    let result = fs::write(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(GenerateError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

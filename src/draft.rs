use chrono::NaiveDateTime;
use std::path::PathBuf;

/// The three fields of the form at the moment generation is triggered.
///
/// No field is validated; empty strings are drawn as blank overlays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionDraft {
    pub patient_name: String,
    pub prescription_text: String,
    /// Pre-formatted date text, e.g. "15 de Março de 2024".
    pub issue_date: String,
}

#[cfg(test)]
impl PrescriptionDraft {
    pub fn new(
        patient_name: impl Into<String>,
        prescription_text: impl Into<String>,
        issue_date: impl Into<String>,
    ) -> Self {
        Self {
            patient_name: patient_name.into(),
            prescription_text: prescription_text.into(),
            issue_date: issue_date.into(),
        }
    }
}

/// A composed prescription and where it was written.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub bytes: Vec<u8>,
    pub file_path: PathBuf,
}

/// `yyyy-MM-dd HH:mm:ss.SSS`
pub fn timestamp(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// `receita_<name>_<timestamp>.pdf`
///
/// Path separators in the name become `-` so the file stays in the
/// documents directory.
pub fn document_file_name(patient_name: &str, now: NaiveDateTime) -> String {
    let name: String = patient_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect();
    format!("receita_{}_{}.pdf", name, timestamp(now))
}

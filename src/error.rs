use std::path::PathBuf;

/// Failures of a prescription generation.
///
/// All variants abort the remaining steps; no output file is left behind.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("template not found at {0:?}")]
    TemplateNotFound(PathBuf),

    #[error("failed to load template: {0}")]
    TemplateLoad(String),

    #[error("failed to render document: {0}")]
    Render(String),

    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

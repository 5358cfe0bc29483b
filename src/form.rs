//! The prescription form as an observable record.
//!
//! The presentation layer owns a [`PrescriptionForm`], binds its inputs to
//! the setters and re-renders from the [`FormView`] handed to observers.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

use crate::draft::PrescriptionDraft;
use crate::error::GenerateError;
use crate::generator::PrescriptionGenerator;

/// Result of the last generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generated(PathBuf),
    Failed(String),
}

/// What a render callback sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub draft: PrescriptionDraft,
    pub status: GenerationStatus,
}

impl FormView {
    /// Path the share action exports, present only after a successful generation.
    pub fn share_target(&self) -> Option<&Path> {
        match &self.status {
            GenerationStatus::Generated(path) => Some(path),
            _ => None,
        }
    }
}

type Observer = Box<dyn FnMut(&FormView)>;

#[derive(Default)]
pub struct PrescriptionForm {
    draft: PrescriptionDraft,
    status: GenerationStatus,
    observers: Vec<Observer>,
}

impl PrescriptionForm {
    /// Register a render callback, invoked after every change.
    pub fn on_change(&mut self, observer: impl FnMut(&FormView) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn draft(&self) -> &PrescriptionDraft {
        &self.draft
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    pub fn set_patient_name(&mut self, value: impl Into<String>) {
        self.draft.patient_name = value.into();
        self.notify();
    }

    pub fn set_prescription_text(&mut self, value: impl Into<String>) {
        self.draft.prescription_text = value.into();
        self.notify();
    }

    pub fn set_issue_date(&mut self, value: impl Into<String>) {
        self.draft.issue_date = value.into();
        self.notify();
    }

    /// Generate the PDF from the current fields.
    ///
    /// Failures are logged and recorded in the status; the share target
    /// is cleared so it never points at a stale file.
    pub fn generate(
        &mut self,
        generator: &PrescriptionGenerator,
        documents_dir: &Path,
        now: NaiveDateTime,
    ) -> Result<PathBuf, GenerateError> {
        let draft = self.draft.clone();
        let result = generator.generate(&draft, documents_dir, now);

        self.status = match &result {
            Ok(document) => GenerationStatus::Generated(document.file_path.clone()),
            Err(e) => {
                tracing::error!("Generate prescription error: {:?}", e);
                GenerationStatus::Failed(e.to_string())
            }
        };
        self.notify();

        result.map(|document| document.file_path)
    }

    /// Snapshot of what observers see.
    pub fn view(&self) -> FormView {
        FormView {
            draft: self.draft.clone(),
            status: self.status.clone(),
        }
    }

    fn notify(&mut self) {
        let view = self.view();
        for observer in self.observers.iter_mut() {
            observer(&view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use crate::pdf::document::tests::test_template;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_milli_opt(8, 0, 0, 0)
            .unwrap()
    }

    fn recorder(form: &mut PrescriptionForm) -> Rc<RefCell<Vec<FormView>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        form.on_change(move |view| sink.borrow_mut().push(view.clone()));
        seen
    }

    #[test]
    fn test_setters_notify_observers() {
        let mut form = PrescriptionForm::default();
        let seen = recorder(&mut form);

        form.set_issue_date("15 de Março de 2024");
        form.set_patient_name("Maria Silva");
        form.set_prescription_text("Amoxicilina");

        assert_eq!(form.draft().patient_name, "Maria Silva");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].draft.patient_name, "");
        assert_eq!(seen[1].draft.patient_name, "Maria Silva");
        assert_eq!(seen[2].draft.prescription_text, "Amoxicilina");
        assert_eq!(seen[2].draft.issue_date, "15 de Março de 2024");
        assert_eq!(seen[2].share_target(), None);
    }

    #[test]
    fn test_successful_generation_enables_share() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("prescription.pdf");
        std::fs::write(&template, test_template()).unwrap();
        let generator = PrescriptionGenerator::new(&template, Layout::default());

        let mut form = PrescriptionForm::default();
        form.set_issue_date("15 de Março de 2024");
        let seen = recorder(&mut form);
        form.set_patient_name("Maria Silva");

        let path = form.generate(&generator, dir.path(), now()).unwrap();

        assert!(path.is_file());
        assert_eq!(form.view().share_target(), Some(path.as_path()));
        assert_eq!(seen.borrow().last().unwrap().share_target(), Some(path.as_path()));
    }

    #[test]
    fn test_failed_generation_clears_share() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("prescription.pdf");
        std::fs::write(&template, test_template()).unwrap();
        let generator = PrescriptionGenerator::new(&template, Layout::default());

        let mut form = PrescriptionForm::default();
        form.set_issue_date("15 de Março de 2024");
        form.generate(&generator, dir.path(), now()).unwrap();
        assert!(form.view().share_target().is_some());

        std::fs::remove_file(&template).unwrap();
        let before = std::fs::read_dir(dir.path()).unwrap().count();
        let err = form.generate(&generator, dir.path(), now()).unwrap_err();

        assert!(matches!(err, GenerateError::TemplateNotFound(_)));
        assert!(matches!(form.status(), GenerationStatus::Failed(_)));
        assert_eq!(form.view().share_target(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), before);
    }
}

mod rules;
mod scale;

use std::sync::Arc;

use tracing::info;

use super::domain::{CurriculumUnitId, FinalGrade, InstitutionSettings, Mark, MarkId, StudentId};
use super::errors::RecordsError;
use super::repository::{PolicyStore, RecordStore};

pub(crate) use rules::{grade_mark, validate_mark};

/// Turns marks into final grades and keeps exactly one grade per student and unit link.
pub struct GradeCalculator<S, P> {
    store: Arc<S>,
    policies: Arc<P>,
}

impl<S, P> Clone for GradeCalculator<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policies: Arc::clone(&self.policies),
        }
    }
}

impl<S, P> GradeCalculator<S, P>
where
    S: RecordStore + 'static,
    P: PolicyStore + 'static,
{
    pub fn new(store: Arc<S>, policies: Arc<P>) -> Self {
        Self { store, policies }
    }

    /// Grade a stored mark's unit link and upsert the result. Nothing is written on failure.
    ///
    /// The stored grade always comes from the link's current sitting, so grading an older
    /// mark returns the grade of the later one. Trashed marks are not graded.
    pub fn compute(&self, mark_id: &MarkId) -> Result<FinalGrade, RecordsError> {
        let mark = self
            .store
            .mark(mark_id)?
            .filter(Mark::is_active)
            .ok_or_else(|| RecordsError::not_found("mark", mark_id))?;

        let current = self
            .store
            .latest_active_mark(&mark.student, &mark.curriculum_unit)?
            .unwrap_or(mark);
        self.store_grade(&current)
    }

    /// Regrade a student's unit link from its latest active mark, dropping the grade when none remain.
    pub fn recompute_unit(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<FinalGrade>, RecordsError> {
        match self.store.latest_active_mark(student, curriculum_unit)? {
            Some(mark) => self.store_grade(&mark).map(Some),
            None => {
                self.store.remove_final_grade(student, curriculum_unit)?;
                info!(
                    student = %student,
                    unit = %curriculum_unit,
                    "final grade withdrawn; no active marks remain"
                );
                Ok(None)
            }
        }
    }

    fn store_grade(&self, mark: &Mark) -> Result<FinalGrade, RecordsError> {
        let grade = self.evaluate(mark)?;
        self.store.upsert_final_grade(grade.clone())?;

        info!(
            student = %grade.student,
            unit = %grade.curriculum_unit,
            total = grade.total_mark,
            grade = %grade.grade,
            status = grade.status.label(),
            "final grade recorded"
        );

        Ok(grade)
    }

    /// Validate and grade a mark without touching storage.
    pub fn evaluate(&self, mark: &Mark) -> Result<FinalGrade, RecordsError> {
        let settings = self.settings_for_student(&mark.student)?;
        validate_mark(mark, &settings)?;
        Ok(grade_mark(mark, &settings))
    }

    pub(crate) fn settings_for_student(
        &self,
        student: &StudentId,
    ) -> Result<InstitutionSettings, RecordsError> {
        let student = self
            .store
            .student(student)?
            .ok_or_else(|| RecordsError::not_found("student", student))?;

        self.policies
            .policy(&student.institution)?
            .ok_or_else(|| {
                RecordsError::Configuration(format!(
                    "no grading policy configured for institution {}",
                    student.institution
                ))
            })
    }
}

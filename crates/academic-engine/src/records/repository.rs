use super::domain::{
    AcademicYear, AcademicYearId, CurriculumUnitId, CurriculumUnitLink, FinalGrade, InstitutionId,
    InstitutionSettings, Mark, MarkId, Program, ProgramId, Student, StudentId,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read-only lookup of per-institution grading policy.
pub trait PolicyStore: Send + Sync {
    fn policy(
        &self,
        institution: &InstitutionId,
    ) -> Result<Option<InstitutionSettings>, RepositoryError>;
}

/// Curriculum and calendar lookups owned by the registry outside the engine.
pub trait CurriculumDirectory: Send + Sync {
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError>;
    fn curriculum_units(
        &self,
        program: &ProgramId,
        year_of_study: u8,
    ) -> Result<Vec<CurriculumUnitLink>, RepositoryError>;
    fn curriculum_unit(
        &self,
        id: &CurriculumUnitId,
    ) -> Result<Option<CurriculumUnitLink>, RepositoryError>;
    fn academic_year_by_name(&self, name: &str) -> Result<Option<AcademicYear>, RepositoryError>;
    fn academic_year(&self, id: &AcademicYearId) -> Result<Option<AcademicYear>, RepositoryError>;
    fn academic_year_following(
        &self,
        id: &AcademicYearId,
    ) -> Result<Option<AcademicYear>, RepositoryError>;
}

/// Storage abstraction for marks, derived grades, and student state.
pub trait RecordStore: Send + Sync {
    fn mark(&self, id: &MarkId) -> Result<Option<Mark>, RepositoryError>;
    fn latest_active_mark(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<Mark>, RepositoryError>;
    fn set_mark_trashed(&self, id: &MarkId, trashed: bool) -> Result<Mark, RepositoryError>;

    /// Upsert a mark and its unit link's current grade as one unit: both land or neither does.
    fn apply_grade_row(&self, mark: Mark, grade: FinalGrade) -> Result<(), RepositoryError>;

    /// Replace the grade keyed by (student, curriculum unit).
    fn upsert_final_grade(&self, grade: FinalGrade) -> Result<(), RepositoryError>;
    fn remove_final_grade(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<(), RepositoryError>;
    fn final_grade(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<FinalGrade>, RepositoryError>;
    fn final_grades_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<FinalGrade>, RepositoryError>;

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn update_student(&self, student: Student) -> Result<(), RepositoryError>;
    fn students_in_cohort(
        &self,
        program: &ProgramId,
        year_of_study: u8,
    ) -> Result<Vec<Student>, RepositoryError>;
}

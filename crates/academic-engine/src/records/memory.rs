use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::domain::{
    AcademicYear, AcademicYearId, CurriculumUnitId, CurriculumUnitLink, FinalGrade, InstitutionId,
    InstitutionSettings, Mark, MarkId, Program, ProgramId, Student, StudentId,
};
use super::repository::{CurriculumDirectory, PolicyStore, RecordStore, RepositoryError};

/// Serializable image of every record the in-memory store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub institutions: Vec<InstitutionSettings>,
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(default)]
    pub curriculum: Vec<CurriculumUnitLink>,
    #[serde(default)]
    pub academic_years: Vec<AcademicYear>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub marks: Vec<Mark>,
    #[serde(default)]
    pub final_grades: Vec<FinalGrade>,
}

/// Snapshot persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unable to access records snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("records snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct MemoryState {
    institutions: BTreeMap<InstitutionId, InstitutionSettings>,
    programs: BTreeMap<ProgramId, Program>,
    curriculum: BTreeMap<CurriculumUnitId, CurriculumUnitLink>,
    academic_years: BTreeMap<AcademicYearId, AcademicYear>,
    students: BTreeMap<StudentId, Student>,
    marks: BTreeMap<MarkId, Mark>,
    final_grades: BTreeMap<(StudentId, CurriculumUnitId), FinalGrade>,
}

impl From<RecordSnapshot> for MemoryState {
    fn from(snapshot: RecordSnapshot) -> Self {
        Self {
            institutions: snapshot
                .institutions
                .into_iter()
                .map(|settings| (settings.institution.clone(), settings))
                .collect(),
            programs: snapshot
                .programs
                .into_iter()
                .map(|program| (program.id.clone(), program))
                .collect(),
            curriculum: snapshot
                .curriculum
                .into_iter()
                .map(|link| (link.id.clone(), link))
                .collect(),
            academic_years: snapshot
                .academic_years
                .into_iter()
                .map(|year| (year.id.clone(), year))
                .collect(),
            students: snapshot
                .students
                .into_iter()
                .map(|student| (student.id.clone(), student))
                .collect(),
            marks: snapshot
                .marks
                .into_iter()
                .map(|mark| (mark.id.clone(), mark))
                .collect(),
            final_grades: snapshot
                .final_grades
                .into_iter()
                .map(|grade| {
                    (
                        (grade.student.clone(), grade.curriculum_unit.clone()),
                        grade,
                    )
                })
                .collect(),
        }
    }
}

impl MemoryState {
    fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            institutions: self.institutions.values().cloned().collect(),
            programs: self.programs.values().cloned().collect(),
            curriculum: self.curriculum.values().cloned().collect(),
            academic_years: self.academic_years.values().cloned().collect(),
            students: self.students.values().cloned().collect(),
            marks: self.marks.values().cloned().collect(),
            final_grades: self.final_grades.values().cloned().collect(),
        }
    }
}

/// Mutex-guarded store implementing every storage seam the engine uses.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl InMemoryRecordStore {
    pub fn from_snapshot(snapshot: RecordSnapshot) -> Self {
        Self {
            state: Mutex::new(MemoryState::from(snapshot)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: RecordSnapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let payload = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        self.state().snapshot()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("record store mutex poisoned")
    }
}

impl PolicyStore for InMemoryRecordStore {
    fn policy(
        &self,
        institution: &InstitutionId,
    ) -> Result<Option<InstitutionSettings>, RepositoryError> {
        Ok(self.state().institutions.get(institution).cloned())
    }
}

impl CurriculumDirectory for InMemoryRecordStore {
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError> {
        Ok(self.state().programs.get(id).cloned())
    }

    fn curriculum_units(
        &self,
        program: &ProgramId,
        year_of_study: u8,
    ) -> Result<Vec<CurriculumUnitLink>, RepositoryError> {
        let guard = self.state();
        let mut units: Vec<CurriculumUnitLink> = guard
            .curriculum
            .values()
            .filter(|link| &link.program == program && link.year_of_study == year_of_study)
            .cloned()
            .collect();
        units.sort_by(|a, b| {
            (a.semester, a.unit_code.as_str()).cmp(&(b.semester, b.unit_code.as_str()))
        });
        Ok(units)
    }

    fn curriculum_unit(
        &self,
        id: &CurriculumUnitId,
    ) -> Result<Option<CurriculumUnitLink>, RepositoryError> {
        Ok(self.state().curriculum.get(id).cloned())
    }

    fn academic_year_by_name(&self, name: &str) -> Result<Option<AcademicYear>, RepositoryError> {
        let name = name.trim();
        Ok(self
            .state()
            .academic_years
            .values()
            .find(|year| year.name == name)
            .cloned())
    }

    fn academic_year(&self, id: &AcademicYearId) -> Result<Option<AcademicYear>, RepositoryError> {
        Ok(self.state().academic_years.get(id).cloned())
    }

    fn academic_year_following(
        &self,
        id: &AcademicYearId,
    ) -> Result<Option<AcademicYear>, RepositoryError> {
        let guard = self.state();
        let Some(current) = guard.academic_years.get(id) else {
            return Ok(None);
        };
        Ok(guard
            .academic_years
            .values()
            .filter(|year| year.start_date > current.start_date)
            .min_by_key(|year| year.start_date)
            .cloned())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn mark(&self, id: &MarkId) -> Result<Option<Mark>, RepositoryError> {
        Ok(self.state().marks.get(id).cloned())
    }

    fn latest_active_mark(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<Mark>, RepositoryError> {
        let guard = self.state();
        let year_start = |mark: &Mark| {
            guard
                .academic_years
                .get(&mark.academic_year)
                .map(|year| year.start_date)
        };
        let latest = guard
            .marks
            .values()
            .filter(|mark| {
                mark.is_active()
                    && &mark.student == student
                    && &mark.curriculum_unit == curriculum_unit
            })
            .max_by(|a, b| {
                a.sitting_key(year_start(*a))
                    .cmp(&b.sitting_key(year_start(*b)))
            })
            .cloned();
        Ok(latest)
    }

    fn set_mark_trashed(&self, id: &MarkId, trashed: bool) -> Result<Mark, RepositoryError> {
        let mut guard = self.state();
        let mark = guard.marks.get_mut(id).ok_or(RepositoryError::NotFound)?;
        mark.trashed = trashed;
        Ok(mark.clone())
    }

    fn apply_grade_row(&self, mark: Mark, grade: FinalGrade) -> Result<(), RepositoryError> {
        // Both writes happen under one lock after the pair is checked, so neither lands alone.
        let mut guard = self.state();
        if grade.student != mark.student || grade.curriculum_unit != mark.curriculum_unit {
            return Err(RepositoryError::Conflict);
        }
        if !guard.students.contains_key(&mark.student) {
            return Err(RepositoryError::NotFound);
        }

        guard.marks.insert(mark.id.clone(), mark);
        guard.final_grades.insert(
            (grade.student.clone(), grade.curriculum_unit.clone()),
            grade,
        );
        Ok(())
    }

    fn upsert_final_grade(&self, grade: FinalGrade) -> Result<(), RepositoryError> {
        let mut guard = self.state();
        guard.final_grades.insert(
            (grade.student.clone(), grade.curriculum_unit.clone()),
            grade,
        );
        Ok(())
    }

    fn remove_final_grade(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<(), RepositoryError> {
        self.state()
            .final_grades
            .remove(&(student.clone(), curriculum_unit.clone()));
        Ok(())
    }

    fn final_grade(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<FinalGrade>, RepositoryError> {
        Ok(self
            .state()
            .final_grades
            .get(&(student.clone(), curriculum_unit.clone()))
            .cloned())
    }

    fn final_grades_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<FinalGrade>, RepositoryError> {
        Ok(self
            .state()
            .final_grades
            .values()
            .filter(|grade| &grade.student == student)
            .cloned()
            .collect())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.state().students.get(id).cloned())
    }

    fn update_student(&self, student: Student) -> Result<(), RepositoryError> {
        let mut guard = self.state();
        if guard.students.contains_key(&student.id) {
            guard.students.insert(student.id.clone(), student);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn students_in_cohort(
        &self,
        program: &ProgramId,
        year_of_study: u8,
    ) -> Result<Vec<Student>, RepositoryError> {
        Ok(self
            .state()
            .students
            .values()
            .filter(|student| {
                &student.program == program
                    && student.current_year_of_study == year_of_study
                    && student.status.is_enrolled()
            })
            .cloned()
            .collect())
    }
}

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{EngineConfig, WeightingTable};
use crate::records::domain::{
    AcademicYear, AcademicYearId, CurriculumUnitId, CurriculumUnitLink, EntryMode, FinalGrade,
    InstitutionId, InstitutionSettings, Mark, MarkId, Program, ProgramId, SchoolType, Student,
    StudentId, StudentStatus,
};
use crate::records::import::MarkImportRow;
use crate::records::memory::{InMemoryRecordStore, RecordSnapshot};
use crate::records::repository::{RecordStore, RepositoryError};
use crate::records::service::AcademicRecordsService;

pub(super) const FIRST_YEAR: &str = "2023/2024";
pub(super) const SECOND_YEAR: &str = "2024/2025";

pub(super) const YEAR_ONE_UNITS: [&str; 5] = ["cs101", "cs102", "cs103", "cs104", "cs105"];

pub(super) type Service =
    AcademicRecordsService<InMemoryRecordStore, InMemoryRecordStore, InMemoryRecordStore>;

pub(super) fn settings() -> InstitutionSettings {
    InstitutionSettings {
        institution: InstitutionId::new("kabianga"),
        cat_maximum: 30.0,
        assignment_maximum: 10.0,
        practical_maximum: 20.0,
        pass_mark: 40.0,
        supplementary_threshold: 3,
        retake_threshold: 3,
        grading_scale: None,
    }
}

pub(super) fn program() -> Program {
    Program {
        id: ProgramId::new("bsc-cs"),
        institution: InstitutionId::new("kabianga"),
        code: "BSC-CS".to_string(),
        name: "Bachelor of Science in Computer Science".to_string(),
        duration_years: 4,
        school_type: SchoolType::Standard,
    }
}

fn link(id: &str, year_of_study: u8, semester: u8) -> CurriculumUnitLink {
    CurriculumUnitLink {
        id: CurriculumUnitId::new(id),
        program: ProgramId::new("bsc-cs"),
        unit_code: id.to_uppercase(),
        unit_title: format!("Unit {}", id.to_uppercase()),
        year_of_study,
        semester,
    }
}

fn academic_year(id: &str, name: &str, start_year: i32) -> AcademicYear {
    AcademicYear {
        id: AcademicYearId::new(id),
        name: name.to_string(),
        start_date: NaiveDate::from_ymd_opt(start_year, 9, 1).expect("valid date"),
        end_date: NaiveDate::from_ymd_opt(start_year + 1, 7, 31).expect("valid date"),
    }
}

pub(super) fn student(id: &str, registration: &str) -> Student {
    Student {
        id: StudentId::new(id),
        registration_number: registration.to_string(),
        institution: InstitutionId::new("kabianga"),
        program: ProgramId::new("bsc-cs"),
        admission_academic_year: AcademicYearId::new("ay-2023"),
        current_academic_year: AcademicYearId::new("ay-2023"),
        entry_mode: EntryMode::Regular,
        current_year_of_study: 1,
        current_semester: 2,
        status: StudentStatus::Active,
        unit_attempts: Default::default(),
        academic_history: Vec::new(),
        remarks: Vec::new(),
    }
}

/// One program, three academic years, five year-one units and two year-two units.
pub(super) fn snapshot() -> RecordSnapshot {
    let mut orphan = student("stu-orphan", "XX/999/2023");
    orphan.institution = InstitutionId::new("unconfigured");

    RecordSnapshot {
        institutions: vec![settings()],
        programs: vec![program()],
        curriculum: vec![
            link("cs101", 1, 1),
            link("cs102", 1, 1),
            link("cs103", 1, 1),
            link("cs104", 1, 2),
            link("cs105", 1, 2),
            link("cs201", 2, 1),
            link("cs202", 2, 2),
        ],
        academic_years: vec![
            academic_year("ay-2023", FIRST_YEAR, 2023),
            academic_year("ay-2024", SECOND_YEAR, 2024),
            academic_year("ay-2025", "2025/2026", 2025),
        ],
        students: vec![
            student("stu-1", "CS/001/2023"),
            student("stu-2", "CS/002/2023"),
            orphan,
        ],
        marks: Vec::new(),
        final_grades: Vec::new(),
    }
}

pub(super) fn store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::from_snapshot(snapshot()))
}

pub(super) fn service(store: &Arc<InMemoryRecordStore>) -> Service {
    service_with(store, EngineConfig::default())
}

pub(super) fn service_with(store: &Arc<InMemoryRecordStore>, config: EngineConfig) -> Service {
    AcademicRecordsService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        &config,
        WeightingTable::standard(),
    )
}

pub(super) fn at(day: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .expect("valid date")
        .and_hms_opt(9, minute, 0)
        .expect("valid time")
}

pub(super) fn row(
    student: &str,
    unit: &str,
    academic_year: &str,
    ca_total: f64,
    exam_total: f64,
    attempt: &str,
) -> MarkImportRow {
    MarkImportRow {
        student: student.to_string(),
        curriculum_unit: unit.to_string(),
        academic_year: academic_year.to_string(),
        ca_total: Some(ca_total),
        exam_total: Some(exam_total),
        attempt: attempt.to_string(),
        internal_examiner_mark: None,
        agreed_mark: None,
    }
}

/// First-attempt rows for every year-one unit; units listed in `failing` score 25.
pub(super) fn year_one_rows(student: &str, academic_year: &str, failing: &[&str]) -> Vec<MarkImportRow> {
    YEAR_ONE_UNITS
        .iter()
        .map(|unit| {
            if failing.contains(unit) {
                row(student, unit, academic_year, 10.0, 15.0, "first")
            } else {
                row(student, unit, academic_year, 25.0, 35.0, "first")
            }
        })
        .collect()
}

pub(super) fn stored_student(store: &InMemoryRecordStore, id: &str) -> Student {
    store
        .student(&StudentId::new(id))
        .expect("student lookup")
        .expect("student present")
}

pub(super) fn stored_grade(store: &InMemoryRecordStore, student: &str, unit: &str) -> Option<FinalGrade> {
    store
        .final_grade(&StudentId::new(student), &CurriculumUnitId::new(unit))
        .expect("grade lookup")
}

pub(super) fn mark_id(student: &str, unit: &str, academic_year: &str) -> MarkId {
    MarkId::natural(
        &StudentId::new(student),
        &CurriculumUnitId::new(unit),
        &AcademicYearId::new(academic_year),
    )
}

/// Record store that refuses writes for chosen students and delegates everything else.
pub(super) struct FlakyStore {
    pub(super) inner: Arc<InMemoryRecordStore>,
    failing_students: Mutex<BTreeSet<StudentId>>,
}

impl FlakyStore {
    pub(super) fn wrapping(inner: Arc<InMemoryRecordStore>) -> Self {
        Self {
            inner,
            failing_students: Mutex::new(BTreeSet::new()),
        }
    }

    pub(super) fn fail_writes_for(&self, student: &str) {
        self.failing_students
            .lock()
            .expect("flaky mutex poisoned")
            .insert(StudentId::new(student));
    }

    fn check(&self, student: &StudentId) -> Result<(), RepositoryError> {
        if self
            .failing_students
            .lock()
            .expect("flaky mutex poisoned")
            .contains(student)
        {
            Err(RepositoryError::Unavailable("write refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FlakyStore {
    fn mark(&self, id: &MarkId) -> Result<Option<Mark>, RepositoryError> {
        self.inner.mark(id)
    }

    fn latest_active_mark(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<Mark>, RepositoryError> {
        self.inner.latest_active_mark(student, curriculum_unit)
    }

    fn set_mark_trashed(&self, id: &MarkId, trashed: bool) -> Result<Mark, RepositoryError> {
        self.inner.set_mark_trashed(id, trashed)
    }

    fn apply_grade_row(&self, mark: Mark, grade: FinalGrade) -> Result<(), RepositoryError> {
        self.check(&mark.student)?;
        self.inner.apply_grade_row(mark, grade)
    }

    fn upsert_final_grade(&self, grade: FinalGrade) -> Result<(), RepositoryError> {
        self.check(&grade.student)?;
        self.inner.upsert_final_grade(grade)
    }

    fn remove_final_grade(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<(), RepositoryError> {
        self.check(student)?;
        self.inner.remove_final_grade(student, curriculum_unit)
    }

    fn final_grade(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<FinalGrade>, RepositoryError> {
        self.inner.final_grade(student, curriculum_unit)
    }

    fn final_grades_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<FinalGrade>, RepositoryError> {
        self.inner.final_grades_for_student(student)
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.student(id)
    }

    fn update_student(&self, student: Student) -> Result<(), RepositoryError> {
        self.check(&student.id)?;
        self.inner.update_student(student)
    }

    fn students_in_cohort(
        &self,
        program: &ProgramId,
        year_of_study: u8,
    ) -> Result<Vec<Student>, RepositoryError> {
        self.inner.students_in_cohort(program, year_of_study)
    }
}

pub(super) fn flaky_service(
    flaky: &Arc<FlakyStore>,
) -> AcademicRecordsService<FlakyStore, InMemoryRecordStore, InMemoryRecordStore> {
    AcademicRecordsService::new(
        flaky.clone(),
        flaky.inner.clone(),
        flaky.inner.clone(),
        &EngineConfig::default(),
        WeightingTable::standard(),
    )
}

mod parser;

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    ComponentScores, CurriculumUnitId, FinalGrade, Mark, MarkAttempt, MarkId, StudentId,
};
use super::errors::{RecordsError, ValidationError};
use super::grading::{grade_mark, validate_mark, GradeCalculator};
use super::repository::{CurriculumDirectory, PolicyStore, RecordStore};

/// One already-parsed mark row handed over by data entry or a file import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkImportRow {
    pub student: String,
    pub curriculum_unit: String,
    pub academic_year: String,
    pub ca_total: Option<f64>,
    pub exam_total: Option<f64>,
    pub attempt: String,
    #[serde(default)]
    pub internal_examiner_mark: Option<f64>,
    #[serde(default)]
    pub agreed_mark: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRowError {
    pub row: usize,
    pub student: String,
    pub unit: String,
    pub message: String,
}

/// A file row that either parsed into a mark row or was rejected with its reason.
pub type ParsedMarkRow = Result<MarkImportRow, ImportRowError>;

/// Outcome of a multi-row import; partial success is expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
    /// Current grade of each imported row's unit link, in row order.
    pub grades: Vec<FinalGrade>,
}

/// Outcome of a batch restoration. Callers audit `affected_students` afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub restored: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub affected_students: Vec<StudentId>,
}

#[derive(Debug)]
pub enum MarkCsvError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for MarkCsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkCsvError::Io(err) => write!(f, "failed to read marks file: {}", err),
            MarkCsvError::Csv(err) => write!(f, "invalid marks CSV data: {}", err),
        }
    }
}

impl std::error::Error for MarkCsvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarkCsvError::Io(err) => Some(err),
            MarkCsvError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for MarkCsvError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for MarkCsvError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Read mark rows from a CSV with `student,unit,academic_year,ca_total,exam_total,attempt` headers.
pub fn read_mark_rows<R: Read>(reader: R) -> Result<Vec<ParsedMarkRow>, MarkCsvError> {
    Ok(parser::parse_rows(reader)?)
}

pub fn read_mark_rows_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<ParsedMarkRow>, MarkCsvError> {
    let file = std::fs::File::open(path)?;
    read_mark_rows(file)
}

/// Recomputation pipeline entry point for imports, corrections, and restorations.
pub struct MarkImporter<S, C, P> {
    store: Arc<S>,
    directory: Arc<C>,
    calculator: GradeCalculator<S, P>,
}

impl<S, C, P> MarkImporter<S, C, P>
where
    S: RecordStore + 'static,
    C: CurriculumDirectory + 'static,
    P: PolicyStore + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<C>, calculator: GradeCalculator<S, P>) -> Self {
        Self {
            store,
            directory,
            calculator,
        }
    }

    pub fn import(&self, rows: Vec<MarkImportRow>) -> ImportSummary {
        self.import_at(rows, Utc::now().naive_utc())
    }

    /// Import rows one at a time; each row's mark and grade commit together or not at all.
    pub fn import_at(&self, rows: Vec<MarkImportRow>, recorded_at: NaiveDateTime) -> ImportSummary {
        self.import_parsed_at(rows.into_iter().map(Ok).collect(), recorded_at)
    }

    pub fn import_parsed(&self, rows: Vec<ParsedMarkRow>) -> ImportSummary {
        self.import_parsed_at(rows, Utc::now().naive_utc())
    }

    /// Import file rows, counting rows rejected while parsing alongside rows rejected here.
    pub fn import_parsed_at(
        &self,
        rows: Vec<ParsedMarkRow>,
        recorded_at: NaiveDateTime,
    ) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for (index, row) in rows.into_iter().enumerate() {
            let row_number = index + 1;
            let outcome = row.and_then(|row| {
                self.import_row(&row, recorded_at)
                    .map_err(|err| ImportRowError {
                        row: row_number,
                        student: row.student.clone(),
                        unit: row.curriculum_unit.clone(),
                        message: err.to_string(),
                    })
            });

            match outcome {
                Ok(grade) => {
                    summary.imported += 1;
                    summary.grades.push(grade);
                }
                Err(mut error) => {
                    error.row = row_number;
                    warn!(
                        row = row_number,
                        student = %error.student,
                        unit = %error.unit,
                        error = %error.message,
                        "mark row rejected"
                    );
                    summary.failed += 1;
                    summary.errors.push(error);
                }
            }
        }

        info!(
            imported = summary.imported,
            failed = summary.failed,
            "mark import finished"
        );
        summary
    }

    fn import_row(
        &self,
        row: &MarkImportRow,
        recorded_at: NaiveDateTime,
    ) -> Result<FinalGrade, RecordsError> {
        let attempt: MarkAttempt = row.attempt.parse()?;
        let student = non_empty(&row.student, "student reference")?;
        let unit = non_empty(&row.curriculum_unit, "curriculum unit reference")?;
        let year_name = non_empty(&row.academic_year, "academic year")?;

        let academic_year = self
            .directory
            .academic_year_by_name(year_name)?
            .ok_or_else(|| RecordsError::not_found("academic year", year_name))?;
        let curriculum_unit = CurriculumUnitId::new(unit);
        self.directory
            .curriculum_unit(&curriculum_unit)?
            .ok_or_else(|| RecordsError::not_found("curriculum unit", unit))?;
        let student = StudentId::new(student);
        let settings = self.calculator.settings_for_student(&student)?;

        let id = MarkId::natural(&student, &curriculum_unit, &academic_year.id);
        let components = self
            .store
            .mark(&id)?
            .map(|existing| existing.components)
            .unwrap_or_else(ComponentScores::default);

        let mark = Mark {
            id,
            student,
            curriculum_unit,
            academic_year: academic_year.id,
            components,
            ca_total: row.ca_total,
            exam_total: row.exam_total,
            internal_examiner_mark: row.internal_examiner_mark,
            agreed_mark: row.agreed_mark,
            attempt,
            recorded_at,
            trashed: false,
        };

        validate_mark(&mark, &settings)?;
        let current = match self
            .store
            .latest_active_mark(&mark.student, &mark.curriculum_unit)?
        {
            Some(existing)
                if existing.id != mark.id
                    && self.sits_after(&existing, &mark, academic_year.start_date)? =>
            {
                existing
            }
            _ => mark.clone(),
        };
        let grade = grade_mark(&current, &settings);
        self.store.apply_grade_row(mark, grade.clone())?;

        Ok(grade)
    }

    /// Whether `existing` is a later sitting than the incoming `mark`.
    fn sits_after(
        &self,
        existing: &Mark,
        mark: &Mark,
        mark_year_start: NaiveDate,
    ) -> Result<bool, RecordsError> {
        let existing_year_start = self
            .directory
            .academic_year(&existing.academic_year)?
            .map(|year| year.start_date);
        Ok(existing.sitting_key(existing_year_start) > mark.sitting_key(Some(mark_year_start)))
    }

    /// Soft-delete a mark and regrade its unit link from what remains.
    pub fn trash_mark(&self, id: &MarkId) -> Result<Option<FinalGrade>, RecordsError> {
        self.set_trashed(id, true)
    }

    /// Bring a trashed mark back and regrade its unit link.
    pub fn restore_mark(&self, id: &MarkId) -> Result<Option<FinalGrade>, RecordsError> {
        self.set_trashed(id, false)
    }

    /// Restore a batch of marks, collecting failures instead of stopping.
    pub fn restore_marks(&self, ids: &[MarkId]) -> RestoreSummary {
        let mut summary = RestoreSummary::default();
        let mut affected = BTreeSet::new();

        for id in ids {
            match self.restore_mark(id) {
                Ok(_) => {
                    summary.restored += 1;
                    if let Ok(Some(mark)) = self.store.mark(id) {
                        affected.insert(mark.student);
                    }
                }
                Err(err) => {
                    warn!(mark = %id, error = %err, "mark restoration failed");
                    summary.failed += 1;
                    summary.errors.push(format!("{id}: {err}"));
                }
            }
        }

        summary.affected_students = affected.into_iter().collect();
        info!(
            restored = summary.restored,
            failed = summary.failed,
            "mark restoration finished"
        );
        summary
    }

    fn set_trashed(&self, id: &MarkId, trashed: bool) -> Result<Option<FinalGrade>, RecordsError> {
        let mark = self
            .store
            .mark(id)?
            .ok_or_else(|| RecordsError::not_found("mark", id))?;
        self.store.set_mark_trashed(id, trashed)?;

        info!(mark = %id, trashed, "mark state changed");
        self.calculator
            .recompute_unit(&mark.student, &mark.curriculum_unit)
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingReference(field))
    } else {
        Ok(trimmed)
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{
    round2, AcademicYear, AcademicYearId, CurriculumUnitId, CurriculumUnitLink, FinalGrade,
    ProgramId, StudentId,
};
use super::errors::RecordsError;
use super::repository::{CurriculumDirectory, RecordStore};

/// Yearly academic standing derived from a student's unit grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YearStatus {
    InGoodStanding,
    SupplementaryPending,
    RetakeYear,
    IncompleteData,
}

impl YearStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::InGoodStanding => "IN GOOD STANDING",
            Self::SupplementaryPending => "SUPPLEMENTARY PENDING",
            Self::RetakeYear => "RETAKE YEAR",
            Self::IncompleteData => "INCOMPLETE DATA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StandingSummary {
    pub total_expected: usize,
    pub passed: usize,
    pub failed: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearStanding {
    pub student: StudentId,
    pub academic_year: AcademicYearId,
    pub year_of_study: u8,
    pub status: YearStatus,
    pub detail_message: String,
    pub summary: StandingSummary,
    pub annual_mean: f64,
    pub failed_units: Vec<String>,
}

/// Standing plus the per-link grades it was reduced from, for callers that snapshot the year.
#[derive(Debug, Clone)]
pub(crate) struct YearEvaluation {
    pub(crate) standing: YearStanding,
    pub(crate) unit_grades: Vec<FinalGrade>,
}

/// Aggregates unit grades against the expected curriculum for one year of study.
pub struct YearStatusAggregator<S, C> {
    store: Arc<S>,
    directory: Arc<C>,
    retake_year_failed_units: u32,
}

impl<S, C> Clone for YearStatusAggregator<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            retake_year_failed_units: self.retake_year_failed_units,
        }
    }
}

impl<S, C> YearStatusAggregator<S, C>
where
    S: RecordStore + 'static,
    C: CurriculumDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<C>, retake_year_failed_units: u32) -> Self {
        Self {
            store,
            directory,
            retake_year_failed_units,
        }
    }

    /// Standing for the named academic year, or `None` when the name does not resolve.
    pub fn year_status(
        &self,
        student: &StudentId,
        program: &ProgramId,
        academic_year: &str,
        year_of_study: u8,
    ) -> Result<Option<YearStanding>, RecordsError> {
        let Some(academic_year) = self.directory.academic_year_by_name(academic_year)? else {
            return Ok(None);
        };

        self.evaluate(student, program, &academic_year, year_of_study)
            .map(|evaluation| Some(evaluation.standing))
    }

    pub(crate) fn evaluate(
        &self,
        student: &StudentId,
        program: &ProgramId,
        academic_year: &AcademicYear,
        year_of_study: u8,
    ) -> Result<YearEvaluation, RecordsError> {
        let curriculum = self.directory.curriculum_units(program, year_of_study)?;
        let grades: Vec<FinalGrade> = self
            .store
            .final_grades_for_student(student)?
            .into_iter()
            .filter(|grade| grade.academic_year == academic_year.id)
            .collect();

        let (status, summary, failed_units, unit_grades) =
            tally(&curriculum, grades, self.retake_year_failed_units);

        let annual_mean = if unit_grades.is_empty() {
            0.0
        } else {
            let total: f64 = unit_grades.iter().map(|grade| grade.total_mark).sum();
            round2(total / unit_grades.len() as f64)
        };

        let detail_message = describe(status, &summary, &failed_units);

        Ok(YearEvaluation {
            standing: YearStanding {
                student: student.clone(),
                academic_year: academic_year.id.clone(),
                year_of_study,
                status,
                detail_message,
                summary,
                annual_mean,
                failed_units,
            },
            unit_grades,
        })
    }
}

/// Reduce grades to one per expected link (a pass always wins) and decide the standing.
pub(crate) fn tally(
    curriculum: &[CurriculumUnitLink],
    grades: Vec<FinalGrade>,
    retake_year_failed_units: u32,
) -> (YearStatus, StandingSummary, Vec<String>, Vec<FinalGrade>) {
    let mut by_unit: BTreeMap<CurriculumUnitId, FinalGrade> = BTreeMap::new();
    for grade in grades {
        match by_unit.get(&grade.curriculum_unit) {
            Some(existing) if existing.status.is_pass() => {}
            _ => {
                by_unit.insert(grade.curriculum_unit.clone(), grade);
            }
        }
    }

    let mut summary = StandingSummary {
        total_expected: curriculum.len(),
        ..StandingSummary::default()
    };
    let mut failed_units = Vec::new();
    let mut unit_grades = Vec::new();

    for link in curriculum {
        match by_unit.remove(&link.id) {
            Some(grade) => {
                if grade.status.is_pass() {
                    summary.passed += 1;
                } else {
                    summary.failed += 1;
                    failed_units.push(link.unit_code.clone());
                }
                unit_grades.push(grade);
            }
            None => summary.missing += 1,
        }
    }

    let status = if summary.missing > 0 {
        YearStatus::IncompleteData
    } else if summary.failed > retake_year_failed_units as usize {
        YearStatus::RetakeYear
    } else if summary.failed > 0 {
        YearStatus::SupplementaryPending
    } else {
        YearStatus::InGoodStanding
    };

    (status, summary, failed_units, unit_grades)
}

fn describe(status: YearStatus, summary: &StandingSummary, failed_units: &[String]) -> String {
    match status {
        YearStatus::IncompleteData => format!(
            "missing results for {} of {} unit(s)",
            summary.missing, summary.total_expected
        ),
        YearStatus::RetakeYear => format!(
            "retake year: {} failed unit(s): {}",
            summary.failed,
            failed_units.join(", ")
        ),
        YearStatus::SupplementaryPending => {
            format!("supplementary pending for: {}", failed_units.join(", "))
        }
        YearStatus::InGoodStanding => {
            format!("all {} unit(s) passed", summary.total_expected)
        }
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{round2, AcademicHistoryEntry, StudentId};
use super::errors::RecordsError;
use super::repository::{CurriculumDirectory, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeClassification {
    FirstClassHonours,
    SecondClassUpper,
    SecondClassLower,
    Pass,
    Fail,
}

impl DegreeClassification {
    pub fn classify(weighted_aggregate_average: f64) -> Self {
        match weighted_aggregate_average {
            waa if waa >= 70.0 => Self::FirstClassHonours,
            waa if waa >= 60.0 => Self::SecondClassUpper,
            waa if waa >= 50.0 => Self::SecondClassLower,
            waa if waa >= 40.0 => Self::Pass,
            _ => Self::Fail,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstClassHonours => "First Class Honours",
            Self::SecondClassUpper => "Second Class Honours (Upper Division)",
            Self::SecondClassLower => "Second Class Honours (Lower Division)",
            Self::Pass => "Pass",
            Self::Fail => "Fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduationResult {
    pub student: StudentId,
    pub weighted_aggregate_average: f64,
    pub classification: Option<DegreeClassification>,
    pub is_eligible: bool,
    pub missing_requirements: Vec<String>,
}

/// Computes the weighted aggregate average from stored history snapshots.
pub struct GraduationClassifier<S, C> {
    store: Arc<S>,
    directory: Arc<C>,
}

impl<S, C> GraduationClassifier<S, C>
where
    S: RecordStore + 'static,
    C: CurriculumDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<C>) -> Self {
        Self { store, directory }
    }

    pub fn classify_student(&self, student_id: &StudentId) -> Result<GraduationResult, RecordsError> {
        let student = self
            .store
            .student(student_id)?
            .ok_or_else(|| RecordsError::not_found("student", student_id))?;
        let program = self
            .directory
            .program(&student.program)?
            .ok_or_else(|| RecordsError::not_found("program", &student.program))?;

        let years = latest_per_year(&student.academic_history);
        let total: f64 = years.values().map(|entry| entry.weighted_contribution).sum();
        let weighted_aggregate_average = round2(total);

        let mut missing_requirements: Vec<String> = years
            .values()
            .filter(|entry| entry.failed_units > 0)
            .map(|entry| {
                format!(
                    "year {} has {} failed unit(s)",
                    entry.year_of_study, entry.failed_units
                )
            })
            .collect();
        if !years.contains_key(&program.duration_years) {
            missing_requirements.push(format!(
                "no academic history for final year {}",
                program.duration_years
            ));
        }

        let is_eligible = missing_requirements.is_empty();
        Ok(GraduationResult {
            student: student.id,
            weighted_aggregate_average,
            classification: is_eligible
                .then(|| DegreeClassification::classify(weighted_aggregate_average)),
            is_eligible,
            missing_requirements,
        })
    }
}

/// Later snapshots of the same year of study supersede earlier ones.
fn latest_per_year(history: &[AcademicHistoryEntry]) -> BTreeMap<u8, &AcademicHistoryEntry> {
    history
        .iter()
        .map(|entry| (entry.year_of_study, entry))
        .collect()
}

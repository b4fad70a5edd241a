use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    round2, AcademicHistoryEntry, AcademicYear, FinalGrade, ProgramId, Student, StudentId,
    StudentStatus, UnitAttempt,
};
use super::errors::RecordsError;
use super::repository::{CurriculumDirectory, RecordStore};
use super::standing::{YearEvaluation, YearStatus, YearStatusAggregator};
use crate::config::{WeightingKey, WeightingTable};

/// Per-student outcome of a promotion or repeat-year decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionResult {
    pub student: StudentId,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_status: Option<YearStatus>,
}

impl PromotionResult {
    fn succeeded(student: &StudentId, message: String) -> Self {
        Self {
            student: student.clone(),
            success: true,
            message,
            blocking_status: None,
        }
    }

    fn blocked(student: &StudentId, message: String, status: Option<YearStatus>) -> Self {
        Self {
            student: student.clone(),
            success: false,
            message,
            blocking_status: status,
        }
    }
}

/// Cohort promotion tally; one student's failure never stops the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPromotionResult {
    pub promoted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Decides promotion, repeat years, and writes the yearly history snapshot.
pub struct ProgressionEngine<S, C> {
    store: Arc<S>,
    directory: Arc<C>,
    aggregator: YearStatusAggregator<S, C>,
    weighting: Arc<WeightingTable>,
    max_unit_attempts: u32,
}

impl<S, C> ProgressionEngine<S, C>
where
    S: RecordStore + 'static,
    C: CurriculumDirectory + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<C>,
        aggregator: YearStatusAggregator<S, C>,
        weighting: Arc<WeightingTable>,
        max_unit_attempts: u32,
    ) -> Self {
        Self {
            store,
            directory,
            aggregator,
            weighting,
            max_unit_attempts,
        }
    }

    /// Promote the student out of their current year if the year is in good standing.
    pub fn promote_student(&self, student_id: &StudentId) -> Result<PromotionResult, RecordsError> {
        let student = self.load_student(student_id)?;
        let academic_year = self.current_academic_year(&student)?;
        self.promote_in_year(student, &academic_year)
    }

    /// Promote every enrolled student of a cohort, repeaters included, evaluated against the given academic year.
    pub fn bulk_promote_class(
        &self,
        program: &ProgramId,
        year_of_study: u8,
        academic_year: &str,
    ) -> Result<BatchPromotionResult, RecordsError> {
        let academic_year = self
            .directory
            .academic_year_by_name(academic_year)?
            .ok_or_else(|| RecordsError::not_found("academic year", academic_year))?;
        let cohort = self.store.students_in_cohort(program, year_of_study)?;

        let mut result = BatchPromotionResult::default();
        for student in cohort {
            let registration = student.registration_number.clone();
            let id = student.id.clone();
            match self.promote_in_year(student, &academic_year) {
                Ok(outcome) if outcome.success => result.promoted += 1,
                Ok(outcome) => {
                    result.failed += 1;
                    result
                        .errors
                        .push(format!("{registration}: {}", outcome.message));
                }
                Err(err) => {
                    warn!(student = %id, error = %err, "promotion failed");
                    result.failed += 1;
                    result.errors.push(format!("{registration}: {err}"));
                }
            }
        }

        info!(
            program = %program,
            year_of_study,
            promoted = result.promoted,
            failed = result.failed,
            "cohort promotion finished"
        );
        Ok(result)
    }

    /// Place a student who failed the year outright on a repeat of the same year of study.
    pub fn register_repeat_year(
        &self,
        student_id: &StudentId,
    ) -> Result<PromotionResult, RecordsError> {
        let mut student = self.load_student(student_id)?;
        if !student.status.is_enrolled() {
            return Ok(PromotionResult::blocked(
                student_id,
                format!("student status is {}", student.status.label()),
                None,
            ));
        }

        let academic_year = self.current_academic_year(&student)?;
        let year_of_study = student.current_year_of_study;
        if student.is_repeating(year_of_study, &academic_year.id) {
            return Ok(PromotionResult::blocked(
                student_id,
                format!("already repeating year {year_of_study}; run the academic audit"),
                Some(YearStatus::RetakeYear),
            ));
        }

        let evaluation =
            self.aggregator
                .evaluate(&student.id, &student.program, &academic_year, year_of_study)?;
        if evaluation.standing.status != YearStatus::RetakeYear {
            return Ok(PromotionResult::blocked(
                student_id,
                format!(
                    "year standing is {}; repeat year not required",
                    evaluation.standing.status.label()
                ),
                Some(evaluation.standing.status),
            ));
        }

        self.close_year(&mut student, &academic_year, &evaluation, true)?;
        student.status = StudentStatus::Repeat;
        if let Some(next) = self.directory.academic_year_following(&academic_year.id)? {
            student.current_academic_year = next.id;
        }
        self.store.update_student(student)?;

        info!(
            student = %student_id,
            year_of_study,
            failed = evaluation.standing.summary.failed,
            "student registered for repeat year"
        );
        Ok(PromotionResult::succeeded(
            student_id,
            format!(
                "repeating year {year_of_study}: {}",
                evaluation.standing.detail_message
            ),
        ))
    }

    fn promote_in_year(
        &self,
        mut student: Student,
        academic_year: &AcademicYear,
    ) -> Result<PromotionResult, RecordsError> {
        if !student.status.is_enrolled() {
            return Ok(PromotionResult::blocked(
                &student.id,
                format!("student status is {}", student.status.label()),
                None,
            ));
        }

        let year_of_study = student.current_year_of_study;
        let evaluation =
            self.aggregator
                .evaluate(&student.id, &student.program, academic_year, year_of_study)?;
        let standing = &evaluation.standing;
        if standing.status != YearStatus::InGoodStanding {
            return Ok(PromotionResult::blocked(
                &student.id,
                format!("{}: {}", standing.status.label(), standing.detail_message),
                Some(standing.status),
            ));
        }

        self.close_year(&mut student, academic_year, &evaluation, false)?;
        student.current_year_of_study = year_of_study.saturating_add(1);
        student.current_semester = 1;
        student.status = StudentStatus::Active;
        if let Some(next) = self.directory.academic_year_following(&academic_year.id)? {
            student.current_academic_year = next.id;
        }

        let id = student.id.clone();
        let new_year = student.current_year_of_study;
        self.store.update_student(student)?;

        info!(student = %id, from = year_of_study, to = new_year, "student promoted");
        Ok(PromotionResult::succeeded(
            &id,
            format!("promoted from year {year_of_study} to year {new_year}"),
        ))
    }

    /// Append the year's history snapshot and register the graded attempts.
    fn close_year(
        &self,
        student: &mut Student,
        academic_year: &AcademicYear,
        evaluation: &YearEvaluation,
        is_repeat_year: bool,
    ) -> Result<(), RecordsError> {
        let program = self
            .directory
            .program(&student.program)?
            .ok_or_else(|| RecordsError::not_found("program", &student.program))?;
        let key = WeightingKey {
            duration_years: program.duration_years,
            school_type: program.school_type,
            entry_mode: student.entry_mode,
        };
        let year_of_study = evaluation.standing.year_of_study;
        let weight = self.weighting.weight_for(&key, year_of_study).ok_or_else(|| {
            RecordsError::Configuration(format!(
                "no weighting for year {year_of_study} of a {}-year {:?} program ({:?} entry)",
                key.duration_years, key.school_type, key.entry_mode
            ))
        })?;

        let annual_mean = evaluation.standing.annual_mean;
        let failed_units = evaluation.standing.summary.failed as u32;
        let already_recorded = student.academic_history.iter().any(|entry| {
            entry.year_of_study == year_of_study
                && entry.academic_year == academic_year.id
                && entry.is_repeat_year == is_repeat_year
        });
        if !already_recorded {
            student.academic_history.push(AcademicHistoryEntry {
                year_of_study,
                academic_year: academic_year.id.clone(),
                annual_mean,
                weight,
                weighted_contribution: round2(annual_mean * weight),
                failed_units,
                is_repeat_year,
            });
        }

        for grade in &evaluation.unit_grades {
            self.register_attempt(student, grade);
        }

        Ok(())
    }

    fn register_attempt(&self, student: &mut Student, grade: &FinalGrade) {
        let attempts = student
            .unit_attempts
            .entry(grade.curriculum_unit.clone())
            .or_default();

        let duplicate = attempts.iter().any(|attempt| {
            attempt.attempt_number == grade.attempt_number
                && attempt.academic_year == grade.academic_year
        });
        if duplicate {
            return;
        }
        if attempts.len() >= self.max_unit_attempts as usize {
            warn!(
                student = %student.id,
                unit = %grade.curriculum_unit,
                cap = self.max_unit_attempts,
                "attempt registry full; attempt not recorded"
            );
            return;
        }

        attempts.push(UnitAttempt {
            attempt_number: grade.attempt_number,
            academic_year: grade.academic_year.clone(),
            mark: grade.total_mark,
            passed: grade.status.is_pass(),
            attempt_type: grade.attempt_type,
        });
    }

    fn load_student(&self, id: &StudentId) -> Result<Student, RecordsError> {
        self.store
            .student(id)?
            .ok_or_else(|| RecordsError::not_found("student", id))
    }

    fn current_academic_year(&self, student: &Student) -> Result<AcademicYear, RecordsError> {
        self.directory
            .academic_year(&student.current_academic_year)?
            .ok_or_else(|| RecordsError::not_found("academic year", &student.current_academic_year))
    }
}

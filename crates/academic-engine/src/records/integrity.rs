use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Student, StudentId, StudentStatus};
use super::errors::RecordsError;
use super::repository::{CurriculumDirectory, RecordStore};
use super::standing::{YearStatus, YearStatusAggregator};

/// Why the audit discontinued a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscontinuationReason {
    MaximumAttempts { unit_code: String, attempt_number: u32 },
    RepeatYearFailure { year_of_study: u8 },
}

impl DiscontinuationReason {
    /// Remark appended to the student's record.
    pub fn remark(&self) -> String {
        match self {
            Self::MaximumAttempts { unit_code, .. } => {
                format!("DISCONTINUED:MAX_ATTEMPTS:{unit_code}")
            }
            Self::RepeatYearFailure { year_of_study } => {
                format!("DISCONTINUED:REPEAT_YEAR_FAILURE:Y{year_of_study}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    Clear,
    Skipped { status: StudentStatus },
    Discontinued { reason: DiscontinuationReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub student: StudentId,
    pub outcome: AuditOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAuditResult {
    pub audited: usize,
    pub discontinued: usize,
    pub errors: Vec<String>,
    pub reports: Vec<AuditReport>,
}

/// Enforces the discontinuation rules after grade changes and year closures.
pub struct IntegrityAuditor<S, C> {
    store: Arc<S>,
    directory: Arc<C>,
    aggregator: YearStatusAggregator<S, C>,
    max_unit_attempts: u32,
}

impl<S, C> IntegrityAuditor<S, C>
where
    S: RecordStore + 'static,
    C: CurriculumDirectory + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<C>,
        aggregator: YearStatusAggregator<S, C>,
        max_unit_attempts: u32,
    ) -> Self {
        Self {
            store,
            directory,
            aggregator,
            max_unit_attempts,
        }
    }

    pub fn perform_academic_audit(&self, student_id: &StudentId) -> Result<AuditReport, RecordsError> {
        let mut student = self
            .store
            .student(student_id)?
            .ok_or_else(|| RecordsError::not_found("student", student_id))?;

        if !student.status.is_enrolled() {
            return Ok(AuditReport {
                student: student.id,
                outcome: AuditOutcome::Skipped {
                    status: student.status,
                },
            });
        }

        let reason = match self.exhausted_unit(&student)? {
            Some(reason) => Some(reason),
            None => self.failed_repeat_year(&student)?,
        };

        let Some(reason) = reason else {
            return Ok(AuditReport {
                student: student.id,
                outcome: AuditOutcome::Clear,
            });
        };

        student.status = StudentStatus::Discontinued;
        student.remarks.push(reason.remark());
        let id = student.id.clone();
        self.store.update_student(student)?;

        info!(student = %id, remark = %reason.remark(), "student discontinued");
        Ok(AuditReport {
            student: id,
            outcome: AuditOutcome::Discontinued { reason },
        })
    }

    /// Audit several students, typically the ones touched by a restoration batch.
    pub fn audit_students(&self, students: &[StudentId]) -> BatchAuditResult {
        let mut result = BatchAuditResult::default();
        for id in students {
            match self.perform_academic_audit(id) {
                Ok(report) => {
                    result.audited += 1;
                    if matches!(report.outcome, AuditOutcome::Discontinued { .. }) {
                        result.discontinued += 1;
                    }
                    result.reports.push(report);
                }
                Err(err) => {
                    warn!(student = %id, error = %err, "academic audit failed");
                    result.errors.push(format!("{id}: {err}"));
                }
            }
        }
        result
    }

    /// A unit whose final grade is still failing at the attempt ceiling.
    fn exhausted_unit(&self, student: &Student) -> Result<Option<DiscontinuationReason>, RecordsError> {
        for grade in self.store.final_grades_for_student(&student.id)? {
            if grade.status.is_pass() || grade.attempt_number < self.max_unit_attempts {
                continue;
            }
            let unit_code = self
                .directory
                .curriculum_unit(&grade.curriculum_unit)?
                .map(|link| link.unit_code)
                .unwrap_or_else(|| grade.curriculum_unit.to_string());
            return Ok(Some(DiscontinuationReason::MaximumAttempts {
                unit_code,
                attempt_number: grade.attempt_number,
            }));
        }
        Ok(None)
    }

    fn failed_repeat_year(
        &self,
        student: &Student,
    ) -> Result<Option<DiscontinuationReason>, RecordsError> {
        let year_of_study = student.current_year_of_study;
        if !student.is_repeating(year_of_study, &student.current_academic_year) {
            return Ok(None);
        }
        let Some(academic_year) = self
            .directory
            .academic_year(&student.current_academic_year)?
        else {
            return Ok(None);
        };

        let evaluation =
            self.aggregator
                .evaluate(&student.id, &student.program, &academic_year, year_of_study)?;
        if evaluation.standing.status == YearStatus::RetakeYear {
            Ok(Some(DiscontinuationReason::RepeatYearFailure { year_of_study }))
        } else {
            Ok(None)
        }
    }
}

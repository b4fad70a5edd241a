use std::sync::Arc;

use chrono::NaiveDateTime;

use super::domain::{CurriculumUnitId, FinalGrade, MarkId, ProgramId, StudentId};
use super::errors::RecordsError;
use super::graduation::{GraduationClassifier, GraduationResult};
use super::grading::GradeCalculator;
use super::import::{ImportSummary, MarkImportRow, MarkImporter, ParsedMarkRow, RestoreSummary};
use super::integrity::{AuditReport, BatchAuditResult, IntegrityAuditor};
use super::progression::{BatchPromotionResult, ProgressionEngine, PromotionResult};
use super::repository::{CurriculumDirectory, PolicyStore, RecordStore};
use super::standing::{YearStanding, YearStatusAggregator};
use crate::config::{EngineConfig, WeightingTable};

/// Service composing grading, standing, progression, auditing, and classification.
pub struct AcademicRecordsService<S, C, P> {
    calculator: GradeCalculator<S, P>,
    aggregator: YearStatusAggregator<S, C>,
    importer: MarkImporter<S, C, P>,
    progression: ProgressionEngine<S, C>,
    auditor: IntegrityAuditor<S, C>,
    graduation: GraduationClassifier<S, C>,
}

impl<S, C, P> AcademicRecordsService<S, C, P>
where
    S: RecordStore + 'static,
    C: CurriculumDirectory + 'static,
    P: PolicyStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<C>,
        policies: Arc<P>,
        config: &EngineConfig,
        weighting: WeightingTable,
    ) -> Self {
        let weighting = Arc::new(weighting);
        let calculator = GradeCalculator::new(store.clone(), policies);
        let aggregator = YearStatusAggregator::new(
            store.clone(),
            directory.clone(),
            config.retake_year_failed_units,
        );

        Self {
            importer: MarkImporter::new(store.clone(), directory.clone(), calculator.clone()),
            progression: ProgressionEngine::new(
                store.clone(),
                directory.clone(),
                aggregator.clone(),
                weighting,
                config.max_unit_attempts,
            ),
            auditor: IntegrityAuditor::new(
                store.clone(),
                directory.clone(),
                aggregator.clone(),
                config.max_unit_attempts,
            ),
            graduation: GraduationClassifier::new(store, directory),
            calculator,
            aggregator,
        }
    }

    pub fn compute_final_grade(&self, mark: &MarkId) -> Result<FinalGrade, RecordsError> {
        self.calculator.compute(mark)
    }

    pub fn recompute_unit(
        &self,
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
    ) -> Result<Option<FinalGrade>, RecordsError> {
        self.calculator.recompute_unit(student, curriculum_unit)
    }

    pub fn import_marks(&self, rows: Vec<MarkImportRow>) -> ImportSummary {
        self.importer.import(rows)
    }

    pub fn import_marks_at(
        &self,
        rows: Vec<MarkImportRow>,
        recorded_at: NaiveDateTime,
    ) -> ImportSummary {
        self.importer.import_at(rows, recorded_at)
    }

    /// Import rows read from a marks file, rejected rows included.
    pub fn import_parsed_marks(&self, rows: Vec<ParsedMarkRow>) -> ImportSummary {
        self.importer.import_parsed(rows)
    }

    pub fn import_parsed_marks_at(
        &self,
        rows: Vec<ParsedMarkRow>,
        recorded_at: NaiveDateTime,
    ) -> ImportSummary {
        self.importer.import_parsed_at(rows, recorded_at)
    }

    pub fn trash_mark(&self, mark: &MarkId) -> Result<Option<FinalGrade>, RecordsError> {
        self.importer.trash_mark(mark)
    }

    pub fn restore_mark(&self, mark: &MarkId) -> Result<Option<FinalGrade>, RecordsError> {
        self.importer.restore_mark(mark)
    }

    /// Restore marks; auditing the affected students is left to the caller.
    pub fn restore_marks(&self, marks: &[MarkId]) -> RestoreSummary {
        self.importer.restore_marks(marks)
    }

    pub fn year_status(
        &self,
        student: &StudentId,
        program: &ProgramId,
        academic_year: &str,
        year_of_study: u8,
    ) -> Result<Option<YearStanding>, RecordsError> {
        self.aggregator
            .year_status(student, program, academic_year, year_of_study)
    }

    pub fn promote_student(&self, student: &StudentId) -> Result<PromotionResult, RecordsError> {
        self.progression.promote_student(student)
    }

    pub fn bulk_promote_class(
        &self,
        program: &ProgramId,
        year_of_study: u8,
        academic_year: &str,
    ) -> Result<BatchPromotionResult, RecordsError> {
        self.progression
            .bulk_promote_class(program, year_of_study, academic_year)
    }

    pub fn register_repeat_year(
        &self,
        student: &StudentId,
    ) -> Result<PromotionResult, RecordsError> {
        self.progression.register_repeat_year(student)
    }

    pub fn perform_academic_audit(&self, student: &StudentId) -> Result<AuditReport, RecordsError> {
        self.auditor.perform_academic_audit(student)
    }

    pub fn audit_students(&self, students: &[StudentId]) -> BatchAuditResult {
        self.auditor.audit_students(students)
    }

    pub fn classify_graduation(
        &self,
        student: &StudentId,
    ) -> Result<GraduationResult, RecordsError> {
        self.graduation.classify_student(student)
    }
}

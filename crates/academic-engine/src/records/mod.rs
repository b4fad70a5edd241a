//! Grade computation, yearly standing, progression, and graduation over stored academic records.
//!
//! Every derived record is recomputed explicitly from its source: final grades from marks,
//! standings from final grades, history snapshots from standings.

pub mod domain;
pub mod errors;
pub mod graduation;
pub mod grading;
pub mod import;
pub mod integrity;
pub mod memory;
pub mod progression;
pub mod repository;
pub mod service;
pub mod standing;

#[cfg(test)]
mod tests;

pub use domain::{
    AcademicHistoryEntry, AcademicYear, AcademicYearId, AttemptType, ComponentScores,
    CurriculumUnitId, CurriculumUnitLink, EntryMode, FinalGrade, GradeBand, GradeStatus,
    InstitutionId, InstitutionSettings, Mark, MarkAttempt, MarkId, Program, ProgramId,
    SchoolType, Student, StudentId, StudentStatus, UnitAttempt,
};
pub use errors::{RecordsError, ValidationError};
pub use graduation::{DegreeClassification, GraduationClassifier, GraduationResult};
pub use grading::GradeCalculator;
pub use import::{
    read_mark_rows, read_mark_rows_from_path, ImportRowError, ImportSummary, MarkCsvError,
    MarkImportRow, MarkImporter, ParsedMarkRow, RestoreSummary,
};
pub use integrity::{
    AuditOutcome, AuditReport, BatchAuditResult, DiscontinuationReason, IntegrityAuditor,
};
pub use memory::{InMemoryRecordStore, RecordSnapshot, SnapshotError};
pub use progression::{BatchPromotionResult, ProgressionEngine, PromotionResult};
pub use repository::{CurriculumDirectory, PolicyStore, RecordStore, RepositoryError};
pub use service::AcademicRecordsService;
pub use standing::{StandingSummary, YearStanding, YearStatus, YearStatusAggregator};

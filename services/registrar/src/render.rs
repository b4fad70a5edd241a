use academic_engine::error::AppError;
use academic_engine::records::{
    AuditOutcome, BatchAuditResult, BatchPromotionResult, FinalGrade, GraduationResult,
    ImportSummary, MarkId, PromotionResult, RestoreSummary, SnapshotError, YearStanding,
};
use serde::Serialize;

pub(crate) fn json<T: Serialize>(enabled: bool, value: &T) -> Result<(), AppError> {
    if enabled {
        let payload = serde_json::to_string_pretty(value).map_err(SnapshotError::from)?;
        println!("{payload}");
    }
    Ok(())
}

pub(crate) fn final_grade(grade: &FinalGrade) {
    let capped = if grade.capped_because_supplementary {
        " (capped: supplementary)"
    } else {
        ""
    };
    println!(
        "{} {}: {:.2} {} {} [{} #{}]{}",
        grade.student,
        grade.curriculum_unit,
        grade.total_mark,
        grade.grade,
        grade.status.label(),
        grade.attempt_type.label(),
        grade.attempt_number,
        capped
    );
}

pub(crate) fn import_summary(summary: &ImportSummary) {
    println!(
        "Mark import: {} imported, {} failed",
        summary.imported, summary.failed
    );
    for grade in &summary.grades {
        print!("- ");
        final_grade(grade);
    }
    if !summary.errors.is_empty() {
        println!("\nRejected rows");
        for error in &summary.errors {
            println!(
                "- row {} ({} / {}): {}",
                error.row, error.student, error.unit, error.message
            );
        }
    }
}

pub(crate) fn regrade(mark: &MarkId, grade: Option<&FinalGrade>) {
    match grade {
        Some(grade) => {
            print!("Mark {mark} updated; unit regraded: ");
            final_grade(grade);
        }
        None => println!("Mark {mark} updated; no active marks remain, final grade withdrawn"),
    }
}

pub(crate) fn restore_summary(summary: &RestoreSummary) {
    println!(
        "Mark restoration: {} restored, {} failed",
        summary.restored, summary.failed
    );
    for error in &summary.errors {
        println!("- {error}");
    }
    if !summary.affected_students.is_empty() {
        let students: Vec<&str> = summary
            .affected_students
            .iter()
            .map(|student| student.as_str())
            .collect();
        println!("Affected students: {}", students.join(", "));
    }
}

pub(crate) fn standing(standing: &YearStanding) {
    println!(
        "{} year {} ({}): {}",
        standing.student,
        standing.year_of_study,
        standing.academic_year,
        standing.status.label()
    );
    println!("{}", standing.detail_message);
    let summary = &standing.summary;
    println!(
        "Expected {}, passed {}, failed {}, missing {}; annual mean {:.2}",
        summary.total_expected, summary.passed, summary.failed, summary.missing, standing.annual_mean
    );
}

pub(crate) fn promotion(result: &PromotionResult) {
    let outcome = if result.success { "ok" } else { "blocked" };
    println!("{} [{}]: {}", result.student, outcome, result.message);
}

pub(crate) fn batch_promotion(result: &BatchPromotionResult) {
    println!(
        "Cohort promotion: {} promoted, {} not promoted",
        result.promoted, result.failed
    );
    for error in &result.errors {
        println!("- {error}");
    }
}

pub(crate) fn batch_audit(result: &BatchAuditResult) {
    println!(
        "Academic audit: {} audited, {} discontinued",
        result.audited, result.discontinued
    );
    for report in &result.reports {
        match &report.outcome {
            AuditOutcome::Clear => println!("- {}: clear", report.student),
            AuditOutcome::Skipped { status } => {
                println!("- {}: skipped ({})", report.student, status.label())
            }
            AuditOutcome::Discontinued { reason } => {
                println!("- {}: {}", report.student, reason.remark())
            }
        }
    }
    for error in &result.errors {
        println!("- error: {error}");
    }
}

pub(crate) fn graduation(result: &GraduationResult) {
    println!(
        "{}: weighted aggregate average {:.2}",
        result.student, result.weighted_aggregate_average
    );
    match result.classification {
        Some(classification) => println!("Eligible: {}", classification.label()),
        None => {
            println!("Not eligible");
            for requirement in &result.missing_requirements {
                println!("- {requirement}");
            }
        }
    }
}

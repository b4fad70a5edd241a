use super::super::domain::{round2, FinalGrade, GradeStatus, InstitutionSettings, Mark};
use super::super::errors::ValidationError;
use super::scale::{letter_for, lowest_passing_letter};

const INCOMPLETE_LETTER: &str = "I";

/// Reject out-of-range or negative scores before anything is written.
pub(crate) fn validate_mark(
    mark: &Mark,
    settings: &InstitutionSettings,
) -> Result<(), ValidationError> {
    check_score("ca_total", mark.ca_total, settings.ca_maximum())?;
    check_score("exam_total", mark.exam_total, settings.exam_maximum())?;
    check_score(
        "internal_examiner_mark",
        mark.internal_examiner_mark,
        settings.ca_maximum() + settings.exam_maximum(),
    )?;
    check_score(
        "agreed_mark",
        mark.agreed_mark,
        settings.ca_maximum() + settings.exam_maximum(),
    )?;

    let components = &mark.components;
    for score in &components.cats {
        check_score("cat score", *score, settings.cat_maximum)?;
    }
    for score in &components.assignments {
        check_score("assignment score", *score, settings.assignment_maximum)?;
    }
    for score in &components.practicals {
        check_score("practical score", *score, settings.practical_maximum)?;
    }
    for score in &components.exam_questions {
        check_score("exam question score", *score, settings.exam_maximum())?;
    }

    Ok(())
}

fn check_score(
    field: &'static str,
    value: Option<f64>,
    maximum: f64,
) -> Result<(), ValidationError> {
    let Some(value) = value else {
        return Ok(());
    };

    if !value.is_finite() || value > maximum {
        return Err(ValidationError::ScoreOutOfRange {
            field,
            value,
            maximum,
        });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeScore { field, value });
    }

    Ok(())
}

/// Derive the final grade for one mark under the owning institution's policy.
pub(crate) fn grade_mark(mark: &Mark, settings: &InstitutionSettings) -> FinalGrade {
    let attempt_type = mark.attempt.attempt_type();
    // Only the supplementary flag feeds the attempt number; prior sittings are not counted.
    let attempt_number = if mark.is_supplementary() { 2 } else { 1 };

    let (total_mark, grade, status, capped) = match (mark.ca_total, mark.exam_total) {
        (Some(ca_total), Some(exam_total)) => {
            let computed = round2(ca_total + exam_total);
            let pass_mark = settings.pass_mark;

            if computed >= pass_mark {
                if mark.is_supplementary() {
                    let stored = if computed > pass_mark {
                        pass_mark
                    } else {
                        computed
                    };
                    (
                        stored,
                        lowest_passing_letter(settings),
                        GradeStatus::Pass,
                        true,
                    )
                } else {
                    (
                        computed,
                        letter_for(computed, settings),
                        GradeStatus::Pass,
                        false,
                    )
                }
            } else {
                let status = if mark.is_supplementary() {
                    GradeStatus::Retake
                } else {
                    GradeStatus::Supplementary
                };
                (computed, letter_for(computed, settings), status, false)
            }
        }
        (ca_total, exam_total) => (
            round2(ca_total.unwrap_or(0.0) + exam_total.unwrap_or(0.0)),
            INCOMPLETE_LETTER.to_string(),
            GradeStatus::Incomplete,
            false,
        ),
    };

    FinalGrade {
        student: mark.student.clone(),
        curriculum_unit: mark.curriculum_unit.clone(),
        academic_year: mark.academic_year.clone(),
        mark: mark.id.clone(),
        total_mark,
        grade,
        status,
        attempt_type,
        attempt_number,
        capped_because_supplementary: capped,
    }
}

use super::common::*;
use crate::config::EngineConfig;
use crate::records::domain::{ProgramId, StudentId};
use crate::records::standing::{StandingSummary, YearStatus};

fn standing(service: &Service, student: &str) -> crate::records::standing::YearStanding {
    service
        .year_status(&StudentId::new(student), &ProgramId::new("bsc-cs"), FIRST_YEAR, 1)
        .expect("standing computed")
        .expect("academic year resolves")
}

#[test]
fn full_pass_is_in_good_standing() {
    let store = store();
    let service = service(&store);
    service.import_marks_at(year_one_rows("stu-1", FIRST_YEAR, &[]), at(1, 0));

    let standing = standing(&service, "stu-1");
    assert_eq!(standing.status, YearStatus::InGoodStanding);
    assert_eq!(
        standing.summary,
        StandingSummary {
            total_expected: 5,
            passed: 5,
            failed: 0,
            missing: 0,
        }
    );
    assert_eq!(standing.annual_mean, 60.0);
    assert_eq!(standing.detail_message, "all 5 unit(s) passed");
}

#[test]
fn missing_results_dominate_failures() {
    let store = store();
    let service = service(&store);
    let mut rows = year_one_rows("stu-1", FIRST_YEAR, &["cs104"]);
    rows.pop();
    service.import_marks_at(rows, at(1, 0));

    let standing = standing(&service, "stu-1");
    assert_eq!(standing.status, YearStatus::IncompleteData);
    assert_eq!(
        standing.summary,
        StandingSummary {
            total_expected: 5,
            passed: 3,
            failed: 1,
            missing: 1,
        }
    );
    assert_eq!(standing.detail_message, "missing results for 1 of 5 unit(s)");
}

#[test]
fn up_to_three_failures_is_supplementary_pending() {
    let store = store();
    let service = service(&store);
    service.import_marks_at(
        year_one_rows("stu-1", FIRST_YEAR, &["cs102", "cs103", "cs105"]),
        at(1, 0),
    );

    let standing = standing(&service, "stu-1");
    assert_eq!(standing.status, YearStatus::SupplementaryPending);
    assert_eq!(standing.failed_units, vec!["CS102", "CS103", "CS105"]);
    assert_eq!(
        standing.detail_message,
        "supplementary pending for: CS102, CS103, CS105"
    );
}

#[test]
fn four_failures_is_a_retake_year() {
    let store = store();
    let service = service(&store);
    service.import_marks_at(
        year_one_rows("stu-1", FIRST_YEAR, &["cs101", "cs102", "cs103", "cs105"]),
        at(1, 0),
    );

    let standing = standing(&service, "stu-1");
    assert_eq!(standing.status, YearStatus::RetakeYear);
    assert_eq!(standing.summary.failed, 4);
    assert!(standing.detail_message.starts_with("retake year: 4 failed unit(s)"));
}

#[test]
fn retake_year_threshold_follows_configuration() {
    let store = store();
    let service = service_with(
        &store,
        EngineConfig {
            retake_year_failed_units: 1,
            ..EngineConfig::default()
        },
    );
    service.import_marks_at(
        year_one_rows("stu-1", FIRST_YEAR, &["cs101", "cs102"]),
        at(1, 0),
    );

    assert_eq!(standing(&service, "stu-1").status, YearStatus::RetakeYear);
}

#[test]
fn supplementary_pass_clears_the_failure() {
    let store = store();
    let service = service(&store);
    service.import_marks_at(year_one_rows("stu-1", FIRST_YEAR, &["cs103"]), at(1, 0));
    assert_eq!(
        standing(&service, "stu-1").status,
        YearStatus::SupplementaryPending
    );

    service.import_marks_at(
        vec![row("stu-1", "cs103", FIRST_YEAR, 20.0, 30.0, "supplementary")],
        at(2, 0),
    );

    let standing = standing(&service, "stu-1");
    assert_eq!(standing.status, YearStatus::InGoodStanding);
    assert_eq!(standing.summary.passed, 5);
}

#[test]
fn grades_from_other_academic_years_are_not_counted() {
    let store = store();
    let service = service(&store);
    service.import_marks_at(year_one_rows("stu-1", SECOND_YEAR, &[]), at(1, 0));

    let standing = standing(&service, "stu-1");
    assert_eq!(standing.status, YearStatus::IncompleteData);
    assert_eq!(standing.summary.missing, 5);
    assert_eq!(standing.annual_mean, 0.0);
}

#[test]
fn unknown_academic_year_cannot_be_evaluated() {
    let store = store();
    let service = service(&store);

    let result = service
        .year_status(
            &StudentId::new("stu-1"),
            &ProgramId::new("bsc-cs"),
            "1999/2000",
            1,
        )
        .expect("lookup succeeds");
    assert!(result.is_none());
}

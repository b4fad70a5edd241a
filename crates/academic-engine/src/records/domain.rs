use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Fixed ceiling of the audited continuous-assessment total. Raw CAT, assignment and
/// practical scores are bounded by the institution's maxima and scaled into this share.
pub const CA_MAXIMUM: f64 = 30.0;

/// Fixed exam maximum of the grading scheme. Never edited per institution.
pub const EXAM_MAXIMUM: f64 = 70.0;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of an examining institution (tenant).
    InstitutionId
);
string_id!(ProgramId);
string_id!(
    /// Identifier of a program × unit × year/semester binding.
    CurriculumUnitId
);
string_id!(AcademicYearId);
string_id!(StudentId);
string_id!(MarkId);

impl MarkId {
    /// Natural key for the single mark a student holds per unit link and academic year.
    pub fn natural(
        student: &StudentId,
        curriculum_unit: &CurriculumUnitId,
        academic_year: &AcademicYearId,
    ) -> Self {
        Self(format!("{student}:{curriculum_unit}:{academic_year}"))
    }
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One band of an institution-defined grading scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub minimum: f64,
    pub letter: String,
    pub points: f64,
}

/// Per-institution grading policy. Consulted by the engine, never mutated by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionSettings {
    pub institution: InstitutionId,
    pub cat_maximum: f64,
    pub assignment_maximum: f64,
    pub practical_maximum: f64,
    pub pass_mark: f64,
    pub supplementary_threshold: u32,
    pub retake_threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_scale: Option<Vec<GradeBand>>,
}

impl InstitutionSettings {
    pub const fn ca_maximum(&self) -> f64 {
        CA_MAXIMUM
    }

    pub const fn exam_maximum(&self) -> f64 {
        EXAM_MAXIMUM
    }

    /// Grading scale ordered from the highest minimum down, if one is configured.
    pub fn ordered_scale(&self) -> Option<Vec<GradeBand>> {
        let scale = self.grading_scale.as_ref().filter(|bands| !bands.is_empty())?;
        let mut bands = scale.clone();
        bands.sort_by(|a, b| b.minimum.total_cmp(&a.minimum));
        Some(bands)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolType {
    Standard,
    Professional,
}

/// How the student joined the program; direct entrants skip year one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    Regular,
    DirectEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub institution: InstitutionId,
    pub code: String,
    pub name: String,
    pub duration_years: u8,
    pub school_type: SchoolType,
}

/// Binding of a unit to a program, year of study, and semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumUnitLink {
    pub id: CurriculumUnitId,
    pub program: ProgramId,
    pub unit_code: String,
    pub unit_title: String,
    pub year_of_study: u8,
    pub semester: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: AcademicYearId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Sitting a mark was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkAttempt {
    First,
    Supplementary,
    Retake,
    Special,
}

impl MarkAttempt {
    pub const fn label(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Supplementary => "supplementary",
            Self::Retake => "retake",
            Self::Special => "special",
        }
    }

    /// Order of sittings within one academic year: first and special, then supplementary, then retake.
    pub const fn sitting_rank(self) -> u8 {
        match self {
            Self::First | Self::Special => 0,
            Self::Supplementary => 1,
            Self::Retake => 2,
        }
    }

    pub const fn attempt_type(self) -> AttemptType {
        match self {
            Self::First => AttemptType::FirstAttempt,
            Self::Supplementary => AttemptType::Supplementary,
            Self::Retake => AttemptType::Retake,
            Self::Special => AttemptType::Special,
        }
    }
}

impl FromStr for MarkAttempt {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "supplementary" => Ok(Self::Supplementary),
            "retake" => Ok(Self::Retake),
            "special" => Ok(Self::Special),
            _ => Err(ValidationError::UnknownAttempt(value.to_string())),
        }
    }
}

/// Raw sub-scores as entered. The engine validates them but grades from the audited totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    #[serde(default)]
    pub cats: Vec<Option<f64>>,
    #[serde(default)]
    pub assignments: Vec<Option<f64>>,
    #[serde(default)]
    pub practicals: Vec<Option<f64>>,
    #[serde(default)]
    pub exam_questions: Vec<Option<f64>>,
}

/// Raw score record for one student, unit link, and academic year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub id: MarkId,
    pub student: StudentId,
    pub curriculum_unit: CurriculumUnitId,
    pub academic_year: AcademicYearId,
    #[serde(default)]
    pub components: ComponentScores,
    pub ca_total: Option<f64>,
    pub exam_total: Option<f64>,
    #[serde(default)]
    pub internal_examiner_mark: Option<f64>,
    #[serde(default)]
    pub agreed_mark: Option<f64>,
    pub attempt: MarkAttempt,
    pub recorded_at: NaiveDateTime,
    #[serde(default)]
    pub trashed: bool,
}

impl Mark {
    pub fn is_supplementary(&self) -> bool {
        self.attempt == MarkAttempt::Supplementary
    }

    pub fn is_retake(&self) -> bool {
        self.attempt == MarkAttempt::Retake
    }

    pub fn is_special(&self) -> bool {
        self.attempt == MarkAttempt::Special
    }

    pub fn is_active(&self) -> bool {
        !self.trashed
    }

    /// Key that orders a unit link's marks by sitting. `year_start` is the start date of the
    /// mark's academic year; entry time only breaks ties.
    pub fn sitting_key(
        &self,
        year_start: Option<NaiveDate>,
    ) -> (Option<NaiveDate>, u8, NaiveDateTime, &MarkId) {
        (
            year_start,
            self.attempt.sitting_rank(),
            self.recorded_at,
            &self.id,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeStatus {
    Pass,
    Supplementary,
    Retake,
    Incomplete,
}

impl GradeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Supplementary => "SUPPLEMENTARY",
            Self::Retake => "RETAKE",
            Self::Incomplete => "INCOMPLETE",
        }
    }

    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptType {
    FirstAttempt,
    Special,
    Supplementary,
    Retake,
    ReRetake,
}

impl AttemptType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstAttempt => "FIRST_ATTEMPT",
            Self::Special => "SPECIAL",
            Self::Supplementary => "SUPPLEMENTARY",
            Self::Retake => "RETAKE",
            Self::ReRetake => "RE_RETAKE",
        }
    }
}

/// Current derived grade for a student on one curriculum unit link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalGrade {
    pub student: StudentId,
    pub curriculum_unit: CurriculumUnitId,
    pub academic_year: AcademicYearId,
    pub mark: MarkId,
    pub total_mark: f64,
    pub grade: String,
    pub status: GradeStatus,
    pub attempt_type: AttemptType,
    pub attempt_number: u32,
    pub capped_because_supplementary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Graduated,
    Discontinued,
    Deregistered,
    Repeat,
}

impl StudentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Graduated => "graduated",
            Self::Discontinued => "discontinued",
            Self::Deregistered => "deregistered",
            Self::Repeat => "repeat",
        }
    }

    /// Whether progression decisions still apply to the student.
    pub const fn is_enrolled(self) -> bool {
        matches!(self, Self::Active | Self::Repeat)
    }
}

/// One sitting of a unit as recorded in the attempt registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitAttempt {
    pub attempt_number: u32,
    pub academic_year: AcademicYearId,
    pub mark: f64,
    pub passed: bool,
    pub attempt_type: AttemptType,
}

/// Yearly snapshot appended when a year of study is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicHistoryEntry {
    pub year_of_study: u8,
    pub academic_year: AcademicYearId,
    pub annual_mean: f64,
    pub weight: f64,
    pub weighted_contribution: f64,
    pub failed_units: u32,
    #[serde(default)]
    pub is_repeat_year: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub registration_number: String,
    pub institution: InstitutionId,
    pub program: ProgramId,
    pub admission_academic_year: AcademicYearId,
    pub current_academic_year: AcademicYearId,
    pub entry_mode: EntryMode,
    pub current_year_of_study: u8,
    pub current_semester: u8,
    pub status: StudentStatus,
    #[serde(default)]
    pub unit_attempts: BTreeMap<CurriculumUnitId, Vec<UnitAttempt>>,
    #[serde(default)]
    pub academic_history: Vec<AcademicHistoryEntry>,
    #[serde(default)]
    pub remarks: Vec<String>,
}

impl Student {
    /// Whether the latest snapshot for `year_of_study` registered a repeat from another academic year.
    pub fn is_repeating(&self, year_of_study: u8, current_year: &AcademicYearId) -> bool {
        self.academic_history
            .iter()
            .rev()
            .find(|entry| entry.year_of_study == year_of_study)
            .is_some_and(|entry| entry.is_repeat_year && &entry.academic_year != current_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_parsing_is_case_insensitive_and_rejects_unknown_values() {
        assert_eq!(
            " Supplementary ".parse::<MarkAttempt>().expect("parses"),
            MarkAttempt::Supplementary
        );
        assert_eq!("FIRST".parse::<MarkAttempt>().expect("parses"), MarkAttempt::First);

        match "resit".parse::<MarkAttempt>() {
            Err(ValidationError::UnknownAttempt(value)) => assert_eq!(value, "resit"),
            other => panic!("expected unknown attempt, got {other:?}"),
        }
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(45.0), 45.0);
        assert_eq!(round2(12.344), 12.34);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn natural_mark_id_joins_key_parts() {
        let id = MarkId::natural(
            &StudentId::new("stu-1"),
            &CurriculumUnitId::new("cu-9"),
            &AcademicYearId::new("ay-2024"),
        );
        assert_eq!(id.as_str(), "stu-1:cu-9:ay-2024");
    }

    #[test]
    fn grading_scale_is_ordered_from_highest_band() {
        let settings = InstitutionSettings {
            institution: InstitutionId::new("inst"),
            cat_maximum: 30.0,
            assignment_maximum: 10.0,
            practical_maximum: 10.0,
            pass_mark: 40.0,
            supplementary_threshold: 0,
            retake_threshold: 3,
            grading_scale: Some(vec![
                GradeBand {
                    minimum: 40.0,
                    letter: "D".to_string(),
                    points: 1.0,
                },
                GradeBand {
                    minimum: 70.0,
                    letter: "A".to_string(),
                    points: 4.0,
                },
            ]),
        };

        let ordered = settings.ordered_scale().expect("scale configured");
        assert_eq!(ordered[0].letter, "A");
        assert_eq!(ordered[1].letter, "D");
    }

    fn history_entry(academic_year: &str, is_repeat_year: bool) -> AcademicHistoryEntry {
        AcademicHistoryEntry {
            year_of_study: 1,
            academic_year: AcademicYearId::new(academic_year),
            annual_mean: 35.0,
            weight: 0.15,
            weighted_contribution: 5.25,
            failed_units: 4,
            is_repeat_year,
        }
    }

    #[test]
    fn only_the_latest_snapshot_of_a_year_marks_a_repeat() {
        let mut student = Student {
            id: StudentId::new("stu-1"),
            registration_number: "CS/001/2023".to_string(),
            institution: InstitutionId::new("inst"),
            program: ProgramId::new("prog"),
            admission_academic_year: AcademicYearId::new("ay-2023"),
            current_academic_year: AcademicYearId::new("ay-2025"),
            entry_mode: EntryMode::Regular,
            current_year_of_study: 1,
            current_semester: 1,
            status: StudentStatus::Repeat,
            unit_attempts: BTreeMap::new(),
            academic_history: vec![history_entry("ay-2023", true)],
            remarks: Vec::new(),
        };
        let current = AcademicYearId::new("ay-2025");
        assert!(student.is_repeating(1, &current));
        assert!(!student.is_repeating(1, &AcademicYearId::new("ay-2023")));
        assert!(!student.is_repeating(2, &current));

        student.academic_history.push(history_entry("ay-2024", false));
        assert!(!student.is_repeating(1, &current));
    }

    #[test]
    fn sittings_order_by_academic_year_before_entry_time() {
        let earlier = NaiveDate::from_ymd_opt(2023, 9, 1);
        let later = NaiveDate::from_ymd_opt(2024, 9, 1);
        let recorded = |day| {
            NaiveDate::from_ymd_opt(2025, 1, day)
                .and_then(|date| date.and_hms_opt(8, 0, 0))
                .expect("valid timestamp")
        };
        let mark = |year: &str, attempt, day| Mark {
            id: MarkId::new(format!("stu-1:cu-1:{year}")),
            student: StudentId::new("stu-1"),
            curriculum_unit: CurriculumUnitId::new("cu-1"),
            academic_year: AcademicYearId::new(year),
            components: ComponentScores::default(),
            ca_total: Some(20.0),
            exam_total: Some(30.0),
            internal_examiner_mark: None,
            agreed_mark: None,
            attempt,
            recorded_at: recorded(day),
            trashed: false,
        };

        let corrected_first = mark("ay-2023", MarkAttempt::First, 20);
        let retake = mark("ay-2024", MarkAttempt::Retake, 2);
        assert!(retake.sitting_key(later) > corrected_first.sitting_key(earlier));

        let supplementary = mark("ay-2023", MarkAttempt::Supplementary, 1);
        assert!(supplementary.sitting_key(earlier) > corrected_first.sitting_key(earlier));
    }
}

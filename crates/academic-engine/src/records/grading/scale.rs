use super::super::domain::InstitutionSettings;

const DEFAULT_LADDER: [(f64, &str); 3] = [(69.5, "A"), (59.5, "B"), (49.5, "C")];
const DEFAULT_PASS_LETTER: &str = "D";
const DEFAULT_FAIL_LETTER: &str = "E";

/// Letter for an uncapped mark.
///
/// Without an institution scale the half-point-shifted ladder applies so that a
/// 69.5 rounds into the A band.
pub(crate) fn letter_for(total: f64, settings: &InstitutionSettings) -> String {
    if let Some(bands) = settings.ordered_scale() {
        return bands
            .iter()
            .find(|band| total >= band.minimum)
            .or_else(|| bands.last())
            .map(|band| band.letter.clone())
            .unwrap_or_else(|| DEFAULT_FAIL_LETTER.to_string());
    }

    for (minimum, letter) in DEFAULT_LADDER {
        if total >= minimum {
            return letter.to_string();
        }
    }

    if total >= settings.pass_mark {
        DEFAULT_PASS_LETTER.to_string()
    } else {
        DEFAULT_FAIL_LETTER.to_string()
    }
}

/// Letter of the band covering the pass mark; the ceiling for a supplementary pass.
pub(crate) fn lowest_passing_letter(settings: &InstitutionSettings) -> String {
    match settings.ordered_scale() {
        Some(bands) => bands
            .iter()
            .find(|band| settings.pass_mark >= band.minimum)
            .or_else(|| bands.last())
            .map(|band| band.letter.clone())
            .unwrap_or_else(|| DEFAULT_PASS_LETTER.to_string()),
        None => DEFAULT_PASS_LETTER.to_string(),
    }
}

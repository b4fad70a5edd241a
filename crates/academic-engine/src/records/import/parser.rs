use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::{ImportRowError, MarkImportRow, ParsedMarkRow};

/// Parse every data row. Only I/O and header failures abort; a bad row is kept as its error.
pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<ParsedMarkRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let cell = |record: &csv::StringRecord, name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .and_then(|index| record.get(index))
            .unwrap_or_default()
            .to_string()
    };
    let mut rows = Vec::new();

    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err),
            Err(err) => {
                rows.push(Err(ImportRowError {
                    row,
                    student: String::new(),
                    unit: String::new(),
                    message: err.to_string(),
                }));
                continue;
            }
        };

        let parsed = record
            .deserialize::<MarkCsvRow>(Some(&headers))
            .map(MarkCsvRow::into_import_row)
            .map_err(|err| ImportRowError {
                row,
                student: cell(&record, "student"),
                unit: cell(&record, "unit"),
                message: err.to_string(),
            });
        rows.push(parsed);
    }

    Ok(rows)
}

impl MarkCsvRow {
    fn into_import_row(self) -> MarkImportRow {
        MarkImportRow {
            student: self.student,
            curriculum_unit: self.unit,
            academic_year: self.academic_year,
            ca_total: self.ca_total,
            exam_total: self.exam_total,
            attempt: self.attempt.unwrap_or_else(|| "first".to_string()),
            internal_examiner_mark: self.internal_examiner_mark,
            agreed_mark: self.agreed_mark,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarkCsvRow {
    student: String,
    unit: String,
    academic_year: String,
    #[serde(default, deserialize_with = "empty_string_as_none_f64")]
    ca_total: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none_f64")]
    exam_total: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    attempt: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none_f64")]
    internal_examiner_mark: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none_f64")]
    agreed_mark: Option<f64>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

fn empty_string_as_none_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    empty_string_as_none(deserializer)?
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("'{raw}' is not a number")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn blank_cells_become_none_and_attempt_defaults_to_first() {
        let rows = parse_rows(Cursor::new(
            "student,unit,academic_year,ca_total,exam_total,attempt\n\
stu-1, cu-1 ,2024/2025,25,,\n",
        ))
        .expect("parse");

        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().expect("row parses");
        assert_eq!(row.curriculum_unit, "cu-1");
        assert_eq!(row.ca_total, Some(25.0));
        assert_eq!(row.exam_total, None);
        assert_eq!(row.attempt, "first");
        assert_eq!(row.agreed_mark, None);
    }

    #[test]
    fn non_numeric_scores_reject_only_their_row() {
        let rows = parse_rows(Cursor::new(
            "student,unit,academic_year,ca_total,exam_total,attempt\n\
stu-1,cu-1,2024/2025,25,40,first\n\
stu-2,cu-1,2024/2025,twenty,40,first\n\
stu-3,cu-1,2024/2025,20,40,first\n",
        ))
        .expect("parse");

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert!(rows[2].is_ok());
        let error = rows[1].as_ref().expect_err("row rejected");
        assert_eq!(error.row, 2);
        assert_eq!(error.student, "stu-2");
        assert_eq!(error.unit, "cu-1");
        assert!(error.message.contains("'twenty' is not a number"));
    }

    #[test]
    fn short_records_are_row_errors() {
        let rows = parse_rows(Cursor::new(
            "student,unit,academic_year,ca_total,exam_total,attempt\n\
stu-1,cu-1\n\
stu-3,cu-1,2024/2025,20,40,first\n",
        ))
        .expect("parse");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().expect_err("row rejected").row, 1);
        assert!(rows[1].is_ok());
    }
}

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use academic_engine::config::AppConfig;
use academic_engine::error::AppError;
use academic_engine::records::{
    read_mark_rows_from_path, AcademicRecordsService, CurriculumDirectory, InMemoryRecordStore,
    MarkId, ProgramId, RecordStore, RecordsError, StudentId,
};
use academic_engine::telemetry;
use clap::{Args, Parser, Subcommand};
use tracing::info;

type Service = AcademicRecordsService<InMemoryRecordStore, InMemoryRecordStore, InMemoryRecordStore>;

#[derive(Parser, Debug)]
#[command(
    name = "academic-registrar",
    about = "Grade marks, evaluate standing, and progress students in a records snapshot",
    version
)]
struct Cli {
    /// JSON records snapshot to read and, for mutating commands, write back
    #[arg(long, global = true, default_value = "records.json")]
    store: PathBuf,
    /// Also print the serialized result
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import marks from a CSV file and grade every row
    ImportMarks(ImportArgs),
    /// Recompute the final grade for one stored mark
    Grade(MarkArgs),
    /// Soft-delete a mark and regrade its unit
    TrashMark(MarkArgs),
    /// Restore trashed marks, optionally auditing the affected students
    RestoreMarks(RestoreArgs),
    /// Show the yearly standing of a student
    YearStatus(YearStatusArgs),
    /// Promote a student who is in good standing
    Promote(StudentArgs),
    /// Promote every active student of a cohort
    PromoteClass(PromoteClassArgs),
    /// Register a student who failed the year for a repeat
    RepeatYear(StudentArgs),
    /// Run the discontinuation audit for one or more students
    Audit(AuditArgs),
    /// Compute the weighted aggregate average and degree classification
    Graduation(StudentArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// CSV with student,unit,academic_year,ca_total,exam_total,attempt headers
    #[arg(long)]
    csv: PathBuf,
}

#[derive(Args, Debug)]
struct MarkArgs {
    #[arg(long)]
    mark: String,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    #[arg(long = "mark", required = true)]
    marks: Vec<String>,
    /// Audit every student whose marks were restored
    #[arg(long)]
    audit: bool,
}

#[derive(Args, Debug)]
struct StudentArgs {
    #[arg(long)]
    student: String,
}

#[derive(Args, Debug)]
struct YearStatusArgs {
    #[arg(long)]
    student: String,
    /// Academic year name, e.g. 2024/2025 (defaults to the student's current year)
    #[arg(long)]
    academic_year: Option<String>,
    /// Year of study (defaults to the student's current year of study)
    #[arg(long)]
    year: Option<u8>,
}

#[derive(Args, Debug)]
struct PromoteClassArgs {
    #[arg(long)]
    program: String,
    #[arg(long)]
    year: u8,
    #[arg(long)]
    academic_year: String,
}

#[derive(Args, Debug)]
struct AuditArgs {
    #[arg(long = "student", required = true)]
    students: Vec<String>,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let weighting = config.engine.weighting_table()?;
    let store = Arc::new(InMemoryRecordStore::load(&cli.store)?);
    let service: Service = AcademicRecordsService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        &config.engine,
        weighting,
    );

    let mutated = run_command(cli.command, &service, &store, cli.json)?;
    if mutated {
        store.save(&cli.store)?;
        info!(store = %cli.store.display(), "records snapshot saved");
    }

    Ok(())
}

fn run_command(
    command: Command,
    service: &Service,
    store: &InMemoryRecordStore,
    json: bool,
) -> Result<bool, AppError> {
    match command {
        Command::ImportMarks(args) => {
            let rows = read_mark_rows_from_path(&args.csv)?;
            let summary = service.import_parsed_marks(rows);
            render::import_summary(&summary);
            render::json(json, &summary)?;
            Ok(summary.imported > 0)
        }
        Command::Grade(args) => {
            let grade = service.compute_final_grade(&MarkId::new(args.mark))?;
            render::final_grade(&grade);
            render::json(json, &grade)?;
            Ok(true)
        }
        Command::TrashMark(args) => {
            let id = MarkId::new(args.mark);
            let grade = service.trash_mark(&id)?;
            render::regrade(&id, grade.as_ref());
            render::json(json, &grade)?;
            Ok(true)
        }
        Command::RestoreMarks(args) => {
            let ids: Vec<MarkId> = args.marks.into_iter().map(MarkId::new).collect();
            let summary = service.restore_marks(&ids);
            render::restore_summary(&summary);
            render::json(json, &summary)?;
            if args.audit {
                let audit = service.audit_students(&summary.affected_students);
                render::batch_audit(&audit);
                render::json(json, &audit)?;
            }
            Ok(summary.restored > 0)
        }
        Command::YearStatus(args) => {
            year_status(service, store, args, json)?;
            Ok(false)
        }
        Command::Promote(args) => {
            let result = service.promote_student(&StudentId::new(args.student))?;
            render::promotion(&result);
            render::json(json, &result)?;
            Ok(result.success)
        }
        Command::PromoteClass(args) => {
            let result = service.bulk_promote_class(
                &ProgramId::new(args.program),
                args.year,
                &args.academic_year,
            )?;
            render::batch_promotion(&result);
            render::json(json, &result)?;
            Ok(result.promoted > 0)
        }
        Command::RepeatYear(args) => {
            let result = service.register_repeat_year(&StudentId::new(args.student))?;
            render::promotion(&result);
            render::json(json, &result)?;
            Ok(result.success)
        }
        Command::Audit(args) => {
            let ids: Vec<StudentId> = args.students.into_iter().map(StudentId::new).collect();
            let result = service.audit_students(&ids);
            render::batch_audit(&result);
            render::json(json, &result)?;
            Ok(result.discontinued > 0)
        }
        Command::Graduation(args) => {
            let result = service.classify_graduation(&StudentId::new(args.student))?;
            render::graduation(&result);
            render::json(json, &result)?;
            Ok(false)
        }
    }
}

fn year_status(
    service: &Service,
    store: &InMemoryRecordStore,
    args: YearStatusArgs,
    json: bool,
) -> Result<(), AppError> {
    let id = StudentId::new(args.student);
    let student = store
        .student(&id)
        .map_err(RecordsError::from)?
        .ok_or_else(|| RecordsError::NotFound {
            entity: "student",
            key: id.to_string(),
        })?;

    let academic_year = match args.academic_year {
        Some(name) => name,
        None => store
            .academic_year(&student.current_academic_year)
            .map_err(RecordsError::from)?
            .map(|year| year.name)
            .ok_or_else(|| RecordsError::NotFound {
                entity: "academic year",
                key: student.current_academic_year.to_string(),
            })?,
    };
    let year_of_study = args.year.unwrap_or(student.current_year_of_study);

    let standing = service.year_status(&id, &student.program, &academic_year, year_of_study)?;
    match &standing {
        Some(standing) => render::standing(standing),
        None => println!("Academic year '{academic_year}' could not be resolved; standing not evaluated"),
    }
    render::json(json, &standing)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn restore_accepts_repeated_marks_and_global_flags() {
        let cli = Cli::try_parse_from([
            "academic-registrar",
            "restore-marks",
            "--mark",
            "m-1",
            "--mark",
            "m-2",
            "--audit",
            "--store",
            "snapshot.json",
            "--json",
        ])
        .expect("arguments parse");

        assert_eq!(cli.store, PathBuf::from("snapshot.json"));
        assert!(cli.json);
        match cli.command {
            Command::RestoreMarks(args) => {
                assert_eq!(args.marks, vec!["m-1", "m-2"]);
                assert!(args.audit);
            }
            other => panic!("expected restore-marks, got {other:?}"),
        }
    }

    #[test]
    fn promote_class_requires_an_academic_year() {
        let result = Cli::try_parse_from([
            "academic-registrar",
            "promote-class",
            "--program",
            "bsc-cs",
            "--year",
            "1",
        ]);
        assert!(result.is_err());
    }
}

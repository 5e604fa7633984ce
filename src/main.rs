use std::path::PathBuf;

use anyhow::Context;
use campus_attendance::aggregate::aggregate;
use campus_attendance::config::Config;
use campus_attendance::db::{self, PgAttendanceStore};
use campus_attendance::filter::{AttendanceFilter, MonthFilter, SubjectFilter};
use campus_attendance::import;
use campus_attendance::models::{AttendanceStatus, Student};
use campus_attendance::optimistic::Submission;
use campus_attendance::report;
use campus_attendance::sheet::MarkingSheet;
use campus_attendance::store::AttendanceStore;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "campus-attendance")]
#[command(about = "Class attendance recording and summaries for the campus ERP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample class with a few marked sessions
    Seed,
    /// Import an attendance export (one batch per subject and date)
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        class_name: String,
    },
    /// Mark attendance for one class session
    Mark {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        faculty: String,
        /// CSV of roll_number,status,remarks; defaults to the whole class present
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Roll numbers to mark absent when using the class roster
        #[arg(long, value_delimiter = ',', conflicts_with = "roster")]
        absent: Vec<String>,
        /// Roll numbers to mark late when using the class roster
        #[arg(long, value_delimiter = ',', conflicts_with = "roster")]
        late: Vec<String>,
    },
    /// Print a student's attendance summary
    Summary {
        #[arg(long)]
        student: String,
        /// Subject code, or "all"
        #[arg(long, default_value = "all")]
        subject: String,
        /// 0-indexed month (0 = January), or "all"
        #[arg(long, default_value = "all")]
        month: MonthFilter,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown attendance report for a student
    Report {
        #[arg(long)]
        student: String,
        #[arg(long, default_value = "all")]
        subject: String,
        #[arg(long, default_value = "all")]
        month: MonthFilter,
        #[arg(long, default_value = "attendance.md")]
        out: PathBuf,
    },
    /// Show what was recorded for one class session
    Session {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        date: NaiveDate,
    },
}

async fn resolve_subject_filter(
    pool: &PgPool,
    subject: &str,
) -> anyhow::Result<(SubjectFilter, Option<String>)> {
    if let Ok(filter) = subject.parse::<SubjectFilter>() {
        return Ok((filter, None));
    }
    let found = db::subject_by_code(pool, subject).await?;
    Ok((
        SubjectFilter::Only(found.id),
        Some(format!("{} {}", found.code, found.name)),
    ))
}

fn roll_numbers_to_ids(roster: &[Student], rolls: &[String]) -> anyhow::Result<Vec<uuid::Uuid>> {
    rolls
        .iter()
        .map(|roll| {
            roster
                .iter()
                .find(|s| s.roll_number == *roll)
                .map(|s| s.id)
                .with_context(|| format!("{roll} is not enrolled in this class"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_filter)?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgAttendanceStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let outcome = db::seed(&store).await?;
            println!(
                "Seed data inserted: {} records, {} sessions already present.",
                outcome.inserted_events, outcome.skipped_sessions
            );
        }
        Commands::Import { csv, class_name } => {
            let outcome = import::import_file(&store, &csv, &class_name)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!(
                "Inserted {} attendance records from {}; skipped {} sessions already marked.",
                outcome.inserted_events,
                csv.display(),
                outcome.skipped_sessions
            );
        }
        Commands::Mark {
            subject,
            date,
            faculty,
            roster,
            absent,
            late,
        } => {
            let subject = db::subject_by_code(&pool, &subject).await?;

            let sheet = match roster {
                Some(path) => {
                    let rows = import::read_roster(&path)
                        .with_context(|| format!("failed to read roster {}", path.display()))?;
                    let mut students = Vec::with_capacity(rows.len());
                    for row in &rows {
                        students.push(db::student_by_roll(&pool, &row.roll_number).await?.id);
                    }
                    let mut sheet = MarkingSheet::new(subject.clone(), date, faculty, &students);
                    for (student_id, row) in students.iter().zip(rows) {
                        sheet = sheet
                            .with_status(*student_id, row.status)
                            .with_remarks(*student_id, row.remarks);
                    }
                    sheet
                }
                None => {
                    let class = db::class_roster(&pool, subject.id).await?;
                    let ids: Vec<_> = class.iter().map(|s| s.id).collect();
                    let mut sheet = MarkingSheet::new(subject.clone(), date, faculty, &ids);
                    for id in roll_numbers_to_ids(&class, &absent)? {
                        sheet = sheet.with_status(id, AttendanceStatus::Absent);
                    }
                    for id in roll_numbers_to_ids(&class, &late)? {
                        sheet = sheet.with_status(id, AttendanceStatus::Late);
                    }
                    sheet
                }
            };

            let batch = sheet.to_batch()?;
            info!(
                subject = %sheet.subject().code,
                date = %sheet.date(),
                students = batch.marks().len(),
                "submitting attendance"
            );
            let result = store.insert_batch(&batch).await;
            let submission = Submission::begin(Vec::new(), batch.events()).resolve(&result);

            if let Submission::RolledBack { reason, .. } = &submission {
                anyhow::bail!("Attendance was not recorded: {reason}");
            }
            let recorded = store.session_events(sheet.subject().id, sheet.date()).await?;
            print!(
                "{}",
                report::session_sheet(sheet.subject(), sheet.date(), &recorded)
            );
        }
        Commands::Summary {
            student,
            subject,
            month,
            json,
        } => {
            let student = db::student_by_roll(&pool, &student).await?;
            let events = store.student_events(student.id).await?;
            let (subject_filter, _) = resolve_subject_filter(&pool, &subject).await?;
            let filter = AttendanceFilter::default()
                .with_subject(subject_filter)
                .with_month(month);
            let summary = aggregate(&filter.apply(&events));

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{} ({})", student.full_name, student.roll_number);
                print!("{}", report::summary_lines(&summary));
            }
        }
        Commands::Report {
            student,
            subject,
            month,
            out,
        } => {
            let student = db::student_by_roll(&pool, &student).await?;
            let events = store.student_events(student.id).await?;
            let (subject_filter, subject_label) = resolve_subject_filter(&pool, &subject).await?;
            let filter = AttendanceFilter::default()
                .with_subject(subject_filter)
                .with_month(month);
            let filtered = filter.apply(&events);
            let summary = aggregate(&filtered);

            let report = report::build_report(
                &format!("{} ({})", student.full_name, student.roll_number),
                &report::describe_filter(&filter, subject_label.as_deref()),
                &summary,
                &filtered,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Session { subject, date } => {
            let subject = db::subject_by_code(&pool, &subject).await?;
            let events = store.session_events(subject.id, date).await?;
            print!("{}", report::session_sheet(&subject, date, &events));
        }
    }

    Ok(())
}

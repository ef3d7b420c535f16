use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use staff_mood_insights::aggregate::{aggregate_with, reference_lines, AggregateOptions};
use staff_mood_insights::cohort::concerning_cohorts;
use staff_mood_insights::format::{export_file_name, format_score, join_list};
use staff_mood_insights::models::{ChartSeries, FilterState, ReferenceLine, SortKey};
use staff_mood_insights::range::DateRange;
use staff_mood_insights::roster::{filter_and_sort, MoodTrend};
use staff_mood_insights::{report, source};

#[derive(Parser)]
#[command(name = "mood-insights")]
#[command(about = "Chart and roster views over student wellbeing exports", long_about = None)]
struct Cli {
    /// Reference instant (RFC 3339); defaults to MOOD_INSIGHTS_NOW or the current time
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RosterArgs {
    /// Only students on these courses
    #[arg(long = "course")]
    courses: Vec<String>,
    /// Only students in these academic years
    #[arg(long = "year")]
    years: Vec<String>,
    /// Case-insensitive match on name or student number
    #[arg(long, default_value = "")]
    search: String,
    /// Sort option such as student_name-asc or student_number-desc
    #[arg(long)]
    sort: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily metric averages as chart-ready JSON
    Chart {
        #[arg(long)]
        records: PathBuf,
        #[arg(long, value_delimiter = ',', default_value = "mood")]
        metrics: Vec<String>,
        /// 7_days, 1_month or 1_year; anything else means all time
        #[arg(long, default_value = "7_days")]
        range: String,
        /// Include every calendar day in the window, empty days as gaps
        #[arg(long, default_value_t = false)]
        fill_days: bool,
        /// Add a flat average line per metric
        #[arg(long, default_value_t = false)]
        with_average: bool,
    },
    /// Filter and sort the student roster
    Roster {
        #[arg(long)]
        students: PathBuf,
        #[command(flatten)]
        filter: RosterArgs,
        /// Also write the view as CSV into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// List cohorts whose average wellbeing falls below thresholds
    Concerns {
        #[arg(long)]
        records: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        students: PathBuf,
        #[arg(long, value_delimiter = ',', default_value = "mood,exercise,sleep,socialisation,productivity")]
        metrics: Vec<String>,
        #[arg(long, default_value = "7_days")]
        range: String,
        #[command(flatten)]
        filter: RosterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct ChartOutput<'a> {
    range: &'a str,
    lower_bound: DateTime<Utc>,
    series: &'a [ChartSeries],
    #[serde(skip_serializing_if = "Option::is_none")]
    averages: Option<Vec<ReferenceLine>>,
}

fn resolve_now(flag: Option<String>) -> anyhow::Result<DateTime<Utc>> {
    let configured = flag.or_else(|| std::env::var("MOOD_INSIGHTS_NOW").ok());
    match configured {
        Some(value) => source::parse_timestamp(&value)
            .with_context(|| format!("reference time '{value}' is not a valid timestamp")),
        None => Ok(Utc::now()),
    }
}

fn filter_state(args: RosterArgs) -> FilterState {
    let sort = args.sort.as_deref().and_then(|key| match key.parse::<SortKey>() {
        Ok(key) => Some(key),
        Err(err) => {
            warn!(sort = key, error = %err, "ignoring sort option");
            None
        }
    });

    FilterState {
        courses: args.courses.into_iter().collect::<BTreeSet<_>>(),
        academic_years: args.years.into_iter().collect::<BTreeSet<_>>(),
        search: args.search,
        sort,
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let now = resolve_now(cli.now)?;

    match cli.command {
        Commands::Chart {
            records,
            metrics,
            range,
            fill_days,
            with_average,
        } => {
            let range = DateRange::from_key(&range);
            let raw = source::load_records(&records)?;
            let options = AggregateOptions {
                fill_calendar_days: fill_days,
            };
            let series = aggregate_with(&raw, &metrics, range, now, options);
            info!(
                records = raw.len(),
                metrics = metrics.len(),
                range = range.key(),
                "aggregated daily metrics"
            );

            let output = ChartOutput {
                range: range.key(),
                lower_bound: range.lower_bound(now),
                series: &series,
                averages: with_average.then(|| reference_lines(&series)),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Roster {
            students,
            filter,
            export_dir,
        } => {
            let roster = source::load_roster(&students)?;
            let view = filter_and_sort(&roster, &filter_state(filter));
            info!(total = roster.len(), shown = view.len(), "filtered roster");

            if view.is_empty() {
                println!("No students match the current filters.");
            }
            for entity in &view {
                println!(
                    "- {} ({}) {} / {}: mood {}, last recording {}",
                    entity.name,
                    entity.secondary_id,
                    entity.academic_year.as_deref().unwrap_or("-"),
                    entity.course.as_deref().unwrap_or("-"),
                    MoodTrend::classify(entity.mood_trend).label(),
                    entity
                        .last_activity
                        .map(|date| date.to_string())
                        .unwrap_or_else(|| "No record".to_string())
                );
            }

            if let Some(dir) = export_dir {
                let path = dir.join(export_file_name("StudentList", now));
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                report::write_roster_csv(file, &view)?;
                println!("Roster written to {}.", path.display());
            }
        }
        Commands::Concerns { records } => {
            let raw = source::load_records(&records)?;
            let flagged = concerning_cohorts(&raw);

            if flagged.is_empty() {
                println!("No cohorts below wellbeing thresholds.");
                return Ok(());
            }

            for concern in &flagged {
                let mood = concern.cohort.averages.get("mood").copied();
                println!(
                    "- {} {}: {} (mood {}, {} records)",
                    concern.cohort.academic_year,
                    concern.cohort.course,
                    join_list(&concern.concerns),
                    format_score(mood),
                    concern.cohort.record_count
                );
            }
        }
        Commands::Report {
            records,
            students,
            metrics,
            range,
            filter,
            out,
        } => {
            let range = DateRange::from_key(&range);
            let raw = source::load_records(&records)?;
            let roster = source::load_roster(&students)?;

            let series = aggregate_with(&raw, &metrics, range, now, AggregateOptions::default());
            let flagged = concerning_cohorts(&raw);
            let view = filter_and_sort(&roster, &filter_state(filter));

            let report = report::build_report(range, now, &series, &flagged, &view);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

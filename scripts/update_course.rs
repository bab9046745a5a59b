use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use syllabus::bson::doc;
use syllabus::{
    load_env, parse_id, with_session, CourseId, CourseRepository, Filter, Logger, Result, SyllabusError,
    Update, UpdateOptions,
};

#[path = "common.rs"]
mod common;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    /// Load the course, change it, save it back under the version check
    Loaded,
    /// Increment the price in place
    Query,
}

/// Update one course by id
#[derive(Parser, Debug)]
#[command(name = "update-course")]
struct Cli {
    #[command(flatten)]
    database: common::DatabaseArgs,

    /// Hex record identifier
    #[arg(long)]
    id: String,

    #[arg(long, value_enum, default_value_t = Mode::Loaded)]
    mode: Mode,

    /// Author written in `loaded` mode
    #[arg(long, default_value = "Another Author")]
    author: String,

    /// Price increment in `query` mode
    #[arg(long, default_value_t = 33.0)]
    increment: f64,

    /// Skip schema checks in `query` mode
    #[arg(long)]
    skip_validation: bool,
}

async fn apply(courses: CourseRepository, cli: &Cli, id: CourseId, logger: &Logger) -> Result<()> {
    match cli.mode {
        Mode::Loaded => {
            let Some(mut course) = courses.find_by_id(&id).await? else {
                return Err(SyllabusError::storage(format!("No course with id {}", id)));
            };
            courses
                .update_loaded(
                    &mut course,
                    doc! { "isPublished": true, "author": cli.author.as_str() },
                )
                .await?;
            logger.success(&format!(
                "Saved {} \"{}\" at version {}",
                course.id, course.name, course.version
            ));
        }
        Mode::Query => {
            let options = UpdateOptions {
                skip_validation: cli.skip_validation,
            };
            let summary = courses
                .update_by_query(
                    &Filter::id(id),
                    &Update::new().inc("price", cli.increment),
                    options,
                )
                .await?;
            if summary.matched == 0 {
                return Err(SyllabusError::storage(format!("No course with id {}", id)));
            }
            logger.success(&format!(
                "Matched {}, modified {}",
                summary.matched, summary.modified
            ));
        }
    }
    Ok(())
}

async fn run(cli: &Cli, logger: &Logger) -> Result<()> {
    let config = cli.database.config()?;
    let id = parse_id(&cli.id)?;

    with_session(&config.url, config.connect_options(), |session| {
        apply(CourseRepository::new(session), cli, id, logger)
    })
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = load_env();
    let cli = Cli::parse();
    cli.database.init_logging();
    let logger = Logger::new("update-course");

    let result = match loaded {
        Ok(()) => run(&cli, &logger).await,
        Err(e) => Err(e),
    };
    common::exit(&logger, result)
}

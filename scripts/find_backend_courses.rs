use clap::Parser;
use std::process::ExitCode;
use syllabus::{
    load_env, with_session, CourseRepository, Filter, Logger, QueryOptions, Result, SortDirection,
};

#[path = "common.rs"]
mod common;

/// Published courses with a tag matching a pattern, case-insensitively
#[derive(Parser, Debug)]
#[command(name = "find-backend-courses")]
struct Cli {
    #[command(flatten)]
    database: common::DatabaseArgs,

    /// Regular expression matched against each tag
    #[arg(long, default_value = "backend")]
    tag_pattern: String,
}

async fn run(cli: &Cli, logger: &Logger) -> Result<()> {
    let config = cli.database.config()?;
    let filter =
        Filter::pattern_ci("tags", cli.tag_pattern.as_str()).and(Filter::eq("isPublished", true));
    let options = QueryOptions::new()
        .select(["name", "author", "price"])
        .sort_by("name", SortDirection::Ascending);

    let courses = with_session(&config.url, config.connect_options(), |session| async move {
        CourseRepository::new(session)
            .find_many(&filter, &options)
            .await
    })
    .await?;

    logger.info(&format!("{} matching courses", courses.len()));
    for course in &courses {
        logger.info(&format!(
            "{} by {} price={:?}",
            course.name.as_deref().unwrap_or("-"),
            course.author.as_deref().unwrap_or("-"),
            course.price,
        ));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = load_env();
    let cli = Cli::parse();
    cli.database.init_logging();
    let logger = Logger::new("find-backend-courses");

    let result = match loaded {
        Ok(()) => run(&cli, &logger).await,
        Err(e) => Err(e),
    };
    common::exit(&logger, result)
}

use clap::Parser;
use std::process::ExitCode;
use syllabus::{
    load_env, with_session, CourseRepository, Filter, Logger, QueryOptions, Result, SortDirection,
};

#[path = "common.rs"]
mod common;

/// List courses sorted by name
#[derive(Parser, Debug)]
#[command(name = "list-courses")]
struct Cli {
    #[command(flatten)]
    database: common::DatabaseArgs,

    /// 0 lists everything
    #[arg(long, default_value_t = 10)]
    limit: u64,
}

async fn run(cli: &Cli, logger: &Logger) -> Result<()> {
    let config = cli.database.config()?;
    let options = QueryOptions::new()
        .sort_by("name", SortDirection::Ascending)
        .limit(cli.limit);

    let courses = with_session(&config.url, config.connect_options(), |session| async move {
        CourseRepository::new(session)
            .find_many(&Filter::all(), &options)
            .await
    })
    .await?;

    logger.info(&format!("{} courses", courses.len()));
    for course in &courses {
        logger.info(&format!(
            "{} {} by {} tags={:?} price={:?}",
            course.id,
            course.name.as_deref().unwrap_or("-"),
            course.author.as_deref().unwrap_or("-"),
            course.tags.as_deref().unwrap_or_default(),
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
    let logger = Logger::new("list-courses");

    let result = match loaded {
        Ok(()) => run(&cli, &logger).await,
        Err(e) => Err(e),
    };
    common::exit(&logger, result)
}

use clap::{ArgAction, Parser};
use std::process::ExitCode;
use syllabus::{load_env, with_session, CourseRepository, Logger, NewCourse, Result};

#[path = "common.rs"]
mod common;

/// Create one course
#[derive(Parser, Debug)]
#[command(name = "create-course")]
struct Cli {
    #[command(flatten)]
    database: common::DatabaseArgs,

    #[arg(long, default_value = "React Course")]
    name: String,

    #[arg(long, default_value = "Daniel")]
    author: String,

    /// Comma separated
    #[arg(long, value_delimiter = ',', default_value = "react,frontend")]
    tags: Vec<String>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    published: bool,

    #[arg(long)]
    price: Option<f64>,
}

async fn run(cli: &Cli, logger: &Logger) -> Result<()> {
    let config = cli.database.config()?;

    let mut new_course = NewCourse::named(cli.name.as_str())
        .author(cli.author.as_str())
        .tags(cli.tags.iter().map(String::as_str))
        .published(cli.published);
    if let Some(price) = cli.price {
        new_course = new_course.price(price);
    }

    let course = with_session(&config.url, config.connect_options(), |session| async move {
        CourseRepository::new(session).create(new_course).await
    })
    .await?;

    logger.success(&format!(
        "Created course {} \"{}\" by {} tags={:?} published={:?} date={}",
        course.id,
        course.name,
        course.author.as_deref().unwrap_or("-"),
        course.tags,
        course.is_published,
        course.date_utc().to_rfc3339(),
    ));
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = load_env();
    let cli = Cli::parse();
    cli.database.init_logging();
    let logger = Logger::new("create-course");

    let result = match loaded {
        Ok(()) => run(&cli, &logger).await,
        Err(e) => Err(e),
    };
    common::exit(&logger, result)
}

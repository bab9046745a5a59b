//! Flags and exit handling shared by the course scripts

use clap::Args;
use std::process::ExitCode;
use syllabus::config::DEFAULT_DATABASE_URL;
use syllabus::{init_logging, DatabaseConfig, Logger, Result};

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// Endpoint URI (mongodb://, mongodb+srv:// or memory://)
    #[arg(long, env = "SYLLABUS_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Log level or tracing filter directive
    #[arg(long, env = "SYLLABUS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl DatabaseArgs {
    pub fn init_logging(&self) {
        std::env::set_var("SYLLABUS_LOG_LEVEL", &self.log_level);
        init_logging();
    }

    /// Environment settings with the endpoint taken from the command line
    pub fn config(&self) -> Result<DatabaseConfig> {
        let mut config = DatabaseConfig::from_env()?;
        config.url = self.database_url.clone();
        Ok(config)
    }
}

pub fn exit(logger: &Logger, result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

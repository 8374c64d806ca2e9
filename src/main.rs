use crate::config::{describe_config_error, fallback_log_file, load_config};
use crate::logging::{init_logging, record_bad_request, ECHO_TARGET};
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info};

mod commit;
mod config;
mod discord;
mod git;
mod logging;
mod models;
mod openai;
mod prompt;
mod review;

#[cfg(test)]
mod tests;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load Configuration
    let app_settings = match load_config() {
        Ok(settings) => settings,
        Err(err) => return report_config_error(err),
    };

    if let Err(e) = init_logging(&app_settings.log_file, &app_settings.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        model = %app_settings.model_name,
        endpoint = %app_settings.api_endpoint,
        mapped_authors = app_settings.author_mapping.len(),
        "Configuration loaded"
    );
    if app_settings.author_mapping.is_empty() {
        debug!("AUTHOR_MAPPING is empty, reviews will name authors without mentions");
    }

    let commit = app_settings
        .commit_hash
        .clone()
        .unwrap_or_else(|| "<stdin>".to_string());

    let result = review::run(&app_settings, io::stdin().lock(), &mut io::stdout().lock()).await;
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: ECHO_TARGET, "Error processing commit {}: {}", commit, e);
            ExitCode::FAILURE
        }
    }
}

/// Usage and configuration errors are logged and exit with 1; `--help` and `--version` exit with 0.
fn report_config_error(err: anyhow::Error) -> ExitCode {
    if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
        let _ = clap_err.print();
        if !clap_err.use_stderr() {
            return ExitCode::SUCCESS;
        }
    } else {
        eprintln!("Failed to load configuration: {:#}", err);
    }

    record_bad_request(&fallback_log_file(), &describe_config_error(&err));
    ExitCode::FAILURE
}

mod cli;
mod commands;
mod infra;
mod ingest;
mod routes;
mod server;

use case_fusion::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

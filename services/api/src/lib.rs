mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use fiscal_host::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

mod cli;
mod infra;
mod offline;
mod routes;
mod server;

use licence_rules::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

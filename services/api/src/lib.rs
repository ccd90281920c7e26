mod cli;
mod infra;
mod operator;
mod routes;
mod server;

use county_desk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

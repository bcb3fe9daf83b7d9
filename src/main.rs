mod ai;
mod app;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod repository;
mod wiki;

use app::App;
use cli::{parse_args, USAGE};
use config::Config;
use error::Result;
use models::UiState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load()?;
    let mut app = App::new(&config).await?;

    // Evict stale cache entries before serving anything
    app.startup().await;

    let output = app.handle_command(command).await?;
    println!("{}", output);

    if let UiState::Error(reason) = &app.state {
        tracing::debug!("Command finished with error state: {}", reason);
        std::process::exit(1);
    }

    Ok(())
}

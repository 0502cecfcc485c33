//! sigscope entry point.

mod app;
mod capture;
mod commands;
mod config;
mod logging;
mod scope;
mod ui;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

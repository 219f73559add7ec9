mod tpp_config;
mod tpp_controllers;
mod tpp_gui;
mod tpp_models;
mod tpp_predictor;
mod tpp_texts;
mod tpp_views;

use anyhow::Context;
use clap::Parser;
use tpp_config::{AppConfig, Cli, Command};
use tpp_controllers::TPPControllers;
use tpp_views::TPPViews;

fn main() {
    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\nThe application encountered an unexpected error:");
        eprintln!("{}", panic_info);
        eprintln!("\n💡 Report this issue if it persists");
        eprintln!("\n{}", "═".repeat(70));
    }));

    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli);

    if let Err(e) = run(cli.command.unwrap_or(Command::Menu), config) {
        eprintln!("\n❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
    if let Command::Gui = command {
        return tpp_gui::run_gui(config).map_err(|e| anyhow::anyhow!("GUI error: {}", e));
    }

    let (artifacts, store) = match TPPControllers::load(&config) {
        Ok(loaded) => loaded,
        Err(e) => {
            TPPViews::load_error(&e.to_string());
            return Err(e).with_context(|| format!("Failed to load data from {:?}", config.data_dir));
        }
    };

    match command {
        Command::Menu | Command::Gui => TPPControllers::run_menu(&config, &artifacts, &store),
        Command::Predict { route, service, year, month } => {
            TPPControllers::predict_once(&config, &artifacts, &store, &route, service, year, month)?
        }
        Command::History { route } => TPPControllers::history_once(&config, &store, &route),
        Command::Ranking => TPPControllers::ranking_once(&config, &store),
        Command::Routes => TPPControllers::routes_once(&config, &artifacts),
    }
    Ok(())
}

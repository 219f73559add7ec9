// Command line and environment configuration
use crate::tpp_models::ServiceType;
use crate::tpp_texts::Language;
use chrono::{Datelike, Utc};
use chrono_tz::Europe::Paris;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tpp", version, about = "TGV punctuality predictor")]
pub struct Cli {
    /// Directory holding data_ml.csv and the exported model artifacts
    #[arg(long, env = "TPP_DATA_DIR", default_value = "data/processed")]
    pub data_dir: PathBuf,

    #[arg(long, env = "TPP_LANG", value_enum, default_value = "en")]
    pub lang: Language,

    /// Years offered for prediction
    #[arg(long, value_delimiter = ',', default_value = "2024,2025,2026")]
    pub years: Vec<i32>,

    /// Number of routes in each ranking list
    #[arg(long, default_value_t = 10)]
    pub ranking_size: usize,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive terminal menu (default)
    Menu,
    /// Graphical dashboard
    Gui,
    /// Predict punctuality for one route and month
    Predict {
        route: String,
        #[arg(long, default_value = "National")]
        service: ServiceType,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Historical punctuality of one route
    History { route: String },
    /// Most and least punctual routes
    Ranking,
    /// Routes known to the model
    Routes,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub lang: Language,
    pub years: Vec<i32>,
    pub ranking_size: usize,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut years = cli.years.clone();
        years.sort_unstable();
        years.dedup();
        if years.is_empty() {
            years = vec![2024, 2025, 2026];
        }
        AppConfig {
            data_dir: cli.data_dir.clone(),
            lang: cli.lang,
            years,
            ranking_size: cli.ranking_size.max(1),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(crate::tpp_models::HistoricalStore::DATA_FILE)
    }

    /// Current year and month in Paris, with the year clamped to the offered
    /// range.
    pub fn default_period(&self) -> (i32, u32) {
        let now = Utc::now().with_timezone(&Paris);
        (self.nearest_year(now.year()), now.month())
    }

    /// Offered year closest to `year`; ties go to the earlier one.
    pub fn nearest_year(&self, year: i32) -> i32 {
        self.years
            .iter()
            .copied()
            .min_by_key(|offered| ((offered - year).abs(), *offered))
            .unwrap_or(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_predict_subcommand() {
        let cli = Cli::try_parse_from([
            "tpp",
            "--data-dir",
            "/tmp/tpp",
            "predict",
            "Paris-Lyon",
            "--service",
            "international",
            "--month",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/tpp"));
        match cli.command {
            Some(Command::Predict { route, service, year, month }) => {
                assert_eq!(route, "Paris-Lyon");
                assert_eq!(service, ServiceType::International);
                assert_eq!(year, None);
                assert_eq!(month, Some(7));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn normalizes_years_and_picks_nearest_offered() {
        let cli = Cli::try_parse_from(["tpp", "--years", "2026,2024,2026", "--lang", "fr"]).unwrap();
        let config = AppConfig::from_cli(&cli);
        assert_eq!(config.years, vec![2024, 2026]);
        assert_eq!(config.lang, Language::Fr);
        assert_eq!(config.nearest_year(2019), 2024);
        assert_eq!(config.nearest_year(2030), 2026);
        assert_eq!(config.nearest_year(2025), 2024);
        let (_, month) = config.default_period();
        assert!((1..=12).contains(&month));
    }

    #[test]
    fn default_year_is_always_one_of_the_offered_years() {
        let cli = Cli::try_parse_from(["tpp", "--years", "2020,2030"]).unwrap();
        let config = AppConfig::from_cli(&cli);
        assert_eq!(config.nearest_year(2026), 2030);
        assert_eq!(config.nearest_year(2024), 2020);
        let (year, _) = config.default_period();
        assert!(config.years.contains(&year));
    }
}

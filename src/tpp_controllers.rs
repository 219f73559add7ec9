// Controllers for the TGV punctuality predictor terminal front-end
use crate::tpp_config::AppConfig;
use crate::tpp_models::{HistoricalStore, PredictionRequest, Result, ServiceType};
use crate::tpp_predictor::{ModelArtifacts, PredictionPipeline};
use crate::tpp_texts::{text, Language};
use crate::tpp_views::{SelectionSummary, TPPViews};
use anyhow::Context;
use std::io::{self, Write};

/// What the user picked in the interactive menu.
#[derive(Debug, Clone)]
pub struct Selection {
    pub route: Option<String>,
    pub service: ServiceType,
    pub year: i32,
    pub month: u32,
}

impl Selection {
    pub fn new(config: &AppConfig) -> Self {
        let (year, month) = config.default_period();
        Selection {
            route: None,
            service: ServiceType::National,
            year,
            month,
        }
    }

    pub fn to_request(&self) -> Option<PredictionRequest> {
        self.route.as_ref().map(|route| PredictionRequest {
            route: route.clone(),
            service: self.service,
            year: self.year,
            month: self.month,
        })
    }
}

pub struct TPPControllers;

impl TPPControllers {
    /// Loads the model artifacts and the historical table once.
    pub fn load(config: &AppConfig) -> Result<(ModelArtifacts, HistoricalStore)> {
        log::info!("Loading artifacts from {:?}", config.data_dir);
        let artifacts = ModelArtifacts::load(&config.data_dir)?;
        let store = HistoricalStore::load(&config.history_path())?;

        log::info!("{} routes in the historical table", store.routes().len());

        let missing = artifacts
            .known_routes()
            .iter()
            .filter(|route| !store.has_route(route))
            .count();
        if missing > 0 {
            log::warn!(
                "{} known routes have no historical rows; predictions for them use network-wide averages",
                missing
            );
        }
        Ok((artifacts, store))
    }

    /// Main application loop
    pub fn run_menu(config: &AppConfig, artifacts: &ModelArtifacts, store: &HistoricalStore) {
        let pipeline = PredictionPipeline::new(artifacts, store);
        let mut lang = config.lang;
        let mut selection = Selection::new(config);

        TPPViews::show_welcome(lang, artifacts.info(), pipeline.known_routes().len(), store.len());

        loop {
            TPPViews::show_menu(
                lang,
                &SelectionSummary {
                    route: selection.route.as_deref(),
                    service: selection.service.as_str(),
                    year: selection.year,
                    month: selection.month,
                },
            );

            let choice = Self::read_input();

            match choice.trim() {
                "1" => {
                    if let Some(route) = Self::handle_route_selection(lang, pipeline.known_routes()) {
                        if let Some(service) = store.service_for_route(&route) {
                            selection.service = service;
                        }
                        selection.route = Some(route);
                    }
                    Self::pause();
                }
                "2" => {
                    Self::handle_service_selection(lang, &mut selection);
                }
                "3" => {
                    Self::handle_period_selection(lang, config, &mut selection);
                }
                "4" => {
                    Self::handle_predict(lang, &pipeline, &selection);
                    Self::pause();
                }
                "5" => {
                    match &selection.route {
                        Some(route) => Self::show_history(lang, store, route),
                        None => println!("\n⚠️  {}", text(lang, "select_route")),
                    }
                    Self::pause();
                }
                "6" => {
                    TPPViews::show_ranking(lang, &store.route_ranking(config.ranking_size), config.ranking_size);
                    Self::pause();
                }
                "7" => {
                    TPPViews::show_routes(lang, pipeline.known_routes(), artifacts.info());
                    Self::pause();
                }
                "8" => {
                    lang = lang.toggled();
                    println!("\n✓ {}", lang.display_name());
                }
                "0" => {
                    TPPViews::goodbye_message(lang);
                    break;
                }
                "" => {}
                other => {
                    println!("\n✗ Invalid option '{}'. Please select 0-8.", other);
                    Self::pause();
                }
            }
        }
    }

    /// Exact (case-insensitive) match, or the routes containing the input.
    pub fn match_route<'a>(input: &str, routes: &'a [String]) -> std::result::Result<&'a str, Vec<&'a str>> {
        let needle = input.trim().to_lowercase();
        if let Some(route) = routes.iter().find(|r| r.to_lowercase() == needle) {
            return Ok(route.as_str());
        }

        let candidates: Vec<&str> = routes
            .iter()
            .filter(|r| !needle.is_empty() && r.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect();

        if candidates.len() == 1 {
            return Ok(candidates[0]);
        }
        Err(candidates)
    }

    fn handle_route_selection(lang: Language, routes: &[String]) -> Option<String> {
        let input = TPPViews::prompt(text(lang, "select_route"));
        if input.is_empty() {
            println!("\n⚠️  No input provided");
            return None;
        }

        match Self::match_route(&input, routes) {
            Ok(route) => {
                println!("\n✓ {}", route);
                Some(route.to_string())
            }
            Err(suggestions) => {
                let shown: Vec<&str> = suggestions.into_iter().take(8).collect();
                TPPViews::show_route_suggestions(&input, &shown);
                None
            }
        }
    }

    fn handle_service_selection(lang: Language, selection: &mut Selection) {
        let input = TPPViews::prompt(&format!("{} (National / International)", text(lang, "service_type")));
        match input.parse::<ServiceType>() {
            Ok(service) => selection.service = service,
            Err(e) => println!("\n✗ {}", e),
        }
    }

    fn handle_period_selection(lang: Language, config: &AppConfig, selection: &mut Selection) {
        let offered: Vec<String> = config.years.iter().map(i32::to_string).collect();
        let year_input = TPPViews::prompt(&format!("{} ({})", text(lang, "year"), offered.join(", ")));
        if !year_input.is_empty() {
            match year_input.parse::<i32>() {
                Ok(year) if config.years.contains(&year) => selection.year = year,
                _ => println!("\n✗ Invalid year '{}'", year_input),
            }
        }

        let month_input = TPPViews::prompt(&format!("{} (1-12)", text(lang, "month")));
        if !month_input.is_empty() {
            match month_input.parse::<u32>() {
                Ok(month) if (1..=12).contains(&month) => selection.month = month,
                _ => println!("\n✗ Invalid month '{}'", month_input),
            }
        }
    }

    fn handle_predict(lang: Language, pipeline: &PredictionPipeline, selection: &Selection) {
        let Some(request) = selection.to_request() else {
            println!("\n⚠️  {}", text(lang, "select_route"));
            return;
        };

        match pipeline.predict(&request) {
            Ok(result) => TPPViews::show_prediction(lang, &request, &result),
            Err(e) => {
                log::warn!("Prediction failed for {}: {}", request.route, e);
                TPPViews::prediction_error(lang, &e);
            }
        }
    }

    fn show_history(lang: Language, store: &HistoricalStore, route: &str) {
        let trend = store.monthly_trend(route);
        let profile = store.seasonal_profile(route);
        TPPViews::show_history(lang, route, &trend, &profile);
    }

    // ------------------------------------------------------------------------
    // One-shot commands
    // ------------------------------------------------------------------------

    pub fn predict_once(
        config: &AppConfig,
        artifacts: &ModelArtifacts,
        store: &HistoricalStore,
        route: &str,
        service: ServiceType,
        year: Option<i32>,
        month: Option<u32>,
    ) -> anyhow::Result<()> {
        let pipeline = PredictionPipeline::new(artifacts, store);
        let (default_year, default_month) = config.default_period();

        // Unmatched names go through unchanged so the encoder reports them.
        let route = Self::match_route(route, pipeline.known_routes()).unwrap_or(route);
        let request = PredictionRequest {
            route: route.to_string(),
            service,
            year: year.unwrap_or(default_year),
            month: month.unwrap_or(default_month),
        };

        let result = pipeline
            .predict(&request)
            .with_context(|| format!("{} ({})", text(config.lang, "error"), request.route))?;
        TPPViews::show_prediction(config.lang, &request, &result);
        Ok(())
    }

    pub fn history_once(config: &AppConfig, store: &HistoricalStore, route: &str) {
        Self::show_history(config.lang, store, &Self::history_route(store, route));
    }

    /// Canonical route name in the historical table, or the input unchanged.
    fn history_route(store: &HistoricalStore, input: &str) -> String {
        let routes = store.routes();
        Self::match_route(input, &routes).unwrap_or(input).to_string()
    }

    pub fn ranking_once(config: &AppConfig, store: &HistoricalStore) {
        TPPViews::show_ranking(config.lang, &store.route_ranking(config.ranking_size), config.ranking_size);
    }

    pub fn routes_once(config: &AppConfig, artifacts: &ModelArtifacts) {
        TPPViews::show_routes(config.lang, artifacts.known_routes(), artifacts.info());
    }

    /// Simple pause - wait for Enter key
    fn pause() {
        print!("\n📌 Press Enter to continue...");
        let _ = io::stdout().flush();
        let mut dummy = String::new();
        let _ = io::stdin().read_line(&mut dummy);
    }

    fn read_input() -> String {
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return "0".to_string();
        }
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> Vec<String> {
        vec![
            "Paris-Lyon".to_string(),
            "Paris-Marseille".to_string(),
            "Lyon-Marseille".to_string(),
        ]
    }

    #[test]
    fn matches_route_exactly_ignoring_case() {
        let routes = routes();
        assert_eq!(TPPControllers::match_route("paris-lyon", &routes), Ok("Paris-Lyon"));
        assert_eq!(TPPControllers::match_route("  Lyon-Marseille ", &routes), Ok("Lyon-Marseille"));
    }

    #[test]
    fn single_partial_match_is_accepted() {
        let routes = routes();
        assert_eq!(TPPControllers::match_route("paris-mar", &routes), Ok("Paris-Marseille"));
    }

    #[test]
    fn ambiguous_or_missing_input_returns_suggestions() {
        let routes = routes();
        assert_eq!(
            TPPControllers::match_route("marseille", &routes),
            Err(vec!["Paris-Marseille", "Lyon-Marseille"])
        );
        assert_eq!(TPPControllers::match_route("brest", &routes), Err(vec![]));
        assert_eq!(TPPControllers::match_route("", &routes), Err(vec![]));
    }

    fn sample_config() -> AppConfig {
        AppConfig {
            data_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/data/processed").into(),
            lang: Language::En,
            years: vec![2024, 2025, 2026],
            ranking_size: 10,
        }
    }

    #[test]
    fn loads_bundled_sample_data() {
        let config = sample_config();
        let (artifacts, store) = TPPControllers::load(&config).unwrap();
        assert_eq!(artifacts.known_routes().len(), 12);
        assert_eq!(store.routes().len(), 11);

        let pipeline = PredictionPipeline::new(&artifacts, &store);
        let request = PredictionRequest {
            route: "Paris Montparnasse-Toulouse Matabiau".to_string(),
            service: ServiceType::National,
            year: 2025,
            month: 8,
        };
        let result = pipeline.predict(&request).unwrap();
        assert!(matches!(result.source, crate::tpp_models::FeatureSource::GlobalFallback { rows: 264 }));
        assert!((0.0..=100.0).contains(&result.rate_percent));

        assert!(TPPControllers::predict_once(&config, &artifacts, &store, "paris nord-lille", ServiceType::National, None, None).is_ok());
        assert!(TPPControllers::predict_once(&config, &artifacts, &store, "Paris-Brest", ServiceType::National, None, None).is_err());
    }

    #[test]
    fn history_lookup_matches_route_names_like_predict() {
        let store = HistoricalStore::from_records(vec![crate::tpp_models::tests::record(
            "Paris Nord-Lille",
            2024,
            1,
            62.0,
            700.0,
            0.9,
        )]);
        assert_eq!(TPPControllers::history_route(&store, "paris nord-lille"), "Paris Nord-Lille");
        assert_eq!(TPPControllers::history_route(&store, "Paris-Brest"), "Paris-Brest");
        assert!(!store.monthly_trend(&TPPControllers::history_route(&store, "paris nord-lille")).is_empty());
    }

    #[test]
    fn selection_needs_a_route_to_build_a_request() {
        let config = sample_config();
        let mut selection = Selection::new(&config);
        assert!(selection.to_request().is_none());
        assert!(config.years.contains(&selection.year));

        selection.route = Some("Paris-Lyon".to_string());
        selection.service = ServiceType::International;
        let request = selection.to_request().unwrap();
        assert_eq!(request.route, "Paris-Lyon");
        assert_eq!(request.service, ServiceType::International);
    }
}

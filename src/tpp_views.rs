// Terminal views for the TGV punctuality predictor
use crate::tpp_models::{
    Category, FeatureSource, MonthAverage, MonthlyPoint, PredictionRequest, PredictionResult, RouteRanking,
    RouteRate, TPPError,
};
use crate::tpp_predictor::ModelInfo;
use crate::tpp_texts::{category_text, month_name, ranking_title, text, Language};
use std::io::{self, Write};

/// Current selection shown in the menu header.
pub struct SelectionSummary<'a> {
    pub route: Option<&'a str>,
    pub service: &'a str,
    pub year: i32,
    pub month: u32,
}

pub struct TPPViews;

impl TPPViews {
    const BAR_LENGTH: usize = 40;

    pub fn show_welcome(lang: Language, info: &ModelInfo, route_count: usize, record_count: usize) {
        println!("\n{}", "═".repeat(70));
        println!("  {}", text(lang, "title"));
        println!("  {}", text(lang, "subtitle"));
        println!("{}", "═".repeat(70));
        println!("\n  📡 {} routes, {} historical records", route_count, record_count);
        if let Some(summary) = Self::model_summary(info) {
            println!("  🧠 {}", summary);
        }
        println!("\n{}", "═".repeat(70));
    }

    /// Show main menu with the current selection
    pub fn show_menu(lang: Language, selection: &SelectionSummary) {
        println!("\n{}", "═".repeat(60));
        println!("     {}", text(lang, "title"));
        println!("{}", "═".repeat(60));
        println!(
            "  🚄 {}: {}",
            text(lang, "select_route"),
            selection.route.unwrap_or("-")
        );
        println!("  🏷️  {}: {}", text(lang, "service_type"), selection.service);
        println!(
            "  📅 {}: {}  {}: {}",
            text(lang, "year"),
            selection.year,
            text(lang, "month"),
            month_name(lang, selection.month)
        );
        println!("\n📋 MENU");
        println!("  1️⃣  {}", text(lang, "select_route"));
        println!("  2️⃣  {}", text(lang, "service_type"));
        println!("  3️⃣  {} / {}", text(lang, "year"), text(lang, "month"));
        println!("  4️⃣  {} 🔮", text(lang, "predict_btn"));
        println!("  5️⃣  {} 📊", text(lang, "historical"));
        println!("  6️⃣  {} 📈", text(lang, "comparison"));
        println!("  7️⃣  {}", text(lang, "routes"));
        println!("  8️⃣  {}", text(lang, "language"));
        println!("  0️⃣  Quit");
        println!("\n{}", "─".repeat(60));
        print!("➜ ");
        let _ = io::stdout().flush();
    }

    pub fn prompt(label: &str) -> String {
        print!("\n{}: ", label);
        let _ = io::stdout().flush();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return String::new();
        }
        input.trim().to_string()
    }

    pub fn show_routes(lang: Language, routes: &[String], info: &ModelInfo) {
        println!("\n{}", "═".repeat(60));
        println!("🚄 {} ({})", text(lang, "routes").to_uppercase(), routes.len());
        println!("{}", "═".repeat(60));
        for (i, route) in routes.iter().enumerate() {
            println!("  {:>3}. {}", i + 1, route);
        }
        if let Some(summary) = Self::model_summary(info) {
            println!("\n  🧠 {}", summary);
        }
        println!("{}", "═".repeat(60));
    }

    pub fn show_route_suggestions(input: &str, suggestions: &[&str]) {
        println!("\n{}", "─".repeat(60));
        println!("✗ Route '{}' not found", input);
        if !suggestions.is_empty() {
            println!("\n💡 Did you mean one of these routes?");
            for route in suggestions {
                println!("  • {}", route);
            }
        }
        println!("{}", "─".repeat(60));
    }

    pub fn show_prediction(lang: Language, request: &PredictionRequest, result: &PredictionResult) {
        println!("\n{}", "═".repeat(60));
        println!("🔮 {}", text(lang, "result").to_uppercase());
        println!(
            "   {} · {} · {} {}",
            request.route,
            request.service,
            month_name(lang, request.month),
            request.year
        );
        println!("{}", "═".repeat(60));
        println!("  {}: {}", text(lang, "predicted_rate"), Self::format_percent(result.rate_percent));
        println!("  {}: {:.0} min", text(lang, "avg_duration"), result.avg_duration);
        println!("  {}: {:.0}", text(lang, "trains_month"), result.avg_trains_per_month);
        println!(
            "\n  {} {}",
            Self::gauge_marker(result.rate_percent),
            Self::bar(result.rate_percent / 100.0)
        );
        println!("\n  {}", category_text(lang, result.category));
        match result.source {
            FeatureSource::Route { rows } => println!("  📊 {}: {}", text(lang, "history_rows"), rows),
            FeatureSource::GlobalFallback { rows } => {
                println!("  ℹ️  {} ({} {})", text(lang, "fallback"), rows, text(lang, "rows"))
            }
        }
        println!("{}", "═".repeat(60));
    }

    pub fn show_history(lang: Language, route: &str, trend: &[MonthlyPoint], profile: &[MonthAverage]) {
        println!("\n{}", "═".repeat(70));
        println!("📊 {} - {}", text(lang, "historical"), route);
        println!("{}", "═".repeat(70));

        if trend.is_empty() {
            println!("\nℹ️  {}", text(lang, "no_history"));
            println!("{}", "═".repeat(70));
            return;
        }

        println!("\n  {}", text(lang, "monthly_trend"));
        println!("{}", "─".repeat(70));
        for point in trend {
            println!(
                "  {}  {} {}",
                point.date.format("%Y-%m"),
                Self::bar(point.punctuality_rate),
                Self::format_percent(point.punctuality_rate * 100.0)
            );
        }

        println!("\n  {}", text(lang, "by_month"));
        println!("{}", "─".repeat(70));
        for average in profile {
            println!(
                "  {:<4} {} {}",
                month_name(lang, average.month),
                Self::bar(average.punctuality_rate),
                Self::format_percent(average.punctuality_rate * 100.0)
            );
        }
        println!("{}", "═".repeat(70));
    }

    pub fn show_ranking(lang: Language, ranking: &RouteRanking, size: usize) {
        println!("\n{}", "═".repeat(70));
        println!("📈 {}", text(lang, "comparison"));
        println!("{}", "═".repeat(70));

        println!("\n  🟢 {}", ranking_title(lang, "top_routes", size));
        println!("{}", "─".repeat(70));
        Self::display_route_rates(&ranking.top);

        println!("\n  🔴 {}", ranking_title(lang, "bottom_routes", size));
        println!("{}", "─".repeat(70));
        Self::display_route_rates(&ranking.bottom);
        println!("{}", "═".repeat(70));
    }

    fn display_route_rates(rates: &[RouteRate]) {
        let width = rates.iter().map(|r| r.route.chars().count()).max().unwrap_or(0);
        for rate in rates {
            let padding = width.saturating_sub(rate.route.chars().count());
            println!(
                "  {}{}  {} {}",
                rate.route,
                " ".repeat(padding),
                Self::bar(rate.punctuality_rate),
                Self::format_percent(rate.punctuality_rate * 100.0)
            );
        }
    }

    pub fn prediction_error(lang: Language, error: &TPPError) {
        println!("\n{}", "─".repeat(60));
        println!("❌ {}", text(lang, "error"));
        println!("   {}", error);
        if let TPPError::UnknownCategory { .. } = error {
            println!("\n💡 Use option 7 to list the routes known to the model");
        }
        println!("{}", "─".repeat(60));
    }

    pub fn load_error(error: &str) {
        println!("\n{}", "═".repeat(60));
        println!("❌ LOADING ERROR");
        println!("{}", "═".repeat(60));
        println!("\n{}", error);
        println!("\n💡 Troubleshooting:");
        println!("  • Check --data-dir (or TPP_DATA_DIR) points to the exported artifacts");
        println!("  • Expected files: data_ml.csv, model.json, le_liaison.json, le_service.json, model_info.json");
        println!("\n{}", "═".repeat(60));
    }

    pub fn goodbye_message(lang: Language) {
        println!("\n{}", "═".repeat(60));
        println!("       👋 {}", text(lang, "title"));
        println!("       {}", text(lang, "footer"));
        println!("{}", "═".repeat(60));
        println!();
    }

    pub fn format_percent(rate_percent: f64) -> String {
        format!("{:.1}%", rate_percent)
    }

    /// Horizontal bar for a fraction in [0, 1].
    pub fn bar(fraction: f64) -> String {
        let filled = ((fraction.clamp(0.0, 1.0) * Self::BAR_LENGTH as f64).round() as usize).min(Self::BAR_LENGTH);
        "█".repeat(filled) + &"░".repeat(Self::BAR_LENGTH - filled)
    }

    /// Gauge colour band: green from 80%, orange from 70%, red below.
    pub fn gauge_marker(rate_percent: f64) -> &'static str {
        match Category::from_rate(rate_percent) {
            Category::Excellent | Category::Good => "🟢",
            Category::Average => "🟠",
            Category::Poor => "🔴",
        }
    }

    pub fn model_summary(info: &ModelInfo) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(model_type) = &info.model_type {
            parts.push(model_type.clone());
        }
        if let Some(r2) = info.r2 {
            parts.push(format!("R² {:.3}", r2));
        }
        if let Some(mae) = info.mae {
            parts.push(format!("MAE {:.3}", mae));
        }
        if parts.is_empty() { None } else { Some(parts.join(" · ")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_is_clamped_and_fixed_width() {
        assert_eq!(TPPViews::bar(0.0).chars().filter(|c| *c == '█').count(), 0);
        assert_eq!(TPPViews::bar(0.5).chars().filter(|c| *c == '█').count(), 20);
        assert_eq!(TPPViews::bar(1.7).chars().filter(|c| *c == '█').count(), 40);
        assert_eq!(TPPViews::bar(-1.0).chars().count(), 40);
    }

    #[test]
    fn formats_percent_and_gauge_band() {
        assert_eq!(TPPViews::format_percent(85.6), "85.6%");
        assert_eq!(TPPViews::gauge_marker(80.0), "🟢");
        assert_eq!(TPPViews::gauge_marker(79.9), "🟠");
        assert_eq!(TPPViews::gauge_marker(69.9), "🔴");
    }

    #[test]
    fn model_summary_lists_known_metrics() {
        assert_eq!(TPPViews::model_summary(&ModelInfo::default()), None);
        let info = ModelInfo {
            model_type: Some("RandomForestRegressor".into()),
            r2: Some(0.6234),
            ..ModelInfo::default()
        };
        assert_eq!(
            TPPViews::model_summary(&info).as_deref(),
            Some("RandomForestRegressor · R² 0.623")
        );
    }
}

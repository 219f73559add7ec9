// Localized text tables (English / French)
use crate::tpp_models::Category;
use clap::ValueEnum;
use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Language {
    En,
    Fr,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Fr];

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "Français",
        }
    }

    pub fn toggled(&self) -> Language {
        match self {
            Language::En => Language::Fr,
            Language::Fr => Language::En,
        }
    }
}

const MONTHS_EN: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
const MONTHS_FR: [&str; 12] = ["Jan", "Fév", "Mar", "Avr", "Mai", "Jun", "Jul", "Aoû", "Sep", "Oct", "Nov", "Déc"];

lazy_static! {
    static ref TEXTS: HashMap<Language, HashMap<&'static str, &'static str>> = {
        let english: HashMap<&'static str, &'static str> = [
            ("title", "🚄 TGV Punctuality Predictor"),
            ("subtitle", "Predict the probability that a TGV train will be on time for a given route."),
            ("select_route", "Select a route"),
            ("service_type", "Service type"),
            ("year", "Year"),
            ("month", "Month"),
            ("predict_btn", "Predict punctuality"),
            ("result", "Result"),
            ("predicted_rate", "Predicted punctuality rate"),
            ("avg_duration", "Average duration"),
            ("trains_month", "Trains/month"),
            ("excellent", "✅ Excellent punctuality expected"),
            ("good", "ℹ️ Good punctuality expected"),
            ("average", "⚠️ Average punctuality - plan a buffer"),
            ("poor", "❌ High risk of delay"),
            ("history_rows", "Historical months used"),
            ("rows", "rows"),
            ("fallback", "No history for this route: network-wide averages used"),
            ("footer", "Data: SNCF Open Data | Model: Random Forest"),
            ("historical", "Historical Punctuality"),
            ("monthly_trend", "Monthly Trend"),
            ("by_month", "Punctuality by Month"),
            ("comparison", "Route Comparison"),
            ("top_routes", "Top {n} Most Punctual Routes"),
            ("bottom_routes", "Top {n} Least Punctual Routes"),
            ("no_history", "No historical data available for this route."),
            ("routes", "Available routes"),
            ("language", "🌐 Language / Langue"),
            ("error", "Prediction failed"),
            ("loading", "Loading model and historical data"),
        ]
        .into_iter()
        .collect();

        let french: HashMap<&'static str, &'static str> = [
            ("title", "🚄 Prédicteur de Régularité TGV"),
            ("subtitle", "Prédisez la probabilité qu'un TGV soit à l'heure sur une liaison donnée."),
            ("select_route", "Choisissez une liaison"),
            ("service_type", "Type de service"),
            ("year", "Année"),
            ("month", "Mois"),
            ("predict_btn", "Prédire la régularité"),
            ("result", "Résultat"),
            ("predicted_rate", "Taux de régularité prédit"),
            ("avg_duration", "Durée moyenne"),
            ("trains_month", "Trains/mois"),
            ("excellent", "✅ Excellente ponctualité attendue"),
            ("good", "ℹ️ Bonne ponctualité attendue"),
            ("average", "⚠️ Ponctualité moyenne - prévoyez une marge"),
            ("poor", "❌ Risque élevé de retard"),
            ("history_rows", "Mois d'historique utilisés"),
            ("rows", "lignes"),
            ("fallback", "Pas d'historique pour cette liaison : moyennes du réseau utilisées"),
            ("footer", "Données : SNCF Open Data | Modèle : Random Forest"),
            ("historical", "Historique de ponctualité"),
            ("monthly_trend", "Tendance mensuelle"),
            ("by_month", "Ponctualité par mois"),
            ("comparison", "Comparaison des liaisons"),
            ("top_routes", "Top {n} liaisons les plus ponctuelles"),
            ("bottom_routes", "Top {n} liaisons les moins ponctuelles"),
            ("no_history", "Pas de données historiques disponibles pour cette liaison."),
            ("routes", "Liaisons disponibles"),
            ("language", "🌐 Language / Langue"),
            ("error", "Échec de la prédiction"),
            ("loading", "Chargement du modèle et de l'historique"),
        ]
        .into_iter()
        .collect();

        let mut texts = HashMap::new();
        texts.insert(Language::En, english);
        texts.insert(Language::Fr, french);
        texts
    };
}

/// Looks up a text; unknown keys come back unchanged.
pub fn text(lang: Language, key: &'static str) -> &'static str {
    TEXTS
        .get(&lang)
        .and_then(|table| table.get(key))
        .copied()
        .unwrap_or(key)
}

/// Ranking heading with the list size filled in.
pub fn ranking_title(lang: Language, key: &'static str, count: usize) -> String {
    text(lang, key).replace("{n}", &count.to_string())
}

pub fn category_text(lang: Language, category: Category) -> &'static str {
    text(lang, category.text_key())
}

/// Short month name, `month` in 1..=12.
pub fn month_name(lang: Language, month: u32) -> &'static str {
    let names = match lang {
        Language::En => &MONTHS_EN,
        Language::Fr => &MONTHS_FR,
    };
    month
        .checked_sub(1)
        .and_then(|i| names.get(i as usize))
        .copied()
        .unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_languages_define_the_same_keys() {
        let english = &TEXTS[&Language::En];
        let french = &TEXTS[&Language::Fr];
        assert_eq!(english.len(), french.len());
        for key in english.keys() {
            assert!(french.contains_key(key), "missing French text for {}", key);
        }
    }

    #[test]
    fn looks_up_texts_and_months() {
        assert_eq!(text(Language::Fr, "year"), "Année");
        assert_eq!(text(Language::En, "no_such_key"), "no_such_key");
        assert_eq!(category_text(Language::En, Category::Poor), "❌ High risk of delay");
        assert_eq!(month_name(Language::Fr, 2), "Fév");
        assert_eq!(month_name(Language::En, 12), "Dec");
        assert_eq!(month_name(Language::En, 0), "?");
        assert_eq!(month_name(Language::En, 13), "?");
    }

    #[test]
    fn ranking_titles_follow_the_configured_size() {
        assert_eq!(ranking_title(Language::En, "top_routes", 5), "Top 5 Most Punctual Routes");
        assert_eq!(
            ranking_title(Language::Fr, "bottom_routes", 20),
            "Top 20 liaisons les moins ponctuelles"
        );
    }
}

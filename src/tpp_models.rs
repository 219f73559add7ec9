// Data models and historical table for the TGV punctuality predictor
// Data source: SNCF Open Data, "Régularité mensuelle TGV par liaisons"
//
// The historical table is a pre-built CSV (data_ml.csv) with one row per
// route and month. It is loaded once at startup and never mutated.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, Error)]
pub enum TPPError {
    #[error("Unknown {table} '{value}': not part of the model's training vocabulary")]
    UnknownCategory { table: String, value: String },
    #[error("No historical data available")]
    NoHistoricalData,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("File error: {0}")]
    FileError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, TPPError>;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    National,
    International,
}

impl ServiceType {
    pub const ALL: [ServiceType; 2] = [ServiceType::National, ServiceType::International];

    /// Literal used by the service encoder and the historical table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::National => "National",
            ServiceType::International => "International",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = TPPError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        ServiceType::ALL
            .into_iter()
            .find(|service| service.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| TPPError::UnknownCategory {
                table: "service type".to_string(),
                value: trimmed.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRecord {
    pub route: String,
    pub service: ServiceType,
    pub year: i32,
    pub month: u32,
    /// Average trip duration in minutes.
    pub avg_duration: f64,
    pub avg_scheduled_trains: f64,
    /// Fraction of trains on time, in [0, 1].
    pub punctuality_rate: f64,
}

/// Raw row as exported by the training notebook.
#[derive(Debug, Deserialize)]
struct CsvRow {
    liaison: String,
    #[serde(default)]
    service: Option<String>,
    annee: i32,
    mois: u32,
    #[serde(rename = "Durée moyenne du trajet")]
    duree_moyenne: f64,
    #[serde(rename = "Nombre de circulations prévues")]
    circulations_prevues: f64,
    taux_regularite: f64,
}

impl CsvRow {
    fn into_record(self) -> Result<HistoricalRecord> {
        let route = self.liaison.trim().to_string();
        if route.is_empty() {
            return Err(TPPError::ParseError("empty route name".to_string()));
        }
        if !(1..=12).contains(&self.mois) {
            return Err(TPPError::ParseError(format!("month {} out of range", self.mois)));
        }
        let numbers = [self.duree_moyenne, self.circulations_prevues, self.taux_regularite];
        if numbers.iter().any(|v| !v.is_finite()) {
            return Err(TPPError::ParseError(format!("non-numeric value for route '{}'", route)));
        }

        let service = match self.service.as_deref().map(str::trim) {
            None | Some("") => ServiceType::National,
            Some(s) => s.parse()?,
        };

        Ok(HistoricalRecord {
            route,
            service,
            year: self.annee,
            month: self.mois,
            avg_duration: self.duree_moyenne,
            avg_scheduled_trains: self.circulations_prevues,
            punctuality_rate: self.taux_regularite,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Excellent,
    Good,
    Average,
    Poor,
}

impl Category {
    const EXCELLENT_THRESHOLD: f64 = 90.0;
    const GOOD_THRESHOLD: f64 = 80.0;
    const AVERAGE_THRESHOLD: f64 = 70.0;

    /// Thresholds are checked highest first; a boundary value belongs to the
    /// higher category.
    pub fn from_rate(rate_percent: f64) -> Self {
        if rate_percent >= Self::EXCELLENT_THRESHOLD {
            Category::Excellent
        } else if rate_percent >= Self::GOOD_THRESHOLD {
            Category::Good
        } else if rate_percent >= Self::AVERAGE_THRESHOLD {
            Category::Average
        } else {
            Category::Poor
        }
    }

    /// Key into the localized text tables.
    pub fn text_key(&self) -> &'static str {
        match self {
            Category::Excellent => "excellent",
            Category::Good => "good",
            Category::Average => "average",
            Category::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub route: String,
    pub service: ServiceType,
    pub year: i32,
    pub month: u32,
}

/// Where the averaged duration and train count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    Route { rows: usize },
    GlobalFallback { rows: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub rate_percent: f64,
    pub avg_duration: f64,
    pub avg_trains_per_month: f64,
    pub category: Category,
    pub source: FeatureSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPoint {
    pub date: NaiveDate,
    pub punctuality_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthAverage {
    pub month: u32,
    pub punctuality_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRate {
    pub route: String,
    pub punctuality_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRanking {
    /// Most punctual first.
    pub top: Vec<RouteRate>,
    /// Least punctual first.
    pub bottom: Vec<RouteRate>,
}

// ============================================================================
// Historical Data Store
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct HistoricalStore {
    records: Vec<HistoricalRecord>,
}

impl HistoricalStore {
    pub const DATA_FILE: &'static str = "data_ml.csv";

    pub fn from_records(records: Vec<HistoricalRecord>) -> Self {
        HistoricalStore { records }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| TPPError::FileError(format!("Failed to open {:?}: {}", path, e)))?;
        let store = Self::from_reader(file)?;
        log::info!("Loaded {} historical records from {:?}", store.len(), path);
        Ok(store)
    }

    /// Reads the CSV table, skipping malformed rows. A table with no valid
    /// row at all is rejected.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            match result.map_err(|e| TPPError::ParseError(e.to_string())).and_then(CsvRow::into_record) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    log::warn!("Skipping historical row {}: {}", line + 2, e);
                }
            }
        }

        if records.is_empty() {
            return Err(TPPError::ParseError(format!(
                "historical table has no valid rows ({} skipped)",
                skipped
            )));
        }
        if skipped > 0 {
            log::warn!("{} malformed historical rows skipped", skipped);
        }

        Ok(HistoricalStore { records })
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records_for_route<'a>(&'a self, route: &'a str) -> impl Iterator<Item = &'a HistoricalRecord> + 'a {
        self.records.iter().filter(move |r| r.route == route)
    }

    /// Service type recorded for a route, if it has history.
    pub fn service_for_route(&self, route: &str) -> Option<ServiceType> {
        self.records_for_route(route).next().map(|r| r.service)
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.records_for_route(route).next().is_some()
    }

    /// Distinct routes present in the table, sorted.
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.records.iter().map(|r| r.route.clone()).collect();
        routes.sort();
        routes.dedup();
        routes
    }

    /// Punctuality per (year, month) for one route, oldest first. Duplicate
    /// months are averaged.
    pub fn monthly_trend(&self, route: &str) -> Vec<MonthlyPoint> {
        let mut grouped: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
        for record in self.records_for_route(route) {
            let entry = grouped.entry((record.year, record.month)).or_insert((0.0, 0));
            entry.0 += record.punctuality_rate;
            entry.1 += 1;
        }

        grouped
            .into_iter()
            .filter_map(|((year, month), (sum, count))| {
                NaiveDate::from_ymd_opt(year, month, 1).map(|date| MonthlyPoint {
                    date,
                    punctuality_rate: sum / count as f64,
                })
            })
            .collect()
    }

    /// Mean punctuality per calendar month over every year, for one route.
    pub fn seasonal_profile(&self, route: &str) -> Vec<MonthAverage> {
        let mut grouped: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for record in self.records_for_route(route) {
            let entry = grouped.entry(record.month).or_insert((0.0, 0));
            entry.0 += record.punctuality_rate;
            entry.1 += 1;
        }

        grouped
            .into_iter()
            .map(|(month, (sum, count))| MonthAverage {
                month,
                punctuality_rate: sum / count as f64,
            })
            .collect()
    }

    /// Mean punctuality per route, best `count` and worst `count`.
    ///
    /// With fewer than `2 * count` distinct routes the two lists overlap.
    pub fn route_ranking(&self, count: usize) -> RouteRanking {
        let mut grouped: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            let entry = grouped.entry(record.route.as_str()).or_insert((0.0, 0));
            entry.0 += record.punctuality_rate;
            entry.1 += 1;
        }

        let mut rates: Vec<RouteRate> = grouped
            .into_iter()
            .map(|(route, (sum, count))| RouteRate {
                route: route.to_string(),
                punctuality_rate: sum / count as f64,
            })
            .collect();

        rates.sort_by(|a, b| {
            b.punctuality_rate
                .total_cmp(&a.punctuality_rate)
                .then_with(|| a.route.cmp(&b.route))
        });
        let top: Vec<RouteRate> = rates.iter().take(count).cloned().collect();

        rates.sort_by(|a, b| {
            a.punctuality_rate
                .total_cmp(&b.punctuality_rate)
                .then_with(|| a.route.cmp(&b.route))
        });
        let bottom: Vec<RouteRate> = rates.into_iter().take(count).collect();

        RouteRanking { top, bottom }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn record(route: &str, year: i32, month: u32, duration: f64, trains: f64, rate: f64) -> HistoricalRecord {
        HistoricalRecord {
            route: route.to_string(),
            service: ServiceType::National,
            year,
            month,
            avg_duration: duration,
            avg_scheduled_trains: trains,
            punctuality_rate: rate,
        }
    }

    const CSV_HEADER: &str =
        "liaison,annee,mois,Durée moyenne du trajet,Nombre de circulations prévues,taux_regularite\n";

    #[test]
    fn classification_boundaries_belong_to_higher_category() {
        assert_eq!(Category::from_rate(100.0), Category::Excellent);
        assert_eq!(Category::from_rate(90.0), Category::Excellent);
        assert_eq!(Category::from_rate(89.999), Category::Good);
        assert_eq!(Category::from_rate(80.0), Category::Good);
        assert_eq!(Category::from_rate(79.999), Category::Average);
        assert_eq!(Category::from_rate(70.0), Category::Average);
        assert_eq!(Category::from_rate(69.999), Category::Poor);
        assert_eq!(Category::from_rate(0.0), Category::Poor);
    }

    #[test]
    fn classification_is_monotonic_over_range() {
        let rank = |c: Category| match c {
            Category::Poor => 0,
            Category::Average => 1,
            Category::Good => 2,
            Category::Excellent => 3,
        };
        let mut previous = rank(Category::from_rate(0.0));
        for step in 0..=10_000 {
            let current = rank(Category::from_rate(step as f64 / 100.0));
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn service_type_parses_case_insensitively() {
        assert_eq!("national".parse::<ServiceType>().unwrap(), ServiceType::National);
        assert_eq!(" International ".parse::<ServiceType>().unwrap(), ServiceType::International);
        assert!(matches!(
            "Regional".parse::<ServiceType>(),
            Err(TPPError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn loads_csv_without_service_column() {
        let csv = format!(
            "{}Paris-Lyon,2023,1,120,40,0.91\nParis-Lyon,2023,2,122,42,0.88\n",
            CSV_HEADER
        );
        let store = HistoricalStore::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].service, ServiceType::National);
        assert_eq!(store.records()[1].avg_duration, 122.0);
    }

    #[test]
    fn loads_csv_with_service_column_and_skips_bad_rows() {
        let csv = "liaison,service,annee,mois,Durée moyenne du trajet,Nombre de circulations prévues,taux_regularite\n\
                   Paris-Milan,International,2023,5,430,12,0.71\n\
                   Paris-Lyon,,2023,13,120,40,0.9\n\
                   Paris-Lyon,National,2023,4,abc,40,0.9\n\
                   Paris-Lyon,National,2023,4,121,41,0.9\n";
        let store = HistoricalStore::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].service, ServiceType::International);
        assert_eq!(store.routes(), vec!["Paris-Lyon".to_string(), "Paris-Milan".to_string()]);
        assert_eq!(store.service_for_route("Paris-Milan"), Some(ServiceType::International));
        assert_eq!(store.service_for_route("Paris-Brest"), None);
    }

    #[test]
    fn rejects_table_without_valid_rows() {
        let csv = format!("{}Paris-Lyon,2023,0,120,40,0.91\n", CSV_HEADER);
        assert!(matches!(
            HistoricalStore::from_reader(csv.as_bytes()),
            Err(TPPError::ParseError(_))
        ));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}Paris-Nice,2024,7,340,20,0.65\n", CSV_HEADER).unwrap();
        let store = HistoricalStore::load(file.path()).unwrap();
        assert!(store.has_route("Paris-Nice"));
        assert!(!store.has_route("Paris-Lyon"));

        let missing = HistoricalStore::load(Path::new("/nonexistent/data_ml.csv"));
        assert!(matches!(missing, Err(TPPError::FileError(_))));
    }

    #[test]
    fn monthly_trend_is_sorted_by_date() {
        let store = HistoricalStore::from_records(vec![
            record("Paris-Lyon", 2024, 2, 120.0, 40.0, 0.80),
            record("Paris-Lyon", 2023, 11, 120.0, 40.0, 0.70),
            record("Paris-Nice", 2023, 1, 340.0, 20.0, 0.50),
            record("Paris-Lyon", 2024, 1, 120.0, 40.0, 0.90),
            record("Paris-Lyon", 2024, 1, 120.0, 40.0, 0.70),
        ]);

        let trend = store.monthly_trend("Paris-Lyon");
        let dates: Vec<String> = trend.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, vec!["2023-11-01", "2024-01-01", "2024-02-01"]);
        assert!((trend[1].punctuality_rate - 0.80).abs() < 1e-12);
        assert!(store.monthly_trend("Paris-Brest").is_empty());
    }

    #[test]
    fn seasonal_profile_averages_across_years() {
        let store = HistoricalStore::from_records(vec![
            record("Paris-Lyon", 2023, 3, 120.0, 40.0, 0.80),
            record("Paris-Lyon", 2024, 3, 120.0, 40.0, 0.90),
            record("Paris-Lyon", 2024, 1, 120.0, 40.0, 0.60),
        ]);
        let profile = store.seasonal_profile("Paris-Lyon");
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].month, 1);
        assert_eq!(profile[1].month, 3);
        assert!((profile[1].punctuality_rate - 0.85).abs() < 1e-12);
    }

    #[test]
    fn ranking_is_sorted_and_disjoint_with_enough_routes() {
        let records: Vec<HistoricalRecord> = (0..25)
            .map(|i| record(&format!("Route-{:02}", i), 2024, 1, 100.0, 10.0, i as f64 / 25.0))
            .collect();
        let ranking = HistoricalStore::from_records(records).route_ranking(10);

        assert_eq!(ranking.top.len(), 10);
        assert_eq!(ranking.bottom.len(), 10);
        assert!(ranking.top.windows(2).all(|w| w[0].punctuality_rate >= w[1].punctuality_rate));
        assert!(ranking.bottom.windows(2).all(|w| w[0].punctuality_rate <= w[1].punctuality_rate));
        assert_eq!(ranking.top[0].route, "Route-24");
        assert_eq!(ranking.bottom[0].route, "Route-00");
        assert!(ranking.top.iter().all(|t| ranking.bottom.iter().all(|b| b.route != t.route)));
    }

    #[test]
    fn ranking_overlaps_with_few_routes() {
        let store = HistoricalStore::from_records(vec![
            record("A", 2024, 1, 100.0, 10.0, 0.95),
            record("B", 2024, 1, 100.0, 10.0, 0.40),
            record("C", 2024, 1, 100.0, 10.0, 0.99),
            record("C", 2024, 2, 100.0, 10.0, 0.97),
        ]);
        let ranking = store.route_ranking(10);

        let top: Vec<&str> = ranking.top.iter().map(|r| r.route.as_str()).collect();
        let bottom: Vec<&str> = ranking.bottom.iter().map(|r| r.route.as_str()).collect();
        assert_eq!(top, vec!["C", "A", "B"]);
        assert_eq!(bottom, vec!["B", "A", "C"]);
        assert!((ranking.top[0].punctuality_rate - 0.98).abs() < 1e-12);
    }
}

// Prediction pipeline: label encoders, model artifact, feature resolution
//
// Artifacts exported by the training notebook (all JSON, under the data dir):
// - model.json       regression forest, one node list per tree
// - le_liaison.json  route label encoder classes
// - le_service.json  service type label encoder classes
// - model_info.json  known routes, feature order, training metrics

use crate::tpp_models::{
    Category, FeatureSource, HistoricalRecord, HistoricalStore, PredictionRequest, PredictionResult,
    Result, TPPError,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// Feature Vector
// ============================================================================

pub const FEATURE_COUNT: usize = 6;

/// Model inputs. Discriminants are the column positions the model was
/// trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    RouteCode = 0,
    ServiceCode = 1,
    Year = 2,
    Month = 3,
    AvgDuration = 4,
    AvgScheduledTrains = 5,
}

pub const FEATURE_ORDER: [Feature; FEATURE_COUNT] = [
    Feature::RouteCode,
    Feature::ServiceCode,
    Feature::Year,
    Feature::Month,
    Feature::AvgDuration,
    Feature::AvgScheduledTrains,
];

impl Feature {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name in the training data frame.
    pub fn column_name(self) -> &'static str {
        match self {
            Feature::RouteCode => "liaison_encoded",
            Feature::ServiceCode => "service_encoded",
            Feature::Year => "annee",
            Feature::Month => "mois",
            Feature::AvgDuration => "Durée moyenne du trajet",
            Feature::AvgScheduledTrains => "Nombre de circulations prévues",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn assemble(route_code: usize, service_code: usize, year: i32, month: u32, averages: &RouteAverages) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in FEATURE_ORDER {
            values[feature.index()] = match feature {
                Feature::RouteCode => route_code as f64,
                Feature::ServiceCode => service_code as f64,
                Feature::Year => year as f64,
                Feature::Month => month as f64,
                Feature::AvgDuration => averages.avg_duration,
                Feature::AvgScheduledTrains => averages.avg_scheduled_trains,
            };
        }
        FeatureVector { values }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

// ============================================================================
// Encoding Tables
// ============================================================================

#[derive(Debug, Deserialize)]
struct EncoderFile {
    classes: Vec<String>,
}

/// Label encoder: class string <-> index in the trained `classes` list.
#[derive(Debug, Clone)]
pub struct EncodingTable {
    name: String,
    classes: Vec<String>,
    codes: HashMap<String, usize>,
}

impl EncodingTable {
    pub fn from_classes(name: &str, classes: Vec<String>) -> Result<Self> {
        let mut codes = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), code).is_some() {
                return Err(TPPError::ParseError(format!(
                    "duplicate class '{}' in {} encoder",
                    class, name
                )));
            }
        }
        Ok(EncodingTable {
            name: name.to_string(),
            classes,
            codes,
        })
    }

    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TPPError::FileError(format!("Failed to read {:?}: {}", path, e)))?;
        let file: EncoderFile = serde_json::from_str(&contents)
            .map_err(|e| TPPError::ParseError(format!("Invalid {} encoder {:?}: {}", name, path, e)))?;
        Self::from_classes(name, file.classes)
    }

    pub fn encode(&self, value: &str) -> Result<usize> {
        self.codes.get(value).copied().ok_or_else(|| TPPError::UnknownCategory {
            table: self.name.clone(),
            value: value.to_string(),
        })
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes.get(code).map(String::as_str).ok_or_else(|| TPPError::UnknownCategory {
            table: self.name.clone(),
            value: format!("code {}", code),
        })
    }

    pub fn contains(&self, value: &str) -> bool {
        self.codes.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

// ============================================================================
// Model Artifact
// ============================================================================

/// Pre-trained punctuality regressor. Output is the predicted on-time
/// fraction, nominally in [0, 1].
pub trait PunctualityModel: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<f64>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, tree_index: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(TPPError::InvalidModel(format!("tree {} has no nodes", tree_index)));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { feature, threshold, left, right } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(TPPError::InvalidModel(format!(
                            "tree {} node {} splits on feature {} (model has {})",
                            tree_index, i, feature, FEATURE_COUNT
                        )));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(TPPError::InvalidModel(format!(
                            "tree {} node {} has a child out of range",
                            tree_index, i
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(TPPError::InvalidModel(format!(
                            "tree {} node {} has a NaN threshold",
                            tree_index, i
                        )));
                    }
                }
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(TPPError::InvalidModel(format!(
                        "tree {} leaf {} is not finite",
                        tree_index, i
                    )));
                }
                TreeNode::Leaf { .. } => {}
            }
        }
        Ok(())
    }

    /// Walks from the root; `x[feature] <= threshold` goes left.
    fn evaluate(&self, features: &FeatureVector) -> Result<f64> {
        let mut index = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    let Some(&x) = features.as_slice().get(*feature) else {
                        return Err(TPPError::InvalidModel(format!(
                            "split on feature {} (model has {})",
                            feature, FEATURE_COUNT
                        )));
                    };
                    index = if x <= *threshold { *left } else { *right };
                }
                None => break,
            }
        }
        Err(TPPError::InvalidModel("tree walk did not reach a leaf".to_string()))
    }
}

/// Regression forest exported from the training run. The prediction is the
/// mean of the tree outputs.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<DecisionTree>,
}

impl ForestModel {
    pub fn from_json(json: &str) -> Result<Self> {
        let model: ForestModel = serde_json::from_str(json)
            .map_err(|e| TPPError::ParseError(format!("Invalid model JSON: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TPPError::FileError(format!("Failed to read {:?}: {}", path, e)))?;
        let model = Self::from_json(&contents)?;
        log::info!("Loaded forest with {} trees from {:?}", model.trees.len(), path);
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(TPPError::InvalidModel("forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i)?;
        }
        Ok(())
    }
}

impl PunctualityModel for ForestModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.evaluate(features)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

/// Training metadata saved next to the model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInfo {
    pub liaisons: Vec<String>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub r2: Option<f64>,
    #[serde(default)]
    pub mae: Option<f64>,
}

impl ModelInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TPPError::FileError(format!("Failed to read {:?}: {}", path, e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| TPPError::ParseError(format!("Invalid model info {:?}: {}", path, e)))
    }

    fn check_feature_order(&self) -> Result<()> {
        let Some(features) = &self.features else {
            return Ok(());
        };
        let expected: Vec<&str> = FEATURE_ORDER.iter().map(|f| f.column_name()).collect();
        if features.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(TPPError::InvalidModel(format!(
                "model was trained on features {:?}, expected {:?}",
                features, expected
            )));
        }
        Ok(())
    }
}

/// Everything produced by the training run, loaded once and shared
/// read-only.
pub struct ModelArtifacts {
    model: Box<dyn PunctualityModel>,
    route_encoder: EncodingTable,
    service_encoder: EncodingTable,
    info: ModelInfo,
    known_routes: Vec<String>,
}

impl ModelArtifacts {
    pub const MODEL_FILE: &'static str = "model.json";
    pub const ROUTE_ENCODER_FILE: &'static str = "le_liaison.json";
    pub const SERVICE_ENCODER_FILE: &'static str = "le_service.json";
    pub const MODEL_INFO_FILE: &'static str = "model_info.json";

    pub fn new(
        model: Box<dyn PunctualityModel>,
        route_encoder: EncodingTable,
        service_encoder: EncodingTable,
        info: ModelInfo,
    ) -> Result<Self> {
        info.check_feature_order()?;

        // Only routes the encoder can handle are offered for selection.
        let mut known_routes: Vec<String> = Vec::with_capacity(info.liaisons.len());
        for route in &info.liaisons {
            if route_encoder.contains(route) {
                known_routes.push(route.clone());
            } else {
                log::warn!("Route '{}' listed in model info but unknown to the route encoder, ignoring", route);
            }
        }
        known_routes.sort();
        known_routes.dedup();

        Ok(ModelArtifacts {
            model,
            route_encoder,
            service_encoder,
            info,
            known_routes,
        })
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let model = ForestModel::load(&dir.join(Self::MODEL_FILE))?;
        let route_encoder = EncodingTable::load("route", &dir.join(Self::ROUTE_ENCODER_FILE))?;
        let service_encoder = EncodingTable::load("service type", &dir.join(Self::SERVICE_ENCODER_FILE))?;
        let info = ModelInfo::load(&dir.join(Self::MODEL_INFO_FILE))?;
        log::info!(
            "Loaded encoders: {} routes, {} service types",
            route_encoder.len(),
            service_encoder.len()
        );
        Self::new(Box::new(model), route_encoder, service_encoder, info)
    }

    pub fn model(&self) -> &dyn PunctualityModel {
        self.model.as_ref()
    }

    pub fn route_encoder(&self) -> &EncodingTable {
        &self.route_encoder
    }

    pub fn service_encoder(&self) -> &EncodingTable {
        &self.service_encoder
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// Sorted routes that can be offered to the user.
    pub fn known_routes(&self) -> &[String] {
        &self.known_routes
    }
}

// ============================================================================
// Feature Resolver
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteAverages {
    pub avg_duration: f64,
    pub avg_scheduled_trains: f64,
    pub source: FeatureSource,
}

pub struct FeatureResolver;

impl FeatureResolver {
    /// Mean duration and train count for `route`, or over the whole table
    /// when the route has no rows.
    pub fn resolve(route: &str, records: &[HistoricalRecord]) -> Result<RouteAverages> {
        let (duration_sum, trains_sum, rows) = records
            .iter()
            .filter(|r| r.route == route)
            .fold((0.0, 0.0, 0usize), |(d, t, n), r| {
                (d + r.avg_duration, t + r.avg_scheduled_trains, n + 1)
            });

        if rows > 0 {
            return Ok(RouteAverages {
                avg_duration: duration_sum / rows as f64,
                avg_scheduled_trains: trains_sum / rows as f64,
                source: FeatureSource::Route { rows },
            });
        }

        log::debug!("No historical rows for '{}', using table-wide averages", route);
        Self::resolve_global(records)
    }

    /// Mean duration and train count over every record.
    pub fn resolve_global(records: &[HistoricalRecord]) -> Result<RouteAverages> {
        if records.is_empty() {
            return Err(TPPError::NoHistoricalData);
        }
        let rows = records.len();
        let duration_sum: f64 = records.iter().map(|r| r.avg_duration).sum();
        let trains_sum: f64 = records.iter().map(|r| r.avg_scheduled_trains).sum();
        Ok(RouteAverages {
            avg_duration: duration_sum / rows as f64,
            avg_scheduled_trains: trains_sum / rows as f64,
            source: FeatureSource::GlobalFallback { rows },
        })
    }
}

// ============================================================================
// Prediction Pipeline
// ============================================================================

/// Encodes the request and resolves its averages into the model's input
/// vector.
pub fn build_features(
    request: &PredictionRequest,
    route_encoder: &EncodingTable,
    service_encoder: &EncodingTable,
    records: &[HistoricalRecord],
) -> Result<(FeatureVector, RouteAverages)> {
    if !(1..=12).contains(&request.month) {
        return Err(TPPError::InvalidRequest(format!("month {} is not in 1-12", request.month)));
    }
    let route_code = route_encoder.encode(&request.route)?;
    let service_code = service_encoder.encode(request.service.as_str())?;
    let averages = FeatureResolver::resolve(&request.route, records)?;
    let features = FeatureVector::assemble(route_code, service_code, request.year, request.month, &averages);
    debug_assert_eq!(
        route_encoder.decode(features.get(Feature::RouteCode) as usize).ok(),
        Some(request.route.as_str())
    );
    Ok((features, averages))
}

pub fn predict(
    request: &PredictionRequest,
    route_encoder: &EncodingTable,
    service_encoder: &EncodingTable,
    model: &dyn PunctualityModel,
    records: &[HistoricalRecord],
) -> Result<PredictionResult> {
    let (features, averages) = build_features(request, route_encoder, service_encoder, records)?;

    let raw = model.predict(&features)?;
    if !raw.is_finite() {
        return Err(TPPError::InvalidModel(format!("model returned {}", raw)));
    }
    let rate_percent = raw * 100.0;

    log::debug!(
        "Prediction for {} ({}, {}-{:02}, {:.1} min, {:.1} trains): {:.2}%",
        request.route,
        request.service,
        request.year,
        request.month,
        features.get(Feature::AvgDuration),
        features.get(Feature::AvgScheduledTrains),
        rate_percent
    );

    Ok(PredictionResult {
        rate_percent,
        avg_duration: averages.avg_duration,
        avg_trains_per_month: averages.avg_scheduled_trains,
        category: Category::from_rate(rate_percent),
        source: averages.source,
    })
}

/// Artifacts and history wired together for request handling.
pub struct PredictionPipeline<'a> {
    artifacts: &'a ModelArtifacts,
    store: &'a HistoricalStore,
}

impl<'a> PredictionPipeline<'a> {
    pub fn new(artifacts: &'a ModelArtifacts, store: &'a HistoricalStore) -> Self {
        PredictionPipeline { artifacts, store }
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        predict(
            request,
            self.artifacts.route_encoder(),
            self.artifacts.service_encoder(),
            self.artifacts.model(),
            self.store.records(),
        )
    }

    pub fn known_routes(&self) -> &'a [String] {
        self.artifacts.known_routes()
    }
}

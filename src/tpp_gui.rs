// GUI dashboard for the TGV punctuality predictor using egui/eframe
use crate::tpp_config::AppConfig;
use crate::tpp_controllers::TPPControllers;
use crate::tpp_models::{
    Category, FeatureSource, HistoricalStore, PredictionRequest, PredictionResult, RouteRanking, RouteRate,
    ServiceType,
};
use crate::tpp_predictor::{ModelArtifacts, PredictionPipeline};
use crate::tpp_texts::{category_text, month_name, ranking_title, text, Language};
use crate::tpp_views::TPPViews;
use eframe::egui;
use egui::{Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};
use std::time::Duration;

const GREEN: Color32 = Color32::from_rgb(0x00, 0xcc, 0x96);
const ORANGE: Color32 = Color32::from_rgb(0xff, 0xa1, 0x5a);
const RED: Color32 = Color32::from_rgb(0xef, 0x55, 0x3b);
const BLUE: Color32 = Color32::from_rgb(0x63, 0x6e, 0xfa);

// ============================================================================
// Application State
// ============================================================================

/// Everything loaded at startup; read-only afterwards.
struct Dashboard {
    artifacts: ModelArtifacts,
    store: HistoricalStore,
    ranking: RouteRanking,
}

/// Form inputs and the last prediction.
struct FormState {
    lang: Language,
    years: Vec<i32>,
    route: Option<String>,
    service: ServiceType,
    year: i32,
    month: u32,
    prediction: Option<(PredictionRequest, Result<PredictionResult, String>)>,
}

pub struct TPPApp {
    config: AppConfig,
    dashboard: Option<Dashboard>,
    form: FormState,
    error_message: Option<String>,
    init_promise: Option<poll_promise::Promise<Result<Dashboard, String>>>,
}

impl TPPApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let (year, month) = config.default_period();
        let mut app = TPPApp {
            form: FormState {
                lang: config.lang,
                years: config.years.clone(),
                route: None,
                service: ServiceType::National,
                year,
                month,
                prediction: None,
            },
            config,
            dashboard: None,
            error_message: None,
            init_promise: None,
        };

        app.start_initialization();
        app
    }

    fn start_initialization(&mut self) {
        let config = self.config.clone();
        let promise = poll_promise::Promise::spawn_thread("load", move || -> Result<Dashboard, String> {
            let (artifacts, store) = TPPControllers::load(&config).map_err(|e| e.to_string())?;
            let ranking = store.route_ranking(config.ranking_size);
            Ok(Dashboard { artifacts, store, ranking })
        });
        self.init_promise = Some(promise);
        self.error_message = None;
    }

    fn check_initialization(&mut self) {
        if let Some(promise) = self.init_promise.take() {
            match promise.try_take() {
                Ok(Ok(dashboard)) => {
                    if self.form.route.is_none() {
                        self.form.route = dashboard.artifacts.known_routes().first().cloned();
                    }
                    self.dashboard = Some(dashboard);
                }
                Ok(Err(e)) => {
                    log::error!("Failed to load dashboard data: {}", e);
                    self.error_message = Some(e);
                }
                Err(pending) => self.init_promise = Some(pending),
            }
        }
    }
}

impl eframe::App for TPPApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_initialization();
        let lang = self.form.lang;

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(text(lang, "title"));
            });
            ui.label(text(lang, "subtitle"));
        });

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            let mut footer = text(lang, "footer").to_string();
            if let Some(summary) = self
                .dashboard
                .as_ref()
                .and_then(|d| TPPViews::model_summary(d.artifacts.info()))
            {
                footer = format!("{} | {}", footer, summary);
            }
            ui.small(footer);
        });

        if self.init_promise.is_some() {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label(text(lang, "loading"));
                    });
                });
            });
            ctx.request_repaint_after(Duration::from_millis(100));
            return;
        }

        if let Some(error) = self.error_message.clone() {
            let mut should_retry = false;
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.colored_label(Color32::RED, "❌ Error");
                        ui.label(&error);
                        if ui.button("Retry").clicked() {
                            should_retry = true;
                        }
                    });
                });
            });
            if should_retry {
                self.start_initialization();
            }
            return;
        }

        let Some(dashboard) = self.dashboard.as_ref() else {
            return;
        };
        let ranking_size = self.config.ranking_size;
        let form = &mut self.form;

        egui::SidePanel::left("controls").min_width(240.0).show(ctx, |ui| {
            show_controls(ui, form, dashboard);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                show_prediction(ui, form);
                ui.separator();
                show_history(ui, form, dashboard);
                ui.separator();
                show_comparison(ui, form.lang, &dashboard.ranking, ranking_size);
            });
        });
    }
}

// ============================================================================
// View Implementations
// ============================================================================

fn show_controls(ui: &mut Ui, form: &mut FormState, dashboard: &Dashboard) {
    ui.label(text(form.lang, "language"));
    ui.horizontal(|ui| {
        for lang in Language::ALL {
            ui.selectable_value(&mut form.lang, lang, lang.display_name());
        }
    });
    ui.separator();

    let lang = form.lang;
    let routes = dashboard.artifacts.known_routes();
    let previous_route = form.route.clone();
    egui::ComboBox::from_label(text(lang, "select_route"))
        .selected_text(form.route.as_deref().unwrap_or("-"))
        .width(200.0)
        .show_ui(ui, |ui| {
            for route in routes {
                ui.selectable_value(&mut form.route, Some(route.clone()), route.as_str());
            }
        });
    if form.route != previous_route {
        if let Some(service) = form.route.as_deref().and_then(|r| dashboard.store.service_for_route(r)) {
            form.service = service;
        }
    }

    egui::ComboBox::from_label(text(lang, "service_type"))
        .selected_text(form.service.as_str())
        .show_ui(ui, |ui| {
            for service in ServiceType::ALL {
                ui.selectable_value(&mut form.service, service, service.as_str());
            }
        });

    ui.horizontal(|ui| {
        egui::ComboBox::from_label(text(lang, "year"))
            .selected_text(form.year.to_string())
            .show_ui(ui, |ui| {
                for year in form.years.clone() {
                    ui.selectable_value(&mut form.year, year, year.to_string());
                }
            });
        egui::ComboBox::from_label(text(lang, "month"))
            .selected_text(month_name(lang, form.month))
            .show_ui(ui, |ui| {
                for month in 1..=12 {
                    ui.selectable_value(&mut form.month, month, month_name(lang, month));
                }
            });
    });

    ui.add_space(10.0);
    let button = egui::Button::new(RichText::new(text(lang, "predict_btn")).strong()).fill(BLUE);
    if ui.add_enabled(form.route.is_some(), button).clicked() {
        if let Some(route) = form.route.clone() {
            let request = PredictionRequest {
                route,
                service: form.service,
                year: form.year,
                month: form.month,
            };
            let pipeline = PredictionPipeline::new(&dashboard.artifacts, &dashboard.store);
            let result = pipeline.predict(&request).map_err(|e| {
                log::warn!("Prediction failed for {}: {}", request.route, e);
                e.to_string()
            });
            form.prediction = Some((request, result));
        }
    }
}

fn show_prediction(ui: &mut Ui, form: &FormState) {
    let lang = form.lang;
    let Some((request, outcome)) = &form.prediction else {
        return;
    };

    ui.heading(text(lang, "result"));
    ui.label(format!(
        "{} · {} · {} {}",
        request.route,
        request.service,
        month_name(lang, request.month),
        request.year
    ));

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            ui.colored_label(RED, format!("❌ {}: {}", text(lang, "error"), e));
            return;
        }
    };

    ui.columns(3, |columns| {
        metric(&mut columns[0], text(lang, "predicted_rate"), &TPPViews::format_percent(result.rate_percent));
        metric(&mut columns[1], text(lang, "avg_duration"), &format!("{:.0} min", result.avg_duration));
        metric(&mut columns[2], text(lang, "trains_month"), &format!("{:.0}", result.avg_trains_per_month));
    });

    let color = match result.category {
        Category::Excellent => GREEN,
        Category::Good => BLUE,
        Category::Average => ORANGE,
        Category::Poor => RED,
    };
    ui.colored_label(color, RichText::new(category_text(lang, result.category)).size(16.0));
    match result.source {
        FeatureSource::Route { rows } => ui.label(format!("📊 {}: {}", text(lang, "history_rows"), rows)),
        FeatureSource::GlobalFallback { rows } => {
            ui.label(format!("ℹ️ {} ({} {})", text(lang, "fallback"), rows, text(lang, "rows")))
        }
    };

    ui.add_space(6.0);
    ui.add(
        egui::ProgressBar::new((result.rate_percent / 100.0).clamp(0.0, 1.0) as f32)
            .fill(gauge_color(result.rate_percent))
            .text(format!("{} {}", text(lang, "predicted_rate"), TPPViews::format_percent(result.rate_percent))),
    );
}

fn show_history(ui: &mut Ui, form: &FormState, dashboard: &Dashboard) {
    let lang = form.lang;
    let Some(route) = form.route.as_deref() else {
        return;
    };

    ui.heading(format!("📊 {} - {}", text(lang, "historical"), route));

    let trend = dashboard.store.monthly_trend(route);
    if trend.is_empty() {
        ui.label(format!("ℹ️ {}", text(lang, "no_history")));
        return;
    }

    ui.strong(text(lang, "monthly_trend"));
    ui.push_id("trend_table", |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(260.0)
            .column(Column::auto())
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong(text(lang, "month"));
                });
                header.col(|ui| {
                    ui.strong(text(lang, "predicted_rate"));
                });
            })
            .body(|mut body| {
                for point in &trend {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.label(point.date.format("%Y-%m").to_string());
                        });
                        row.col(|ui| {
                            rate_bar(ui, point.punctuality_rate, GREEN);
                        });
                    });
                }
            });
    });

    ui.add_space(8.0);
    ui.strong(text(lang, "by_month"));
    for average in dashboard.store.seasonal_profile(route) {
        ui.horizontal(|ui| {
            ui.label(format!("{:<4}", month_name(lang, average.month)));
            rate_bar(ui, average.punctuality_rate, BLUE);
        });
    }
}

fn show_comparison(ui: &mut Ui, lang: Language, ranking: &RouteRanking, size: usize) {
    ui.heading(format!("📈 {}", text(lang, "comparison")));
    ui.columns(2, |columns| {
        ranking_list(&mut columns[0], &ranking_title(lang, "top_routes", size), &ranking.top, GREEN);
        ranking_list(&mut columns[1], &ranking_title(lang, "bottom_routes", size), &ranking.bottom, RED);
    });
}

fn ranking_list(ui: &mut Ui, title: &str, rates: &[RouteRate], color: Color32) {
    ui.strong(title);
    for rate in rates {
        ui.label(&rate.route);
        rate_bar(ui, rate.punctuality_rate, color);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn metric(ui: &mut Ui, label: &str, value: &str) {
    ui.vertical(|ui| {
        ui.label(label);
        ui.label(RichText::new(value).size(24.0).strong());
    });
}

fn rate_bar(ui: &mut Ui, rate: f64, color: Color32) {
    ui.add(
        egui::ProgressBar::new(rate.clamp(0.0, 1.0) as f32)
            .fill(color)
            .text(TPPViews::format_percent(rate * 100.0)),
    );
}

fn gauge_color(rate_percent: f64) -> Color32 {
    if rate_percent >= 80.0 {
        GREEN
    } else if rate_percent >= 70.0 {
        ORANGE
    } else {
        RED
    }
}

// ============================================================================
// Public entry point
// ============================================================================

pub fn run_gui(config: AppConfig) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "TGV Punctuality Predictor",
        options,
        Box::new(move |cc| Ok(Box::new(TPPApp::new(cc, config)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_bands_follow_thresholds() {
        assert_eq!(gauge_color(95.0), GREEN);
        assert_eq!(gauge_color(80.0), GREEN);
        assert_eq!(gauge_color(75.0), ORANGE);
        assert_eq!(gauge_color(70.0), ORANGE);
        assert_eq!(gauge_color(69.9), RED);
    }
}

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use curricula::config::AppConfig;
use curricula::convalidation::import;
use curricula::convalidation::{
    convalidation_router, ConvalidationService, DistributionView, ImpactReport, ImpactRequest,
    InMemoryDistributionCache, NoopDistributionCache,
};
use curricula::error::AppError;
use curricula::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "curricula",
    about = "Compute curriculum credit distributions and convalidation impact",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Distribute a student's credits across a curriculum's components
    Distribution(DistributionArgs),
    /// Compare a student's progress before and after convalidation
    Impact(ImpactArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct DistributionArgs {
    /// Student subject history CSV
    #[arg(long)]
    records: PathBuf,
    /// Curriculum catalog JSON
    #[arg(long)]
    catalog: PathBuf,
    /// Print the JSON payload instead of the text report
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ImpactArgs {
    /// Student subject history CSV
    #[arg(long)]
    records: PathBuf,
    /// Convalidation mappings CSV
    #[arg(long)]
    mappings: PathBuf,
    /// Target curriculum catalog JSON
    #[arg(long)]
    catalog: PathBuf,
    /// Curriculum the student is leaving (defaults to the target catalog)
    #[arg(long)]
    origin_catalog: Option<PathBuf>,
    /// Print the JSON payload instead of the text report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        Command::Serve(args) => run_server(config, args).await,
        Command::Distribution(args) => run_distribution(&config, args),
        Command::Impact(args) => run_impact(&config, args),
    }
}

async fn run_server(mut config: AppConfig, mut args: ServeArgs) -> Result<(), AppError> {
    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let service = ConvalidationService::from_config(
        Arc::new(InMemoryDistributionCache::with_capacity(
            config.allocation.cache_capacity,
        )),
        &config.allocation,
    )?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(convalidation_router(Arc::new(service)))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        overflow_policy = config.allocation.overflow_policy.label(),
        workers = config.allocation.bulk_workers.get(),
        cache_capacity = config.allocation.cache_capacity.get(),
        "convalidation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_distribution(config: &AppConfig, args: DistributionArgs) -> Result<(), AppError> {
    let records = import::subject_records_from_path(&args.records)?;
    let catalog = import::catalog_from_path(&args.catalog)?;

    let service =
        ConvalidationService::from_config(Arc::new(NoopDistributionCache), &config.allocation)?;
    let view = service.distribution_view(&records, &catalog)?;

    if args.json {
        print_json(&view)
    } else {
        render_distribution(&view);
        Ok(())
    }
}

fn run_impact(config: &AppConfig, args: ImpactArgs) -> Result<(), AppError> {
    let request = ImpactRequest {
        student_id: None,
        original_records: import::subject_records_from_path(&args.records)?,
        mappings: import::mappings_from_path(&args.mappings)?,
        catalog: import::catalog_from_path(&args.catalog)?,
        origin_catalog: args
            .origin_catalog
            .as_ref()
            .map(import::catalog_from_path)
            .transpose()?,
    };

    let service =
        ConvalidationService::from_config(Arc::new(NoopDistributionCache), &config.allocation)?;
    let report = service.compute_impact(&request)?;

    if args.json {
        print_json(&report.summary())
    } else {
        render_impact(&request, &report);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn render_distribution(view: &DistributionView) {
    println!("Credit distribution for {}", view.curriculum);
    println!("Evaluated {}", Local::now().date_naive());
    println!(
        "Degree credits: {:.2} of {:.2} ({:.1}%)",
        view.degree_credits, view.curriculum_credits, view.progress_pct
    );

    println!("\nComponents");
    for entry in &view.components {
        let cap = match entry.credit_cap {
            Some(cap) => format!("cap {cap:.2}"),
            None => "uncapped".to_string(),
        };
        println!(
            "- {}: {:.2}/{:.2} credits, {} subjects ({})",
            entry.label, entry.credits_assigned, entry.credit_target, entry.subject_count, cap
        );
    }

    println!("\nSubjects");
    for subject in &view.subjects {
        let placement = match subject.assigned_component {
            Some(component) if subject.redirected => format!("{component} (redirected)"),
            Some(component) => component.to_string(),
            None => "not counted".to_string(),
        };
        println!(
            "- {} {}: {:.2} credits -> {}",
            subject.code, subject.name, subject.credits_counted, placement
        );
    }

    if view.uncounted_credits > 0.0 {
        println!("\nUncounted credits: {:.2}", view.uncounted_credits);
    }

    render_warnings(view.warnings.iter().map(|w| (w.label, &w.subject, &w.detail)));
}

fn render_impact(request: &ImpactRequest, report: &ImpactReport) {
    let summary = report.summary();
    let origin = request
        .origin_catalog
        .as_ref()
        .unwrap_or(&request.catalog);

    println!(
        "Convalidation impact: {} -> {}",
        origin.code(),
        request.catalog.code()
    );
    println!("Evaluated {}", Local::now().date_naive());
    println!(
        "Credits: {:.2} before, {:.2} after ({:+.2})",
        summary.original_assigned_credits,
        summary.new_convalidated_credits,
        summary.credit_difference
    );
    println!(
        "Progress change: {:+.1}% | additional subjects required: {}",
        summary.average_progress_change, summary.additional_subjects_required
    );

    println!("\nBy component");
    for entry in &summary.per_component_breakdown {
        println!(
            "- {}: {:.2} -> {:.2} ({:+.2})",
            entry.label, entry.original, entry.convalidated, entry.delta
        );
    }

    render_warnings(
        summary
            .warnings
            .iter()
            .map(|w| (w.label, &w.subject, &w.detail)),
    );
}

fn render_warnings<'a>(warnings: impl Iterator<Item = (&'static str, &'a String, &'a String)>) {
    let warnings: Vec<_> = warnings.collect();
    if warnings.is_empty() {
        println!("\nWarnings: none");
        return;
    }

    println!("\nWarnings");
    for (label, subject, detail) in warnings {
        println!("- [{label}] {subject}: {detail}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: recorder.handle(),
        }
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let app = Router::new()
            .route("/ready", get(readiness_endpoint))
            .with_state(state(false));

        let response = app
            .oneshot(
                axum::http::Request::get("/ready")
                    .body(axum::body::Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthcheck_is_always_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }
}

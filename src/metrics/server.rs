use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::sync::{ComponentHealth, HealthCheckable};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

struct ServerState {
    registry: Registry,
    health: Arc<dyn HealthCheckable>,
}

/// Start the metrics HTTP server
/// This should be called in a separate thread/runtime to avoid conflicts
pub async fn start_metrics_server(
    registry: Registry,
    health: Arc<dyn HealthCheckable>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    let state = web::Data::new(ServerState { registry, health });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(state: web::Data<ServerState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(state: web::Data<ServerState>) -> impl Responder {
    let component = state.health.check_health();
    let body = serde_json::json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "status": status_label(&component),
        "components": [&component],
    });

    if component.status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(body)
    } else {
        HttpResponse::Ok().json(body)
    }
}

fn status_label(component: &ComponentHealth) -> &'static str {
    if component.status.is_healthy() {
        "healthy"
    } else if component.status.is_degraded() {
        "degraded"
    } else {
        "unhealthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::HealthStatus;
    use actix_web::{http::StatusCode, test};

    struct FixedHealth(HealthStatus);

    impl HealthCheckable for FixedHealth {
        fn check_health(&self) -> ComponentHealth {
            ComponentHealth::new("command_transport", self.0.clone())
        }

        fn component_name(&self) -> &str {
            "command_transport"
        }
    }

    fn state(status: HealthStatus) -> web::Data<ServerState> {
        let metrics = super::super::Metrics::new().unwrap();
        metrics.record_snapshot(true);
        web::Data::new(ServerState {
            registry: metrics.registry().clone(),
            health: Arc::new(FixedHealth(status)),
        })
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_registry() {
        let app = test::init_service(
            App::new()
                .app_data(state(HealthStatus::Healthy))
                .route("/metrics", web::get().to(metrics_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("bridge_snapshots_pushed_total 1"));
    }

    #[actix_web::test]
    async fn test_health_reports_version_and_status() {
        let app = test::init_service(
            App::new()
                .app_data(state(HealthStatus::Degraded("fell back".into())))
                .route("/health", web::get().to(health_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(json["status"], "degraded");
        assert_eq!(json["version"], SERVICE_VERSION);
        assert_eq!(json["components"][0]["reason"], "fell back");
    }

    #[actix_web::test]
    async fn test_unhealthy_is_service_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(state(HealthStatus::Unhealthy("stale".into())))
                .route("/health", web::get().to(health_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

const SERVICE_NAME: &str = "ledger-es";

/// Serve `/metrics` (Prometheus text format) and `/health` until the actix
/// system stops. Runs on its own actix system, off the tokio runtime that
/// drives the repositories.
pub async fn start_metrics_server(registry: Arc<Registry>, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Repository metrics on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

// Healthy as long as the process answers; backends are not checked.
async fn health_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "metric_families": registry.gather().len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RepositoryMetrics;
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_reports_service() {
        let metrics = RepositoryMetrics::new().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(metrics.registry().clone())))
                .configure(routes),
        )
        .await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[actix_web::test]
    async fn test_metrics_exposes_repository_counters() {
        let metrics = RepositoryMetrics::new().unwrap();
        metrics.record_append("account", 3);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(metrics.registry().clone())))
                .configure(routes),
        )
        .await;

        let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains(r#"events_appended_total{aggregate_type="account"} 3"#));
    }
}

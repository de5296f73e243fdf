use std::sync::Arc;

use anyhow::Context;

use flexfit_onboarding::config::OnboardingConfig;
use flexfit_onboarding::onboarding::{OnboardingRouteState, onboarding_routes};
use flexfit_onboarding::store::{KeyValueStore, LibSqlBackend, SnapshotStore};
use flexfit_onboarding::submission::{HttpAccountService, MergeReconciler, SubmissionPipeline};

const USAGE: &str = "usage: flexfit-onboarding [serve|status|resubmit|reset]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());
    let config = OnboardingConfig::from_env()?;

    // ── Storage ──────────────────────────────────────────────────────────
    let kv: Arc<dyn KeyValueStore> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&config.db_path))
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path))?,
    );
    let snapshots = SnapshotStore::new(kv);

    // ── Submission ───────────────────────────────────────────────────────
    let service = Arc::new(HttpAccountService::from_config(&config)?);
    let reconciler =
        MergeReconciler::new(snapshots.clone()).with_require_profile(config.require_profile);
    let pipeline = Arc::new(
        SubmissionPipeline::new(service, snapshots.clone()).with_reconciler(reconciler),
    );

    match command.as_str() {
        "status" => {
            let status = snapshots.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if status.is_empty() {
                eprintln!("No pending onboarding snapshots.");
            }
        }
        "resubmit" => match pipeline.resubmit().await {
            Ok(_) => eprintln!("Registration submitted; session token stored."),
            Err(e) if e.routes_to_credentials() => {
                anyhow::bail!("{e}. Restart onboarding from the credentials step.")
            }
            Err(e) => return Err(e.into()),
        },
        "reset" => {
            snapshots.clear_all().await?;
            eprintln!("Onboarding snapshots cleared.");
        }
        "serve" => {
            eprintln!("FlexFit onboarding v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Account service: {}", config.register_url());
            eprintln!("   Database: {}", config.db_path);
            eprintln!(
                "   Status API: http://0.0.0.0:{}/api/onboarding/status",
                config.http_port
            );

            let app = onboarding_routes(OnboardingRouteState {
                snapshots,
                pipeline,
                clear_stale_on_start: config.clear_stale_on_start,
            });
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
                .await
                .with_context(|| format!("failed to bind port {}", config.http_port))?;
            axum::serve(listener, app).await?;
        }
        other => anyhow::bail!("unknown command {other:?}\n{USAGE}"),
    }

    Ok(())
}

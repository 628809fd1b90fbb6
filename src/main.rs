use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fac_gym::{
    create_router, AppState, Config, ControllerSettings, HttpSessionApi, Lifecycle, NatsRoom,
    SessionApi, SessionController, SessionRuntime,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fac-gym")]
#[command(about = "Facilitator training session client")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/fac-gym")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available case studies
    Cases,
    /// Start a session and serve the local control surface until Ctrl-C
    Run {
        /// Case study to practise on
        case_study_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level)),
        )
        .init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let api: Arc<dyn SessionApi> = Arc::new(HttpSessionApi::new(&cfg.api)?);
    info!("Session API: {}", cfg.api.base_url);

    match args.command {
        Command::Cases => list_cases(api).await,
        Command::Run { case_study_id } => run(cfg, api, &case_study_id).await,
    }
}

async fn list_cases(api: Arc<dyn SessionApi>) -> Result<()> {
    let cases = api
        .list_case_studies()
        .await
        .context("Failed to list case studies")?;

    for case in cases {
        println!(
            "{}\t{}",
            case.case_study_id,
            case.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}

async fn run(cfg: Config, api: Arc<dyn SessionApi>, case_study_id: &str) -> Result<()> {
    let mut lifecycle = Lifecycle::new(
        api,
        cfg.facilitator.identity.clone(),
        cfg.timing.unload_grace(),
    );

    let session = lifecycle
        .start(case_study_id)
        .await
        .context("Failed to start session")?;

    let (room, events) = match NatsRoom::join(
        &cfg.room.nats_url,
        &session.room_name,
        &cfg.facilitator.identity,
        &session.token,
    )
    .await
    {
        Ok(joined) => joined,
        Err(e) => {
            error!("Failed to join room: {}", e);
            let _ = lifecycle.end().await;
            return Err(e);
        }
    };

    let controller = SessionController::new(
        &session.session_id,
        &session.active_branch_id,
        &ControllerSettings::from_config(&cfg),
    );
    let (handle, task) =
        SessionRuntime::new(controller, Arc::new(room), events, cfg.timing.clock_tick()).spawn();
    lifecycle.attach(handle, task)?;

    let state = AppState::new(lifecycle);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Control surface listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Control surface failed")?;

    state.lifecycle.lock().await.on_unload().await;
    info!("Goodbye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

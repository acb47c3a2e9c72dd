//! posemirror - Webcam pose mirror for VRM avatars
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use posemirror::{
    avatar,
    config::Config,
    tracking::{subprocess::check_tracker_available, PoseReceiver, TrackerSubprocess},
    AppState,
};

/// posemirror - drives a VRM avatar from live webcam pose tracking
#[derive(Parser, Debug)]
#[command(name = "posemirror", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera device index (overrides config)
    #[arg(long)]
    camera: Option<u32>,

    /// Avatar model path (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Tracker UDP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable the pose tracker (render only)
    #[arg(long)]
    no_tracker: bool,

    /// Run without the UI window (tracker + rig only)
    #[arg(long)]
    headless: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", posemirror::NAME, posemirror::VERSION);

    // Build tokio runtime manually so the main thread stays free for the UI
    // event loop
    let runtime = tokio::runtime::Runtime::new()?;

    // Do all async setup on the runtime
    let state = runtime.block_on(async { setup_and_spawn_services(&args).await })?;

    // Run the UI on the main thread (blocks until the window closes)
    #[cfg(feature = "native-ui")]
    if !args.headless {
        // Enter the tokio runtime context so try_current() works inside
        // eframe (needed for reading config via tokio::sync::RwLock)
        let _guard = runtime.enter();

        // eframe::run_native blocks the main thread (winit requirement)
        if let Err(e) = posemirror::ui::PoseMirrorApp::run(Arc::clone(&state)) {
            error!("UI error: {}", e);
        }

        info!("UI window closed, shutting down");
        state.shutdown();

        // Give async tasks a moment to finish
        runtime.shutdown_timeout(std::time::Duration::from_secs(3));
        return Ok(());
    }

    #[cfg(not(feature = "native-ui"))]
    if !args.headless {
        tracing::warn!("Built without native-ui, running headless");
    }

    // Headless mode: wait for Ctrl+C / SIGTERM
    runtime.block_on(async {
        shutdown_signal().await;
        info!("Shutdown signal received");
        state.shutdown();

        // Give tasks a moment to clean up
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
    });

    info!("posemirror stopped");
    Ok(())
}

/// Setup config, create AppState, and spawn all background services.
async fn setup_and_spawn_services(args: &Args) -> anyhow::Result<Arc<AppState>> {
    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(camera) = args.camera {
        config.tracker.camera_device = camera;
    }
    if let Some(ref model) = args.model {
        config.avatar.model_path = model.clone();
    }
    if let Some(port) = args.port {
        config.tracker.port = port;
    }
    if args.no_tracker {
        config.tracker.enabled = false;
    }

    // Validate configuration
    config.validate()?;

    info!("Camera device: {}", config.tracker.camera_device);
    info!(
        "Capture: {}x{} @ {} fps",
        config.tracker.capture_width, config.tracker.capture_height, config.tracker.capture_fps
    );
    info!("Tracker: {}", config.tracker.enabled);

    // Resolve the avatar file (downloads it on first run if configured with
    // a URL). Blocking network/file IO, so run off the async threads.
    let avatar_config = config.avatar.clone();
    match tokio::task::spawn_blocking(move || avatar::ensure_model(&avatar_config)).await? {
        Ok(path) => {
            info!("Avatar model: {}", path.display());
            config.avatar.model_path = path.display().to_string();
        }
        Err(e) => {
            // The UI surfaces the load failure; keep running so the tracker
            // can still be inspected
            error!("Failed to resolve avatar model: {}", e);
        }
    }

    // Create shared application state
    let state = AppState::new(config.clone());

    // Start the tracker service
    if config.tracker.enabled {
        let tracker_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_tracker(tracker_state).await {
                error!("Tracker service error: {}", e);
            }
        });
    } else {
        info!("Tracker disabled");
    }

    Ok(state)
}

/// Tracker service: subprocess supervision + receive loop.
async fn run_tracker(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await;
    let tracker_config = config.tracker.clone();
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();

    // Optionally launch the subprocess
    let mut subprocess = if tracker_config.auto_launch && !check_tracker_available(&tracker_config)
    {
        tracing::warn!(
            "Tracker script or python3 not found, expecting an external tracker on port {}",
            tracker_config.port
        );
        None
    } else if tracker_config.auto_launch {
        let mut sp = TrackerSubprocess::new(&tracker_config);
        if let Err(e) = sp.start() {
            error!("Failed to auto-launch pose tracker: {}", e);
            // Continue anyway; the tracker may be running externally
        }
        // Give the tracker a moment to start
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
        Some(sp)
    } else {
        None
    };

    // Start the receiver
    let mut receiver = PoseReceiver::new(&tracker_config);
    receiver.start()?;
    state.set_tracker_alive(true);

    info!(
        "Pose tracking started (port: {}, auto_launch: {})",
        tracker_config.port, tracker_config.auto_launch
    );

    loop {
        tokio::select! {
            result = receiver.process() => {
                match result {
                    Ok(Some(report)) => {
                        state.update_pose(report).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Pose receive error: {}", e);
                        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                    }
                }

                // Check subprocess health and auto-restart if needed
                if let Some(ref mut sp) = subprocess {
                    if !sp.is_running() {
                        state.set_tracker_alive(false);
                        if tracker_config.auto_restart {
                            info!(
                                "Pose tracker subprocess crashed, restarting in {}s",
                                tracker_config.restart_delay_secs
                            );
                            tokio::time::sleep(tokio::time::Duration::from_secs(
                                tracker_config.restart_delay_secs,
                            ))
                            .await;
                            match sp.start() {
                                Ok(()) => state.set_tracker_alive(true),
                                Err(e) => error!("Failed to restart pose tracker: {}", e),
                            }
                        }
                    }
                }
            }
            _ = state.wait_tracker_restart() => {
                info!("Tracker restart requested");
                if let Some(ref mut sp) = subprocess {
                    sp.stop().await;
                    if let Err(e) = sp.start() {
                        error!("Failed to restart pose tracker: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Pose tracking shutting down");
                break;
            }
        }

        // Small yield to avoid busy-spinning when no data arrives
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }

    // Cleanup
    receiver.stop();
    state.set_tracker_alive(false);
    if let Some(ref mut sp) = subprocess {
        sp.stop().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

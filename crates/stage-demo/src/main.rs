//! Stage demo - main entry point.
//!
//! Loads the config, starts the dispatch thread and walks a launcher through
//! its states: animated transitions, a scrubbed gesture, the rest state and
//! an element animation.

use std::sync::Arc;
use std::time::Duration;

use stage_core::StageConfig;
use stage_demo::launcher::{Launcher, LauncherState, LoggingListener, HOTSEAT_BOUNCE};
use stage_manager::{AnimationFlags, StateManager};
use stage_runtime::MainThread;

/// Upper bound on waiting for any single step to settle.
const SETTLE_LIMIT: Duration = Duration::from_secs(5);

type Manager = Arc<StateManager<LauncherState>>;

/// Run `f` against the manager on the dispatch thread, then wait for the looper to go idle.
async fn step<F>(dispatch: &MainThread, manager: &Manager, label: &str, f: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&StateManager<LauncherState>) + Send + 'static,
{
    tracing::info!("== {}", label);
    let manager = manager.clone();
    dispatch.run(move |_| f(&*manager)).await?;
    dispatch.wait_for_idle(SETTLE_LIMIT).await?;
    Ok(())
}

async fn run_demo(dispatch: &MainThread, config: &StageConfig) -> Result<(), Box<dyn std::error::Error>> {
    let launcher = Arc::new(Launcher::new(config.animation.clone()));
    let settings = config.manager.clone();
    let container = launcher.clone();
    let manager: Manager = dispatch
        .run(move |looper| {
            StateManager::with_settings(container, looper.clone(), LauncherState::Normal, settings)
        })
        .await?;
    manager.add_state_listener(Arc::new(LoggingListener));

    step(dispatch, &manager, "Normal -> Overview", |m| m.go_to_state(LauncherState::Overview)).await?;
    tracing::info!("Frame: {:?}", launcher.frame());

    step(dispatch, &manager, "Overview -> AllApps", |m| m.go_to_state(LauncherState::AllApps)).await?;
    tracing::info!("Frame: {:?}", launcher.frame());

    step(dispatch, &manager, "Restore from AllApps", |m| m.move_to_rest_state(true)).await?;
    tracing::info!("Frame: {:?}", launcher.frame());

    step(dispatch, &manager, "Scrubbed swipe to Overview", |m| {
        let controller = m.create_animation_to_new_workspace_with(
            LauncherState::Overview,
            Duration::from_millis(300),
            AnimationFlags::empty(),
        );
        controller.set_play_fraction(0.4);
        controller.animate_to_progress(1.0, Duration::from_millis(120));
    })
    .await?;
    tracing::info!("Frame: {:?}", launcher.frame());

    step(dispatch, &manager, "Hotseat bounce", |m| {
        match m.create_state_element_animation(HOTSEAT_BOUNCE, &[0.0, 12.0]) {
            Ok(bounce) => bounce.start(),
            Err(e) => tracing::warn!("Skipping bounce: {}", e),
        }
    })
    .await?;

    step(dispatch, &manager, "Back home", |m| m.go_to_state(LauncherState::Normal)).await?;
    tracing::info!("Frame: {:?}", launcher.frame());

    let dump = dispatch.run(move |_| format!("{:?}", manager)).await?;
    tracing::info!("Final state: {}", dump);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Stage demo starting...");

    let config = StageConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        StageConfig::default()
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let main_thread = MainThread::from_settings(&config.animation);
    let result = rt.block_on(run_demo(&main_thread, &config));
    main_thread.shutdown();

    result
}

mod args;

use args::{Args, Mode};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;
use wos_adb_automator::adb::AdbBackend;
use wos_adb_automator::config::{EngineConfig, load_config};
use wos_adb_automator::device::AdbDeviceBridge;
use wos_adb_automator::executor::StateObserver;
use wos_adb_automator::persistence::{SqliteTaskStore, TaskStore};
use wos_adb_automator::scheduler::{
    ControlCommand, Notification, Scheduler, create_control_channels,
};
use wos_adb_automator::tasks::task_catalog;
use wos_adb_automator::vision::{Catalog, TextEngine, VisionPipeline};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

fn main() {
    let Some(args) = Args::parse() else {
        return;
    };

    let level = if args.debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wos_adb_automator", level)
        .filter_module("wos_automator", level)
        .init();

    let mut cfg = match load_config(args.config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(2);
        }
    };
    if let Some(backend) = args.backend {
        cfg.device.backend = backend;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Could not start the async runtime: {e}");
            std::process::exit(1);
        }
    };
    let result = rt.block_on(async move {
        match args.mode {
            Mode::Run => run_scheduler(&cfg).await,
            Mode::Screenshot => screenshot(&cfg).await,
            Mode::Observe => observe(&cfg).await,
            Mode::Status => status(&cfg),
        }
    });
    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn text_engine(cfg: &EngineConfig, catalog: &Catalog) -> CliResult<TextEngine> {
    #[cfg(feature = "ocr-models")]
    if let (Some(detection), Some(recognition)) = (
        cfg.vision.ocr_detection_model.as_deref(),
        cfg.vision.ocr_recognition_model.as_deref(),
    ) {
        let ocrs = wos_adb_automator::vision::ocr::OcrsRecognizer::load(detection, recognition)?;
        log::info!("Text regions read with ocrs models");
        return Ok(TextEngine::Ocrs(Box::new(ocrs)));
    }
    #[cfg(not(feature = "ocr-models"))]
    if cfg.vision.ocr_detection_model.is_some() {
        log::warn!("OCR model paths set but built without the 'ocr-models' feature; using glyphs");
    }
    let glyphs = wos_adb_automator::vision::GlyphRecognizer::new(catalog.glyphs().to_vec());
    Ok(TextEngine::Glyphs(glyphs))
}

fn build_observer(cfg: &EngineConfig) -> CliResult<(StateObserver, (u32, u32))> {
    let catalog = Catalog::load(&cfg.vision.assets_dir, cfg.vision.default_threshold)?;
    let reference = catalog.reference_size;
    let text = text_engine(cfg, &catalog)?;
    let pipeline = VisionPipeline::new(Arc::new(catalog), text);
    Ok((StateObserver::new(pipeline), reference))
}

async fn run_scheduler(cfg: &EngineConfig) -> CliResult {
    let (observer, reference) = build_observer(cfg)?;
    let mut device = AdbDeviceBridge::new(&cfg.device, reference);
    if let Err(e) = device.acquire().await {
        log::warn!("Device not reachable at start ({e}); tasks will retry the connection");
    }
    let store = SqliteTaskStore::open(&cfg.persistence.database)?;
    log::info!("Task table at {}", cfg.persistence.database.display());

    let (cmd_tx, cmd_rx, event_tx, event_rx) = create_control_channels();
    let mut scheduler = Scheduler::new(
        device,
        store,
        observer,
        cfg,
        task_catalog(cfg),
        cmd_rx,
        event_tx,
    )?;

    tokio::spawn(log_notifications(event_rx));
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            log::info!("Received Ctrl+C, stopping after the current step");
            if cmd_tx.send(ControlCommand::Shutdown).await.is_err() {
                log::debug!("Scheduler already stopped");
            }
        }
    });

    scheduler.run().await;
    Ok(())
}

/// Console side of the control channel.
async fn log_notifications(mut events: mpsc::Receiver<Notification>) {
    while let Some(event) = events.recv().await {
        match &event {
            Notification::TaskCompleted { task_id } => log::info!("📣 {task_id} completed"),
            Notification::TaskFailed { task_id, reason } => {
                log::warn!("📣 {task_id} failed: {reason}")
            }
            Notification::DeviceLost { reason } => {
                log::error!("📣 Device lost ({reason}); scheduler paused")
            }
            Notification::Status(_) => match serde_json::to_string_pretty(&event) {
                Ok(json) => println!("{json}"),
                Err(e) => log::warn!("Status not printable: {e}"),
            },
        }
    }
}

async fn screenshot(cfg: &EngineConfig) -> CliResult {
    let kind = cfg.device.backend;
    println!("📸 CLI screenshot using impl='{kind:?}'...");
    let client = AdbBackend::connect(&cfg.device.serial, kind).await?;
    let (sx, sy) = client.screen_dimensions();
    println!("📱 Device: {} size: {}x{}", client.device_name(), sx, sy);
    let cap = client.screen_capture().await?;
    tokio::fs::write("cli-screenshot.png", &cap.bytes).await?;
    println!(
        "✅ Screenshot ({} bytes, {}ms) saved to cli-screenshot.png",
        cap.bytes.len(),
        cap.duration_ms
    );
    Ok(())
}

async fn observe(cfg: &EngineConfig) -> CliResult {
    let (observer, reference) = build_observer(cfg)?;
    let mut device = AdbDeviceBridge::new(&cfg.device, reference);
    let state = observer.look(&mut device).await?;
    println!("🔎 Screen: {}", state.name());
    if state.ambiguous {
        println!("⚠️ More than one screen rule matched; the first declared wins");
    }
    println!("   {}", state.observation.summary());
    device.release();
    Ok(())
}

fn status(cfg: &EngineConfig) -> CliResult {
    let store = SqliteTaskStore::open(&cfg.persistence.database)?;
    let now = chrono::Utc::now();
    let due: Vec<String> = store
        .list_due_tasks(now)?
        .into_iter()
        .map(|r| r.task_id)
        .collect();

    println!("{:<18} {:<10} {:<26} {:>5}  last error", "task", "state", "cooldown until", "retry");
    for r in store.list_tasks()? {
        let marker = if due.contains(&r.task_id) { "*" } else { " " };
        println!(
            "{marker}{:<17} {:<10} {:<26} {:>5}  {}",
            r.task_id,
            r.state.as_str(),
            r.cooldown_until.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            r.retry_count,
            r.last_error.as_deref().unwrap_or("-")
        );
    }
    println!("(* due now)");

    let runs = store.recent_runs(10)?;
    if !runs.is_empty() {
        println!();
        println!("Recent runs:");
        for run in runs {
            println!(
                "  {} {:<18} {:<10} {}",
                run.finished_at.format("%Y-%m-%d %H:%M:%S"),
                run.task_id,
                run.outcome.as_str(),
                run.reason.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}

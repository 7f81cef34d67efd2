//! Panesync - replay scroll synchronization between an editor and a preview.
//!
//! # Usage
//!
//! ```bash
//! panesync README.md
//! panesync --from rendered --steps 40 README.md
//! panesync --jump-line 120 README.md
//! panesync --dump-map README.md
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use panesync::config::{
    OptionOverrides, clear_overrides, global_config_path, local_override_path, resolve_options,
    save_overrides,
};
use panesync::editor::{EditorMetrics, EditorPane};
use panesync::perf;
use panesync::preview::{PreviewMetrics, PreviewPane};
use panesync::sync::{ScrollSource, ScrollSurface, SyncCoordinator};

/// One display refresh at 60 Hz.
const FRAME_MS: u64 = 16;
/// Extra frames after a scripted session so trailing work lands.
const SETTLE_FRAMES: usize = 20;

/// Which pane the scripted sweep scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Pane {
    Buffer,
    Rendered,
}

impl From<Pane> for ScrollSource {
    fn from(pane: Pane) -> Self {
        match pane {
            Pane::Buffer => Self::Buffer,
            Pane::Rendered => Self::Rendered,
        }
    }
}

/// Replay scroll synchronization between a markdown source and its preview
#[derive(Parser, Debug)]
#[command(name = "panesync", version, about, long_about = None)]
struct Cli {
    /// Markdown file to load into both panes
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Pane to sweep from top to bottom
    #[arg(long, value_enum, default_value = "buffer")]
    from: Pane,

    /// Number of frames in the sweep
    #[arg(long, default_value_t = 20)]
    steps: usize,

    /// Animate the editor to a line instead of sweeping
    #[arg(long, value_name = "LINE")]
    jump_line: Option<usize>,

    /// Print the line map as JSON and exit
    #[arg(long)]
    dump_map: bool,

    /// Visible height of both panes in pixels
    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Interpolate on the calling thread
    #[arg(long)]
    no_offload: bool,

    /// Use this config file instead of the global one
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Minimum spacing between sync computations
    #[arg(long, value_name = "MS")]
    throttle_ms: Option<u64>,

    /// Quiet period before the active pane is released
    #[arg(long, value_name = "MS")]
    quiet_ms: Option<u64>,

    /// Duration of animated jumps (0 disables smoothing)
    #[arg(long, value_name = "MS")]
    smoothing_ms: Option<u64>,

    /// Smallest scroll delta worth writing
    #[arg(long, value_name = "PX")]
    pixel_threshold: Option<f64>,

    /// Write sync decisions to a file
    #[arg(long, value_name = "PATH")]
    sync_debug_log: Option<PathBuf>,

    /// Time map builds and sync stages and print a summary
    #[arg(long)]
    perf: bool,

    /// Save the tuning flags given on this command line as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

impl Cli {
    fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            throttle_interval_ms: self.throttle_ms,
            lock_quiet_ms: self.quiet_ms,
            smoothing_duration_ms: self.smoothing_ms,
            pixel_threshold: self.pixel_threshold,
            use_offload: self.no_offload.then_some(false),
            ..OptionOverrides::default()
        }
    }
}

type Demo = SyncCoordinator<EditorPane, PreviewPane>;

fn print_frame(coordinator: &Demo, now_ms: u64, writes: usize) {
    println!(
        "{now_ms:>6} ms  buffer {:>10.2}  rendered {:>10.2}  writes {writes}  active {:?}",
        coordinator.buffer().scroll_top(),
        coordinator.rendered().scroll_top(),
        coordinator.active_source(),
    );
}

fn print_timings() {
    for (stage, timing) in perf::timing_report() {
        println!(
            "{stage:<16} n={:<6} mean {:>8.3} ms  max {:>8.3} ms",
            timing.count,
            timing.mean_ms(),
            timing.max_ms
        );
    }
}

fn frame(coordinator: &mut Demo, now_ms: &mut u64) {
    let writes = coordinator.on_frame(*now_ms);
    print_frame(coordinator, *now_ms, writes);
    *now_ms += FRAME_MS;
    // Give the offload worker a real frame to answer in.
    std::thread::sleep(Duration::from_millis(FRAME_MS));
}

fn sweep(coordinator: &mut Demo, from: ScrollSource, steps: usize, now_ms: &mut u64) {
    let steps = steps.max(1);
    let max = match from {
        ScrollSource::Buffer => coordinator.buffer().max_scroll(),
        ScrollSource::Rendered => coordinator.rendered().max_scroll(),
    };
    for step in 0..=steps {
        let offset = max * step as f64 / steps as f64;
        match from {
            ScrollSource::Buffer => coordinator.buffer_mut().set_scroll_top(offset),
            ScrollSource::Rendered => coordinator.rendered_mut().set_scroll_top(offset),
        }
        coordinator.on_scroll(from, *now_ms);
        frame(coordinator, now_ms);
    }
}

fn jump(coordinator: &mut Demo, line: usize, now_ms: &mut u64) {
    coordinator.jump_buffer_to_line(line, *now_ms);
    while coordinator.is_animating() {
        frame(coordinator, now_ms);
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let global_path = cli.config.clone().unwrap_or_else(global_config_path);
    let local_path = local_override_path();
    let cli_overrides = cli.overrides();

    if cli.clear {
        clear_overrides(&global_path)?;
    }
    if cli.save {
        save_overrides(&global_path, &cli_overrides)?;
    }
    let options = resolve_options(&global_path, &local_path, &cli_overrides)?;

    perf::set_timing(cli.perf);
    let sync_debug_log_path = cli
        .sync_debug_log
        .clone()
        .or_else(|| std::env::var_os("PANESYNC_SYNC_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::open_decision_log(sync_debug_log_path.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize sync debug log {}: {}",
            sync_debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            err
        );
    }

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }
    let source = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;

    let editor = EditorPane::from_text(
        &source,
        EditorMetrics {
            client_height: cli.height,
            ..EditorMetrics::default()
        },
    );
    let preview = PreviewPane::from_source(
        &source,
        PreviewMetrics {
            client_height: cli.height,
            ..PreviewMetrics::default()
        },
    );

    let mut coordinator = SyncCoordinator::new(editor, preview, options);
    let map = coordinator.rebuild_line_map();
    if cli.dump_map {
        let json = serde_json::to_string_pretty(map.entries()).context("Failed to encode map")?;
        println!("{json}");
        return Ok(());
    }

    let mut now_ms = 0;
    match cli.jump_line {
        Some(line) => jump(&mut coordinator, line, &mut now_ms),
        None => sweep(&mut coordinator, cli.from.into(), cli.steps, &mut now_ms),
    }
    for _ in 0..SETTLE_FRAMES {
        frame(&mut coordinator, &mut now_ms);
    }

    println!("{:?}", coordinator.stats());
    if cli.perf {
        print_timings();
    }
    Ok(())
}

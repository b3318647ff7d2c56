use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use corebridge::{
    BridgeConfig, GameSource, JoypadButton, Language, MemoryKind, Session, loader, registry,
};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Headless libretro core runner
#[derive(Parser, Debug)]
#[command(name = "corebridge")]
#[command(about = "Load a libretro core, run it headless, and move saves in and out", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: Level,

    /// Directory scanned for core modules; repeatable, searched in order
    #[arg(short = 'p', long = "core-path", global = true)]
    core_paths: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cores found in the search paths and linked into this binary
    List,
    /// Run a core for a number of frames
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Core module file, or a core name resolved through the search paths
    #[arg(short, long)]
    core: String,

    /// Content to load; omit to start cores that support running without content
    game: Option<PathBuf>,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 60)]
    frames: u64,

    /// Root for the system/ and saves/ directories
    #[arg(long)]
    root: Option<PathBuf>,

    /// Language reported to the core (en, ja, fr, ...)
    #[arg(long, default_value = "en")]
    language: Language,

    /// Button held on port 0 for the whole run (b, a, start, up, ...); repeatable
    #[arg(long = "hold")]
    held: Vec<String>,

    /// Save state restored before the first frame
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Where to write a save state after the last frame
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Battery save imported before the first frame
    #[arg(long)]
    load_sram: Option<PathBuf>,

    /// Where to write battery save RAM after the last frame
    #[arg(long)]
    save_sram: Option<PathBuf>,

    /// Write the last video frame as raw RGBA8888
    #[arg(long)]
    dump_frame: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::List => list_cores(&cli.core_paths),
        Command::Run(args) => run(&cli.core_paths, args),
    }
}

fn list_cores(search_paths: &[PathBuf]) -> Result<()> {
    registry::rescan(search_paths);
    let entries = registry::entries();
    if entries.is_empty() {
        println!("no cores found");
        return Ok(());
    }
    for entry in entries {
        let location = match entry.module_path() {
            Some(path) => path.display().to_string(),
            None => String::from("(static)"),
        };
        println!(
            "{:<20} {:<36} {:<24} {}",
            entry.id,
            entry.system,
            entry.extensions.join(","),
            location
        );
    }
    Ok(())
}

fn run(search_paths: &[PathBuf], args: RunArgs) -> Result<()> {
    let mut config = match &args.root {
        Some(root) => BridgeConfig::with_root(root),
        None => BridgeConfig::default(),
    }
    .with_language(args.language);
    config.core_search_paths = search_paths.to_vec();

    let held = args
        .held
        .iter()
        .map(|name| JoypadButton::from_name(name).with_context(|| format!("unknown button `{name}`")))
        .collect::<Result<Vec<_>>>()?;

    let mut session = Session::new(config)?;
    load_core(&mut session, &args.core, search_paths)?;

    match &args.game {
        Some(path) => session
            .load_game(GameSource::Path(path.clone()))
            .with_context(|| format!("loading {}", path.display()))?,
        None => session.load_no_game()?,
    }
    if let Some(av) = session.av_info() {
        info!(
            "{}x{} @ {:.2} fps, {} Hz audio, aspect {:.3}",
            av.geometry.base_width,
            av.geometry.base_height,
            av.timing.fps,
            av.timing.sample_rate,
            av.effective_aspect_ratio()
        );
    }
    if session.rotation() != 0 {
        info!("core asks for {} quarter turn(s) of rotation", session.rotation());
    }
    if let Some(level) = session.performance_level() {
        info!("core reports performance level {level}");
    }

    if let Some(path) = &args.load_sram {
        let n = session.load_memory_from(MemoryKind::SaveRam, path)?;
        info!("imported {n} bytes of save RAM from {}", path.display());
    }
    if let Some(path) = &args.load_state {
        session
            .load_state_from(path)
            .with_context(|| format!("restoring {}", path.display()))?;
        info!("restored state from {}", path.display());
    }

    for button in &held {
        session.set_input(0, *button, true);
    }

    let started = Instant::now();
    let mut last_frame = None;
    let mut audio_frames = 0usize;
    let mut duplicated = 0u64;
    for _ in 0..args.frames {
        let out = session.run_frame()?;
        audio_frames += out.audio_frames();
        if out.duplicated {
            duplicated += 1;
        }
        if out.video.is_some() {
            last_frame = out.video;
        }
        if session.shutdown_requested() {
            warn!("core requested shutdown after frame {}", out.frame_index);
            break;
        }
    }
    info!(
        "ran {} frames in {:.2?} ({audio_frames} audio frames, {duplicated} duplicated)",
        session.frame_count(),
        started.elapsed()
    );

    if let Some(path) = &args.dump_frame {
        let Some(frame) = &last_frame else {
            bail!("core produced no video frame to dump");
        };
        write_file(path, &frame.pixels)?;
        info!("wrote {}x{} RGBA frame to {}", frame.width, frame.height, path.display());
    }
    if let Some(path) = &args.save_state {
        let n = session
            .save_state_to(path)
            .with_context(|| format!("saving state to {}", path.display()))?;
        info!("wrote {n} byte state to {}", path.display());
    }
    if let Some(path) = &args.save_sram {
        if session.save_memory_to(MemoryKind::SaveRam, path)? {
            info!("wrote save RAM to {}", path.display());
        } else {
            warn!("core exposes no save RAM");
        }
    }

    session.unload_core()?;
    Ok(())
}

fn load_core(session: &mut Session, core: &str, search_paths: &[PathBuf]) -> Result<()> {
    let as_path = Path::new(core);
    if as_path.exists() {
        unsafe { session.load_core_from_path(as_path) }
            .with_context(|| format!("opening {}", as_path.display()))?;
        return Ok(());
    }

    if let Some(module) = loader::find_module(search_paths, core) {
        info!("using {} for `{core}`", module.path.display());
        unsafe { session.load_core_from_path(&module.path) }?;
        return Ok(());
    }

    unsafe { session.load_core_by_id(core) }.with_context(|| format!("resolving core `{core}`"))?;
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

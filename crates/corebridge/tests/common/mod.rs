#![allow(dead_code)]

pub mod stub_core;

use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use anyhow::{Context, Result};
use corebridge::{BridgeConfig, CoreApi, GameSource, Session, StaticCore};
use ctor::ctor;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// One bridge session per process: tests touching the stub core take this first.
static SERIAL: Mutex<()> = Mutex::new(());

#[ctor]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

/// Serializes the test and resets the stub core's switches.
pub fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    stub_core::reset();
    guard
}

/// A fresh directory under the system temp dir, unique to this process.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("corebridge-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

pub fn config(name: &str) -> BridgeConfig {
    BridgeConfig::with_root(scratch_dir(name))
}

/// A session with the stub core loaded but no game.
pub fn session_with(name: &str, core: StaticCore) -> Result<Session> {
    let mut session = Session::new(config(name)).context("creating session")?;
    session
        .load_core(Box::new(core) as Box<dyn CoreApi>)
        .context("loading stub core")?;
    Ok(session)
}

/// A session running the stub core with an in-memory game loaded.
pub fn running_session(name: &str) -> Result<Session> {
    let mut session = session_with(name, stub_core::core())?;
    session
        .load_game(GameSource::Memory {
            data: b"STUB-ROM".to_vec(),
            path_hint: Some(PathBuf::from("game.stub")),
        })
        .context("loading game")?;
    Ok(session)
}

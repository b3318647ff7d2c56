use std::{
    ffi::CString,
    fs,
    path::{Path, PathBuf},
    ptr, slice,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    callbacks::{self, CallbackSet, CallbackState, SharedState},
    config::BridgeConfig,
    environment::EnvironmentState,
    error::{Error, Result},
    frame::FrameOutput,
    input::{JoypadButton, JoypadMask},
    loader,
    memory::{MemoryKind, Region},
    pixel::PixelFormat,
    raw, registry,
    table::{AvInfo, CoreApi, CoreOrigin, SystemInfo},
    util::{path_to_cstring, string_to_cstring},
};

/// Where a [`Session`] is in the core/game lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unloaded,
    CoreLoaded,
    GameLoaded,
}

/// Content handed to `retro_load_game`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameSource {
    /// A file on disk. Read into memory unless the core asks for the path.
    Path(PathBuf),
    /// Bytes already in memory; `path_hint` is passed along for cores that
    /// look at the file name.
    Memory {
        data: Vec<u8>,
        path_hint: Option<PathBuf>,
    },
}

impl GameSource {
    fn label(&self) -> String {
        match self {
            GameSource::Path(path) => path.display().to_string(),
            GameSource::Memory {
                path_hint: Some(path),
                ..
            } => path.display().to_string(),
            GameSource::Memory { data, .. } => format!("<{} bytes>", data.len()),
        }
    }
}

/// Buffers referenced by a `retro_game_info`; kept until the game is unloaded.
#[derive(Debug)]
struct PreparedGame {
    path: Option<CString>,
    data: Option<Vec<u8>>,
}

impl PreparedGame {
    fn prepare(source: GameSource, need_fullpath: bool) -> Result<Self> {
        match source {
            GameSource::Path(path) => {
                let data = if need_fullpath {
                    None
                } else {
                    Some(fs::read(&path)?)
                };
                Ok(Self {
                    path: Some(path_to_cstring(&path)?),
                    data,
                })
            }
            GameSource::Memory { .. } if need_fullpath => Err(Error::PathRequired),
            GameSource::Memory { data, path_hint } => Ok(Self {
                path: path_hint.as_deref().map(path_to_cstring).transpose()?,
                data: Some(data),
            }),
        }
    }

    fn raw(&self) -> raw::retro_game_info {
        let (data, size) = match &self.data {
            Some(bytes) => (bytes.as_ptr().cast(), bytes.len()),
            None => (ptr::null(), 0),
        };
        raw::retro_game_info {
            path: self.path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
            data,
            size,
            meta: ptr::null(),
        }
    }
}

/// Drives one core through its lifecycle and exchanges frames, input and
/// persistence data with it.
///
/// Only one session may have a core loaded at a time in a process; a second
/// [`load_core`](Self::load_core) fails with [`Error::SessionBusy`] until the
/// first session unloads or is dropped.
pub struct Session {
    config: BridgeConfig,
    shared: SharedState,
    core: Option<Box<dyn CoreApi>>,
    state: SessionState,
    system_info: Option<SystemInfo>,
    av_info: Option<AvInfo>,
    games: Vec<PreparedGame>,
    frame_index: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("origin", &self.core.as_ref().map(|c| c.origin()))
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates the configured system and save directories and an idle session.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        fs::create_dir_all(&config.system_dir)?;
        fs::create_dir_all(&config.save_dir)?;
        let env = EnvironmentState::new(&config)?;

        Ok(Self {
            config,
            shared: Arc::new(Mutex::new(CallbackState::new(env))),
            core: None,
            state: SessionState::Unloaded,
            system_info: None,
            av_info: None,
            games: Vec::new(),
            frame_index: 0,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Binds callbacks, runs `retro_init` and reads the core's system info.
    pub fn load_core(&mut self, core: Box<dyn CoreApi>) -> Result<()> {
        if self.core.is_some() {
            return Err(Error::CoreAlreadyLoaded);
        }
        core.table().validate()?;

        let origin = core.origin();
        {
            let mut shared = self.shared.lock();
            shared.env.reset_for_core(origin.module_path())?;
            shared.input.clear();
            shared.sink.clear();
        }
        callbacks::claim(&self.shared)?;

        core.bind_callbacks(&CallbackSet::host());
        match core.api_version() {
            Some(raw::RETRO_API_VERSION) => {}
            Some(version) => warn!(
                "core reports API version {version}, host speaks {}",
                raw::RETRO_API_VERSION
            ),
            None => debug!("core does not export retro_api_version"),
        }
        core.init();

        let system_info = core.system_info();
        info!(
            "loaded core {} {} ({origin:?})",
            system_info.library_name, system_info.library_version
        );
        self.system_info = Some(system_info);
        self.core = Some(core);
        self.state = SessionState::CoreLoaded;
        Ok(())
    }

    /// Opens a dynamic module and loads it.
    ///
    /// # Safety
    /// See [`loader::load_dynamic`].
    pub unsafe fn load_core_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let core = unsafe { loader::load_dynamic(path) }?;
        self.load_core(Box::new(core))
    }

    /// Loads a core from the global registry.
    ///
    /// When the configuration names core search paths, the registry's dynamic
    /// entries are rescanned from them first.
    ///
    /// # Safety
    /// See [`registry::resolve`].
    pub unsafe fn load_core_by_id(&mut self, id: &str) -> Result<()> {
        if !self.config.core_search_paths.is_empty() {
            registry::rescan(&self.config.core_search_paths);
        }
        let core = unsafe { registry::resolve(id) }?;
        self.load_core(core)
    }

    fn core(&self) -> Result<&dyn CoreApi> {
        self.core.as_deref().ok_or(Error::NoCoreLoaded)
    }

    /// The loaded core, provided no game is loaded yet.
    fn idle_core(&self) -> Result<&dyn CoreApi> {
        match self.state {
            SessionState::Unloaded => Err(Error::NoCoreLoaded),
            SessionState::GameLoaded => Err(Error::GameAlreadyLoaded),
            SessionState::CoreLoaded => self.core(),
        }
    }

    fn running_core(&self) -> Result<&dyn CoreApi> {
        match self.state {
            SessionState::GameLoaded => self.core(),
            _ => Err(Error::NoGameLoaded),
        }
    }

    fn need_fullpath(&self) -> bool {
        self.system_info.as_ref().is_some_and(|i| i.need_fullpath)
    }

    /// Loads content, as a path or an in-memory buffer depending on what the
    /// core's `need_fullpath` asks for.
    pub fn load_game(&mut self, source: GameSource) -> Result<()> {
        let core = self.idle_core()?;
        let label = source.label();
        let game = PreparedGame::prepare(source, self.need_fullpath())?;

        let info = game.raw();
        debug!("loading game {label} ({} bytes)", info.size);
        if !core.load_game(Some(&info)) {
            return Err(Error::GameRejected(label));
        }
        self.finish_game_load(vec![game]);
        info!("loaded game {label}");
        Ok(())
    }

    /// Starts the core without content. Only allowed after the core sent
    /// `SET_SUPPORT_NO_GAME`.
    pub fn load_no_game(&mut self) -> Result<()> {
        let core = self.idle_core()?;
        if !self.shared.lock().env.support_no_game() {
            return Err(Error::NoGameUnsupported);
        }
        if !core.load_game(None) {
            return Err(Error::GameRejected(String::from("<no game>")));
        }
        self.finish_game_load(Vec::new());
        Ok(())
    }

    /// Loads multi-part content through `retro_load_game_special`.
    pub fn load_game_special(&mut self, game_type: u32, sources: Vec<GameSource>) -> Result<()> {
        let core = self.idle_core()?;
        if core.table().load_game_special.is_none() {
            return Err(Error::Unsupported("retro_load_game_special"));
        }

        let need_fullpath = self.need_fullpath();
        let labels: Vec<String> = sources.iter().map(GameSource::label).collect();
        let games = sources
            .into_iter()
            .map(|source| PreparedGame::prepare(source, need_fullpath))
            .collect::<Result<Vec<_>>>()?;
        let infos: Vec<raw::retro_game_info> = games.iter().map(PreparedGame::raw).collect();

        if core.load_game_special(game_type, &infos) != Some(true) {
            return Err(Error::GameRejected(labels.join(", ")));
        }
        self.finish_game_load(games);
        Ok(())
    }

    fn finish_game_load(&mut self, games: Vec<PreparedGame>) {
        self.games = games;
        self.av_info = self.core.as_deref().and_then(|core| core.av_info());
        {
            let mut shared = self.shared.lock();
            // Superseded by the av info queried just now.
            shared.env.take_av_update();
            shared.env.take_geometry_update();
            shared.sink.clear();
        }
        self.frame_index = 0;
        self.state = SessionState::GameLoaded;
    }

    /// Runs the core for exactly one frame and returns what it emitted.
    pub fn run_frame(&mut self) -> Result<FrameOutput> {
        self.running_core()?.run();

        let mut shared = self.shared.lock();
        let output = shared.sink.take(self.frame_index);
        if let Some(av) = shared.env.take_av_update() {
            self.av_info = Some(av);
        }
        if let (Some(geometry), Some(av)) =
            (shared.env.take_geometry_update(), self.av_info.as_mut())
        {
            av.geometry = geometry;
        }
        drop(shared);

        self.frame_index += 1;
        Ok(output)
    }

    /// Number of frames run since the current game was loaded.
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// Soft-resets the game. Returns `false` if the core has no `retro_reset`.
    pub fn reset(&mut self) -> Result<bool> {
        let reset = self.running_core()?.reset();
        self.shared.lock().input.clear();
        Ok(reset)
    }

    pub fn unload_game(&mut self) -> Result<()> {
        self.running_core()?.unload_game();
        self.games.clear();
        self.av_info = None;
        {
            let mut shared = self.shared.lock();
            shared.input.clear();
            shared.sink.clear();
        }
        self.state = SessionState::CoreLoaded;
        debug!("game unloaded");
        Ok(())
    }

    /// Unloads the game if one is loaded, then runs `retro_deinit` and frees
    /// the callback slot for other sessions.
    pub fn unload_core(&mut self) -> Result<()> {
        if self.core.is_none() {
            return Err(Error::NoCoreLoaded);
        }
        if self.state == SessionState::GameLoaded {
            self.unload_game()?;
        }
        if let Some(core) = self.core.take() {
            core.deinit();
            info!("core unloaded ({:?})", core.origin());
        }
        callbacks::release(&self.shared);
        self.shared.lock().input.clear();
        self.system_info = None;
        self.state = SessionState::Unloaded;
        Ok(())
    }

    /// Size the core currently needs for a save state. Queried on every call.
    pub fn save_state_size(&self) -> Result<usize> {
        Ok(self.core()?.serialize_size())
    }

    /// Serializes into a buffer of exactly [`save_state_size`](Self::save_state_size)
    /// bytes. A zero size with a game loaded counts as a failure.
    pub fn save_state(&self) -> Result<Vec<u8>> {
        let core = self.running_core()?;
        let size = core.serialize_size();
        if size == 0 {
            warn!("core reports a zero-sized save state");
            return Err(Error::SerializeFailed);
        }
        let mut buffer = vec![0u8; size];
        if !core.serialize(&mut buffer) {
            return Err(Error::SerializeFailed);
        }
        Ok(buffer)
    }

    /// Restores a blob produced by [`save_state`](Self::save_state).
    ///
    /// A failure may leave the emulated machine half-restored; callers
    /// should offer a reset.
    pub fn load_state(&mut self, state: &[u8]) -> Result<()> {
        let core = self.running_core()?;
        if !core.unserialize(state) {
            warn!("core rejected a {} byte save state", state.len());
            return Err(Error::UnserializeFailed);
        }
        Ok(())
    }

    pub fn save_state_to(&self, path: impl AsRef<Path>) -> Result<usize> {
        let state = self.save_state()?;
        fs::write(path.as_ref(), &state)?;
        debug!("wrote {} byte state to {}", state.len(), path.as_ref().display());
        Ok(state.len())
    }

    pub fn load_state_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let state = fs::read(path.as_ref())?;
        self.load_state(&state)
    }

    /// Copies a core memory region out, or `None` if the core does not expose it.
    pub fn memory(&self, kind: MemoryKind) -> Option<Vec<u8>> {
        let (ptr, len) = self.core.as_deref()?.memory_region(kind)?;
        Some(unsafe { slice::from_raw_parts(ptr.as_ptr(), len) }.to_vec())
    }

    /// Copies `bytes` into a core memory region, truncating to the region's
    /// size. Returns the number of bytes written.
    pub fn set_memory(&mut self, kind: MemoryKind, bytes: &[u8]) -> Result<usize> {
        let (ptr, len) = self
            .core()?
            .memory_region(kind)
            .ok_or(Error::MemoryUnavailable(kind))?;
        let count = bytes.len().min(len);
        if count < bytes.len() {
            warn!(
                "truncating {kind} write from {} to {count} bytes",
                bytes.len()
            );
        }
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), count) };
        Ok(count)
    }

    /// Writes a memory region to `path`. Returns `false` if the core has no
    /// such region; nothing is written then.
    pub fn save_memory_to(&self, kind: MemoryKind, path: impl AsRef<Path>) -> Result<bool> {
        let Some(bytes) = self.memory(kind) else {
            return Ok(false);
        };
        fs::write(path.as_ref(), &bytes)?;
        Ok(true)
    }

    pub fn load_memory_from(&mut self, kind: MemoryKind, path: impl AsRef<Path>) -> Result<usize> {
        let bytes = fs::read(path.as_ref())?;
        self.set_memory(kind, &bytes)
    }

    pub fn supports_cheats(&self) -> bool {
        self.core
            .as_deref()
            .is_some_and(|core| core.table().supports_cheats())
    }

    pub fn cheat_reset(&mut self) -> bool {
        self.core.as_deref().is_some_and(|core| core.cheat_reset())
    }

    /// Forwards a cheat code untouched. `Ok(false)` means cheats are unsupported.
    pub fn cheat_set(&mut self, index: u32, enabled: bool, code: &str) -> Result<bool> {
        let code = string_to_cstring(code)?;
        Ok(self
            .core
            .as_deref()
            .is_some_and(|core| core.cheat_set(index, enabled, &code)))
    }

    pub fn set_input(&mut self, port: usize, button: JoypadButton, pressed: bool) {
        self.shared.lock().input.set_button(port, button, pressed);
    }

    pub fn set_input_value(&mut self, port: usize, button: JoypadButton, value: i16) {
        self.shared.lock().input.set_button_value(port, button, value);
    }

    pub fn set_analog(&mut self, port: usize, stick: usize, axis: usize, value: i16) {
        self.shared.lock().input.set_analog(port, stick, axis, value);
    }

    pub fn clear_input(&mut self) {
        self.shared.lock().input.clear();
    }

    pub fn input_mask(&self, port: usize) -> JoypadMask {
        self.shared.lock().input.mask(port)
    }

    /// The answer the core would get from its input-state callback.
    pub fn input_state(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        self.shared.lock().input.query(port, device, index, id)
    }

    pub fn set_controller_port_device(&mut self, port: u32, device: u32) -> bool {
        self.core
            .as_deref()
            .is_some_and(|core| core.set_controller_port_device(port, device))
    }

    pub fn region(&self) -> Option<Region> {
        self.core.as_deref()?.region()
    }

    pub fn system_info(&self) -> Option<&SystemInfo> {
        self.system_info.as_ref()
    }

    pub fn av_info(&self) -> Option<&AvInfo> {
        self.av_info.as_ref()
    }

    pub fn origin(&self) -> Option<CoreOrigin> {
        self.core.as_deref().map(|core| core.origin())
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.shared.lock().env.pixel_format()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shared.lock().env.shutdown_requested()
    }

    pub fn last_message(&self) -> Option<String> {
        self.shared.lock().env.last_message().map(str::to_string)
    }

    pub fn input_bitmasks(&self) -> bool {
        self.shared.lock().env.input_bitmasks()
    }

    /// Screen rotation the core asked for, in 90 degree counter-clockwise steps.
    pub fn rotation(&self) -> u32 {
        self.shared.lock().env.rotation()
    }

    pub fn performance_level(&self) -> Option<u32> {
        self.shared.lock().env.performance_level()
    }

    pub fn supports_achievements(&self) -> bool {
        self.shared.lock().env.supports_achievements()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.core.is_none() {
            return;
        }
        if let Err(err) = self.unload_core() {
            warn!("failed to unload core on drop: {err}");
        }
    }
}

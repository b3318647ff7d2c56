use std::{
    ffi::{CStr, c_uint},
    path::{Path, PathBuf},
    ptr::NonNull,
};

use crate::{
    callbacks::CallbackSet,
    error::{Error, Result},
    memory::{MemoryKind, Region},
    raw,
    util::c_str_to_string,
};

/// Every entry point a libretro core exposes, as nullable C function pointers.
///
/// `init`, `deinit`, `run`, `load_game`, `unload_game`, `serialize_size`,
/// `serialize` and `unserialize` must be present for the table to be usable
/// (see [`validate`](Self::validate)); any other `None` means the capability
/// is unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreInterfaceTable {
    pub init: Option<raw::retro_init_fn>,
    pub deinit: Option<raw::retro_deinit_fn>,
    pub api_version: Option<raw::retro_api_version_fn>,
    pub get_system_info: Option<raw::retro_get_system_info_fn>,
    pub get_system_av_info: Option<raw::retro_get_system_av_info_fn>,
    pub set_environment: Option<raw::retro_set_environment_fn>,
    pub set_video_refresh: Option<raw::retro_set_video_refresh_fn>,
    pub set_audio_sample: Option<raw::retro_set_audio_sample_fn>,
    pub set_audio_sample_batch: Option<raw::retro_set_audio_sample_batch_fn>,
    pub set_input_poll: Option<raw::retro_set_input_poll_fn>,
    pub set_input_state: Option<raw::retro_set_input_state_fn>,
    pub set_controller_port_device: Option<raw::retro_set_controller_port_device_fn>,
    pub reset: Option<raw::retro_reset_fn>,
    pub run: Option<raw::retro_run_fn>,
    pub load_game: Option<raw::retro_load_game_fn>,
    pub load_game_special: Option<raw::retro_load_game_special_fn>,
    pub unload_game: Option<raw::retro_unload_game_fn>,
    pub get_region: Option<raw::retro_get_region_fn>,
    pub serialize_size: Option<raw::retro_serialize_size_fn>,
    pub serialize: Option<raw::retro_serialize_fn>,
    pub unserialize: Option<raw::retro_unserialize_fn>,
    pub get_memory_data: Option<raw::retro_get_memory_data_fn>,
    pub get_memory_size: Option<raw::retro_get_memory_size_fn>,
    pub cheat_reset: Option<raw::retro_cheat_reset_fn>,
    pub cheat_set: Option<raw::retro_cheat_set_fn>,
}

impl CoreInterfaceTable {
    /// Symbol names of the entries that must never be null.
    pub const REQUIRED: [&'static str; 8] = [
        "retro_init",
        "retro_deinit",
        "retro_run",
        "retro_load_game",
        "retro_unload_game",
        "retro_serialize_size",
        "retro_serialize",
        "retro_unserialize",
    ];

    /// Returns the first missing required entry, if any.
    pub fn validate(&self) -> Result<()> {
        let present = [
            self.init.is_some(),
            self.deinit.is_some(),
            self.run.is_some(),
            self.load_game.is_some(),
            self.unload_game.is_some(),
            self.serialize_size.is_some(),
            self.serialize.is_some(),
            self.unserialize.is_some(),
        ];
        match present.iter().position(|ok| !ok) {
            Some(idx) => Err(Error::IncompleteCore(Self::REQUIRED[idx])),
            None => Ok(()),
        }
    }

    pub fn supports_cheats(&self) -> bool {
        self.cheat_reset.is_some() && self.cheat_set.is_some()
    }
}

/// Metadata reported by `retro_get_system_info`, copied out of core memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    pub library_name: String,
    pub library_version: String,
    /// Pipe-delimited extension list exactly as the core reported it.
    pub valid_extensions: String,
    /// The core wants a filesystem path instead of an in-memory buffer.
    pub need_fullpath: bool,
    /// The host must not extract archives before handing them over.
    pub block_extract: bool,
}

impl SystemInfo {
    /// # Safety
    /// Every non-null string pointer in `info` must reference a NUL-terminated string.
    pub unsafe fn from_raw(info: &raw::retro_system_info) -> Self {
        unsafe {
            Self {
                library_name: c_str_to_string(info.library_name).unwrap_or_default(),
                library_version: c_str_to_string(info.library_version).unwrap_or_default(),
                valid_extensions: c_str_to_string(info.valid_extensions).unwrap_or_default(),
                need_fullpath: info.need_fullpath,
                block_extract: info.block_extract,
            }
        }
    }

    /// Lower-cased extensions without leading dots.
    pub fn extensions(&self) -> Vec<String> {
        split_extensions(&self.valid_extensions)
    }

    pub fn supports_extension(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.extensions().iter().any(|e| *e == ext)
    }
}

pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

pub(crate) fn split_extensions(list: &str) -> Vec<String> {
    list.split('|')
        .map(normalize_extension)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Matches `retro_game_geometry`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Zero or negative means "derive from base dimensions".
    pub aspect_ratio: f32,
}

impl From<raw::retro_game_geometry> for Geometry {
    fn from(g: raw::retro_game_geometry) -> Self {
        Self {
            base_width: g.base_width,
            base_height: g.base_height,
            max_width: g.max_width,
            max_height: g.max_height,
            aspect_ratio: g.aspect_ratio,
        }
    }
}

/// Matches `retro_system_timing`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    pub fps: f64,
    pub sample_rate: f64,
}

/// Audio/video parameters for the loaded game.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvInfo {
    pub geometry: Geometry,
    pub timing: Timing,
}

impl From<raw::retro_system_av_info> for AvInfo {
    fn from(av: raw::retro_system_av_info) -> Self {
        Self {
            geometry: av.geometry.into(),
            timing: Timing {
                fps: av.timing.fps,
                sample_rate: av.timing.sample_rate,
            },
        }
    }
}

impl AvInfo {
    pub fn effective_aspect_ratio(&self) -> f32 {
        let g = &self.geometry;
        if g.aspect_ratio > 0.0 {
            g.aspect_ratio
        } else if g.base_height > 0 {
            g.base_width as f32 / g.base_height as f32
        } else {
            1.0
        }
    }
}

/// Where a core's code came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreOrigin {
    /// Linked into this binary and registered under an identifier.
    Static { id: String },
    /// Opened from a dynamic module at runtime.
    Dynamic { path: PathBuf },
}

impl CoreOrigin {
    pub fn module_path(&self) -> Option<&Path> {
        match self {
            CoreOrigin::Static { .. } => None,
            CoreOrigin::Dynamic { path } => Some(path),
        }
    }
}

/// The operation set the bridge drives a core through.
///
/// Implementations only have to hand out their [`CoreInterfaceTable`]; the
/// provided methods null-check optional entries before calling them. Types
/// implementing this trait guarantee that every pointer in the table is a
/// valid libretro entry point for as long as the value lives.
pub trait CoreApi: Send {
    fn table(&self) -> &CoreInterfaceTable;

    fn origin(&self) -> CoreOrigin;

    /// Registers host callbacks. The environment callback goes first because
    /// cores may issue environment calls from inside the setter itself.
    fn bind_callbacks(&self, callbacks: &CallbackSet) {
        let t = self.table();
        unsafe {
            if let Some(f) = t.set_environment {
                f(callbacks.environment);
            }
            if let Some(f) = t.set_video_refresh {
                f(callbacks.video);
            }
            if let Some(f) = t.set_audio_sample {
                f(callbacks.audio_sample);
            }
            if let Some(f) = t.set_audio_sample_batch {
                f(callbacks.audio_batch);
            }
            if let Some(f) = t.set_input_poll {
                f(callbacks.input_poll);
            }
            if let Some(f) = t.set_input_state {
                f(callbacks.input_state);
            }
        }
    }

    fn init(&self) {
        if let Some(f) = self.table().init {
            unsafe { f() }
        }
    }

    fn deinit(&self) {
        if let Some(f) = self.table().deinit {
            unsafe { f() }
        }
    }

    fn api_version(&self) -> Option<u32> {
        self.table().api_version.map(|f| unsafe { f() })
    }

    fn system_info(&self) -> SystemInfo {
        let Some(f) = self.table().get_system_info else {
            return SystemInfo::default();
        };
        let mut info = raw::retro_system_info::default();
        unsafe {
            f(&mut info);
            SystemInfo::from_raw(&info)
        }
    }

    fn av_info(&self) -> Option<AvInfo> {
        let f = self.table().get_system_av_info?;
        let mut av = raw::retro_system_av_info::default();
        unsafe { f(&mut av) };
        Some(av.into())
    }

    fn reset(&self) -> bool {
        match self.table().reset {
            Some(f) => {
                unsafe { f() };
                true
            }
            None => false,
        }
    }

    fn run(&self) {
        if let Some(f) = self.table().run {
            unsafe { f() }
        }
    }

    /// `game` is `None` when starting without content.
    fn load_game(&self, game: Option<&raw::retro_game_info>) -> bool {
        let Some(f) = self.table().load_game else {
            return false;
        };
        let ptr = game.map_or(std::ptr::null(), |g| g as *const _);
        unsafe { f(ptr) }
    }

    /// Returns `None` when the core has no `retro_load_game_special`.
    fn load_game_special(&self, game_type: u32, games: &[raw::retro_game_info]) -> Option<bool> {
        let f = self.table().load_game_special?;
        Some(unsafe { f(game_type as c_uint, games.as_ptr(), games.len()) })
    }

    fn unload_game(&self) {
        if let Some(f) = self.table().unload_game {
            unsafe { f() }
        }
    }

    fn serialize_size(&self) -> usize {
        self.table().serialize_size.map_or(0, |f| unsafe { f() })
    }

    fn serialize(&self, dst: &mut [u8]) -> bool {
        match self.table().serialize {
            Some(f) => unsafe { f(dst.as_mut_ptr().cast(), dst.len()) },
            None => false,
        }
    }

    fn unserialize(&self, src: &[u8]) -> bool {
        match self.table().unserialize {
            Some(f) => unsafe { f(src.as_ptr().cast(), src.len()) },
            None => false,
        }
    }

    /// Pointer and length of a core-owned memory region, if it exists.
    fn memory_region(&self, kind: MemoryKind) -> Option<(NonNull<u8>, usize)> {
        let t = self.table();
        let (data, size) = (t.get_memory_data?, t.get_memory_size?);
        let len = unsafe { size(kind.id()) };
        if len == 0 {
            return None;
        }
        let ptr = NonNull::new(unsafe { data(kind.id()) }.cast::<u8>())?;
        Some((ptr, len))
    }

    fn cheat_reset(&self) -> bool {
        let t = self.table();
        match (t.cheat_reset, t.cheat_set) {
            (Some(f), Some(_)) => {
                unsafe { f() };
                true
            }
            _ => false,
        }
    }

    fn cheat_set(&self, index: u32, enabled: bool, code: &CStr) -> bool {
        let t = self.table();
        match (t.cheat_reset, t.cheat_set) {
            (Some(_), Some(f)) => {
                unsafe { f(index as c_uint, enabled, code.as_ptr()) };
                true
            }
            _ => false,
        }
    }

    fn set_controller_port_device(&self, port: u32, device: u32) -> bool {
        match self.table().set_controller_port_device {
            Some(f) => {
                unsafe { f(port as c_uint, device as c_uint) };
                true
            }
            None => false,
        }
    }

    fn region(&self) -> Option<Region> {
        let f = self.table().get_region?;
        Region::from_raw(unsafe { f() })
    }
}

/// A core linked into the binary, identified by its registry id.
#[derive(Debug, Clone)]
pub struct StaticCore {
    id: String,
    table: CoreInterfaceTable,
}

impl StaticCore {
    /// Wraps a table after checking its required entries.
    ///
    /// # Safety
    /// Every non-null pointer in `table` must be a libretro entry point with
    /// the matching C signature, valid for the rest of the process.
    pub unsafe fn new(id: impl Into<String>, table: CoreInterfaceTable) -> Result<Self> {
        table.validate()?;
        Ok(Self {
            id: id.into(),
            table,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl CoreApi for StaticCore {
    fn table(&self) -> &CoreInterfaceTable {
        &self.table
    }

    fn origin(&self) -> CoreOrigin {
        CoreOrigin::Static {
            id: self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn noop() {}
    unsafe extern "C" fn load(_: *const raw::retro_game_info) -> bool {
        true
    }
    unsafe extern "C" fn size() -> usize {
        0
    }
    unsafe extern "C" fn ser(_: *mut std::ffi::c_void, _: usize) -> bool {
        false
    }
    unsafe extern "C" fn unser(_: *const std::ffi::c_void, _: usize) -> bool {
        false
    }

    fn minimal() -> CoreInterfaceTable {
        CoreInterfaceTable {
            init: Some(noop),
            deinit: Some(noop),
            run: Some(noop),
            load_game: Some(load),
            unload_game: Some(noop),
            serialize_size: Some(size),
            serialize: Some(ser),
            unserialize: Some(unser),
            ..CoreInterfaceTable::default()
        }
    }

    #[test]
    fn validate_names_first_missing_entry() {
        assert!(minimal().validate().is_ok());

        let mut table = minimal();
        table.run = None;
        table.serialize = None;
        assert!(matches!(table.validate(), Err(Error::IncompleteCore("retro_run"))));

        assert!(matches!(
            CoreInterfaceTable::default().validate(),
            Err(Error::IncompleteCore("retro_init"))
        ));
    }

    #[test]
    fn optional_entries_report_unsupported() {
        let core = unsafe { StaticCore::new("minimal", minimal()) }.unwrap();
        assert!(!core.table().supports_cheats());
        assert!(!core.cheat_reset());
        assert!(!core.reset());
        assert!(core.memory_region(MemoryKind::SaveRam).is_none());
        assert_eq!(core.region(), None);
        assert_eq!(core.api_version(), None);
        assert_eq!(core.system_info(), SystemInfo::default());
        assert!(core.av_info().is_none());
        assert_eq!(core.load_game_special(1, &[]), None);
        assert_eq!(
            core.origin(),
            CoreOrigin::Static {
                id: "minimal".into()
            }
        );
    }

    #[test]
    fn extensions_are_normalized() {
        let info = SystemInfo {
            valid_extensions: "NES|.fds||unf".into(),
            ..SystemInfo::default()
        };
        assert_eq!(info.extensions(), vec!["nes", "fds", "unf"]);
        assert!(info.supports_extension(".FDS"));
        assert!(!info.supports_extension("gba"));
    }

    #[test]
    fn aspect_ratio_falls_back_to_base_dimensions() {
        let mut av = AvInfo::default();
        av.geometry.base_width = 320;
        av.geometry.base_height = 240;
        assert!((av.effective_aspect_ratio() - 4.0 / 3.0).abs() < f32::EPSILON);
        av.geometry.aspect_ratio = 1.5;
        assert_eq!(av.effective_aspect_ratio(), 1.5);
    }
}

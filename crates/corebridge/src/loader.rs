//! Resolving cores: dynamic modules opened at runtime, compiled-in tables
//! looked up by identifier, and discovery of module files on disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use libloading::Library;
use tracing::{debug, info, trace};

use crate::{
    catalog,
    error::{Error, Result},
    registry,
    table::{CoreApi, CoreInterfaceTable, CoreOrigin, StaticCore},
};

/// File extensions of loadable modules across platforms.
pub const MODULE_EXTENSIONS: [&str; 3] = ["so", "dylib", "dll"];
/// Directory extension of bundle-packaged modules.
pub const FRAMEWORK_EXTENSION: &str = "framework";
/// Suffix upstream packaging appends to a core's logical name.
pub const MODULE_SUFFIX: &str = "_libretro";

/// A core opened from a dynamic module.
///
/// The module stays mapped for as long as this value lives; dropping it
/// unloads the code the table points into.
pub struct DynamicCore {
    table: CoreInterfaceTable,
    path: PathBuf,
    _library: Library,
}

impl std::fmt::Debug for DynamicCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicCore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DynamicCore {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoreApi for DynamicCore {
    fn table(&self) -> &CoreInterfaceTable {
        &self.table
    }

    fn origin(&self) -> CoreOrigin {
        CoreOrigin::Dynamic {
            path: self.path.clone(),
        }
    }
}

unsafe fn optional<T: Copy>(library: &Library, name: &str) -> Option<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.ok()?;
    Some(*symbol)
}

unsafe fn required<T: Copy>(library: &Library, name: &'static str) -> Result<Option<T>> {
    match unsafe { optional::<T>(library, name) } {
        Some(f) => Ok(Some(f)),
        None => Err(Error::SymbolMissing(name)),
    }
}

/// Opens the module at `path` and binds every `retro_*` symbol by exact name.
///
/// Bundle directories (`Foo.framework`) are resolved to the binary inside.
/// `retro_init` is not called.
///
/// # Safety
/// Opening a module runs its initializers, and the symbols found are trusted
/// to have libretro's C signatures.
pub unsafe fn load_dynamic(path: impl AsRef<Path>) -> Result<DynamicCore> {
    let requested = path.as_ref();
    let module = resolve_module_path(requested);
    debug!("opening core module {}", module.display());

    let library = unsafe { Library::new(&module) }.map_err(|err| Error::OpenFailed {
        path: requested.to_path_buf(),
        reason: err.to_string(),
    })?;

    let table = unsafe {
        let lib = &library;
        CoreInterfaceTable {
            init: required(lib, "retro_init")?,
            deinit: required(lib, "retro_deinit")?,
            run: required(lib, "retro_run")?,
            load_game: required(lib, "retro_load_game")?,
            unload_game: required(lib, "retro_unload_game")?,
            serialize_size: required(lib, "retro_serialize_size")?,
            serialize: required(lib, "retro_serialize")?,
            unserialize: required(lib, "retro_unserialize")?,
            api_version: optional(lib, "retro_api_version"),
            get_system_info: optional(lib, "retro_get_system_info"),
            get_system_av_info: optional(lib, "retro_get_system_av_info"),
            set_environment: optional(lib, "retro_set_environment"),
            set_video_refresh: optional(lib, "retro_set_video_refresh"),
            set_audio_sample: optional(lib, "retro_set_audio_sample"),
            set_audio_sample_batch: optional(lib, "retro_set_audio_sample_batch"),
            set_input_poll: optional(lib, "retro_set_input_poll"),
            set_input_state: optional(lib, "retro_set_input_state"),
            set_controller_port_device: optional(lib, "retro_set_controller_port_device"),
            reset: optional(lib, "retro_reset"),
            load_game_special: optional(lib, "retro_load_game_special"),
            get_region: optional(lib, "retro_get_region"),
            get_memory_data: optional(lib, "retro_get_memory_data"),
            get_memory_size: optional(lib, "retro_get_memory_size"),
            cheat_reset: optional(lib, "retro_cheat_reset"),
            cheat_set: optional(lib, "retro_cheat_set"),
        }
    };

    info!("bound core module {}", module.display());
    Ok(DynamicCore {
        table,
        path: requested.to_path_buf(),
        _library: library,
    })
}

/// Looks up a compiled-in core by identifier.
pub fn load_static(id: &str) -> Result<StaticCore> {
    registry::static_table(id).ok_or_else(|| Error::CoreNotFound(id.to_string()))
}

/// Maps a `Foo.framework` bundle to the binary inside it; other paths pass through.
pub fn resolve_module_path(path: &Path) -> PathBuf {
    let is_bundle = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAMEWORK_EXTENSION));
    if !is_bundle || !path.is_dir() {
        return path.to_path_buf();
    }
    let Some(stem) = path.file_stem() else {
        return path.to_path_buf();
    };

    let candidates = [
        path.join(stem),
        path.join("Versions").join("Current").join(stem),
        path.join("Versions").join("A").join(stem),
    ];
    candidates
        .iter()
        .find(|c| c.is_file())
        .cloned()
        .unwrap_or_else(|| path.join(stem))
}

/// Folds case and punctuation so vendor spellings of one core compare equal.
///
/// `-`, `.` and whitespace become `_`; a trailing `_libretro` is removed.
pub fn normalize_core_name(name: &str) -> String {
    let mut folded = fold_punctuation(name);
    if folded.ends_with(MODULE_SUFFIX) {
        folded.truncate(folded.len() - MODULE_SUFFIX.len());
    }
    folded
}

fn fold_punctuation(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c if c.is_whitespace() => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Logical core name for a module file stem, or `None` if the file is not a core.
///
/// `<name>_libretro` stems always name a core. Bare stems, with or without a
/// `lib` prefix, only count when the [`catalog`] knows the name; search paths
/// routinely hold unrelated shared libraries.
pub fn core_name_for_module(module_name: &str) -> Option<String> {
    let folded = fold_punctuation(module_name);
    if let Some(name) = folded.strip_suffix(MODULE_SUFFIX) {
        return (!name.is_empty()).then(|| name.to_string());
    }
    catalog::lookup(&folded)
        .or_else(|| folded.strip_prefix("lib").and_then(catalog::lookup))
        .map(|core| core.name.to_string())
}

/// Exact, lower-cased and punctuation-normalized spellings of a core name.
pub fn name_variants(name: &str) -> [String; 3] {
    [
        name.to_string(),
        name.to_lowercase(),
        normalize_core_name(name),
    ]
}

/// Whether a module's name refers to the logical core `logical`.
pub fn module_matches(module: &str, logical: &str) -> bool {
    let wanted = name_variants(logical);
    name_variants(module).iter().any(|v| wanted.contains(v))
}

/// A module file found by [`discover_dynamic_modules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    /// File name without extension, e.g. `mgba_libretro`.
    pub module_name: String,
    /// Normalized logical core name, e.g. `mgba`.
    pub logical_name: String,
    pub path: PathBuf,
}

fn module_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let is_module = if ext == FRAMEWORK_EXTENSION {
        path.is_dir()
    } else {
        MODULE_EXTENSIONS.contains(&ext.as_str()) && path.is_file()
    };
    if !is_module {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

/// Lists core modules in `search_paths`, in search-path order and then by
/// file name within each directory. Missing directories are skipped, as are
/// libraries [`core_name_for_module`] does not accept.
pub fn discover_dynamic_modules<P: AsRef<Path>>(search_paths: &[P]) -> Vec<DiscoveredModule> {
    let mut found = Vec::new();
    for dir in search_paths {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("skipping core search path {}: {err}", dir.display());
                continue;
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();

        for path in paths {
            let Some(module_name) = module_name(&path) else {
                continue;
            };
            let Some(logical_name) = core_name_for_module(&module_name) else {
                trace!("ignoring non-core library {}", path.display());
                continue;
            };
            trace!("discovered core module {module_name} at {}", path.display());
            found.push(DiscoveredModule {
                module_name,
                logical_name,
                path,
            });
        }
    }
    found
}

/// First module in search order whose name matches `logical`.
pub fn find_module<P: AsRef<Path>>(search_paths: &[P], logical: &str) -> Option<DiscoveredModule> {
    discover_dynamic_modules(search_paths)
        .into_iter()
        .find(|m| module_matches(&m.logical_name, logical) || module_matches(&m.module_name, logical))
}

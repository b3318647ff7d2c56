//! Process-wide catalogue of the cores this host can run.
//!
//! Static entries come from tables compiled into the binary (see `build.rs`)
//! or registered at start-up; dynamic entries come from the last
//! [`rescan`] of the module search paths. Lookups prefer dynamic entries.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    catalog,
    error::{Error, Result},
    loader::{self, DiscoveredModule, module_matches},
    table::{CoreApi, CoreInterfaceTable, StaticCore, normalize_extension},
};

mod builtin {
    include!(concat!(env!("OUT_DIR"), "/static_cores.rs"));
}

/// Where a registered core's code lives.
#[derive(Debug, Clone)]
pub enum CoreSource {
    Static(CoreInterfaceTable),
    Dynamic(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CoreEntry {
    pub id: String,
    pub system: String,
    /// Lower-case, without leading dots.
    pub extensions: Vec<String>,
    pub source: CoreSource,
}

impl CoreEntry {
    fn describe(id: &str, source: CoreSource) -> Self {
        let (system, extensions) = match catalog::lookup(id) {
            Some(known) => (
                known.system.to_string(),
                known.extensions.iter().map(|e| e.to_string()).collect(),
            ),
            None => (String::from("unknown"), Vec::new()),
        };
        Self {
            id: id.to_string(),
            system,
            extensions,
            source,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.source, CoreSource::Static(_))
    }

    pub fn module_path(&self) -> Option<&Path> {
        match &self.source {
            CoreSource::Dynamic(path) => Some(path),
            CoreSource::Static(_) => None,
        }
    }

    pub fn supports_extension(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.extensions.iter().any(|e| *e == ext)
    }
}

#[derive(Debug, Default)]
pub struct CoreRegistry {
    static_entries: Vec<CoreEntry>,
    dynamic_entries: Vec<CoreEntry>,
}

impl CoreRegistry {
    /// A registry seeded with the tables linked in at build time.
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        for (id, table) in builtin::builtin_cores() {
            match table.validate() {
                Ok(()) => {
                    debug!("registered built-in core {id}");
                    registry.insert_static(CoreEntry::describe(id, CoreSource::Static(table)));
                }
                Err(err) => warn!("skipping built-in core {id}: {err}"),
            }
        }
        registry
    }

    fn insert_static(&mut self, entry: CoreEntry) {
        match self.static_entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.static_entries.push(entry),
        }
    }

    /// Adds or replaces a static entry.
    ///
    /// # Safety
    /// Every non-null pointer in `table` must be a libretro entry point with
    /// the matching C signature, valid for the rest of the process.
    pub unsafe fn register_static(
        &mut self,
        id: &str,
        system: &str,
        extensions: &[&str],
        table: CoreInterfaceTable,
    ) -> Result<()> {
        table.validate()?;
        self.insert_static(CoreEntry {
            id: id.to_string(),
            system: system.to_string(),
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
            source: CoreSource::Static(table),
        });
        Ok(())
    }

    /// Replaces the dynamic entries with `modules`. When two modules share a
    /// logical name the first one wins.
    pub fn set_dynamic(&mut self, modules: Vec<DiscoveredModule>) {
        let mut entries: Vec<CoreEntry> = Vec::with_capacity(modules.len());
        for module in modules {
            if entries.iter().any(|e| e.id == module.logical_name) {
                debug!(
                    "ignoring {}: {} already registered",
                    module.path.display(),
                    module.logical_name
                );
                continue;
            }
            entries.push(CoreEntry::describe(
                &module.logical_name,
                CoreSource::Dynamic(module.path),
            ));
        }
        self.dynamic_entries = entries;
    }

    pub fn find(&self, id: &str) -> Option<&CoreEntry> {
        self.iter().find(|e| module_matches(&e.id, id))
    }

    /// First entry claiming `ext`, dynamic entries first.
    pub fn find_by_extension(&self, ext: &str) -> Option<&CoreEntry> {
        self.iter().find(|e| e.supports_extension(ext))
    }

    /// Dynamic entries, then static ones.
    pub fn iter(&self) -> impl Iterator<Item = &CoreEntry> {
        self.dynamic_entries.iter().chain(&self.static_entries)
    }

    pub fn static_core(&self, id: &str) -> Option<StaticCore> {
        let entry = self
            .static_entries
            .iter()
            .find(|e| module_matches(&e.id, id))?;
        let CoreSource::Static(table) = entry.source else {
            return None;
        };
        // Validated on the way in.
        unsafe { StaticCore::new(entry.id.clone(), table) }.ok()
    }
}

static REGISTRY: Lazy<RwLock<CoreRegistry>> = Lazy::new(|| RwLock::new(CoreRegistry::with_builtin()));

/// Adds a statically linked core to the global registry.
///
/// # Safety
/// See [`CoreRegistry::register_static`].
pub unsafe fn register_static(
    id: &str,
    system: &str,
    extensions: &[&str],
    table: CoreInterfaceTable,
) -> Result<()> {
    unsafe { REGISTRY.write().register_static(id, system, extensions, table) }
}

/// Rediscovers dynamic modules under `search_paths`, replacing the previous
/// scan. Returns the number of dynamic entries now registered.
pub fn rescan<P: AsRef<Path>>(search_paths: &[P]) -> usize {
    let modules = loader::discover_dynamic_modules(search_paths);
    let mut registry = REGISTRY.write();
    registry.set_dynamic(modules);
    let count = registry.dynamic_entries.len();
    info!("found {count} dynamic core(s)");
    count
}

pub fn find(id: &str) -> Option<CoreEntry> {
    REGISTRY.read().find(id).cloned()
}

pub fn find_by_extension(ext: &str) -> Option<CoreEntry> {
    REGISTRY.read().find_by_extension(ext).cloned()
}

pub fn entries() -> Vec<CoreEntry> {
    REGISTRY.read().iter().cloned().collect()
}

pub(crate) fn static_table(id: &str) -> Option<StaticCore> {
    REGISTRY.read().static_core(id)
}

/// Opens the core registered under `id`.
///
/// # Safety
/// Dynamic entries are opened with [`loader::load_dynamic`], whose contract applies.
pub unsafe fn resolve(id: &str) -> Result<Box<dyn CoreApi>> {
    let entry = find(id).ok_or_else(|| Error::CoreNotFound(id.to_string()))?;
    match entry.source {
        CoreSource::Static(table) => {
            let core = unsafe { StaticCore::new(entry.id, table) }?;
            Ok(Box::new(core))
        }
        CoreSource::Dynamic(path) => {
            let core = unsafe { loader::load_dynamic(&path) }?;
            Ok(Box::new(core))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw;

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

    fn table() -> CoreInterfaceTable {
        CoreInterfaceTable {
            init: Some(noop),
            deinit: Some(noop),
            run: Some(noop),
            load_game: Some(load),
            unload_game: Some(noop),
            serialize_size: Some(size),
            serialize: Some(ser),
            unserialize: Some(unser),
            ..Default::default()
        }
    }

    fn module(name: &str, path: &str) -> DiscoveredModule {
        DiscoveredModule {
            module_name: format!("{name}_libretro"),
            logical_name: name.to_string(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn dynamic_entries_take_priority() {
        let mut registry = CoreRegistry::default();
        unsafe { registry.register_static("mgba", "Game Boy Advance", &["gba"], table()) }.unwrap();
        assert!(registry.find("mgba").unwrap().is_static());

        registry.set_dynamic(vec![module("mgba", "/cores/mgba_libretro.so")]);
        let entry = registry.find("mGBA").unwrap();
        assert_eq!(entry.module_path(), Some(Path::new("/cores/mgba_libretro.so")));
        // The static table is still reachable through the static path.
        assert!(registry.static_core("mgba").is_some());
    }

    #[test]
    fn first_discovered_module_wins() {
        let mut registry = CoreRegistry::default();
        registry.set_dynamic(vec![
            module("gambatte", "/a/gambatte_libretro.so"),
            module("gambatte", "/b/gambatte_libretro.so"),
        ]);
        assert_eq!(registry.iter().count(), 1);
        assert_eq!(
            registry.find("gambatte").and_then(CoreEntry::module_path),
            Some(Path::new("/a/gambatte_libretro.so"))
        );
    }

    #[test]
    fn extension_lookup_is_tolerant_and_ordered() {
        let mut registry = CoreRegistry::default();
        unsafe { registry.register_static("fceumm", "NES", &[".NES", "fds"], table()) }.unwrap();
        registry.set_dynamic(vec![module("gambatte", "/cores/gambatte_libretro.so")]);

        assert_eq!(registry.find_by_extension(".nes").map(|e| e.id.as_str()), Some("fceumm"));
        assert_eq!(registry.find_by_extension("GBC").map(|e| e.id.as_str()), Some("gambatte"));
        assert!(registry.find_by_extension("iso").is_none());

        unsafe { registry.register_static("sameboy", "Game Boy", &["gb"], table()) }.unwrap();
        // gambatte (dynamic) claims `gb` first.
        assert_eq!(registry.find_by_extension("gb").map(|e| e.id.as_str()), Some("gambatte"));
    }

    #[test]
    fn incomplete_tables_are_refused() {
        let mut registry = CoreRegistry::default();
        let mut broken = table();
        broken.run = None;
        let err = unsafe { registry.register_static("broken", "", &[], broken) }.unwrap_err();
        assert!(matches!(err, Error::IncompleteCore("retro_run")));
        assert!(registry.find("broken").is_none());
    }

    #[test]
    fn unknown_modules_get_placeholder_description() {
        let mut registry = CoreRegistry::default();
        registry.set_dynamic(vec![module("homebrew", "/cores/homebrew_libretro.so")]);
        let entry = registry.find("homebrew").unwrap();
        assert_eq!(entry.system, "unknown");
        assert!(entry.extensions.is_empty());
    }
}

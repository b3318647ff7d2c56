//! Descriptions of the cores the bridge knows by name.
//!
//! Used to label discovered modules and built-in tables before any of them
//! is opened; a core's own `retro_get_system_info` remains authoritative once
//! it is loaded.

use crate::loader::normalize_core_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownCore {
    /// Normalized logical name, as produced by [`normalize_core_name`].
    pub name: &'static str,
    /// Human readable system the core emulates.
    pub system: &'static str,
    pub extensions: &'static [&'static str],
}

pub const KNOWN_CORES: &[KnownCore] = &[
    KnownCore {
        name: "fceumm",
        system: "Nintendo Entertainment System",
        extensions: &["nes", "fds", "unf", "unif"],
    },
    KnownCore {
        name: "nestopia",
        system: "Nintendo Entertainment System",
        extensions: &["nes", "fds"],
    },
    KnownCore {
        name: "gambatte",
        system: "Game Boy / Game Boy Color",
        extensions: &["gb", "gbc", "dmg"],
    },
    KnownCore {
        name: "mgba",
        system: "Game Boy Advance",
        extensions: &["gba", "gb", "gbc", "sgb"],
    },
    KnownCore {
        name: "clownmdemu",
        system: "Sega Genesis / Mega Drive",
        extensions: &["md", "gen", "bin", "smd"],
    },
    KnownCore {
        name: "genesis_plus_gx",
        system: "Sega Genesis / Mega Drive",
        extensions: &["md", "gen", "bin", "smd", "sms", "gg", "sg"],
    },
    KnownCore {
        name: "melonds",
        system: "Nintendo DS",
        extensions: &["nds", "dsi"],
    },
    KnownCore {
        name: "mupen64plus_next",
        system: "Nintendo 64",
        extensions: &["n64", "v64", "z64"],
    },
    KnownCore {
        name: "pcsx_rearmed",
        system: "Sony PlayStation",
        extensions: &["bin", "cue", "img", "iso", "chd", "pbp"],
    },
    KnownCore {
        name: "bsnes",
        system: "Super Nintendo Entertainment System",
        extensions: &["sfc", "smc"],
    },
    KnownCore {
        name: "snes9x",
        system: "Super Nintendo Entertainment System",
        extensions: &["sfc", "smc", "fig", "swc"],
    },
];

/// Looks up a core by any spelling of its name (`mGBA`, `mgba_libretro`, ...).
pub fn lookup(name: &str) -> Option<&'static KnownCore> {
    let wanted = normalize_core_name(name);
    KNOWN_CORES.iter().find(|core| core.name == wanted)
}

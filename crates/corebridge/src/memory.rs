//! Typed views over the memory regions and region codes a core exposes.

use core::fmt;
use std::ffi::c_uint;

use crate::raw;

/// Memory region selector for `retro_get_memory_data` / `retro_get_memory_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryKind {
    /// Battery-backed cartridge RAM.
    SaveRam,
    /// Real-time clock state.
    Rtc,
    SystemRam,
    VideoRam,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 4] = [
        MemoryKind::SaveRam,
        MemoryKind::Rtc,
        MemoryKind::SystemRam,
        MemoryKind::VideoRam,
    ];

    pub const fn id(self) -> c_uint {
        match self {
            MemoryKind::SaveRam => raw::RETRO_MEMORY_SAVE_RAM,
            MemoryKind::Rtc => raw::RETRO_MEMORY_RTC,
            MemoryKind::SystemRam => raw::RETRO_MEMORY_SYSTEM_RAM,
            MemoryKind::VideoRam => raw::RETRO_MEMORY_VIDEO_RAM,
        }
    }

    /// File extension conventionally used when the region is persisted.
    pub const fn file_extension(self) -> &'static str {
        match self {
            MemoryKind::SaveRam => "srm",
            MemoryKind::Rtc => "rtc",
            MemoryKind::SystemRam => "ram",
            MemoryKind::VideoRam => "vram",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryKind::SaveRam => "save-ram",
            MemoryKind::Rtc => "rtc",
            MemoryKind::SystemRam => "system-ram",
            MemoryKind::VideoRam => "video-ram",
        };
        f.write_str(s)
    }
}

/// Television standard reported by `retro_get_region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    pub fn from_raw(value: c_uint) -> Option<Self> {
        match value {
            raw::RETRO_REGION_NTSC => Some(Region::Ntsc),
            raw::RETRO_REGION_PAL => Some(Region::Pal),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Ntsc => "ntsc",
            Region::Pal => "pal",
        };
        f.write_str(s)
    }
}

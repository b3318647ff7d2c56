#![doc = include_str!("../README.md")]

pub mod callbacks;
pub mod catalog;
pub mod config;
pub mod environment;
pub mod error;
pub mod frame;
pub mod input;
pub mod loader;
pub mod memory;
pub mod pixel;
pub mod registry;
pub mod session;
pub mod table;
mod util;

/// Raw bindings for `libretro.h`. Generated via `bindgen` in `build.rs`, along
/// with the `retro_*_fn` entry point pointer types.
#[allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code)]
pub mod raw {
    include!(concat!(env!("OUT_DIR"), "/libretro_bindings.rs"));
    include!(concat!(env!("OUT_DIR"), "/entry_points.rs"));
}

pub use crate::callbacks::CallbackSet;
pub use crate::config::{BridgeConfig, Language};
pub use crate::error::{Error, Result};
pub use crate::frame::{FrameOutput, VideoFrame};
pub use crate::input::{InputState, JoypadButton, JoypadMask};
pub use crate::loader::{DiscoveredModule, DynamicCore, discover_dynamic_modules, load_dynamic, load_static};
pub use crate::memory::{MemoryKind, Region};
pub use crate::pixel::PixelFormat;
pub use crate::registry::{CoreEntry, CoreSource};
pub use crate::session::{GameSource, Session, SessionState};
pub use crate::table::{
    AvInfo, CoreApi, CoreInterfaceTable, CoreOrigin, Geometry, StaticCore, SystemInfo, Timing,
};

#[cfg(test)]
mod tests {
    use ctor::ctor;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[ctor]
    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .pretty()
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
    }
}

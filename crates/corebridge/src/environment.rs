//! Answers to `retro_environment_t` calls.
//!
//! Every string handed to the core is owned here, so pointers returned by
//! `GET_*_DIRECTORY` and friends stay valid until the session is torn down.

use std::{
    ffi::{CString, c_char, c_int, c_uint, c_void},
    path::Path,
    ptr,
};

use tracing::{debug, info, trace, warn};

use crate::{
    config::{BridgeConfig, Language},
    error::Result,
    pixel::PixelFormat,
    raw,
    table::{AvInfo, Geometry},
    util::{c_str_to_string, path_to_cstring, string_to_cstring, trim_dir},
};

/// `GET_AUDIO_VIDEO_ENABLE` answer: bit 0 video, bit 1 audio.
const AUDIO_VIDEO_ENABLED: c_int = 0b11;

/// Capabilities negotiated with the current core plus the host values it can query.
#[derive(Debug)]
pub struct EnvironmentState {
    system_dir: CString,
    save_dir: CString,
    core_assets_dir: CString,
    username: CString,
    libretro_path: Option<CString>,
    language: Language,
    max_users: u32,
    target_refresh_rate: f32,

    pixel_format: PixelFormat,
    support_no_game: bool,
    input_bitmasks: bool,
    shutdown_requested: bool,
    performance_level: Option<u32>,
    supports_achievements: bool,
    rotation: u32,
    av_update: Option<AvInfo>,
    geometry_update: Option<Geometry>,
    last_message: Option<String>,
}

impl EnvironmentState {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let system_dir = trim_dir(&config.system_dir);
        let assets_dir = config
            .core_assets_dir
            .as_deref()
            .map(trim_dir)
            .unwrap_or_else(|| system_dir.clone());

        Ok(Self {
            system_dir: path_to_cstring(&system_dir)?,
            save_dir: path_to_cstring(&trim_dir(&config.save_dir))?,
            core_assets_dir: path_to_cstring(&assets_dir)?,
            username: string_to_cstring(&config.username)?,
            libretro_path: None,
            language: config.language,
            max_users: config.max_users,
            target_refresh_rate: config.target_refresh_rate,
            pixel_format: PixelFormat::default(),
            support_no_game: false,
            input_bitmasks: false,
            shutdown_requested: false,
            performance_level: None,
            supports_achievements: false,
            rotation: 0,
            av_update: None,
            geometry_update: None,
            last_message: None,
        })
    }

    /// Forgets everything negotiated with the previous core.
    ///
    /// `module_path` is reported for `GET_LIBRETRO_PATH`; static cores pass `None`.
    pub fn reset_for_core(&mut self, module_path: Option<&Path>) -> Result<()> {
        self.libretro_path = module_path.map(path_to_cstring).transpose()?;
        self.pixel_format = PixelFormat::default();
        self.support_no_game = false;
        self.input_bitmasks = false;
        self.shutdown_requested = false;
        self.performance_level = None;
        self.supports_achievements = false;
        self.rotation = 0;
        self.av_update = None;
        self.geometry_update = None;
        self.last_message = None;
        Ok(())
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn support_no_game(&self) -> bool {
        self.support_no_game
    }

    pub fn input_bitmasks(&self) -> bool {
        self.input_bitmasks
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn performance_level(&self) -> Option<u32> {
        self.performance_level
    }

    pub fn supports_achievements(&self) -> bool {
        self.supports_achievements
    }

    /// Requested screen rotation in quarter turns counter-clockwise.
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub(crate) fn take_av_update(&mut self) -> Option<AvInfo> {
        self.av_update.take()
    }

    pub(crate) fn take_geometry_update(&mut self) -> Option<Geometry> {
        self.geometry_update.take()
    }

    /// Handles one environment command. Returns `false` for anything the
    /// bridge does not implement, leaving negotiated state untouched.
    ///
    /// # Safety
    /// `data` must be null or point to the payload type libretro defines for `cmd`.
    pub unsafe fn handle(&mut self, cmd: c_uint, data: *mut c_void) -> bool {
        let cmd = cmd & !raw::RETRO_ENVIRONMENT_EXPERIMENTAL;
        if cmd & raw::RETRO_ENVIRONMENT_PRIVATE != 0 {
            trace!("ignoring private environment command {cmd:#x}");
            return false;
        }

        unsafe {
            match cmd {
                raw::RETRO_ENVIRONMENT_SET_PIXEL_FORMAT => {
                    let Some(value) = read::<c_uint>(data) else {
                        return false;
                    };
                    match PixelFormat::from_raw(value) {
                        Some(format) => {
                            debug!("core selected pixel format {format}");
                            self.pixel_format = format;
                            true
                        }
                        None => {
                            warn!("core requested unknown pixel format {value}");
                            false
                        }
                    }
                }
                raw::RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY => {
                    write(data, self.system_dir.as_ptr())
                }
                raw::RETRO_ENVIRONMENT_GET_SAVE_DIRECTORY => write(data, self.save_dir.as_ptr()),
                raw::RETRO_ENVIRONMENT_GET_CORE_ASSETS_DIRECTORY => {
                    write(data, self.core_assets_dir.as_ptr())
                }
                raw::RETRO_ENVIRONMENT_GET_USERNAME => write(data, self.username.as_ptr()),
                raw::RETRO_ENVIRONMENT_GET_LIBRETRO_PATH => match &self.libretro_path {
                    Some(path) => write(data, path.as_ptr()),
                    None => {
                        write::<*const c_char>(data, ptr::null());
                        false
                    }
                },
                raw::RETRO_ENVIRONMENT_GET_CAN_DUPE => write(data, true),
                raw::RETRO_ENVIRONMENT_GET_OVERSCAN => write(data, false),
                raw::RETRO_ENVIRONMENT_GET_FASTFORWARDING => write(data, false),
                raw::RETRO_ENVIRONMENT_GET_LANGUAGE => write(data, self.language.to_raw()),
                raw::RETRO_ENVIRONMENT_GET_INPUT_MAX_USERS => {
                    write::<c_uint>(data, self.max_users)
                }
                raw::RETRO_ENVIRONMENT_GET_TARGET_REFRESH_RATE => {
                    write(data, self.target_refresh_rate)
                }
                raw::RETRO_ENVIRONMENT_GET_AUDIO_VIDEO_ENABLE => write(data, AUDIO_VIDEO_ENABLED),
                raw::RETRO_ENVIRONMENT_GET_CORE_OPTIONS_VERSION => write::<c_uint>(data, 0),
                raw::RETRO_ENVIRONMENT_GET_VARIABLE => {
                    if data.is_null() {
                        return false;
                    }
                    let var = &mut *data.cast::<raw::retro_variable>();
                    trace!("core queried variable {:?}", c_str_to_string(var.key));
                    var.value = ptr::null();
                    false
                }
                raw::RETRO_ENVIRONMENT_GET_VARIABLE_UPDATE => write(data, false),
                raw::RETRO_ENVIRONMENT_SET_VARIABLES => true,
                raw::RETRO_ENVIRONMENT_SET_SUPPORT_NO_GAME => match read::<bool>(data) {
                    Some(flag) => {
                        self.support_no_game = flag;
                        true
                    }
                    None => false,
                },
                raw::RETRO_ENVIRONMENT_GET_INPUT_BITMASKS => {
                    self.input_bitmasks = true;
                    true
                }
                raw::RETRO_ENVIRONMENT_SET_MESSAGE => {
                    let Some(message) = read::<raw::retro_message>(data) else {
                        return false;
                    };
                    let Some(text) = c_str_to_string(message.msg) else {
                        return false;
                    };
                    info!(frames = message.frames, "core message: {text}");
                    self.last_message = Some(text);
                    true
                }
                raw::RETRO_ENVIRONMENT_SHUTDOWN => {
                    info!("core requested shutdown");
                    self.shutdown_requested = true;
                    true
                }
                raw::RETRO_ENVIRONMENT_SET_PERFORMANCE_LEVEL => match read::<c_uint>(data) {
                    Some(level) => {
                        self.performance_level = Some(level);
                        true
                    }
                    None => false,
                },
                raw::RETRO_ENVIRONMENT_SET_ROTATION => match read::<c_uint>(data) {
                    Some(rotation) if rotation < 4 => {
                        self.rotation = rotation;
                        true
                    }
                    _ => false,
                },
                raw::RETRO_ENVIRONMENT_SET_SUPPORT_ACHIEVEMENTS => match read::<bool>(data) {
                    Some(flag) => {
                        self.supports_achievements = flag;
                        true
                    }
                    None => false,
                },
                raw::RETRO_ENVIRONMENT_SET_SYSTEM_AV_INFO => {
                    match read::<raw::retro_system_av_info>(data) {
                        Some(av) => {
                            debug!("core changed av info");
                            self.av_update = Some(av.into());
                            self.geometry_update = None;
                            true
                        }
                        None => false,
                    }
                }
                raw::RETRO_ENVIRONMENT_SET_GEOMETRY => {
                    match read::<raw::retro_game_geometry>(data) {
                        Some(geometry) => {
                            self.geometry_update = Some(geometry.into());
                            true
                        }
                        None => false,
                    }
                }
                raw::RETRO_ENVIRONMENT_SET_INPUT_DESCRIPTORS
                | raw::RETRO_ENVIRONMENT_SET_CONTROLLER_INFO
                | raw::RETRO_ENVIRONMENT_SET_CONTENT_INFO_OVERRIDE
                | raw::RETRO_ENVIRONMENT_SET_SERIALIZATION_QUIRKS
                | raw::RETRO_ENVIRONMENT_SET_MEMORY_MAPS
                | raw::RETRO_ENVIRONMENT_SET_SUBSYSTEM_INFO => true,
                raw::RETRO_ENVIRONMENT_GET_LOG_INTERFACE => {
                    debug!("no log interface offered; core will use its own fallback");
                    false
                }
                other => {
                    trace!("unhandled environment command {other}");
                    false
                }
            }
        }
    }
}

unsafe fn read<T: Copy>(data: *mut c_void) -> Option<T> {
    if data.is_null() {
        return None;
    }
    Some(unsafe { data.cast::<T>().read() })
}

unsafe fn write<T>(data: *mut c_void, value: T) -> bool {
    if data.is_null() {
        return false;
    }
    unsafe { data.cast::<T>().write(value) };
    true
}

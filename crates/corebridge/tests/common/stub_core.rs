//! An in-process core implementing the libretro C ABI, with switches the
//! tests flip to exercise each bridge path.

use std::{
    ffi::{CStr, c_char, c_uint, c_void},
    ptr,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering},
    },
};

use corebridge::{CoreInterfaceTable, StaticCore, raw};
use once_cell::sync::Lazy;

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;
/// Row pitch in bytes; each 8-byte RGB565 row is followed by 8 bytes of padding.
pub const PITCH: usize = 16;
pub const AUDIO_FRAMES_PER_RUN: usize = 4;
pub const SAVE_RAM_SIZE: usize = 32;
const STATE_HEADER: usize = 8;

static EVENTS: Lazy<Mutex<Vec<&'static str>>> = Lazy::new(|| Mutex::new(Vec::new()));
static CHEATS: Lazy<Mutex<Vec<(u32, bool, String)>>> = Lazy::new(|| Mutex::new(Vec::new()));
static SYSTEM_DIR: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));
static LOADED: Lazy<Mutex<Option<LoadedContent>>> = Lazy::new(|| Mutex::new(None));
static SAVE_RAM: Mutex<[u8; SAVE_RAM_SIZE]> = Mutex::new([0; SAVE_RAM_SIZE]);

static ENVIRONMENT: Mutex<raw::retro_environment_t> = Mutex::new(None);
static VIDEO: Mutex<raw::retro_video_refresh_t> = Mutex::new(None);
static AUDIO_BATCH: Mutex<raw::retro_audio_sample_batch_t> = Mutex::new(None);
static INPUT_POLL: Mutex<raw::retro_input_poll_t> = Mutex::new(None);
static INPUT_STATE: Mutex<raw::retro_input_state_t> = Mutex::new(None);

static FRAMES: AtomicU64 = AtomicU64::new(0);
static LAST_MASK: AtomicU16 = AtomicU16::new(0);

/// Switches read by the stub; reset by [`reset`].
pub static NEED_FULLPATH: AtomicBool = AtomicBool::new(false);
pub static SUPPORT_NO_GAME: AtomicBool = AtomicBool::new(false);
pub static DUPLICATE_FRAMES: AtomicBool = AtomicBool::new(false);
pub static REJECT_GAMES: AtomicBool = AtomicBool::new(false);
pub static USE_XRGB8888: AtomicBool = AtomicBool::new(false);

/// What `retro_load_game` was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContent {
    pub path: Option<String>,
    pub data: Option<Vec<u8>>,
}

fn log(event: &'static str) {
    EVENTS.lock().unwrap().push(event);
}

/// Clears every recorded event and switch.
pub fn reset() {
    EVENTS.lock().unwrap().clear();
    CHEATS.lock().unwrap().clear();
    *SYSTEM_DIR.lock().unwrap() = None;
    *LOADED.lock().unwrap() = None;
    *SAVE_RAM.lock().unwrap() = [0; SAVE_RAM_SIZE];
    FRAMES.store(0, Ordering::SeqCst);
    LAST_MASK.store(0, Ordering::SeqCst);
    for flag in [
        &NEED_FULLPATH,
        &SUPPORT_NO_GAME,
        &DUPLICATE_FRAMES,
        &REJECT_GAMES,
        &USE_XRGB8888,
    ] {
        flag.store(false, Ordering::SeqCst);
    }
}

pub fn events() -> Vec<&'static str> {
    EVENTS.lock().unwrap().clone()
}

pub fn count(event: &str) -> usize {
    events().iter().filter(|e| **e == event).count()
}

pub fn cheats() -> Vec<(u32, bool, String)> {
    CHEATS.lock().unwrap().clone()
}

pub fn system_dir() -> Option<String> {
    SYSTEM_DIR.lock().unwrap().clone()
}

pub fn loaded() -> Option<LoadedContent> {
    LOADED.lock().unwrap().clone()
}

pub fn frames() -> u64 {
    FRAMES.load(Ordering::SeqCst)
}

/// Joypad bitmask the core read during its last `retro_run`.
pub fn last_mask() -> u16 {
    LAST_MASK.load(Ordering::SeqCst)
}

fn env_call<T>(cmd: c_uint, data: &mut T) -> bool {
    let cb = *ENVIRONMENT.lock().unwrap();
    match cb {
        Some(cb) => unsafe { cb(cmd, (data as *mut T).cast()) },
        None => false,
    }
}

unsafe extern "C" fn retro_init() {
    log("init");
    let mut dir: *const c_char = ptr::null();
    if env_call(raw::RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY, &mut dir) && !dir.is_null() {
        let dir = unsafe { CStr::from_ptr(dir) }.to_string_lossy().into_owned();
        *SYSTEM_DIR.lock().unwrap() = Some(dir);
    }
    if USE_XRGB8888.load(Ordering::SeqCst) {
        let mut format = raw::RETRO_PIXEL_FORMAT_XRGB8888;
        env_call(raw::RETRO_ENVIRONMENT_SET_PIXEL_FORMAT, &mut format);
    }
    let mut unused = 0u8;
    env_call(raw::RETRO_ENVIRONMENT_GET_INPUT_BITMASKS, &mut unused);
}

unsafe extern "C" fn retro_deinit() {
    log("deinit");
}

unsafe extern "C" fn retro_api_version() -> c_uint {
    raw::RETRO_API_VERSION
}

unsafe extern "C" fn retro_get_system_info(info: *mut raw::retro_system_info) {
    let info = unsafe { &mut *info };
    info.library_name = c"StubCore".as_ptr();
    info.library_version = c"1.0".as_ptr();
    info.valid_extensions = c"stub|bin".as_ptr();
    info.need_fullpath = NEED_FULLPATH.load(Ordering::SeqCst);
    info.block_extract = false;
}

unsafe extern "C" fn retro_get_system_av_info(info: *mut raw::retro_system_av_info) {
    let info = unsafe { &mut *info };
    info.geometry = raw::retro_game_geometry {
        base_width: WIDTH,
        base_height: HEIGHT,
        max_width: WIDTH,
        max_height: HEIGHT,
        aspect_ratio: 0.0,
    };
    info.timing = raw::retro_system_timing {
        fps: 60.0,
        sample_rate: 48_000.0,
    };
}

unsafe extern "C" fn retro_set_environment(cb: raw::retro_environment_t) {
    log("set_environment");
    *ENVIRONMENT.lock().unwrap() = cb;
    if SUPPORT_NO_GAME.load(Ordering::SeqCst) {
        let mut flag = true;
        env_call(raw::RETRO_ENVIRONMENT_SET_SUPPORT_NO_GAME, &mut flag);
    }
}

unsafe extern "C" fn retro_set_video_refresh(cb: raw::retro_video_refresh_t) {
    log("set_video_refresh");
    *VIDEO.lock().unwrap() = cb;
}

unsafe extern "C" fn retro_set_audio_sample(_: raw::retro_audio_sample_t) {}

unsafe extern "C" fn retro_set_audio_sample_batch(cb: raw::retro_audio_sample_batch_t) {
    *AUDIO_BATCH.lock().unwrap() = cb;
}

unsafe extern "C" fn retro_set_input_poll(cb: raw::retro_input_poll_t) {
    *INPUT_POLL.lock().unwrap() = cb;
}

unsafe extern "C" fn retro_set_input_state(cb: raw::retro_input_state_t) {
    *INPUT_STATE.lock().unwrap() = cb;
}

unsafe extern "C" fn retro_reset() {
    log("reset");
}

/// Red, green, blue, white in RGB565, then the same row reversed.
fn rgb565_frame() -> Vec<u8> {
    let row = [0xF800u16, 0x07E0, 0x001F, 0xFFFF];
    let mut frame = Vec::with_capacity(PITCH * HEIGHT as usize);
    for y in 0..HEIGHT as usize {
        let pixels: Vec<u16> = if y == 0 {
            row.to_vec()
        } else {
            row.iter().rev().copied().collect()
        };
        for px in pixels {
            frame.extend_from_slice(&px.to_ne_bytes());
        }
        // Padding a correct converter never reads.
        frame.extend_from_slice(&[0x55; PITCH - WIDTH as usize * 2]);
    }
    frame
}

fn xrgb8888_frame() -> Vec<u8> {
    let row = [0x00FF_0000u32, 0x0000_FF00, 0x0000_00FF, 0x00FF_FFFF];
    let mut frame = Vec::new();
    for _ in 0..HEIGHT {
        for px in row {
            frame.extend_from_slice(&px.to_ne_bytes());
        }
    }
    frame
}

unsafe extern "C" fn retro_run() {
    log("run");
    let frame = FRAMES.fetch_add(1, Ordering::SeqCst);

    if let Some(poll) = *INPUT_POLL.lock().unwrap() {
        unsafe { poll() };
    }
    if let Some(state) = *INPUT_STATE.lock().unwrap() {
        let mask = unsafe {
            state(
                0,
                raw::RETRO_DEVICE_JOYPAD,
                0,
                raw::RETRO_DEVICE_ID_JOYPAD_MASK,
            )
        };
        LAST_MASK.store(mask as u16, Ordering::SeqCst);
    }

    if let Some(video) = *VIDEO.lock().unwrap() {
        if DUPLICATE_FRAMES.load(Ordering::SeqCst) {
            unsafe { video(ptr::null(), WIDTH, HEIGHT, PITCH) };
        } else if USE_XRGB8888.load(Ordering::SeqCst) {
            let data = xrgb8888_frame();
            unsafe { video(data.as_ptr().cast(), WIDTH, HEIGHT, WIDTH as usize * 4) };
        } else {
            let data = rgb565_frame();
            unsafe { video(data.as_ptr().cast(), WIDTH, HEIGHT, PITCH) };
        }
    }

    if let Some(batch) = *AUDIO_BATCH.lock().unwrap() {
        let mut samples = Vec::with_capacity(AUDIO_FRAMES_PER_RUN * 2);
        for i in 0..AUDIO_FRAMES_PER_RUN as i16 {
            samples.extend_from_slice(&[frame as i16 + i, -(frame as i16 + i)]);
        }
        unsafe { batch(samples.as_ptr(), AUDIO_FRAMES_PER_RUN) };
    }
}

unsafe extern "C" fn retro_load_game(game: *const raw::retro_game_info) -> bool {
    log("load_game");
    if REJECT_GAMES.load(Ordering::SeqCst) {
        return false;
    }
    let content = if game.is_null() {
        if !SUPPORT_NO_GAME.load(Ordering::SeqCst) {
            return false;
        }
        LoadedContent {
            path: None,
            data: None,
        }
    } else {
        let game = unsafe { &*game };
        let path = (!game.path.is_null())
            .then(|| unsafe { CStr::from_ptr(game.path) }.to_string_lossy().into_owned());
        let data = (!game.data.is_null()).then(|| {
            unsafe { std::slice::from_raw_parts(game.data.cast::<u8>(), game.size) }.to_vec()
        });
        LoadedContent { path, data }
    };
    *LOADED.lock().unwrap() = Some(content);
    true
}

unsafe extern "C" fn retro_load_game_special(
    _game_type: c_uint,
    info: *const raw::retro_game_info,
    num_info: usize,
) -> bool {
    log("load_game_special");
    num_info > 0 && unsafe { retro_load_game(info) }
}

unsafe extern "C" fn retro_unload_game() {
    log("unload_game");
    *LOADED.lock().unwrap() = None;
}

unsafe extern "C" fn retro_get_region() -> c_uint {
    raw::RETRO_REGION_NTSC
}

/// Grows by one byte per frame so callers must re-query it.
unsafe extern "C" fn retro_serialize_size() -> usize {
    STATE_HEADER + FRAMES.load(Ordering::SeqCst) as usize
}

unsafe extern "C" fn retro_serialize(data: *mut c_void, size: usize) -> bool {
    let frames = FRAMES.load(Ordering::SeqCst);
    let needed = STATE_HEADER + frames as usize;
    if data.is_null() || size < needed {
        return false;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), needed) };
    out[..STATE_HEADER].copy_from_slice(&frames.to_le_bytes());
    for (i, byte) in out[STATE_HEADER..].iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(31);
    }
    true
}

unsafe extern "C" fn retro_unserialize(data: *const c_void, size: usize) -> bool {
    if data.is_null() || size < STATE_HEADER {
        return false;
    }
    let src = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), STATE_HEADER) };
    let mut header = [0u8; STATE_HEADER];
    header.copy_from_slice(src);
    let frames = u64::from_le_bytes(header);
    if size != STATE_HEADER + frames as usize {
        return false;
    }
    FRAMES.store(frames, Ordering::SeqCst);
    true
}

unsafe extern "C" fn retro_get_memory_data(id: c_uint) -> *mut c_void {
    match id {
        raw::RETRO_MEMORY_SAVE_RAM => SAVE_RAM.lock().unwrap().as_mut_ptr().cast(),
        _ => ptr::null_mut(),
    }
}

unsafe extern "C" fn retro_get_memory_size(id: c_uint) -> usize {
    match id {
        raw::RETRO_MEMORY_SAVE_RAM => SAVE_RAM_SIZE,
        _ => 0,
    }
}

unsafe extern "C" fn retro_cheat_reset() {
    log("cheat_reset");
    CHEATS.lock().unwrap().clear();
}

unsafe extern "C" fn retro_cheat_set(index: c_uint, enabled: bool, code: *const c_char) {
    let code = unsafe { CStr::from_ptr(code) }.to_string_lossy().into_owned();
    CHEATS.lock().unwrap().push((index, enabled, code));
}

unsafe extern "C" fn retro_set_controller_port_device(_: c_uint, _: c_uint) {
    log("set_controller_port_device");
}

/// Every entry point filled in.
pub fn table() -> CoreInterfaceTable {
    CoreInterfaceTable {
        init: Some(retro_init),
        deinit: Some(retro_deinit),
        api_version: Some(retro_api_version),
        get_system_info: Some(retro_get_system_info),
        get_system_av_info: Some(retro_get_system_av_info),
        set_environment: Some(retro_set_environment),
        set_video_refresh: Some(retro_set_video_refresh),
        set_audio_sample: Some(retro_set_audio_sample),
        set_audio_sample_batch: Some(retro_set_audio_sample_batch),
        set_input_poll: Some(retro_set_input_poll),
        set_input_state: Some(retro_set_input_state),
        set_controller_port_device: Some(retro_set_controller_port_device),
        reset: Some(retro_reset),
        run: Some(retro_run),
        load_game: Some(retro_load_game),
        load_game_special: Some(retro_load_game_special),
        unload_game: Some(retro_unload_game),
        get_region: Some(retro_get_region),
        serialize_size: Some(retro_serialize_size),
        serialize: Some(retro_serialize),
        unserialize: Some(retro_unserialize),
        get_memory_data: Some(retro_get_memory_data),
        get_memory_size: Some(retro_get_memory_size),
        cheat_reset: Some(retro_cheat_reset),
        cheat_set: Some(retro_cheat_set),
    }
}

/// Only the required entries plus the callback setters and info queries.
pub fn minimal_table() -> CoreInterfaceTable {
    CoreInterfaceTable {
        api_version: None,
        set_controller_port_device: None,
        reset: None,
        load_game_special: None,
        get_region: None,
        get_memory_data: None,
        get_memory_size: None,
        cheat_reset: None,
        cheat_set: None,
        ..table()
    }
}

pub fn core() -> StaticCore {
    unsafe { StaticCore::new("stub", table()) }.unwrap()
}

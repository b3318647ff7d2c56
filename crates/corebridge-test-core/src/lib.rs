//! Tiny libretro core exported with unprefixed `retro_*` symbols.
//!
//! It negotiates XRGB8888, a quarter-turn rotation, performance level 3 and
//! achievement support, draws a 2x2 frame whose top-left pixel turns red
//! while A is held on port 0, emits one stereo audio frame per run and
//! serializes its frame counter. There are no cheat or special-content entry
//! points, so hosts see those as unsupported.

use std::{
    ffi::{c_uint, c_void},
    sync::atomic::{AtomicU64, Ordering},
};

use corebridge::raw;
use parking_lot::Mutex;

const WIDTH: u32 = 2;
const HEIGHT: u32 = 2;
const STATE_SIZE: usize = 8;
const SAVE_RAM_SIZE: usize = 16;

static ENVIRONMENT: Mutex<raw::retro_environment_t> = Mutex::new(None);
static VIDEO: Mutex<raw::retro_video_refresh_t> = Mutex::new(None);
static AUDIO_BATCH: Mutex<raw::retro_audio_sample_batch_t> = Mutex::new(None);
static INPUT_POLL: Mutex<raw::retro_input_poll_t> = Mutex::new(None);
static INPUT_STATE: Mutex<raw::retro_input_state_t> = Mutex::new(None);
static SAVE_RAM: Mutex<[u8; SAVE_RAM_SIZE]> = Mutex::new([0; SAVE_RAM_SIZE]);
static FRAMES: AtomicU64 = AtomicU64::new(0);

fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    let cb = *ENVIRONMENT.lock();
    match cb {
        Some(cb) => unsafe { cb(cmd, data) },
        None => false,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_environment(cb: raw::retro_environment_t) {
    *ENVIRONMENT.lock() = cb;
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_video_refresh(cb: raw::retro_video_refresh_t) {
    *VIDEO.lock() = cb;
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_audio_sample(_: raw::retro_audio_sample_t) {}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_audio_sample_batch(cb: raw::retro_audio_sample_batch_t) {
    *AUDIO_BATCH.lock() = cb;
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_input_poll(cb: raw::retro_input_poll_t) {
    *INPUT_POLL.lock() = cb;
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_input_state(cb: raw::retro_input_state_t) {
    *INPUT_STATE.lock() = cb;
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_init() {
    FRAMES.store(0, Ordering::SeqCst);
    let mut format = raw::RETRO_PIXEL_FORMAT_XRGB8888;
    environment(raw::RETRO_ENVIRONMENT_SET_PIXEL_FORMAT, (&raw mut format).cast());
    let mut rotation: c_uint = 1;
    environment(raw::RETRO_ENVIRONMENT_SET_ROTATION, (&raw mut rotation).cast());
    let mut level: c_uint = 3;
    environment(raw::RETRO_ENVIRONMENT_SET_PERFORMANCE_LEVEL, (&raw mut level).cast());
    let mut achievements = true;
    environment(raw::RETRO_ENVIRONMENT_SET_SUPPORT_ACHIEVEMENTS, (&raw mut achievements).cast());
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_deinit() {
    *SAVE_RAM.lock() = [0; SAVE_RAM_SIZE];
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_api_version() -> c_uint {
    raw::RETRO_API_VERSION
}

/// # Safety
/// `info` must be null or point to a writable `retro_system_info`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn retro_get_system_info(info: *mut raw::retro_system_info) {
    let Some(info) = (unsafe { info.as_mut() }) else {
        return;
    };
    info.library_name = c"TestCore".as_ptr();
    info.library_version = c"0.1".as_ptr();
    info.valid_extensions = c"tc".as_ptr();
    info.need_fullpath = false;
    info.block_extract = false;
}

/// # Safety
/// `info` must be null or point to a writable `retro_system_av_info`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn retro_get_system_av_info(info: *mut raw::retro_system_av_info) {
    let Some(info) = (unsafe { info.as_mut() }) else {
        return;
    };
    info.geometry = raw::retro_game_geometry {
        base_width: WIDTH,
        base_height: HEIGHT,
        max_width: WIDTH,
        max_height: HEIGHT,
        aspect_ratio: 0.0,
    };
    info.timing = raw::retro_system_timing {
        fps: 60.0,
        sample_rate: 44_100.0,
    };
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_controller_port_device(_: c_uint, _: c_uint) {}

#[unsafe(no_mangle)]
pub extern "C" fn retro_reset() {
    FRAMES.store(0, Ordering::SeqCst);
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_run() {
    let frame = FRAMES.fetch_add(1, Ordering::SeqCst);

    let poll = *INPUT_POLL.lock();
    if let Some(poll) = poll {
        unsafe { poll() };
    }
    let state = *INPUT_STATE.lock();
    let held_a = state.is_some_and(|state| unsafe {
        state(0, raw::RETRO_DEVICE_JOYPAD, 0, raw::RETRO_DEVICE_ID_JOYPAD_A) != 0
    });

    let video = *VIDEO.lock();
    if let Some(video) = video {
        let first = if held_a { 0x00FF_0000 } else { 0 };
        let pixels: [u32; 4] = [first, 0x0000_FF00, 0x0000_00FF, 0x00FF_FFFF];
        unsafe { video(pixels.as_ptr().cast(), WIDTH, HEIGHT, WIDTH as usize * 4) };
    }

    let batch = *AUDIO_BATCH.lock();
    if let Some(batch) = batch {
        let sample = frame as i16;
        let samples = [sample, -sample];
        unsafe { batch(samples.as_ptr(), 1) };
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_serialize_size() -> usize {
    STATE_SIZE
}

/// # Safety
/// `data` must be null or valid for `size` writable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn retro_serialize(data: *mut c_void, size: usize) -> bool {
    if data.is_null() || size < STATE_SIZE {
        return false;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), STATE_SIZE) };
    out.copy_from_slice(&FRAMES.load(Ordering::SeqCst).to_le_bytes());
    true
}

/// # Safety
/// `data` must be null or valid for `size` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn retro_unserialize(data: *const c_void, size: usize) -> bool {
    if data.is_null() || size != STATE_SIZE {
        return false;
    }
    let src = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), STATE_SIZE) };
    let mut bytes = [0u8; STATE_SIZE];
    bytes.copy_from_slice(src);
    FRAMES.store(u64::from_le_bytes(bytes), Ordering::SeqCst);
    true
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_load_game(game: *const raw::retro_game_info) -> bool {
    !game.is_null()
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_unload_game() {}

#[unsafe(no_mangle)]
pub extern "C" fn retro_get_region() -> c_uint {
    raw::RETRO_REGION_PAL
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_get_memory_data(id: c_uint) -> *mut c_void {
    match id {
        raw::RETRO_MEMORY_SAVE_RAM => SAVE_RAM.data_ptr().cast(),
        _ => std::ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_get_memory_size(id: c_uint) -> usize {
    match id {
        raw::RETRO_MEMORY_SAVE_RAM => SAVE_RAM_SIZE,
        _ => 0,
    }
}

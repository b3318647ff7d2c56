//! C trampolines registered with the core and the process-wide slot they read.
//!
//! libretro callbacks carry no user-data pointer, so the active session's
//! callback-visible state lives in [`ACTIVE`]. The slot never holds the core
//! itself: the core calls back into these functions while the session is
//! inside `retro_run`.

use std::{
    ffi::{c_uint, c_void},
    slice,
    sync::Arc,
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{
    environment::EnvironmentState,
    error::{Error, Result},
    frame::FrameSink,
    input::InputState,
    pixel, raw,
};

/// Host callbacks handed to `retro_set_*`.
#[derive(Clone, Copy, Default)]
pub struct CallbackSet {
    pub environment: raw::retro_environment_t,
    pub video: raw::retro_video_refresh_t,
    pub audio_sample: raw::retro_audio_sample_t,
    pub audio_batch: raw::retro_audio_sample_batch_t,
    pub input_poll: raw::retro_input_poll_t,
    pub input_state: raw::retro_input_state_t,
}

impl CallbackSet {
    /// The bridge's own trampolines.
    pub fn host() -> Self {
        Self {
            environment: Some(environment),
            video: Some(video_refresh),
            audio_sample: Some(audio_sample),
            audio_batch: Some(audio_sample_batch),
            input_poll: Some(input_poll),
            input_state: Some(input_state),
        }
    }
}

/// Everything a callback may touch while the core runs.
#[derive(Debug)]
pub(crate) struct CallbackState {
    pub env: EnvironmentState,
    pub input: InputState,
    pub sink: FrameSink,
}

impl CallbackState {
    pub fn new(env: EnvironmentState) -> Self {
        Self {
            env,
            input: InputState::new(),
            sink: FrameSink::default(),
        }
    }
}

pub(crate) type SharedState = Arc<Mutex<CallbackState>>;

static ACTIVE: Lazy<Mutex<Option<SharedState>>> = Lazy::new(|| Mutex::new(None));

/// Installs `state` as the target of every trampoline.
pub(crate) fn claim(state: &SharedState) -> Result<()> {
    let mut slot = ACTIVE.lock();
    if slot.is_some() {
        return Err(Error::SessionBusy);
    }
    *slot = Some(Arc::clone(state));
    Ok(())
}

/// Empties the slot if `state` is the one installed.
pub(crate) fn release(state: &SharedState) {
    let mut slot = ACTIVE.lock();
    if slot.as_ref().is_some_and(|active| Arc::ptr_eq(active, state)) {
        *slot = None;
    }
}

/// Whether any session currently owns the slot.
pub fn is_claimed() -> bool {
    ACTIVE.lock().is_some()
}

fn active() -> Option<SharedState> {
    ACTIVE.lock().clone()
}

fn with_active<R>(fallback: R, f: impl FnOnce(&mut CallbackState) -> R) -> R {
    match active() {
        Some(state) => f(&mut state.lock()),
        None => {
            trace!("callback invoked with no active session");
            fallback
        }
    }
}

unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    with_active(false, |state| unsafe { state.env.handle(cmd, data) })
}

unsafe extern "C" fn video_refresh(data: *const c_void, width: c_uint, height: c_uint, pitch: usize) {
    with_active((), |state| {
        if data.is_null() {
            state.sink.mark_duplicated();
            return;
        }

        let format = state.env.pixel_format();
        let (w, h) = (width as usize, height as usize);
        let Some(len) = pixel::source_len(format, w, h, pitch) else {
            warn!("dropping {width}x{height} {format} frame: pitch {pitch} overflows");
            return;
        };
        let src = unsafe { slice::from_raw_parts(data.cast::<u8>(), len) };
        match pixel::convert_frame(format, src, w, h, pitch, state.sink.scratch()) {
            Ok(()) => state.sink.commit_video(width, height),
            Err(err) => warn!("dropping {width}x{height} {format} frame: {err}"),
        }
    })
}

unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    with_active((), |state| state.sink.push_sample(left, right))
}

unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() {
        return 0;
    }
    let Some(len) = frames
        .checked_mul(2)
        .filter(|&len| len <= isize::MAX as usize / size_of::<i16>())
    else {
        warn!("ignoring audio batch of {frames} frames");
        return 0;
    };
    with_active(0, |state| {
        let samples = unsafe { slice::from_raw_parts(data, len) };
        state.sink.push_batch(samples);
        frames
    })
}

unsafe extern "C" fn input_poll() {
    with_active((), |state| state.sink.mark_polled())
}

unsafe extern "C" fn input_state(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
    with_active(0, |state| state.input.query(port, device, index, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;

    static SERIAL: Mutex<()> = parking_lot::const_mutex(());

    fn shared() -> SharedState {
        let env = EnvironmentState::new(&BridgeConfig::default()).unwrap();
        Arc::new(Mutex::new(CallbackState::new(env)))
    }

    #[test]
    fn slot_admits_one_session() {
        let _guard = SERIAL.lock();
        let first = shared();
        let second = shared();

        claim(&first).unwrap();
        assert!(matches!(claim(&second), Err(Error::SessionBusy)));
        release(&second);
        assert!(is_claimed());
        release(&first);
        assert!(!is_claimed());
        claim(&second).unwrap();
        release(&second);
    }

    #[test]
    fn trampolines_are_inert_without_a_session() {
        let _guard = SERIAL.lock();
        let samples = [1i16, 2, 3, 4];
        let mut can_dupe = false;
        unsafe {
            assert!(!environment(
                raw::RETRO_ENVIRONMENT_GET_CAN_DUPE,
                (&raw mut can_dupe).cast()
            ));
            assert_eq!(audio_sample_batch(samples.as_ptr(), 2), 0);
            assert_eq!(input_state(0, raw::RETRO_DEVICE_JOYPAD, 0, 0), 0);
            video_refresh(std::ptr::null(), 1, 1, 2);
            input_poll();
        }
        assert!(!can_dupe);
    }

    #[test]
    fn trampolines_feed_the_active_state() {
        let _guard = SERIAL.lock();
        let state = shared();
        claim(&state).unwrap();

        let px = [0xF800u16, 0x001F];
        let samples = [5i16, -5, 6, -6];
        unsafe {
            video_refresh(px.as_ptr().cast(), 2, 1, 4);
            audio_sample(1, -1);
            assert_eq!(audio_sample_batch(samples.as_ptr(), 2), 2);
            assert_eq!(audio_sample_batch(std::ptr::null(), 2), 0);
            input_poll();
        }
        state
            .lock()
            .input
            .set_button(0, crate::input::JoypadButton::A, true);
        let mask = unsafe {
            input_state(
                0,
                raw::RETRO_DEVICE_JOYPAD,
                0,
                raw::RETRO_DEVICE_ID_JOYPAD_MASK,
            )
        };
        assert_eq!(mask, 1 << 8);

        let out = state.lock().sink.take(0);
        release(&state);

        let video = out.video.unwrap();
        assert_eq!(video.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(video.pixel(1, 0), Some([0, 0, 255, 255]));
        assert_eq!(out.audio, vec![1, -1, 5, -5, 6, -6]);
        assert!(out.input_polled);
    }

    #[test]
    fn oversized_core_arguments_are_dropped() {
        let _guard = SERIAL.lock();
        let state = shared();
        claim(&state).unwrap();

        let px = [0u16; 4];
        let samples = [1i16, -1];
        unsafe {
            assert_eq!(audio_sample_batch(samples.as_ptr(), usize::MAX), 0);
            assert_eq!(audio_sample_batch(samples.as_ptr(), usize::MAX / 2), 0);
            video_refresh(px.as_ptr().cast(), 2, 3, usize::MAX);
            video_refresh(px.as_ptr().cast(), c_uint::MAX, c_uint::MAX, usize::MAX / 4);
        }

        let out = state.lock().sink.take(0);
        release(&state);
        assert!(out.video.is_none());
        assert!(out.audio.is_empty());
    }
}

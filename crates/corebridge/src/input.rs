//! Per-port input values answered to the core's input-state callback.

use std::ffi::c_uint;

use bitflags::bitflags;

use crate::raw;

/// Number of controller ports the table tracks.
pub const MAX_PORTS: usize = 4;
/// Number of standard joypad buttons.
pub const BUTTON_COUNT: usize = 16;
/// Left stick, right stick, analog buttons.
pub const STICK_COUNT: usize = 3;
pub const AXIS_COUNT: usize = 2;

/// Standard joypad button ids; the discriminant is the libretro id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoypadButton {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L = 10,
    R = 11,
    L2 = 12,
    R2 = 13,
    L3 = 14,
    R3 = 15,
}

impl JoypadButton {
    pub const ALL: [JoypadButton; BUTTON_COUNT] = [
        JoypadButton::B,
        JoypadButton::Y,
        JoypadButton::Select,
        JoypadButton::Start,
        JoypadButton::Up,
        JoypadButton::Down,
        JoypadButton::Left,
        JoypadButton::Right,
        JoypadButton::A,
        JoypadButton::X,
        JoypadButton::L,
        JoypadButton::R,
        JoypadButton::L2,
        JoypadButton::R2,
        JoypadButton::L3,
        JoypadButton::R3,
    ];

    #[inline]
    pub const fn id(self) -> usize {
        self as usize
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let button = match name.to_ascii_lowercase().as_str() {
            "b" => JoypadButton::B,
            "y" => JoypadButton::Y,
            "select" => JoypadButton::Select,
            "start" => JoypadButton::Start,
            "up" => JoypadButton::Up,
            "down" => JoypadButton::Down,
            "left" => JoypadButton::Left,
            "right" => JoypadButton::Right,
            "a" => JoypadButton::A,
            "x" => JoypadButton::X,
            "l" => JoypadButton::L,
            "r" => JoypadButton::R,
            "l2" => JoypadButton::L2,
            "r2" => JoypadButton::R2,
            "l3" => JoypadButton::L3,
            "r3" => JoypadButton::R3,
            _ => return None,
        };
        Some(button)
    }

    #[inline]
    pub const fn mask(self) -> JoypadMask {
        JoypadMask::from_bits_retain(1 << (self as u16))
    }
}

bitflags! {
    /// Answer to a `RETRO_DEVICE_ID_JOYPAD_MASK` query: bit *i* is set iff
    /// button id *i* is pressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JoypadMask: u16 {
        const B = 1 << 0;
        const Y = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
        const LEFT = 1 << 6;
        const RIGHT = 1 << 7;
        const A = 1 << 8;
        const X = 1 << 9;
        const L = 1 << 10;
        const R = 1 << 11;
        const L2 = 1 << 12;
        const R2 = 1 << 13;
        const L3 = 1 << 14;
        const R3 = 1 << 15;
    }
}

/// Button and analog values for every port.
///
/// Written only by the host-facing setters and read only by the input-state
/// callback, so both query shapes (single id and bitmask) see the same data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputState {
    buttons: [[i16; BUTTON_COUNT]; MAX_PORTS],
    analog: [[[i16; AXIS_COUNT]; STICK_COUNT]; MAX_PORTS],
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub const fn new() -> Self {
        Self {
            buttons: [[0; BUTTON_COUNT]; MAX_PORTS],
            analog: [[[0; AXIS_COUNT]; STICK_COUNT]; MAX_PORTS],
        }
    }

    /// Sets a digital button. Out-of-range ports are ignored.
    pub fn set_button(&mut self, port: usize, button: JoypadButton, pressed: bool) {
        self.set_button_value(port, button, i16::from(pressed));
    }

    /// Sets a button's raw value; any non-zero value counts as pressed.
    pub fn set_button_value(&mut self, port: usize, button: JoypadButton, value: i16) {
        if let Some(slot) = self.buttons.get_mut(port) {
            slot[button.id()] = value;
        }
    }

    /// Sets an analog axis. Out-of-range coordinates are ignored.
    pub fn set_analog(&mut self, port: usize, stick: usize, axis: usize, value: i16) {
        if let Some(v) = self
            .analog
            .get_mut(port)
            .and_then(|p| p.get_mut(stick))
            .and_then(|s| s.get_mut(axis))
        {
            *v = value;
        }
    }

    pub fn button(&self, port: usize, button: JoypadButton) -> i16 {
        self.buttons.get(port).map_or(0, |p| p[button.id()])
    }

    pub fn mask(&self, port: usize) -> JoypadMask {
        let Some(buttons) = self.buttons.get(port) else {
            return JoypadMask::empty();
        };
        buttons
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .fold(JoypadMask::empty(), |mask, (id, _)| {
                mask | JoypadMask::from_bits_retain(1 << id)
            })
    }

    pub fn analog(&self, port: usize, stick: usize, axis: usize) -> i16 {
        self.analog
            .get(port)
            .and_then(|p| p.get(stick))
            .and_then(|s| s.get(axis))
            .copied()
            .unwrap_or(0)
    }

    /// Zeroes every port.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Answers `retro_input_state_t(port, device, index, id)`.
    pub fn query(&self, port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
        let port = port as usize;
        match device & raw::RETRO_DEVICE_MASK {
            raw::RETRO_DEVICE_JOYPAD if id == raw::RETRO_DEVICE_ID_JOYPAD_MASK => {
                self.mask(port).bits() as i16
            }
            raw::RETRO_DEVICE_JOYPAD => JoypadButton::from_id(id as usize)
                .map_or(0, |button| self.button(port, button)),
            raw::RETRO_DEVICE_ANALOG => self.analog(port, index as usize, id as usize),
            _ => 0,
        }
    }
}

//! Window-message input for desktop windows
//!
//! Coordinates are client coordinates of the target window. Messages are
//! posted, not sent, so a busy target never blocks the caller.

use crate::types::InputMethod;
use crate::AutomationError;
use std::ffi::c_void;
use std::thread;
use std::time::Duration;
use tracing::debug;
use windows::Win32::Foundation::{HWND, LPARAM, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::WindowsAndMessaging::{
    PostMessageW, SetCursorPos, WM_CHAR, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL,
};

const MK_LBUTTON: usize = 0x0001;
const SWIPE_STEPS: i32 = 20;

fn hwnd(native_handle: u64) -> HWND {
    HWND(native_handle as usize as *mut c_void)
}

fn make_lparam(x: i32, y: i32) -> LPARAM {
    LPARAM((((y as u32 & 0xFFFF) << 16) | (x as u32 & 0xFFFF)) as isize)
}

fn post(native_handle: u64, msg: u32, wparam: usize, lparam: LPARAM) -> Result<(), AutomationError> {
    unsafe { PostMessageW(Some(hwnd(native_handle)), msg, WPARAM(wparam), lparam) }.map_err(|e| {
        AutomationError::PlatformError(format!("PostMessageW({msg:#x}) failed: {e}"))
    })
}

fn to_screen(native_handle: u64, x: i32, y: i32) -> POINT {
    let mut point = POINT { x, y };
    unsafe {
        let _ = ClientToScreen(hwnd(native_handle), &mut point);
    }
    point
}

fn move_cursor(native_handle: u64, input: InputMethod, x: i32, y: i32) {
    if input == InputMethod::PostMessageWithCursorPos {
        let point = to_screen(native_handle, x, y);
        unsafe {
            let _ = SetCursorPos(point.x, point.y);
        }
    }
}

pub fn click(native_handle: u64, input: InputMethod, x: i32, y: i32) -> Result<(), AutomationError> {
    debug!("[win32] click ({}, {}) on {:#x}", x, y, native_handle);
    move_cursor(native_handle, input, x, y);
    let lparam = make_lparam(x, y);
    post(native_handle, WM_MOUSEMOVE, 0, lparam)?;
    post(native_handle, WM_LBUTTONDOWN, MK_LBUTTON, lparam)?;
    thread::sleep(Duration::from_millis(30));
    post(native_handle, WM_LBUTTONUP, 0, lparam)
}

pub fn swipe(
    native_handle: u64,
    input: InputMethod,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    duration_ms: u32,
) -> Result<(), AutomationError> {
    debug!(
        "[win32] swipe ({}, {}) -> ({}, {}) over {}ms on {:#x}",
        x0, y0, x1, y1, duration_ms, native_handle
    );
    let step_delay = Duration::from_millis(u64::from(duration_ms) / SWIPE_STEPS as u64);

    move_cursor(native_handle, input, x0, y0);
    post(native_handle, WM_LBUTTONDOWN, MK_LBUTTON, make_lparam(x0, y0))?;
    for step in 1..=SWIPE_STEPS {
        let x = x0 + (x1 - x0) * step / SWIPE_STEPS;
        let y = y0 + (y1 - y0) * step / SWIPE_STEPS;
        move_cursor(native_handle, input, x, y);
        post(native_handle, WM_MOUSEMOVE, MK_LBUTTON, make_lparam(x, y))?;
        thread::sleep(step_delay);
    }
    post(native_handle, WM_LBUTTONUP, 0, make_lparam(x1, y1))
}

pub fn input_text(native_handle: u64, text: &str) -> Result<(), AutomationError> {
    debug!("[win32] input {} char(s) on {:#x}", text.chars().count(), native_handle);
    for unit in text.encode_utf16() {
        post(native_handle, WM_CHAR, usize::from(unit), LPARAM(1))?;
    }
    Ok(())
}

/// `key` is a Windows virtual-key code
pub fn press_key(native_handle: u64, key: i32) -> Result<(), AutomationError> {
    debug!("[win32] key {:#x} on {:#x}", key, native_handle);
    let vk = key as usize;
    post(native_handle, WM_KEYDOWN, vk, LPARAM(1))?;
    thread::sleep(Duration::from_millis(30));
    post(native_handle, WM_KEYUP, vk, LPARAM(0xC000_0001_u32 as isize))
}

/// Wheel deltas in WHEEL_DELTA units (120 per notch); positive `dy` scrolls up
pub fn scroll(native_handle: u64, input: InputMethod, dx: i32, dy: i32) -> Result<(), AutomationError> {
    debug!("[win32] scroll ({}, {}) on {:#x}", dx, dy, native_handle);
    // Wheel messages carry screen coordinates; aim at the client origin.
    let origin = to_screen(native_handle, 0, 0);
    move_cursor(native_handle, input, 0, 0);
    let lparam = make_lparam(origin.x, origin.y);
    if dy != 0 {
        post(native_handle, WM_MOUSEWHEEL, (dy as i16 as u16 as usize) << 16, lparam)?;
    }
    if dx != 0 {
        post(native_handle, WM_MOUSEHWHEEL, (dx as i16 as u16 as usize) << 16, lparam)?;
    }
    Ok(())
}

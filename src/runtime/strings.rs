//! String and byte conversions across the boundary.
//!
//! Strings handed to native code are NUL-terminated copies allocated with
//! the Rust allocator; they must be released with [`free`], never with the
//! C library's `free`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use super::RuntimeError;

/// Copy `s` into a freshly allocated NUL-terminated native string.
pub fn c_string(s: &str) -> Result<*mut c_char, RuntimeError> {
    let owned = CString::new(s).map_err(|e| RuntimeError::InteriorNul(e.nul_position()))?;
    Ok(owned.into_raw())
}

/// Release a string returned by [`c_string`].
///
/// # Safety
///
/// `p` must come from [`c_string`] and must not be used afterwards.
pub unsafe fn free(p: *mut c_char) {
    if !p.is_null() {
        drop(unsafe { CString::from_raw(p) });
    }
}

/// Copy a NUL-terminated native string. A null pointer yields `""`.
///
/// # Safety
///
/// `p` must be null or point to a NUL-terminated buffer.
pub unsafe fn go_string(p: *const c_char) -> String {
    if p.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
}

/// Copy exactly `n` bytes of native memory as a string.
///
/// # Safety
///
/// `p` must be valid for `n` bytes of reads, or `n` must be zero.
pub unsafe fn go_string_n(p: *const c_char, n: usize) -> String {
    let bytes = unsafe { go_bytes(p as *const u8, n) };
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copy exactly `n` bytes of native memory.
///
/// # Safety
///
/// `p` must be valid for `n` bytes of reads, or `n` must be zero.
pub unsafe fn go_bytes(p: *const u8, n: usize) -> Vec<u8> {
    if p.is_null() || n == 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(p, n) }.to_vec()
}

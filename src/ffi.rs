//! FFI bindings for CGM Flux
//!
//! This module provides C-compatible functions for calling CGM Flux from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `cgmflux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::pipeline::report_to_json;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Report API
// ============================================================================

/// Compute a full glucose report and return it as JSON.
///
/// # Safety
/// - `readings_json` and `config_json` must be valid null-terminated C strings.
/// - `insulin_json` may be NULL when no insulin history is available.
/// - Returns a newly allocated string that must be freed with `cgmflux_free_string`.
/// - Returns NULL on error; call `cgmflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cgmflux_report(
    readings_json: *const c_char,
    insulin_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let readings = match cstr_to_string(readings_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid readings string pointer");
            return ptr::null_mut();
        }
    };

    let insulin = if insulin_json.is_null() {
        None
    } else {
        match cstr_to_string(insulin_json) {
            Some(s) => Some(s),
            None => {
                set_last_error("Invalid insulin history string");
                return ptr::null_mut();
            }
        }
    };

    let config = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    match report_to_json(&readings, insulin.as_deref(), &config) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by CGM Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a CGM Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cgmflux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next CGM Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cgmflux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cgmflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_readings() -> CString {
        CString::new(
            r#"[
                {"timestamp": "2024-01-15T08:00:00+01:00", "value": 5.5, "source": "cgm"},
                {"timestamp": "2024-01-15T08:05:00+01:00", "value": 3.4, "source": "cgm"},
                {"timestamp": "2024-01-15T08:10:00+01:00", "value": 4.6, "source": "cgm"}
            ]"#,
        )
        .unwrap()
    }

    fn sample_config() -> CString {
        CString::new(
            r#"{
                "thresholds": {"very_low": 3.0, "low": 3.9, "high": 10.0, "very_high": 13.9},
                "category_mode": "5",
                "insulin_duration_hours": 4.0
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_report() {
        let readings = sample_readings();
        let config = sample_config();

        unsafe {
            let result = cgmflux_report(readings.as_ptr(), ptr::null(), config.as_ptr());
            assert!(!result.is_null());
            assert!(cgmflux_last_error().is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["reading_count"], 3);
            assert_eq!(value["days"][0]["hypo"]["non_severe_count"], 1);
            assert!(value["days"][0].get("insulin").is_none());

            cgmflux_free_string(result);
        }
    }

    #[test]
    fn test_ffi_report_with_insulin() {
        let readings = sample_readings();
        let config = sample_config();
        let insulin = CString::new(
            r#"{"boluses": [{"timestamp": "2024-01-15T07:30:00+01:00", "units": 3.0}]}"#,
        )
        .unwrap();

        unsafe {
            let result = cgmflux_report(readings.as_ptr(), insulin.as_ptr(), config.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["days"][0]["insulin"][8]["bolus_in_previous_hour"], 3.0);

            cgmflux_free_string(result);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid_json = CString::new("not json").unwrap();
        let config = sample_config();

        unsafe {
            let result = cgmflux_report(invalid_json.as_ptr(), ptr::null(), config.as_ptr());
            assert!(result.is_null());

            let error = cgmflux_last_error();
            assert!(!error.is_null());

            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let missing = cgmflux_report(ptr::null(), ptr::null(), config.as_ptr());
            assert!(missing.is_null());
            let error_str = CStr::from_ptr(cgmflux_last_error()).to_str().unwrap();
            assert_eq!(error_str, "Invalid readings string pointer");
        }
    }

    #[test]
    fn test_ffi_free_null_is_noop() {
        unsafe {
            cgmflux_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = cgmflux_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}

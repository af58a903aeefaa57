//! FFI bindings for the insight engine
//!
//! C-compatible functions for calling the engine from the mobile and backend
//! hosts. All functions take null-terminated UTF-8 strings and return
//! allocated memory that must be freed by the caller using `nobet_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::pipeline::{assess_risk_json, RiskEngine};
use crate::thresholds::RiskLevel;

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

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free the result
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Assess one user's bundle with the default configuration.
///
/// # Safety
/// - `bundle_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nobet_free_string`.
/// - Returns NULL on error; call `nobet_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nobet_assess_json(bundle_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let bundle = match cstr_to_string(bundle_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid bundle string pointer");
            return ptr::null_mut();
        }
    };

    match assess_risk_json(&bundle) {
        Ok(payload) => string_to_cstr(&payload),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Assess one user's bundle with a JSON engine configuration.
///
/// # Safety
/// - `bundle_json` and `config_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `nobet_free_string`.
/// - Returns NULL on error; call `nobet_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nobet_assess_json_with_config(
    bundle_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let bundle = match cstr_to_string(bundle_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid bundle string pointer");
            return ptr::null_mut();
        }
    };

    let config = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    let result = EngineConfig::from_json(&config)
        .and_then(RiskEngine::new)
        .and_then(|engine| engine.assess_json(&bundle));
    match result {
        Ok(payload) => string_to_cstr(&payload),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Map a 0-100 risk score to its level name (`LOW`, `MEDIUM`, `HIGH`).
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn nobet_risk_level(score: u8) -> *const c_char {
    static LOW: &[u8] = b"LOW\0";
    static MEDIUM: &[u8] = b"MEDIUM\0";
    static HIGH: &[u8] = b"HIGH\0";
    let name = match RiskLevel::from_score(score) {
        RiskLevel::Low => LOW,
        RiskLevel::Medium => MEDIUM,
        RiskLevel::High => HIGH,
    };
    name.as_ptr() as *const c_char
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to a configured RiskEngine
pub struct RiskEngineHandle {
    engine: RiskEngine,
}

/// Create an engine from a JSON configuration, or the defaults when NULL.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `nobet_engine_free`.
/// - Returns NULL on an invalid configuration; call `nobet_last_error`.
#[no_mangle]
pub unsafe extern "C" fn nobet_engine_new(config_json: *const c_char) -> *mut RiskEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match RiskEngine::new(config) {
        Ok(engine) => Box::into_raw(Box::new(RiskEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a pointer returned by `nobet_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nobet_engine_free(engine: *mut RiskEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Assess one user's bundle with a configured engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `nobet_engine_new`.
/// - `bundle_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nobet_free_string`.
/// - Returns NULL on error; call `nobet_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nobet_engine_assess(
    engine: *const RiskEngineHandle,
    bundle_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let bundle = match cstr_to_string(bundle_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid bundle string pointer");
            return ptr::null_mut();
        }
    };

    match handle.engine.assess_json(&bundle) {
        Ok(payload) => string_to_cstr(&payload),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory and errors
// ============================================================================

/// Free a string returned by an engine function.
///
/// # Safety
/// - `ptr` must be a pointer returned by an engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nobet_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The pointer is valid until the next engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn nobet_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the engine version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn nobet_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

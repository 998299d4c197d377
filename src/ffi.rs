//! FFI bindings for the proctoring core
//!
//! C-compatible functions for embedding a detection session in a host that
//! runs its own detectors. Frames cross the boundary as JSON observations;
//! outcomes and reports come back as JSON strings that must be freed with
//! `proctor_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::ProctorConfig;
use crate::error::ProctorError;
use crate::report::SessionReport;
use crate::state::DetectionState;
use crate::types::RecordedFrame;

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

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Hand a JSON result to the caller, or record the error and return NULL
fn json_result(result: Result<String, ProctorError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a report JSON with the default deduction table.
///
/// Returns the score (0-100), or -1 on error.
///
/// # Safety
/// - `report_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn proctor_score_report(report_json: *const c_char) -> i32 {
    clear_last_error();

    let json = match cstr_to_string(report_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid report string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<SessionReport>(&json) {
        Ok(report) => report.integrity_score(&ProctorConfig::default().scoring) as i32,
        Err(e) => {
            set_last_error(&ProctorError::from(e).to_string());
            -1
        }
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to one detection session
pub struct ProctorSessionHandle {
    state: DetectionState,
}

/// Create a detection session.
///
/// `config_json` may be NULL for the default configuration.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `proctor_session_free`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_new(config_json: *const c_char) -> *mut ProctorSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        ProctorConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match ProctorConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(ProctorSessionHandle {
        state: DetectionState::new(config),
    });
    Box::into_raw(handle)
}

/// Free a detection session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `proctor_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_free(session: *mut ProctorSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Feed one captured frame, given as a recorded observation JSON.
///
/// Returns the frame outcome as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `proctor_session_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_process(
    session: *mut ProctorSessionHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let json = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    json_result(process_recorded(&mut handle.state, &json))
}

fn process_recorded(state: &mut DetectionState, json: &str) -> Result<String, ProctorError> {
    let frame: RecordedFrame =
        serde_json::from_str(json).map_err(|e| ProctorError::ParseError(e.to_string()))?;
    let outcome = state.process(frame);
    Ok(serde_json::to_string(&outcome)?)
}

/// Build a scored report; pending alerts are drained into it.
///
/// # Safety
/// - `session` must be a valid pointer returned by `proctor_session_new`.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_report(session: *mut ProctorSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let scoring = handle.state.config().scoring.clone();
    let scored = handle.state.generate_report().scored(&scoring);
    json_result(serde_json::to_string(&scored).map_err(ProctorError::from))
}

/// Zero all counters and restart the session clock.
///
/// # Safety
/// - `session` must be a valid pointer returned by `proctor_session_new`.
/// - Returns 0 on success, -1 on a NULL session.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_reset(session: *mut ProctorSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    (*session).state.reset();
    0
}

/// Clear the gaze baseline; counters are kept.
///
/// # Safety
/// - `session` must be a valid pointer returned by `proctor_session_new`.
/// - Returns 0 on success, -1 on a NULL session.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_recalibrate(session: *mut ProctorSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    (*session).state.recalibrate();
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a proctor function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a proctor function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn proctor_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next proctor call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn proctor_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn proctor_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

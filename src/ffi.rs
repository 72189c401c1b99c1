//! FFI bindings for Narrative Flux
//!
//! This module provides C-compatible functions for calling Narrative Flux from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `narrative_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::NarrativeConfig;
use crate::error::ComputeError;
use crate::pipeline::{compute_request_json, NarrativeProcessor};
use crate::schema::InputAdapter;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

/// Parse an optional TOML configuration; NULL means defaults
unsafe fn config_from_ptr(config_toml: *const c_char) -> Result<NarrativeConfig, ComputeError> {
    if config_toml.is_null() {
        return Ok(NarrativeConfig::default());
    }
    match cstr_to_string(config_toml) {
        Some(raw) => NarrativeConfig::from_toml_str(&raw),
        None => Err(ComputeError::InvalidInput(
            "Configuration is not valid UTF-8".to_string(),
        )),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute every series in a request and return the batch response JSON.
///
/// The request holds `messages`, `aggregates` and `indicators` arrays, each optional.
///
/// # Safety
/// - `input_json` must be a valid null-terminated C string.
/// - `config_toml` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `narrative_free_string`.
/// - Returns NULL on error; call `narrative_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn narrative_compute(
    input_json: *const c_char,
    config_toml: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let input = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };
    let config = match config_from_ptr(config_toml) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match compute_request_json(&input, &config) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a NarrativeProcessor
pub struct NarrativeProcessorHandle {
    processor: NarrativeProcessor,
}

/// Create a new NarrativeProcessor.
///
/// # Safety
/// - `config_toml` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer to a newly allocated NarrativeProcessor.
/// - Must be freed with `narrative_processor_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn narrative_processor_new(
    config_toml: *const c_char,
) -> *mut NarrativeProcessorHandle {
    clear_last_error();

    let processor = match config_from_ptr(config_toml).and_then(NarrativeProcessor::new) {
        Ok(processor) => processor,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };
    Box::into_raw(Box::new(NarrativeProcessorHandle { processor }))
}

/// Free a NarrativeProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `narrative_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn narrative_processor_free(processor: *mut NarrativeProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Ingest a JSON array of daily aggregates and return the batch response JSON
/// for every stored series.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `narrative_processor_new`.
/// - `aggregates_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `narrative_free_string`.
/// - Returns NULL on error; call `narrative_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn narrative_processor_ingest(
    processor: *mut NarrativeProcessorHandle,
    aggregates_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;

    let json_str = match cstr_to_string(aggregates_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = InputAdapter::parse_aggregates_array(&json_str)
        .and_then(|aggregates| handle.processor.ingest(aggregates))
        .and_then(|_| handle.processor.process_to_json());

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save the processor's index store to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `narrative_processor_new`.
/// - Returns a newly allocated string that must be freed with `narrative_free_string`.
/// - Returns NULL on error; call `narrative_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn narrative_processor_save_store(
    processor: *mut NarrativeProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    match handle.processor.save_store() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load the processor's index store from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `narrative_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `narrative_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn narrative_processor_load_store(
    processor: *mut NarrativeProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_store(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Narrative Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Narrative Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn narrative_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Narrative Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn narrative_last_error() -> *const c_char {
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
pub unsafe extern "C" fn narrative_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

//! FFI binding to the native llama shim library.
//!
//! The shim wraps llama.cpp behind six C functions with the same contract as
//! [`NativeGenerationPort`]: handles are `i64`, zero means "no model", and
//! every string crossing the boundary is NUL-terminated UTF-8. Strings
//! returned by the shim are owned by it and must be released with
//! `llama_shim_free_string`.
//!
//! Building and linking the shim is a packaging concern; this module only
//! exists with the `native-ffi` feature enabled.
//!
//! # Safety
//!
//! - Null pointers from the shim are treated as failures, never dereferenced.
//! - Interior NUL bytes in a path or prompt are reported as errors before
//!   any call is made.
//! - Returned strings are copied into Rust memory and freed immediately.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};

use crate::error::NativeError;
use crate::models::native::{ModelHandle, NativeGenerationPort};

#[link(name = "llama_shim")]
extern "C" {
    fn llama_shim_load_model(path: *const c_char) -> i64;
    fn llama_shim_generate_text(handle: i64, prompt: *const c_char) -> *mut c_char;
    fn llama_shim_free_string(s: *mut c_char);
    fn llama_shim_unload_model(handle: i64) -> c_int;
    fn llama_shim_model_info(handle: i64) -> *mut c_char;
    fn llama_shim_is_model_loaded(handle: i64) -> c_int;
    fn llama_shim_last_error() -> *mut c_char;
}

/// Copies a shim-owned string into a Rust `String` and releases it.
///
/// # Safety
///
/// `ptr` must be null or a string returned by the shim that has not been freed.
unsafe fn take_shim_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let text = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    llama_shim_free_string(ptr);
    Some(text)
}

fn last_error(fallback: &str) -> NativeError {
    // SAFETY: the shim returns null or a fresh string we own.
    let message = unsafe { take_shim_string(llama_shim_last_error()) };
    NativeError::new(message.unwrap_or_else(|| fallback.to_string()))
}

fn to_c_string(value: &str, what: &str) -> Result<CString, NativeError> {
    CString::new(value).map_err(|_| NativeError::new(format!("{what} contains a NUL byte")))
}

#[derive(Debug, Default)]
pub struct FfiLlamaPort;

impl FfiLlamaPort {
    pub fn new() -> Self {
        Self
    }
}

impl NativeGenerationPort for FfiLlamaPort {
    fn load_model(&self, path: &str) -> Result<ModelHandle, NativeError> {
        let c_path = to_c_string(path, "Model path")?;
        // SAFETY: c_path outlives the call.
        let raw = unsafe { llama_shim_load_model(c_path.as_ptr()) };
        Ok(ModelHandle::from_raw(raw))
    }

    fn generate_text(&self, handle: ModelHandle, prompt: &str) -> Result<String, NativeError> {
        let c_prompt = to_c_string(prompt, "Prompt")?;
        // SAFETY: c_prompt outlives the call; the result is owned by us.
        let text = unsafe {
            take_shim_string(llama_shim_generate_text(handle.raw(), c_prompt.as_ptr()))
        };
        text.ok_or_else(|| last_error("Native generation returned no text"))
    }

    fn unload_model(&self, handle: ModelHandle) -> Result<(), NativeError> {
        // SAFETY: plain value call.
        let status = unsafe { llama_shim_unload_model(handle.raw()) };
        if status == 0 {
            Ok(())
        } else {
            Err(last_error("Native unload failed"))
        }
    }

    fn model_info(&self, handle: ModelHandle) -> String {
        // SAFETY: the result is owned by us.
        unsafe { take_shim_string(llama_shim_model_info(handle.raw())) }
            .unwrap_or_else(|| "Invalid model state".to_string())
    }

    fn is_model_loaded(&self, handle: ModelHandle) -> bool {
        // SAFETY: plain value call.
        unsafe { llama_shim_is_model_loaded(handle.raw()) != 0 }
    }
}

// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Dynamic codec loading from shared objects.
//!
//! A codec plugin exports two C-ABI symbols:
//!
//! ```c
//! const char *openvocs_plugin_codec_id(void);
//! CPluginCodec *openvocs_plugin_codec_create(uint32_t ssid,
//!                                            const char *parameters_json);
//! ```
//!
//! Parameters cross the ABI as minimally-encoded JSON text. The create
//! symbol returns a [`CPluginCodec`] vtable; the host wraps it in a regular
//! [`Codec`] and keeps the library loaded for as long as the registry entry
//! or any instance created from it lives.
//!
//! Rust plugin crates implement the contract with [`export_plugin_codec!`].

use crate::codec::Codec;
use crate::factory::{CodecFactory, CodecGenerator};
use libloading::{Library, Symbol};
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;
use voicekit_core::json::{self, JsonValue};
use voicekit_core::{Result, VoiceKitError};

pub type SharedLibrary = Arc<Library>;

pub const PLUGIN_CODEC_ID_SYMBOL: &[u8] = b"openvocs_plugin_codec_id\0";
pub const PLUGIN_CODEC_CREATE_SYMBOL: &[u8] = b"openvocs_plugin_codec_create\0";

type PluginCodecIdFn = unsafe extern "C" fn() -> *const c_char;
type PluginCodecCreateFn = unsafe extern "C" fn(u32, *const c_char) -> *mut CPluginCodec;

/// The C-ABI codec vtable a plugin's create symbol returns.
///
/// All functions receive the `context` pointer; `encode`/`decode` return the
/// bytes written or a negative value on failure. `destroy` releases the
/// instance including the vtable allocation itself.
#[repr(C)]
pub struct CPluginCodec {
    pub context: *mut c_void,
    pub encode: unsafe extern "C" fn(
        context: *mut c_void,
        input: *const u8,
        input_length: usize,
        output: *mut u8,
        output_capacity: usize,
    ) -> i64,
    pub decode: unsafe extern "C" fn(
        context: *mut c_void,
        seq_number: u64,
        input: *const u8,
        input_length: usize,
        output: *mut u8,
        output_capacity: usize,
    ) -> i64,
    pub sample_rate_hertz: unsafe extern "C" fn(context: *mut c_void) -> u32,
    pub destroy: unsafe extern "C" fn(codec: *mut CPluginCodec),
}

/// Host-side wrapper presenting a loaded plugin instance as a [`Codec`].
pub struct PluginCodec {
    raw: NonNull<CPluginCodec>,
    type_id: String,
    /// Keeps the shared object mapped while this instance lives.
    _library: Option<SharedLibrary>,
}

// SAFETY: the plugin contract requires codec instances to be movable between
// threads (the host pins each instance to one thread at a time, like every
// other codec).
unsafe impl Send for PluginCodec {}

impl PluginCodec {
    /// Wraps a raw plugin vtable. Takes ownership: the vtable's `destroy` is
    /// invoked on drop.
    pub(crate) fn from_raw(
        raw: NonNull<CPluginCodec>,
        type_id: String,
        library: Option<SharedLibrary>,
    ) -> Self {
        Self { raw, type_id, _library: library }
    }
}

impl Drop for PluginCodec {
    fn drop(&mut self) {
        // SAFETY: `raw` was returned by the plugin's create symbol and has
        // not been destroyed before - this wrapper is its only owner.
        unsafe {
            let vtable = self.raw.as_ref();
            (vtable.destroy)(self.raw.as_ptr());
        }
    }
}

impl Codec for PluginCodec {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        // SAFETY: pointers and lengths describe live, disjoint slices for
        // the duration of the call; the vtable functions are valid while the
        // library stays loaded (held via `_library`).
        let written = unsafe {
            let vtable = self.raw.as_ref();
            (vtable.encode)(
                vtable.context,
                input.as_ptr(),
                input.len(),
                output.as_mut_ptr(),
                output.len(),
            )
        };

        usize::try_from(written).map_err(|_| {
            VoiceKitError::ResourceFailure(format!(
                "plugin codec '{}' encode failed ({written})",
                self.type_id
            ))
        })
    }

    fn decode(&mut self, seq_number: u64, input: &[u8], output: &mut [u8]) -> Result<usize> {
        // SAFETY: see `encode`.
        let written = unsafe {
            let vtable = self.raw.as_ref();
            (vtable.decode)(
                vtable.context,
                seq_number,
                input.as_ptr(),
                input.len(),
                output.as_mut_ptr(),
                output.len(),
            )
        };

        usize::try_from(written).map_err(|_| {
            VoiceKitError::ResourceFailure(format!(
                "plugin codec '{}' decode failed ({written})",
                self.type_id
            ))
        })
    }

    fn parameters(&self) -> JsonValue {
        JsonValue::object()
    }

    fn sample_rate_hertz(&self) -> u32 {
        // SAFETY: see `encode`.
        unsafe {
            let vtable = self.raw.as_ref();
            (vtable.sample_rate_hertz)(vtable.context)
        }
    }
}

/// Loads the shared object at `path` and installs the codec it exports.
/// Returns the codec id installed under.
pub fn install_from_so(factory: &mut CodecFactory, path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();

    tracing::info!(path = %path.display(), "loading codec plugin");

    // SAFETY: loading a shared object runs its initializers - plugins are
    // trusted code selected by the operator.
    let library = unsafe {
        Library::new(path).map_err(|e| {
            VoiceKitError::ResourceFailure(format!(
                "could not load '{}': {e}",
                path.display()
            ))
        })?
    };

    // The symbol borrows must end before the library moves into the Arc;
    // only the raw function pointer and the copied id leave this block.
    let (type_id, create): (String, PluginCodecCreateFn) = {
        // SAFETY: symbol lookup; the signatures are fixed by the plugin
        // contract and upheld by export_plugin_codec!.
        let id_fn: Symbol<'_, PluginCodecIdFn> = unsafe {
            library.get(PLUGIN_CODEC_ID_SYMBOL).map_err(|e| {
                VoiceKitError::NotFound(format!(
                    "shared object does not provide openvocs_plugin_codec_id: {e}"
                ))
            })?
        };
        let create_fn: Symbol<'_, PluginCodecCreateFn> = unsafe {
            library.get(PLUGIN_CODEC_CREATE_SYMBOL).map_err(|e| {
                VoiceKitError::NotFound(format!(
                    "shared object does not provide openvocs_plugin_codec_create: {e}"
                ))
            })?
        };

        // SAFETY: the id function returns a pointer to a static
        // NUL-terminated string inside the library, valid while the library
        // is loaded.
        let type_id = unsafe {
            let id_ptr = id_fn();
            if id_ptr.is_null() {
                return Err(VoiceKitError::ResourceFailure(
                    "plugin returned a null codec id".to_string(),
                ));
            }
            CStr::from_ptr(id_ptr)
                .to_str()
                .map_err(|_| {
                    VoiceKitError::MalformedInput("plugin codec id is not UTF-8".to_string())
                })?
                .to_string()
        };

        (type_id, *create_fn)
    };

    let library = Arc::new(library);

    let generator: CodecGenerator = {
        let library = library.clone();
        let type_id = type_id.clone();
        Arc::new(move |ssid: u32, parameters: Option<&JsonValue>| {
            let parameters_text = match parameters {
                Some(parameters) => Some(
                    CString::new(json::encode_minimal(parameters)?).map_err(|_| {
                        VoiceKitError::InvalidArgument(
                            "parameter JSON contains a NUL byte".to_string(),
                        )
                    })?,
                ),
                None => None,
            };
            let parameters_ptr =
                parameters_text.as_ref().map_or(std::ptr::null(), |text| text.as_ptr());

            // SAFETY: `create` stays valid while `library` is loaded; the
            // parameter pointer is NUL-terminated or null.
            let raw = unsafe { create(ssid, parameters_ptr) };

            let raw = NonNull::new(raw).ok_or_else(|| {
                VoiceKitError::ResourceFailure(format!(
                    "plugin codec '{type_id}' refused to create an instance"
                ))
            })?;

            Ok(Box::new(PluginCodec::from_raw(
                raw,
                type_id.clone(),
                Some(library.clone()),
            )) as Box<dyn Codec>)
        })
    };

    factory.install_with_library(&type_id, generator, Some(library));

    tracing::info!(codec = %type_id, "installed codec plugin");

    Ok(type_id)
}

/// Attempts to install every regular file in `dir` as a codec plugin.
/// Returns the number installed; failures are logged and skipped.
pub fn install_from_so_dir(factory: &mut CodecFactory, dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    let mut installed = 0usize;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        match install_from_so(factory, entry.path()) {
            Ok(id) => {
                tracing::info!(codec = %id, path = %entry.path().display(), "loaded codec");
                installed += 1;
            },
            Err(e) => {
                tracing::info!(
                    path = %entry.path().display(),
                    error = %e,
                    "could not load codec"
                );
            },
        }
    }

    Ok(installed)
}

/*
 *      ------------------------------------------------------------------------
 *
 *      EXPORT SIDE
 *
 *      ------------------------------------------------------------------------
 */

/// Heap layout behind an exported vtable: the vtable first (so the
/// `CPluginCodec` pointer is also the allocation pointer), then the codec.
#[repr(C)]
struct ExportedCodec {
    vtable: CPluginCodec,
    codec: Box<dyn Codec>,
}

unsafe extern "C" fn exported_encode(
    context: *mut c_void,
    input: *const u8,
    input_length: usize,
    output: *mut u8,
    output_capacity: usize,
) -> i64 {
    // SAFETY: `context` is the ExportedCodec this shim was installed into;
    // the caller guarantees the slices are live.
    let exported = unsafe { &mut *context.cast::<ExportedCodec>() };
    let input = unsafe { std::slice::from_raw_parts(input, input_length) };
    let output = unsafe { std::slice::from_raw_parts_mut(output, output_capacity) };

    match exported.codec.encode(input, output) {
        Ok(written) => i64::try_from(written).unwrap_or(-1),
        Err(_) => -1,
    }
}

unsafe extern "C" fn exported_decode(
    context: *mut c_void,
    seq_number: u64,
    input: *const u8,
    input_length: usize,
    output: *mut u8,
    output_capacity: usize,
) -> i64 {
    // SAFETY: see exported_encode.
    let exported = unsafe { &mut *context.cast::<ExportedCodec>() };
    let input = unsafe { std::slice::from_raw_parts(input, input_length) };
    let output = unsafe { std::slice::from_raw_parts_mut(output, output_capacity) };

    match exported.codec.decode(seq_number, input, output) {
        Ok(written) => i64::try_from(written).unwrap_or(-1),
        Err(_) => -1,
    }
}

unsafe extern "C" fn exported_sample_rate(context: *mut c_void) -> u32 {
    // SAFETY: see exported_encode.
    let exported = unsafe { &*context.cast::<ExportedCodec>() };
    exported.codec.sample_rate_hertz()
}

unsafe extern "C" fn exported_destroy(codec: *mut CPluginCodec) {
    if codec.is_null() {
        return;
    }
    // SAFETY: `codec` points at the vtable field of a Box<ExportedCodec>
    // produced by `export_codec_instance`; repr(C) makes the two pointers
    // interchangeable. Reconstructing the Box drops codec and vtable.
    drop(unsafe { Box::from_raw(codec.cast::<ExportedCodec>()) });
}

/// Builds the C-ABI instance [`export_plugin_codec!`] hands to the host.
/// Returns null when construction fails.
pub fn export_codec_instance(
    ssid: u32,
    parameters_json: *const c_char,
    create: fn(u32, Option<&JsonValue>) -> Result<Box<dyn Codec>>,
) -> *mut CPluginCodec {
    let parameters = if parameters_json.is_null() {
        None
    } else {
        // SAFETY: per contract the pointer is a NUL-terminated JSON string.
        let text = unsafe { CStr::from_ptr(parameters_json) };
        match text.to_str().map_err(|_| ()).and_then(|t| json::decode_str(t).map_err(|_| ())) {
            Ok(value) => Some(value),
            Err(()) => return std::ptr::null_mut(),
        }
    };

    let Ok(codec) = create(ssid, parameters.as_ref()) else {
        return std::ptr::null_mut();
    };

    let exported = Box::new(ExportedCodec {
        vtable: CPluginCodec {
            context: std::ptr::null_mut(),
            encode: exported_encode,
            decode: exported_decode,
            sample_rate_hertz: exported_sample_rate,
            destroy: exported_destroy,
        },
        codec,
    });

    let raw = Box::into_raw(exported);
    // SAFETY: `raw` is valid; the context points back at the allocation so
    // the shims can reach the codec.
    unsafe {
        (*raw).vtable.context = raw.cast::<c_void>();
    }
    raw.cast::<CPluginCodec>()
}

/// Exports the two plugin symbols for a codec crate built as a `cdylib`.
///
/// ```ignore
/// voicekit_codecs::export_plugin_codec!("gsm", GsmCodec::create);
/// ```
#[macro_export]
macro_rules! export_plugin_codec {
    ($id:literal, $create:path) => {
        #[no_mangle]
        pub extern "C" fn openvocs_plugin_codec_id() -> *const ::std::ffi::c_char {
            concat!($id, "\0").as_ptr().cast()
        }

        #[no_mangle]
        pub extern "C" fn openvocs_plugin_codec_create(
            ssid: u32,
            parameters_json: *const ::std::ffi::c_char,
        ) -> *mut $crate::plugin::CPluginCodec {
            $crate::plugin::export_codec_instance(ssid, parameters_json, $create)
        }
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Drives the exported vtable the way a host across the ABI would -
    /// without an actual shared object in between.
    #[test]
    fn test_export_and_wrap_roundtrip() {
        let params = CString::new(r#"{"law":"alaw"}"#).unwrap();
        let raw = export_codec_instance(7, params.as_ptr(), crate::g711::G711Codec::create);
        let raw = NonNull::new(raw).expect("export must succeed");

        let mut codec = PluginCodec::from_raw(raw, "G.711".to_string(), None);
        assert_eq!(codec.sample_rate_hertz(), 8_000);

        let pcm: Vec<u8> = [0i16, 1000, -1000, 0].iter().flat_map(|s| s.to_ne_bytes()).collect();
        let mut wire = vec![0u8; 4];
        assert_eq!(codec.encode(&pcm, &mut wire).unwrap(), 4);

        let mut back = vec![0u8; 8];
        assert_eq!(codec.decode(1, &wire, &mut back).unwrap(), 8);
        // dropping the wrapper runs the vtable destroy
    }

    #[test]
    fn test_export_rejects_bad_parameters() {
        let params = CString::new("{not json").unwrap();
        let raw = export_codec_instance(0, params.as_ptr(), crate::g711::G711Codec::create);
        assert!(raw.is_null());

        let params = CString::new(r#"{"law":"none"}"#).unwrap();
        let raw = export_codec_instance(0, params.as_ptr(), crate::g711::G711Codec::create);
        assert!(raw.is_null());
    }

    #[test]
    fn test_exported_errors_surface_as_negative() {
        let raw = export_codec_instance(0, std::ptr::null(), crate::g711::G711Codec::create);
        let raw = NonNull::new(raw).unwrap();
        let mut codec = PluginCodec::from_raw(raw, "G.711".to_string(), None);

        // odd input length is a codec error -> negative across the ABI
        let mut output = vec![0u8; 8];
        assert!(codec.encode(&[1, 2, 3], &mut output).is_err());
    }

    #[test]
    fn test_install_from_so_rejects_non_library() {
        let dir = std::env::temp_dir().join("voicekit-plugin-test");
        std::fs::create_dir_all(&dir).unwrap();
        let bogus = dir.join("not-a-codec.so");
        std::fs::write(&bogus, b"definitely not ELF").unwrap();

        let mut factory = CodecFactory::new();
        assert!(install_from_so(&mut factory, &bogus).is_err());

        // the directory walker skips it and reports zero installs
        assert_eq!(install_from_so_dir(&mut factory, &dir).unwrap(), 0);

        std::fs::remove_file(&bogus).unwrap();
    }

    #[test]
    fn test_install_from_missing_dir() {
        let mut factory = CodecFactory::new();
        assert!(install_from_so_dir(&mut factory, "/nonexistent/plugin-dir").is_err());
    }
}

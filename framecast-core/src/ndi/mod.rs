//! NDI runtime loading and the production transport.
//!
//! The NDI SDK ships as a redistributable the user installs separately,
//! so the library is opened at runtime rather than linked. Discovery
//! follows the SDK's own convention: the `NDILIB_REDIST_FOLDER`
//! environment variable first, then the system loader path. A library
//! that predates v5 is rejected.
//!
//! [`NdiRuntime`] owns the loaded library and the resolved entry points;
//! dropping it shuts the SDK down. [`NdiTransport`] implements
//! [`Transport`] on top of it with `send_video_async`, which hands a
//! frame to the SDK without copying it. The null-frame send doubles as
//! a fence: it returns once the previously submitted buffer is no
//! longer referenced.

pub mod sys;

use std::collections::HashMap;
use std::env;
use std::ffi::{CStr, CString, c_void};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::frame::{FrameInfo, PixelFormat, ScanMode};
use crate::transport::{SenderHandle, Transport, VideoFrame};

#[cfg(target_os = "windows")]
const LIB_NAME: &str = "Processing.NDI.Lib.x64.dll";
#[cfg(target_os = "macos")]
const LIB_NAME: &str = "libndi.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIB_NAME: &str = "libndi.so.5";

// ── Runtime ──────────────────────────────────────────────────────

struct RuntimeFns {
    initialize: sys::InitializeFn,
    destroy: sys::DestroyFn,
    version: sys::VersionFn,
    send_create: sys::SendCreateFn,
    send_destroy: sys::SendDestroyFn,
    send_video_async: sys::SendVideoAsyncFn,
}

/// The loaded NDI library with its entry points resolved and the SDK
/// initialized. Dropping it calls `NDIlib_destroy`.
pub struct NdiRuntime {
    fns: RuntimeFns,
    version: String,
    /// Keeps the shared object mapped while the fn pointers live.
    _lib: Library,
}

fn resolve<T: Copy>(lib: &Library, name: &'static str) -> Result<T, RelayError> {
    unsafe {
        lib.get::<T>(name.as_bytes())
            .map(|symbol| *symbol)
            .map_err(|_| RelayError::RuntimeSymbol(name))
    }
}

impl NdiRuntime {
    /// Locate, load and initialize the NDI runtime.
    pub fn load() -> Result<Self, RelayError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Ok(dir) = env::var("NDILIB_REDIST_FOLDER") {
            candidates.push(PathBuf::from(dir).join(LIB_NAME));
        }
        candidates.push(PathBuf::from(LIB_NAME));

        let mut loaded = None;
        for candidate in &candidates {
            match unsafe { Library::new(candidate) } {
                Ok(lib) => {
                    loaded = Some((lib, candidate));
                    break;
                }
                Err(e) => debug!("no NDI runtime at {}: {e}", candidate.display()),
            }
        }
        let Some((lib, path)) = loaded else {
            return Err(RelayError::RuntimeNotFound {
                searched: candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        };

        // Never called, only checked: its presence means the library is
        // v5 or newer.
        resolve::<sys::V5LoadFn>(&lib, sys::SYM_V5_LOAD)?;

        let fns = RuntimeFns {
            initialize: resolve(&lib, sys::SYM_INITIALIZE)?,
            destroy: resolve(&lib, sys::SYM_DESTROY)?,
            version: resolve(&lib, sys::SYM_VERSION)?,
            send_create: resolve(&lib, sys::SYM_SEND_CREATE)?,
            send_destroy: resolve(&lib, sys::SYM_SEND_DESTROY)?,
            send_video_async: resolve(&lib, sys::SYM_SEND_VIDEO_ASYNC)?,
        };

        if !unsafe { (fns.initialize)() } {
            return Err(RelayError::RuntimeInit);
        }

        let version = unsafe {
            let ptr = (fns.version)();
            if ptr.is_null() {
                "unknown".to_owned()
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        };
        info!("NDI runtime '{version}' loaded from {}", path.display());

        Ok(Self {
            fns,
            version,
            _lib: lib,
        })
    }

    /// Version string reported by the runtime.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Drop for NdiRuntime {
    fn drop(&mut self) {
        unsafe { (self.fns.destroy)() };
    }
}

// ── Transport ────────────────────────────────────────────────────

/// [`Transport`] backed by NDI senders.
pub struct NdiTransport {
    runtime: Arc<NdiRuntime>,
    senders: HashMap<u64, *mut c_void>,
    next_handle: u64,
}

impl NdiTransport {
    pub fn new(runtime: Arc<NdiRuntime>) -> Self {
        Self {
            runtime,
            senders: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn runtime(&self) -> &NdiRuntime {
        &self.runtime
    }
}

fn describe_frame(info: &FrameInfo, data: *const u8) -> sys::VideoFrameDesc {
    sys::VideoFrameDesc {
        xres: info.width as i32,
        yres: info.height as i32,
        fourcc: match info.format {
            PixelFormat::Rgba8 => sys::FOURCC_RGBA,
            PixelFormat::Bgra8 => sys::FOURCC_BGRA,
        },
        frame_rate_n: info.frame_rate_n,
        frame_rate_d: info.frame_rate_d,
        picture_aspect_ratio: info.aspect_ratio,
        frame_format_type: match info.scan {
            ScanMode::Progressive => sys::FRAME_FORMAT_PROGRESSIVE,
            ScanMode::Interlaced => sys::FRAME_FORMAT_INTERLEAVED,
        },
        timecode: 0,
        p_data: data,
        line_stride_in_bytes: info.line_stride() as i32,
        p_metadata: ptr::null(),
        timestamp: 0,
    }
}

impl Transport for NdiTransport {
    fn create_sender(
        &mut self,
        name: &str,
        clock_video: bool,
    ) -> Result<SenderHandle, RelayError> {
        let c_name =
            CString::new(name).map_err(|_| RelayError::SenderCreate { name: name.into() })?;
        let desc = sys::SenderDesc {
            p_ndi_name: c_name.as_ptr(),
            p_groups: ptr::null(),
            clock_video,
            clock_audio: false,
        };
        // The SDK copies the strings during the call.
        let instance = unsafe { (self.runtime.fns.send_create)(&desc) };
        if instance.is_null() {
            return Err(RelayError::SenderCreate { name: name.into() });
        }

        self.next_handle += 1;
        self.senders.insert(self.next_handle, instance);
        debug!("created NDI sender '{name}'");
        Ok(SenderHandle(self.next_handle))
    }

    fn destroy_sender(&mut self, handle: SenderHandle) {
        match self.senders.remove(&handle.0) {
            Some(instance) => unsafe { (self.runtime.fns.send_destroy)(instance) },
            None => warn!("destroy of unknown {handle}"),
        }
    }

    fn send_video(&mut self, handle: SenderHandle, frame: Option<&VideoFrame<'_>>) {
        let Some(&instance) = self.senders.get(&handle.0) else {
            warn!("send on unknown {handle}");
            return;
        };
        match frame {
            Some(frame) => {
                let desc = describe_frame(&frame.info, frame.data.as_ptr());
                unsafe { (self.runtime.fns.send_video_async)(instance, &desc) };
            }
            // Null frame fences the previous async send.
            None => unsafe { (self.runtime.fns.send_video_async)(instance, ptr::null()) },
        }
    }
}

impl Drop for NdiTransport {
    fn drop(&mut self) {
        // Backstop for senders nobody tore down. Fence before destroy so
        // the SDK is not holding a frame buffer that is about to go away.
        for (_, instance) in self.senders.drain() {
            unsafe {
                (self.runtime.fns.send_video_async)(instance, ptr::null());
                (self.runtime.fns.send_destroy)(instance);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_desc_mirrors_frame_info() {
        let info = FrameInfo::new(1920, 1080);
        let data = vec![0u8; info.buffer_len()];
        let desc = describe_frame(&info, data.as_ptr());

        assert_eq!(desc.xres, 1920);
        assert_eq!(desc.yres, 1080);
        assert_eq!(desc.fourcc, sys::FOURCC_RGBA);
        assert_eq!(desc.frame_rate_n, 60000);
        assert_eq!(desc.frame_rate_d, 1000);
        assert_eq!(desc.frame_format_type, sys::FRAME_FORMAT_PROGRESSIVE);
        assert_eq!(desc.line_stride_in_bytes, 1920 * 4);
        assert_eq!(desc.timecode, 0);
        assert!(desc.p_metadata.is_null());
    }

    #[test]
    fn missing_runtime_reports_searched_paths() {
        // SAFETY: no other test in this binary touches this variable.
        unsafe { env::set_var("NDILIB_REDIST_FOLDER", "/nonexistent/ndi") };
        let result = NdiRuntime::load();
        unsafe { env::remove_var("NDILIB_REDIST_FOLDER") };

        match result {
            Err(RelayError::RuntimeNotFound { searched }) => {
                assert!(searched.contains("/nonexistent/ndi"));
                assert!(searched.contains(LIB_NAME));
            }
            // A development machine may actually have the runtime.
            _ => {}
        }
    }
}

//! Raw NDI 5 ABI surface.
//!
//! Hand-written declarations for the handful of entry points the relay
//! uses. Layouts follow `Processing.NDI.Lib.h`; the structs are passed
//! by pointer across the C boundary, so field order and padding must
//! match the SDK exactly.

use std::ffi::{c_char, c_void};

// ── Frame constants ──────────────────────────────────────────────

/// `NDIlib_FourCC_video_type_RGBA`.
pub const FOURCC_RGBA: i32 = i32::from_le_bytes(*b"RGBA");
/// `NDIlib_FourCC_video_type_BGRA`.
pub const FOURCC_BGRA: i32 = i32::from_le_bytes(*b"BGRA");

/// `NDIlib_frame_format_type_interleaved`.
pub const FRAME_FORMAT_INTERLEAVED: i32 = 0;
/// `NDIlib_frame_format_type_progressive`.
pub const FRAME_FORMAT_PROGRESSIVE: i32 = 1;

// ── Structs ──────────────────────────────────────────────────────

/// `NDIlib_send_create_t`.
#[repr(C)]
pub struct SenderDesc {
    pub p_ndi_name: *const c_char,
    pub p_groups: *const c_char,
    pub clock_video: bool,
    pub clock_audio: bool,
}

/// `NDIlib_video_frame_v2_t`.
#[repr(C)]
pub struct VideoFrameDesc {
    pub xres: i32,
    pub yres: i32,
    pub fourcc: i32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub picture_aspect_ratio: f32,
    pub frame_format_type: i32,
    pub timecode: i64,
    pub p_data: *const u8,
    pub line_stride_in_bytes: i32,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

// ── Entry points ─────────────────────────────────────────────────

/// Present from SDK v5 onward; used only as a version gate.
pub const SYM_V5_LOAD: &str = "NDIlib_v5_load";

pub const SYM_INITIALIZE: &str = "NDIlib_initialize";
pub const SYM_DESTROY: &str = "NDIlib_destroy";
pub const SYM_VERSION: &str = "NDIlib_version";
pub const SYM_SEND_CREATE: &str = "NDIlib_send_create";
pub const SYM_SEND_DESTROY: &str = "NDIlib_send_destroy";
pub const SYM_SEND_VIDEO_ASYNC: &str = "NDIlib_send_send_video_async_v2";

pub type V5LoadFn = unsafe extern "C" fn() -> *const c_void;
pub type InitializeFn = unsafe extern "C" fn() -> bool;
pub type DestroyFn = unsafe extern "C" fn();
pub type VersionFn = unsafe extern "C" fn() -> *const c_char;
pub type SendCreateFn = unsafe extern "C" fn(*const SenderDesc) -> *mut c_void;
pub type SendDestroyFn = unsafe extern "C" fn(*mut c_void);
pub type SendVideoAsyncFn = unsafe extern "C" fn(*mut c_void, *const VideoFrameDesc);

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_values_match_the_sdk() {
        assert_eq!(FOURCC_RGBA, 0x4142_4752);
        assert_eq!(FOURCC_BGRA, 0x4152_4742);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn struct_layouts_match_the_sdk() {
        assert_eq!(std::mem::size_of::<VideoFrameDesc>(), 72);
        assert_eq!(std::mem::size_of::<SenderDesc>(), 24);
    }
}

//! Direct3D 11 graphics backend for Windows hosts.
//!
//! Render-target textures live in GPU default memory; transport buffers
//! are filled by mapping staging textures with `DO_NOT_WAIT`, so a copy
//! that is still in flight surfaces as [`RelayError::StagingNotReady`]
//! instead of stalling the render thread.
//!
//! # Platform
//!
//! This module is **Windows-only** and is compiled out everywhere else;
//! non-Windows builds use [`SoftwareDevice`](crate::gfx::SoftwareDevice).
//!
//! # Safety
//!
//! All unsafe FFI calls are confined to this module.

use std::collections::HashMap;

use tracing::warn;
use windows::Win32::Graphics::{
    Direct3D::D3D_DRIVER_TYPE_HARDWARE,
    Direct3D11::*,
    Dxgi::{Common::*, DXGI_ERROR_WAS_STILL_DRAWING},
};

use crate::error::RelayError;
use crate::frame::PixelFormat;
use crate::gfx::{BlendFactor, ClearFlags, ColorSpace, GraphicsDevice, StagingId, TextureId};

struct GpuTexture {
    texture: ID3D11Texture2D,
    rtv: ID3D11RenderTargetView,
}

struct GpuStaging {
    texture: ID3D11Texture2D,
    width: u32,
    height: u32,
    format: PixelFormat,
}

/// [`GraphicsDevice`] backed by a hardware D3D11 device and its
/// immediate context.
pub struct D3d11Device {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    textures: HashMap<u64, GpuTexture>,
    stagings: HashMap<u64, GpuStaging>,
    next_id: u64,

    bound_target: Option<TextureId>,
    color_space: ColorSpace,
    ortho: [f32; 6],
    blend_stack: Vec<ID3D11BlendState>,
    context_depth: u32,
}

fn dxgi_format(format: PixelFormat) -> DXGI_FORMAT {
    match format {
        PixelFormat::Rgba8 => DXGI_FORMAT_R8G8B8A8_UNORM,
        PixelFormat::Bgra8 => DXGI_FORMAT_B8G8R8A8_UNORM,
    }
}

fn d3d_blend(factor: BlendFactor) -> D3D11_BLEND {
    match factor {
        BlendFactor::One => D3D11_BLEND_ONE,
        BlendFactor::Zero => D3D11_BLEND_ZERO,
        BlendFactor::SrcAlpha => D3D11_BLEND_SRC_ALPHA,
        BlendFactor::InvSrcAlpha => D3D11_BLEND_INV_SRC_ALPHA,
    }
}

impl D3d11Device {
    /// Create a hardware device with its immediate context.
    pub fn new() -> Result<Self, RelayError> {
        let mut device = None;
        let mut context = None;
        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None, // feature levels — let the driver decide
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(|e| RelayError::Other(format!("D3D11CreateDevice failed: {e}")))?;
        }

        let device = device.ok_or_else(|| RelayError::Other("D3D11 device is None".into()))?;
        let context = context.ok_or_else(|| RelayError::Other("D3D11 context is None".into()))?;

        Ok(Self {
            device,
            context,
            textures: HashMap::new(),
            stagings: HashMap::new(),
            next_id: 1,
            bound_target: None,
            color_space: ColorSpace::Srgb,
            ortho: [0.0; 6],
            blend_stack: Vec::new(),
            context_depth: 0,
        })
    }

    /// Orthographic projection parameters from the last `set_ortho`:
    /// `[left, right, top, bottom, near, far]`.
    pub fn ortho_params(&self) -> [f32; 6] {
        self.ortho
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn apply_render_target(&self) {
        let rtv = self
            .bound_target
            .and_then(|id| self.textures.get(&id.0))
            .map(|tex| tex.rtv.clone());
        match rtv {
            Some(rtv) => unsafe { self.context.OMSetRenderTargets(Some(&[Some(rtv)]), None) },
            None => unsafe { self.context.OMSetRenderTargets(None, None) },
        }
    }

    fn blend_desc(src: BlendFactor, dst: BlendFactor) -> D3D11_BLEND_DESC {
        let target = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: true.into(),
            SrcBlend: d3d_blend(src),
            DestBlend: d3d_blend(dst),
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: d3d_blend(src),
            DestBlendAlpha: d3d_blend(dst),
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };
        let mut desc = D3D11_BLEND_DESC::default();
        desc.RenderTarget[0] = target;
        desc
    }
}

// ── GraphicsDevice ───────────────────────────────────────────────

impl GraphicsDevice for D3d11Device {
    fn enter_context(&mut self) {
        // The immediate context needs no explicit acquire; the counter
        // keeps scope bookkeeping honest.
        self.context_depth += 1;
    }

    fn leave_context(&mut self) {
        if self.context_depth == 0 {
            warn!("graphics context released more times than acquired");
            return;
        }
        self.context_depth -= 1;
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureId, RelayError> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: dxgi_format(format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };

        let mut texture = None;
        unsafe {
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture))
                .map_err(|e| RelayError::TextureAllocation {
                    width,
                    height,
                    reason: format!("CreateTexture2D failed: {e}"),
                })?;
        }
        let texture = texture.ok_or(RelayError::TextureAllocation {
            width,
            height,
            reason: "CreateTexture2D returned None".into(),
        })?;

        let mut rtv = None;
        unsafe {
            self.device
                .CreateRenderTargetView(&texture, None, Some(&mut rtv))
                .map_err(|e| RelayError::TextureAllocation {
                    width,
                    height,
                    reason: format!("CreateRenderTargetView failed: {e}"),
                })?;
        }
        let rtv = rtv.ok_or(RelayError::TextureAllocation {
            width,
            height,
            reason: "CreateRenderTargetView returned None".into(),
        })?;

        let id = self.next_id();
        self.textures.insert(id, GpuTexture { texture, rtv });
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id.0).is_none() {
            warn!("destroy of unknown {id}");
        }
        if self.bound_target == Some(id) {
            self.bound_target = None;
            self.apply_render_target();
        }
    }

    fn create_staging(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<StagingId, RelayError> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: dxgi_format(format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        let mut texture = None;
        unsafe {
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture))
                .map_err(|e| RelayError::StagingAllocation {
                    width,
                    height,
                    reason: format!("CreateTexture2D (staging) failed: {e}"),
                })?;
        }
        let texture = texture.ok_or(RelayError::StagingAllocation {
            width,
            height,
            reason: "CreateTexture2D (staging) returned None".into(),
        })?;

        let id = self.next_id();
        self.stagings.insert(
            id,
            GpuStaging {
                texture,
                width,
                height,
                format,
            },
        );
        Ok(StagingId(id))
    }

    fn destroy_staging(&mut self, id: StagingId) {
        if self.stagings.remove(&id.0).is_none() {
            warn!("destroy of unknown {id}");
        }
    }

    fn render_target(&self) -> (Option<TextureId>, ColorSpace) {
        (self.bound_target, self.color_space)
    }

    fn set_render_target(&mut self, target: Option<TextureId>, space: ColorSpace) {
        if let Some(id) = target {
            if !self.textures.contains_key(&id.0) {
                warn!("bind of unknown {id}");
            }
        }
        self.bound_target = target;
        self.color_space = space;
        self.apply_render_target();
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let viewport = D3D11_VIEWPORT {
            TopLeftX: x as f32,
            TopLeftY: y as f32,
            Width: width as f32,
            Height: height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        unsafe { self.context.RSSetViewports(Some(&[viewport])) };
    }

    fn set_ortho(&mut self, left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) {
        // Consumed by whichever shader pass the host's frame source binds.
        self.ortho = [left, right, top, bottom, near, far];
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        if !flags.contains(ClearFlags::COLOR) {
            return;
        }
        let Some(tex) = self.bound_target.and_then(|id| self.textures.get(&id.0)) else {
            warn!("clear with no render target bound");
            return;
        };
        unsafe { self.context.ClearRenderTargetView(&tex.rtv, &color) };
    }

    fn push_blend_state(&mut self, src: BlendFactor, dst: BlendFactor) {
        let desc = Self::blend_desc(src, dst);
        let mut state = None;
        let created = unsafe { self.device.CreateBlendState(&desc, Some(&mut state)) };
        match (created, state) {
            (Ok(()), Some(state)) => {
                unsafe { self.context.OMSetBlendState(&state, None, u32::MAX) };
                self.blend_stack.push(state);
            }
            (Err(e), _) => warn!("CreateBlendState failed: {e}; draw keeps previous blending"),
            (Ok(()), None) => warn!("CreateBlendState returned None"),
        }
    }

    fn pop_blend_state(&mut self) {
        if self.blend_stack.pop().is_none() {
            warn!("blend state popped with empty stack");
            return;
        }
        match self.blend_stack.last() {
            Some(prev) => unsafe { self.context.OMSetBlendState(prev, None, u32::MAX) },
            None => unsafe { self.context.OMSetBlendState(None, None, u32::MAX) },
        }
    }

    fn stage_texture(&mut self, dst: StagingId, src: TextureId) {
        let Some(tex) = self.textures.get(&src.0) else {
            warn!("stage from unknown {src}");
            return;
        };
        let Some(staging) = self.stagings.get(&dst.0) else {
            warn!("stage into unknown {dst}");
            return;
        };
        unsafe { self.context.CopyResource(&staging.texture, &tex.texture) };
    }

    fn read_staging(&mut self, src: StagingId, dst: &mut [u8]) -> Result<(), RelayError> {
        let staging = self.stagings.get(&src.0).ok_or(RelayError::UnknownHandle {
            kind: "staging",
            id: src.0,
        })?;

        let bpp = staging.format.bytes_per_pixel();
        let tight = staging.width as usize * bpp;
        let expected = tight * staging.height as usize;
        if dst.len() != expected {
            return Err(RelayError::StagingRead(format!(
                "destination is {} bytes, surface holds {}",
                dst.len(),
                expected
            )));
        }

        // DO_NOT_WAIT keeps the render thread unblocked: a copy still in
        // flight reports WAS_STILL_DRAWING instead of stalling.
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(
                    &staging.texture,
                    0,
                    D3D11_MAP_READ,
                    D3D11_MAP_FLAG_DO_NOT_WAIT.0 as u32,
                    Some(&mut mapped),
                )
                .map_err(|e| {
                    if e.code() == DXGI_ERROR_WAS_STILL_DRAWING {
                        RelayError::StagingNotReady
                    } else {
                        RelayError::StagingRead(format!("Map failed: {e}"))
                    }
                })?;
        }

        // Tight-pack rows; RowPitch is usually wider than width × bpp.
        let pitch = mapped.RowPitch as usize;
        let total = pitch * staging.height as usize;
        let rows = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, total) };
        for y in 0..staging.height as usize {
            dst[y * tight..(y + 1) * tight].copy_from_slice(&rows[y * pitch..y * pitch + tight]);
        }

        unsafe { self.context.Unmap(&staging.texture, 0) };
        Ok(())
    }
}

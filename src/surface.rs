//! The off-screen rendering surface frames are produced into.

use std::fmt;
use std::os::raw::c_void;

use drm_fourcc::{DrmFourcc, DrmModifier};
use gbm::{AsRaw, BufferObject, Device as GbmDevice, Surface as GbmSurface};

use crate::device::DrmDeviceFd;
use crate::error::{AccessError, Error};
use crate::framebuffer::FramebufferBinding;

/// The scanout format of the pipeline.
///
/// 32-bit ARGB with a linear layout keeps the scanout path working across
/// target devices without any format negotiation.
pub const SCANOUT_FORMAT: DrmFourcc = DrmFourcc::Argb8888;

/// Ring of buffer objects the renderer draws into, sized to the output mode.
///
/// The raw surface pointer doubles as the native window handle the
/// rendering stack creates its window surface from; after every swap the
/// freshly rendered front buffer is locked here and handed to presentation.
pub struct RenderSurface {
    // declared before the device so buffers die before their allocator
    surface: GbmSurface<FramebufferBinding>,
    device: GbmDevice<DrmDeviceFd>,
    size: (u16, u16),
}

impl fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSurface")
            .field("size", &self.size)
            .field("format", &SCANOUT_FORMAT)
            .finish_non_exhaustive()
    }
}

impl RenderSurface {
    /// Create the buffer allocation device and a surface matching `size`.
    pub(crate) fn new(fd: &DrmDeviceFd, size: (u16, u16)) -> Result<RenderSurface, Error> {
        let device = GbmDevice::new(fd.clone()).map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Failed to create gbm device",
                dev: fd.dev_path(),
                source,
            })
        })?;

        let surface = device
            .create_surface_with_modifiers(
                u32::from(size.0),
                u32::from(size.1),
                SCANOUT_FORMAT,
                [DrmModifier::Linear].iter().copied(),
            )
            .map_err(|source| {
                Error::Access(AccessError {
                    errmsg: "Failed to create scanout surface",
                    dev: fd.dev_path(),
                    source,
                })
            })?;

        Ok(RenderSurface {
            surface,
            device,
            size,
        })
    }

    /// Lock the most recently rendered front buffer.
    ///
    /// Must be called exactly once per swap of the rendering surface. The
    /// buffer returns to the ring when the returned object is dropped.
    pub fn lock_front(&mut self) -> Result<BufferObject<FramebufferBinding>, Error> {
        unsafe { self.surface.lock_front_buffer() }.map_err(Error::FrontBufferLock)
    }

    /// Size of the surface in pixels.
    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    /// The buffer allocation device backing this surface.
    pub fn device(&self) -> &GbmDevice<DrmDeviceFd> {
        &self.device
    }

    /// Opaque native display handle for the rendering stack.
    pub fn native_display(&self) -> *mut c_void {
        self.device.as_raw() as *mut c_void
    }

    /// Opaque native window handle for the rendering stack.
    pub fn native_window(&self) -> *mut c_void {
        self.surface.as_raw() as *mut c_void
    }
}

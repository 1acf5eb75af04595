//! The display output aggregate.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use drm::control::{property, AtomicCommitFlags, Device as ControlDevice, Mode};
use drm::{ClientCapability, Device as BasicDevice};
use drm_fourcc::DrmFourcc;
use gbm::BufferObject;
use tracing::{debug, info, info_span, trace, warn};

use crate::cursor::Cursor;
use crate::device::DrmDeviceFd;
use crate::error::{AccessError, Error};
use crate::framebuffer::{self, FramebufferBinding};
use crate::pipe::DisplayPipe;
use crate::screen::{self, ScreenGeometry};
use crate::surface::{RenderSurface, SCANOUT_FORMAT};

static OUTPUT_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Marker owning the process-wide output slot.
#[derive(Debug)]
struct OutputClaim(());

impl OutputClaim {
    fn acquire() -> Result<OutputClaim, Error> {
        if OUTPUT_CLAIMED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyOpen);
        }
        Ok(OutputClaim(()))
    }
}

impl Drop for OutputClaim {
    fn drop(&mut self) {
        OUTPUT_CLAIMED.store(false, Ordering::SeqCst);
    }
}

/// An owned display output: one connector driven end-to-end, from buffer
/// allocation to atomic presentation.
///
/// At most one `Output` exists per process; opening a second one fails
/// until the first is dropped. All operations run synchronously on the
/// calling thread, there is no background machinery.
///
/// Field order doubles as teardown order: the displayed buffer goes back
/// to the surface first, then cursor and surface release their buffers,
/// and the device node closes last.
#[derive(Debug)]
pub struct Output {
    shown: Option<BufferObject<FramebufferBinding>>,
    cursor: Cursor,
    surface: RenderSurface,
    pipe: DisplayPipe,
    mode: Mode,
    mode_blob: Option<property::Value<'static>>,
    needs_modeset: bool,
    fd: DrmDeviceFd,
    span: tracing::Span,
    _claim: OutputClaim,
}

impl Output {
    /// Open the drm node at `path` and resolve a display output on it.
    ///
    /// Fails without leaving anything behind if no connected output with a
    /// usable encoder/crtc/plane chain is found, if the device lacks atomic
    /// modesetting, or if the rendering surface cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Output, Error> {
        let path = path.as_ref();
        let span = info_span!("scanout", dev = %path.display());
        let guard = span.enter();

        let claim = OutputClaim::acquire()?;
        let fd = DrmDeviceFd::open(path)?;

        // this also exposes the full set of planes to enumeration
        fd.set_client_capability(ClientCapability::Atomic, true)
            .map_err(|_| Error::AtomicsNotSupported(fd.dev_path()))?;

        let (pipe, mode) = DisplayPipe::resolve(&fd)?;
        let (w, h) = mode.size();
        info!(connector = ?pipe.connector(), "driving output at {}x{}", w, h);

        let surface = RenderSurface::new(&fd, mode.size())?;
        let cursor = Cursor::new(fd.clone(), pipe.crtc());

        drop(guard);
        Ok(Output {
            shown: None,
            cursor,
            surface,
            pipe,
            mode,
            mode_blob: None,
            needs_modeset: true,
            fd,
            span,
            _claim: claim,
        })
    }

    /// Present the most recently rendered frame.
    ///
    /// Locks the surface's front buffer, ensures it has a framebuffer and
    /// submits the atomic commit; the first successful commit also
    /// configures connector, mode and crtc. On failure the frame is
    /// dropped, the previously presented buffer stays on screen and the
    /// output remains usable.
    pub fn present(&mut self) -> Result<(), Error> {
        let span = self.span.clone();
        let _guard = span.enter();

        let mut next = self.surface.lock_front()?;
        let fb = framebuffer::attach(&self.fd, &mut next)?;

        let modeset = if self.needs_modeset {
            Some(self.mode_blob()?)
        } else {
            None
        };
        let request = self.pipe.present_request(fb, self.mode.size(), modeset)?;

        let flags = if self.needs_modeset {
            AtomicCommitFlags::ALLOW_MODESET
        } else {
            AtomicCommitFlags::empty()
        };
        trace!(?fb, modeset = self.needs_modeset, "submitting frame");
        self.fd
            .atomic_commit(flags, request.into_atomic())
            .map_err(|source| {
                Error::Access(AccessError {
                    errmsg: "Atomic commit failed",
                    dev: self.fd.dev_path(),
                    source,
                })
            })?;

        if self.needs_modeset {
            debug!("output configured");
            self.needs_modeset = false;
        }
        // the superseded buffer returns to the ring only now, after the
        // kernel accepted the frame replacing it
        self.shown = Some(next);
        Ok(())
    }

    fn mode_blob(&mut self) -> Result<property::Value<'static>, Error> {
        if let Some(blob) = self.mode_blob {
            return Ok(blob);
        }
        let blob = self.fd.create_property_blob(&self.mode).map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Failed to create property blob for mode",
                dev: self.fd.dev_path(),
                source,
            })
        })?;
        self.mode_blob = Some(blob);
        Ok(blob)
    }

    /// The mode the output is driven at.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The buffer object currently on screen, if a frame was presented.
    pub fn displayed(&self) -> Option<&BufferObject<FramebufferBinding>> {
        self.shown.as_ref()
    }

    /// The resolved kms object chain behind this output.
    pub fn pipe(&self) -> &DisplayPipe {
        &self.pipe
    }

    /// The rendering surface frames are produced into.
    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// The pixel format scanned out by this output.
    pub fn native_format(&self) -> DrmFourcc {
        SCANOUT_FORMAT
    }

    /// Number of screens in the current configuration.
    pub fn screen_count(&self) -> usize {
        1
    }

    /// Geometry of the screen at `index`; all-zero for indices beyond 0.
    pub fn screen_geometry(&self, index: usize) -> ScreenGeometry {
        screen::geometry(self.mode.size(), index)
    }

    /// Set the cursor dimensions used by subsequent image uploads.
    pub fn configure_cursor(&mut self, width: u32, height: u32) {
        self.cursor.configure(width, height);
    }

    /// Upload a new cursor image, see [`Cursor::set_image`].
    pub fn set_cursor_image(&mut self, pixels: &[u8]) {
        let _guard = self.span.enter();
        self.cursor.set_image(self.surface.device(), pixels);
    }

    /// Show or hide the hardware cursor.
    pub fn set_cursor_visibility(&mut self, visible: bool) {
        let _guard = self.span.enter();
        self.cursor.set_visibility(visible);
    }

    /// Move the hardware cursor to a logical position.
    pub fn set_cursor_position(&mut self, x: i32, y: i32) {
        let _guard = self.span.enter();
        self.cursor.set_position(x, y);
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        let _guard = self.span.enter();
        if let Some(blob) = self.mode_blob.take() {
            if let Err(err) = self.fd.destroy_property_blob(blob.into()) {
                warn!(?err, "failed to destroy mode property blob");
            }
        }
        info!("closing display output");
    }
}

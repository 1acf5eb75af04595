//! Attaching kernel framebuffers to rendered buffer objects.

use std::io;

use drm::buffer::PlanarBuffer;
use drm::control::{framebuffer, Device as ControlDevice, FbCmd2Flags};
use gbm::BufferObject;
use tracing::{trace, warn};

use crate::device::DrmDeviceFd;
use crate::error::{AccessError, Error};

/// A kernel framebuffer registered for one buffer object.
///
/// Lives as userdata on the buffer object it was created for, so a buffer
/// object that cycles through the surface ring keeps its framebuffer across
/// presentations. The framebuffer is unregistered when the buffer object is
/// destroyed, which the allocator only does once nothing scans it out
/// anymore.
#[derive(Debug)]
pub struct FramebufferBinding {
    fd: DrmDeviceFd,
    fb: framebuffer::Handle,
}

impl FramebufferBinding {
    /// The kernel framebuffer handle.
    pub fn handle(&self) -> framebuffer::Handle {
        self.fb
    }
}

impl AsRef<framebuffer::Handle> for FramebufferBinding {
    fn as_ref(&self) -> &framebuffer::Handle {
        &self.fb
    }
}

impl Drop for FramebufferBinding {
    fn drop(&mut self) {
        trace!(fb = ?self.fb, "destroying framebuffer");
        if let Err(err) = self.fd.destroy_framebuffer(self.fb) {
            warn!(fb = ?self.fb, ?err, "failed to destroy framebuffer");
        }
    }
}

/// Return the framebuffer for `bo`, registering one on first use.
///
/// Registration reads the buffer's planar layout and modifier and uses the
/// multi-planar, modifier-aware framebuffer call. On failure the buffer
/// object is left without a binding, so a later frame can retry.
pub(crate) fn attach(
    fd: &DrmDeviceFd,
    bo: &mut BufferObject<FramebufferBinding>,
) -> Result<framebuffer::Handle, Error> {
    if let Ok(Some(binding)) = bo.userdata() {
        return Ok(binding.fb);
    }

    let flags = if PlanarBuffer::modifier(&*bo).is_some() {
        FbCmd2Flags::MODIFIERS
    } else {
        FbCmd2Flags::empty()
    };
    let fb = fd.add_planar_framebuffer(&*bo, flags).map_err(|source| {
        Error::Access(AccessError {
            errmsg: "Failed to add framebuffer",
            dev: fd.dev_path(),
            source,
        })
    })?;
    trace!(?fb, "registered framebuffer for buffer object");

    let binding = FramebufferBinding { fd: fd.clone(), fb };
    if bo.set_userdata(binding).is_err() {
        // Only reachable once the gbm device is gone; the binding above
        // already unregistered itself again when it was dropped.
        return Err(Error::Access(AccessError {
            errmsg: "Buffer object outlived its allocation device",
            dev: fd.dev_path(),
            source: io::Error::new(io::ErrorKind::Other, "gbm device destroyed"),
        }));
    }

    Ok(fb)
}

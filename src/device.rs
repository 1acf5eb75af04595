//! Shared ownership of the opened drm node.

use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drm::control::Device as ControlDevice;
use drm::Device as BasicDevice;
use rustix::fs::{Mode, OFlags};
use tracing::{info, warn};

use crate::error::{AccessError, Error};

#[derive(Debug)]
struct InternalDeviceFd {
    fd: OwnedFd,
    path: PathBuf,
    privileged: bool,
}

impl AsFd for InternalDeviceFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
impl BasicDevice for InternalDeviceFd {}
impl ControlDevice for InternalDeviceFd {}

impl Drop for InternalDeviceFd {
    fn drop(&mut self) {
        info!("Dropping device: {:?}", self.path);
        if self.privileged {
            if let Err(err) = self.release_master_lock() {
                warn!("Failed to drop drm master state: {}", err);
            }
        }
    }
}

/// Ref-counted file descriptor of an open drm device.
///
/// Every component of the pipeline that needs to issue ioctls holds a clone
/// of this; the node is closed once the last clone is gone.
#[derive(Debug, Clone)]
pub struct DrmDeviceFd(Arc<InternalDeviceFd>);

impl AsFd for DrmDeviceFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.fd.as_fd()
    }
}
impl BasicDevice for DrmDeviceFd {}
impl ControlDevice for DrmDeviceFd {}

impl DrmDeviceFd {
    /// Open the drm node at `path` read-write.
    ///
    /// Tries to acquire the drm master lock, which is released again on drop.
    /// Newer kernels grant master implicitly if no other process holds it, so
    /// failing to acquire it is not an error.
    pub fn open(path: &Path) -> Result<DrmDeviceFd, Error> {
        let fd = rustix::fs::open(
            path,
            OFlags::RDWR | OFlags::CLOEXEC | OFlags::NOCTTY,
            Mode::empty(),
        )
        .map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Failed to open drm device",
                dev: Some(path.to_owned()),
                source: source.into(),
            })
        })?;

        let mut dev = InternalDeviceFd {
            fd,
            path: path.to_owned(),
            privileged: false,
        };
        if dev.acquire_master_lock().is_err() {
            warn!("Unable to become drm master, assuming unprivileged mode");
        } else {
            dev.privileged = true;
        }

        Ok(DrmDeviceFd(Arc::new(dev)))
    }

    /// Path the device was opened from, for error reporting.
    pub fn dev_path(&self) -> Option<PathBuf> {
        Some(self.0.path.clone())
    }
}

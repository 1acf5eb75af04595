//! Error types of the presentation pipeline.

use drm::control::{connector, crtc, encoder, RawResourceHandle};
use std::io;
use std::path::PathBuf;

/// Errors thrown by [`Output`](crate::Output) and its components.
///
/// Discovery errors are only ever returned from [`Output::open`](crate::Output::open)
/// and leave no state behind. Errors returned from
/// [`Output::present`](crate::Output::present) are scoped to the failed frame;
/// the output stays valid and keeps displaying the last good frame.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Another display output is already open in this process
    #[error("Another display output is already open in this process")]
    AlreadyOpen,
    /// The device does not support atomic modesetting
    ///
    /// There is no legacy fallback path, this is terminal.
    #[error("Atomic modesetting is not supported by device `{0:?}`")]
    AtomicsNotSupported(Option<PathBuf>),
    /// The device encountered an access error
    #[error(transparent)]
    Access(#[from] AccessError),
    /// No connected connector advertising at least one mode was found
    #[error("No connected connector with modes on device `{0:?}`")]
    NoConnectedConnector(Option<PathBuf>),
    /// The selected connector has no encoder driving it
    #[error("No encoder bound to connector {connector:?}")]
    NoEncoder {
        /// Connector that cannot be driven
        connector: connector::Handle,
    },
    /// The resolved encoder has no crtc bound to it
    #[error("No crtc bound to encoder {encoder:?}")]
    NoCrtc {
        /// Encoder without a crtc
        encoder: encoder::Handle,
    },
    /// The crtc is not scanning out anything, so the driving plane cannot be found
    #[error("No active framebuffer on crtc {crtc:?}")]
    NoActiveFramebuffer {
        /// Crtc without an active framebuffer
        crtc: crtc::Handle,
    },
    /// No plane is currently driving the crtc
    #[error("No plane driving crtc {crtc:?}")]
    NoScanoutPlane {
        /// Crtc without a matching plane
        crtc: crtc::Handle,
    },
    /// A kms object is missing a required property
    #[error("Object {handle:?} is missing the required property '{name}'")]
    UnknownProperty {
        /// Object the property was looked up on
        handle: RawResourceHandle,
        /// Name of the missing property
        name: &'static str,
    },
    /// Locking the front buffer of the rendering surface failed
    #[error("Failed to lock the surface front buffer")]
    FrontBufferLock(#[source] gbm::FrontBufferError),
}

/// Ioctl failure annotated with the operation and the device it happened on.
#[derive(Debug, thiserror::Error)]
#[error("DRM access error: {errmsg} on device `{dev:?}` ({source})")]
pub struct AccessError {
    /// Short description of the failed operation
    pub errmsg: &'static str,
    /// Device on which the error was generated
    pub dev: Option<PathBuf>,
    /// Underlying kernel error
    #[source]
    pub source: io::Error,
}

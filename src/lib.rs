#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # scanout: direct-to-hardware presentation
//!
//! This crate owns a physical display output end-to-end on compositor-less
//! embedded Linux systems: it discovers the connected monitor through
//! DRM/KMS, picks a mode, allocates a GBM-backed rendering surface, turns
//! rendered buffers into kernel framebuffers and presents them through
//! atomic commits. A hardware cursor overlay is driven on an independent
//! path. There is no window manager and no compositing; the output always
//! shows whole frames from a single client.
//!
//! ## Usage
//!
//! [`Output::open`] resolves everything in one step: it opens the device
//! node, picks the first connected connector and its preferred mode,
//! follows the connector's encoder to its crtc and the plane currently
//! driving it, and creates a rendering surface sized to the mode.
//!
//! The rendering stack binds to the surface through the opaque handles in
//! [`RenderSurface`]; each time it finishes a frame,
//! [`Output::present`] flips that frame onto the screen:
//!
//! ```no_run
//! use scanout::Output;
//!
//! let mut output = Output::open("/dev/dri/card0")?;
//! // hand output.surface().native_window() to the rendering stack,
//! // render a frame, then:
//! output.present()?;
//! # Ok::<(), scanout::Error>(())
//! ```
//!
//! The first `present` configures the output (modeset); every following
//! one is a plain page flip. A rejected commit leaves the previous frame
//! on screen and the output usable.
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]. Cursor operations are best-effort
//! and only ever log their failures; everything else reports errors
//! through [`Error`].

pub mod atomic;
pub mod config;
pub mod cursor;
mod device;
pub mod error;
pub mod framebuffer;
pub mod pipe;
mod props;
pub mod screen;
pub mod surface;

mod output;

pub use crate::config::FramebufferConfig;
pub use crate::cursor::Cursor;
pub use crate::device::DrmDeviceFd;
pub use crate::error::{AccessError, Error};
pub use crate::output::Output;
pub use crate::pipe::DisplayPipe;
pub use crate::props::PropertyCatalog;
pub use crate::screen::ScreenGeometry;
pub use crate::surface::RenderSurface;

//! Resolution of the connector → encoder → crtc → plane chain.

use drm::control::{connector, crtc, encoder, plane, Device as ControlDevice, Mode, ModeTypeFlags};
use tracing::{debug, warn};

use crate::device::DrmDeviceFd;
use crate::error::{AccessError, Error};
use crate::props::PropertyCatalog;

/// The resolved object chain driving one display output, together with the
/// property catalogs needed to address it in atomic requests.
///
/// Resolved once when the output is opened; there is no re-resolution on
/// hot-plug.
#[derive(Debug)]
pub struct DisplayPipe {
    pub(crate) connector: connector::Handle,
    pub(crate) encoder: encoder::Handle,
    pub(crate) crtc: crtc::Handle,
    pub(crate) plane: plane::Handle,
    pub(crate) connector_props: PropertyCatalog,
    pub(crate) crtc_props: PropertyCatalog,
    pub(crate) plane_props: PropertyCatalog,
}

impl DisplayPipe {
    /// Walk the device's resource graph and resolve the chain for the first
    /// connected connector.
    ///
    /// Connector policy is strictly first-match.
    // TODO: allow overriding the connector choice, e.g. through an
    // environment variable, instead of blindly picking the first one.
    pub(crate) fn resolve(fd: &DrmDeviceFd) -> Result<(DisplayPipe, Mode), Error> {
        let resources = fd.resource_handles().map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Error loading drm resources",
                dev: fd.dev_path(),
                source,
            })
        })?;

        let connector = resources
            .connectors()
            .iter()
            .filter_map(|conn| match fd.get_connector(*conn, false) {
                Ok(info) => Some(info),
                Err(err) => {
                    warn!(connector = ?conn, ?err, "skipping unreadable connector");
                    None
                }
            })
            .find(|info| {
                info.state() == connector::State::Connected && !info.modes().is_empty()
            })
            .ok_or_else(|| Error::NoConnectedConnector(fd.dev_path()))?;

        // modes() is non-empty, so this cannot fail
        let mode = select_mode(connector.modes())
            .ok_or_else(|| Error::NoConnectedConnector(fd.dev_path()))?;

        let encoder_handle = connector.current_encoder().ok_or(Error::NoEncoder {
            connector: connector.handle(),
        })?;
        let encoder = fd.get_encoder(encoder_handle).map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Error loading encoder info",
                dev: fd.dev_path(),
                source,
            })
        })?;

        let crtc_handle = encoder.crtc().ok_or(Error::NoCrtc {
            encoder: encoder_handle,
        })?;
        let crtc = fd.get_crtc(crtc_handle).map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Error loading crtc info",
                dev: fd.dev_path(),
                source,
            })
        })?;

        // We take over whatever plane the firmware or boot splash left
        // scanning out, not the result of a capability query. A crtc that
        // comes up without an active framebuffer cannot be resolved.
        let current_fb = crtc.framebuffer().ok_or(Error::NoActiveFramebuffer {
            crtc: crtc_handle,
        })?;
        let planes = fd.plane_handles().map_err(|source| {
            Error::Access(AccessError {
                errmsg: "Error loading plane resources",
                dev: fd.dev_path(),
                source,
            })
        })?;
        let plane = planes
            .iter()
            .copied()
            .filter_map(|plane| fd.get_plane(plane).ok().map(|info| (plane, info)))
            .find(|(_, info)| {
                info.crtc() == Some(crtc_handle) && info.framebuffer() == Some(current_fb)
            })
            .map(|(plane, _)| plane)
            .ok_or(Error::NoScanoutPlane { crtc: crtc_handle })?;

        let connector_props = PropertyCatalog::fetch(fd, connector.handle())?;
        let crtc_props = PropertyCatalog::fetch(fd, crtc_handle)?;
        let plane_props = PropertyCatalog::fetch(fd, plane)?;

        debug!(
            connector = ?connector.handle(),
            encoder = ?encoder_handle,
            crtc = ?crtc_handle,
            ?plane,
            "resolved display pipe"
        );

        Ok((
            DisplayPipe {
                connector: connector.handle(),
                encoder: encoder_handle,
                crtc: crtc_handle,
                plane,
                connector_props,
                crtc_props,
                plane_props,
            },
            mode,
        ))
    }

    /// The connector this pipe drives.
    pub fn connector(&self) -> connector::Handle {
        self.connector
    }

    /// The encoder converting pixel data for the connector.
    pub fn encoder(&self) -> encoder::Handle {
        self.encoder
    }

    /// The crtc generating scanout timings for this pipe.
    pub fn crtc(&self) -> crtc::Handle {
        self.crtc
    }

    /// The plane frames are presented on.
    pub fn plane(&self) -> plane::Handle {
        self.plane
    }
}

/// Pick the mode the output should be driven at.
///
/// The mode flagged preferred by the display wins; without one the mode with
/// the largest pixel area is chosen, ties broken by enumeration order.
pub(crate) fn select_mode(modes: &[Mode]) -> Option<Mode> {
    if let Some(preferred) = modes
        .iter()
        .find(|mode| mode.mode_type().contains(ModeTypeFlags::PREFERRED))
    {
        return Some(*preferred);
    }

    let mut chosen: Option<Mode> = None;
    for mode in modes {
        if chosen.map_or(true, |best| pixel_area(mode) > pixel_area(&best)) {
            chosen = Some(*mode);
        }
    }
    chosen
}

fn pixel_area(mode: &Mode) -> u32 {
    let (w, h) = mode.size();
    u32::from(w) * u32::from(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: u16, height: u16, preferred: bool) -> Mode {
        let mut raw: drm_ffi::drm_mode_modeinfo = unsafe { std::mem::zeroed() };
        raw.hdisplay = width;
        raw.vdisplay = height;
        if preferred {
            raw.type_ = drm_ffi::DRM_MODE_TYPE_PREFERRED;
        }
        // Mode wraps the ffi struct, there is no public constructor
        unsafe { std::mem::transmute(raw) }
    }

    #[test]
    fn preferred_mode_wins_over_larger_area() {
        let modes = [mode(1920, 1080, false), mode(1280, 720, true)];

        let selected = select_mode(&modes).unwrap();
        assert_eq!(selected.size(), (1280, 720));
    }

    #[test]
    fn largest_area_without_preferred_flag() {
        let modes = [
            mode(800, 600, false),
            mode(1920, 1080, false),
            mode(1024, 768, false),
        ];

        let selected = select_mode(&modes).unwrap();
        assert_eq!(selected.size(), (1920, 1080));
    }

    #[test]
    fn area_ties_break_by_enumeration_order() {
        let modes = [mode(1600, 900, false), mode(900, 1600, false)];

        let selected = select_mode(&modes).unwrap();
        assert_eq!(selected.size(), (1600, 900));
    }

    #[test]
    fn no_modes_selects_nothing() {
        assert!(select_mode(&[]).is_none());
    }
}

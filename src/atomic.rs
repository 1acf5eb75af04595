//! Construction of the atomic property transactions used for presentation.

use drm::control::atomic::AtomicModeReq;
use drm::control::{framebuffer, property, RawResourceHandle};

use crate::error::Error;
use crate::pipe::DisplayPipe;

/// Property assignments accumulated for one atomic commit.
///
/// Assignments are collected here before anything is handed to the kernel,
/// so a failed property lookup aborts the whole construction and a
/// partially-built transaction is simply dropped, never submitted.
#[derive(Debug, Default)]
pub struct PresentRequest {
    entries: Vec<(RawResourceHandle, property::Handle, property::Value<'static>)>,
}

impl PresentRequest {
    fn add(
        &mut self,
        object: impl Into<RawResourceHandle>,
        prop: property::Handle,
        value: property::Value<'static>,
    ) {
        self.entries.push((object.into(), prop, value));
    }

    /// The collected property assignments, in the order they were added.
    pub fn entries(&self) -> &[(RawResourceHandle, property::Handle, property::Value<'static>)] {
        &self.entries
    }

    pub(crate) fn into_atomic(self) -> AtomicModeReq {
        let mut req = AtomicModeReq::new();
        for (object, prop, value) in self.entries {
            req.add_raw_property(object, prop, value.into());
        }
        req
    }
}

impl DisplayPipe {
    /// Build the transaction presenting `fb` on this pipe.
    ///
    /// `modeset` carries the mode property blob on the first frame (and on
    /// retries of a failed first frame); it makes the request additionally
    /// bind the connector to the crtc, set the mode and activate the crtc.
    /// Steady-state frames only reprogram the plane.
    pub(crate) fn present_request(
        &self,
        fb: framebuffer::Handle,
        mode_size: (u16, u16),
        modeset: Option<property::Value<'static>>,
    ) -> Result<PresentRequest, Error> {
        let mut req = PresentRequest::default();

        if let Some(blob) = modeset {
            req.add(
                self.connector,
                self.connector_props.get("CRTC_ID")?,
                property::Value::CRTC(Some(self.crtc)),
            );
            req.add(self.crtc, self.crtc_props.get("MODE_ID")?, blob);
            req.add(
                self.crtc,
                self.crtc_props.get("ACTIVE")?,
                property::Value::Boolean(true),
            );
        }

        let (w, h) = mode_size;
        req.add(
            self.plane,
            self.plane_props.get("FB_ID")?,
            property::Value::Framebuffer(Some(fb)),
        );
        req.add(
            self.plane,
            self.plane_props.get("CRTC_ID")?,
            property::Value::CRTC(Some(self.crtc)),
        );
        req.add(
            self.plane,
            self.plane_props.get("SRC_X")?,
            property::Value::UnsignedRange(0),
        );
        req.add(
            self.plane,
            self.plane_props.get("SRC_Y")?,
            property::Value::UnsignedRange(0),
        );
        // SRC_* are 16.16 fixed point
        req.add(
            self.plane,
            self.plane_props.get("SRC_W")?,
            property::Value::UnsignedRange(u64::from(w) << 16),
        );
        req.add(
            self.plane,
            self.plane_props.get("SRC_H")?,
            property::Value::UnsignedRange(u64::from(h) << 16),
        );
        req.add(
            self.plane,
            self.plane_props.get("CRTC_X")?,
            property::Value::SignedRange(0),
        );
        req.add(
            self.plane,
            self.plane_props.get("CRTC_Y")?,
            property::Value::SignedRange(0),
        );
        req.add(
            self.plane,
            self.plane_props.get("CRTC_W")?,
            property::Value::UnsignedRange(u64::from(w)),
        );
        req.add(
            self.plane,
            self.plane_props.get("CRTC_H")?,
            property::Value::UnsignedRange(u64::from(h)),
        );

        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use drm::control::{connector, crtc, encoder, framebuffer, plane, property};

    use super::*;
    use crate::props::PropertyCatalog;

    const PLANE_PROPS: &[&str] = &[
        "FB_ID", "CRTC_ID", "SRC_X", "SRC_Y", "SRC_W", "SRC_H", "CRTC_X", "CRTC_Y", "CRTC_W",
        "CRTC_H",
    ];

    fn raw(id: u32) -> RawResourceHandle {
        NonZeroU32::new(id).unwrap()
    }

    fn pipe() -> DisplayPipe {
        DisplayPipe {
            connector: connector::Handle::from(raw(31)),
            encoder: encoder::Handle::from(raw(32)),
            crtc: crtc::Handle::from(raw(33)),
            plane: plane::Handle::from(raw(34)),
            connector_props: PropertyCatalog::from_names(raw(31), &["CRTC_ID"]),
            crtc_props: PropertyCatalog::from_names(raw(33), &["MODE_ID", "ACTIVE"]),
            plane_props: PropertyCatalog::from_names(raw(34), PLANE_PROPS),
        }
    }

    fn fb() -> framebuffer::Handle {
        framebuffer::Handle::from(raw(99))
    }

    fn assigned(
        req: &PresentRequest,
        object: RawResourceHandle,
        prop: property::Handle,
    ) -> Option<property::Value<'static>> {
        req.entries()
            .iter()
            .find(|(obj, p, _)| *obj == object && *p == prop)
            .map(|(_, _, value)| *value)
    }

    #[test]
    fn first_frame_contains_modeset_and_plane_properties() {
        let pipe = pipe();
        let blob = property::Value::Blob(77);

        let req = pipe.present_request(fb(), (1280, 720), Some(blob)).unwrap();

        let conn_crtc = assigned(&req, raw(31), pipe.connector_props.get("CRTC_ID").unwrap());
        assert!(matches!(
            conn_crtc,
            Some(property::Value::CRTC(Some(c))) if c == pipe.crtc
        ));
        assert!(matches!(
            assigned(&req, raw(33), pipe.crtc_props.get("MODE_ID").unwrap()),
            Some(property::Value::Blob(77))
        ));
        assert!(matches!(
            assigned(&req, raw(33), pipe.crtc_props.get("ACTIVE").unwrap()),
            Some(property::Value::Boolean(true))
        ));
        // plane properties are part of every request
        assert!(matches!(
            assigned(&req, raw(34), pipe.plane_props.get("FB_ID").unwrap()),
            Some(property::Value::Framebuffer(Some(f))) if f == fb()
        ));
        assert_eq!(req.entries().len(), 3 + PLANE_PROPS.len());
    }

    #[test]
    fn steady_state_frame_only_touches_the_plane() {
        let pipe = pipe();

        let req = pipe.present_request(fb(), (1280, 720), None).unwrap();

        assert_eq!(req.entries().len(), PLANE_PROPS.len());
        assert!(req
            .entries()
            .iter()
            .all(|(object, _, _)| *object == raw(34)));
    }

    #[test]
    fn source_rectangle_is_fixed_point_full_mode() {
        let pipe = pipe();

        let req = pipe.present_request(fb(), (1920, 1080), None).unwrap();

        assert!(matches!(
            assigned(&req, raw(34), pipe.plane_props.get("SRC_W").unwrap()),
            Some(property::Value::UnsignedRange(v)) if v == 1920 << 16
        ));
        assert!(matches!(
            assigned(&req, raw(34), pipe.plane_props.get("SRC_H").unwrap()),
            Some(property::Value::UnsignedRange(v)) if v == 1080 << 16
        ));
        assert!(matches!(
            assigned(&req, raw(34), pipe.plane_props.get("CRTC_W").unwrap()),
            Some(property::Value::UnsignedRange(1920))
        ));
        assert!(matches!(
            assigned(&req, raw(34), pipe.plane_props.get("CRTC_X").unwrap()),
            Some(property::Value::SignedRange(0))
        ));
    }

    #[test]
    fn missing_plane_property_aborts_the_build() {
        let mut pipe = pipe();
        pipe.plane_props = PropertyCatalog::from_names(raw(34), &["FB_ID", "CRTC_ID"]);

        match pipe.present_request(fb(), (1280, 720), None) {
            Err(Error::UnknownProperty { name, .. }) => assert_eq!(name, "SRC_X"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_modeset_property_aborts_the_first_frame() {
        let mut pipe = pipe();
        pipe.crtc_props = PropertyCatalog::from_names(raw(33), &["ACTIVE"]);

        let result = pipe.present_request(fb(), (1280, 720), Some(property::Value::Blob(1)));
        assert!(matches!(
            result,
            Err(Error::UnknownProperty { name: "MODE_ID", .. })
        ));
    }
}

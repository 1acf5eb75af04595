//! The hardware cursor overlay.

use drm::control::{crtc, Device as ControlDevice};
use gbm::{BufferObject, BufferObjectFlags, Device as GbmDevice};
use tracing::warn;

use crate::device::DrmDeviceFd;
use crate::screen::SCALE_FACTOR;
use crate::surface::SCANOUT_FORMAT;

/// State of the hardware cursor on the output's crtc.
///
/// Driven through the legacy cursor interface instead of an atomic plane,
/// which keeps it independent of the presentation path. Cursor updates are
/// best-effort: failures are logged and swallowed, they never invalidate
/// the display output.
// TODO: drive an owned overlay plane through the atomic interface instead,
// which would also cover devices without a cursor plane.
#[derive(Debug)]
pub struct Cursor {
    fd: DrmDeviceFd,
    crtc: crtc::Handle,
    size: (u32, u32),
    bo: Option<BufferObject<()>>,
    visible: bool,
}

impl Cursor {
    pub(crate) fn new(fd: DrmDeviceFd, crtc: crtc::Handle) -> Cursor {
        Cursor {
            fd,
            crtc,
            size: (0, 0),
            bo: None,
            visible: false,
        }
    }

    /// Set the dimensions used by subsequent image uploads.
    ///
    /// Does not allocate anything until an image is supplied.
    pub fn configure(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Upload a new cursor image from tightly packed 32-bit ARGB pixels.
    ///
    /// The copy is bounds-checked against `pixels`: a buffer shorter than
    /// `width * height * 4` bytes truncates the upload instead of reading
    /// past the end. The previous cursor buffer is destroyed only after the
    /// new one has been installed.
    pub fn set_image(&mut self, device: &GbmDevice<DrmDeviceFd>, pixels: &[u8]) {
        let (width, height) = self.size;
        if width == 0 || height == 0 {
            warn!("cursor dimensions not configured, ignoring image");
            return;
        }

        let mut bo = match device.create_buffer_object::<()>(
            width,
            height,
            SCANOUT_FORMAT,
            BufferObjectFlags::SCANOUT | BufferObjectFlags::LINEAR,
        ) {
            Ok(bo) => bo,
            Err(err) => {
                warn!(?err, "failed to create cursor buffer object");
                return;
            }
        };

        let mapped = bo.map_mut(device, 0, 0, width, height, |map| {
            let stride = map.stride() as usize;
            write_rows(map.buffer_mut(), stride, pixels, width as usize, height as usize);
        });
        match mapped {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(?err, "failed to map cursor buffer object");
                return;
            }
            Err(err) => {
                warn!(?err, "cursor buffer object unusable");
                return;
            }
        }

        if self.visible {
            if let Err(err) = self.fd.set_cursor(self.crtc, Some(&bo)) {
                warn!(?err, "failed to update cursor image");
            }
        }
        // install-before-drop: the old image stays alive until the new one
        // took over on the crtc
        self.bo = Some(bo);
    }

    /// Show or hide the cursor.
    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;

        let result = match (visible, self.bo.as_ref()) {
            (true, Some(bo)) => self.fd.set_cursor(self.crtc, Some(bo)),
            _ => self.fd.set_cursor(self.crtc, None::<&BufferObject<()>>),
        };
        if let Err(err) = result {
            warn!(?err, "failed to set cursor visibility");
        }
    }

    /// Move the cursor to a logical position, scaled to device pixels.
    pub fn set_position(&mut self, x: i32, y: i32) {
        let x = (x as f32 * SCALE_FACTOR) as i32;
        let y = (y as f32 * SCALE_FACTOR) as i32;
        if let Err(err) = self.fd.move_cursor(self.crtc, (x, y)) {
            warn!(?err, "failed to move cursor");
        }
    }
}

/// Copy `pixels` into the mapped cursor buffer row by row.
///
/// Rows in the destination are `stride` bytes apart; the source is tightly
/// packed. The copy stops at the end of `pixels`, short rows are copied
/// partially.
pub(crate) fn write_rows(dst: &mut [u8], stride: usize, pixels: &[u8], width: usize, height: usize) {
    let row_len = width * 4;
    for row in 0..height {
        let src_start = row * row_len;
        let src_end = (src_start + row_len).min(pixels.len());
        if src_start >= src_end {
            break;
        }
        let src_row = &pixels[src_start..src_end];
        let dst_row = &mut dst[row * stride..row * stride + src_row.len()];
        dst_row.copy_from_slice(src_row);
        #[cfg(feature = "cursor-premultiply")]
        premultiply_row(dst_row);
    }
}

#[cfg(feature = "cursor-premultiply")]
fn premultiply_row(row: &mut [u8]) {
    for px in row.chunks_exact_mut(4) {
        let alpha = u16::from(px[3]);
        px[0] = ((u16::from(px[0]) * alpha) / 255) as u8;
        px[1] = ((u16::from(px[1]) * alpha) / 255) as u8;
        px[2] = ((u16::from(px[2]) * alpha) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_buffer_is_copied_completely() {
        let pixels: Vec<u8> = (0..4 * 4 * 2).map(|i| i as u8).collect();
        let mut dst = vec![0u8; 4 * 4 * 2];

        write_rows(&mut dst, 4 * 4, &pixels, 4, 2);

        #[cfg(not(feature = "cursor-premultiply"))]
        assert_eq!(dst, pixels);
        #[cfg(feature = "cursor-premultiply")]
        assert_eq!(dst[3], pixels[3]);
    }

    #[test]
    fn short_buffer_truncates_the_copy() {
        // one and a half rows of a 4x2 cursor, opaque so the premultiply
        // variant copies the same bytes
        let pixels = vec![0xff; 24];
        let mut dst = vec![0u8; 4 * 4 * 2];

        write_rows(&mut dst, 4 * 4, &pixels, 4, 2);

        assert!(dst[..16].iter().all(|&b| b == 0xff));
        // second row got only half a row of source bytes
        assert!(dst[16..24].iter().all(|&b| b == 0xff));
        assert!(dst[24..].iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_buffer_copies_nothing() {
        let mut dst = vec![0xffu8; 32];

        write_rows(&mut dst, 16, &[], 4, 2);

        assert!(dst.iter().all(|&b| b == 0xff));
    }

    #[test]
    fn stride_larger_than_row_leaves_padding_untouched() {
        let pixels = vec![0xff; 4 * 4 * 2];
        let mut dst = vec![0u8; 32 * 2];

        write_rows(&mut dst, 32, &pixels, 4, 2);

        assert!(dst[..16].iter().all(|&b| b == 0xff));
        assert!(dst[16..32].iter().all(|&b| b == 0));
        assert!(dst[32..48].iter().all(|&b| b == 0xff));
    }

    #[cfg(feature = "cursor-premultiply")]
    #[test]
    fn premultiply_scales_color_by_alpha() {
        // one pixel: b=200, g=100, r=50, a=127
        let pixels = [200u8, 100, 50, 127];
        let mut dst = [0u8; 4];

        write_rows(&mut dst, 4, &pixels, 1, 1);

        assert_eq!(dst[3], 127);
        assert_eq!(dst[0], (200u16 * 127 / 255) as u8);
        assert_eq!(dst[1], (100u16 * 127 / 255) as u8);
        assert_eq!(dst[2], (50u16 * 127 / 255) as u8);
    }
}

//! Interface types shared with the rendering stack.

use drm_fourcc::DrmFourcc;

/// Framebuffer configuration requirements handed over by the rendering
/// stack when it chooses a rendering configuration for the output.
///
/// The output itself only ever scans out one format, so config selection
/// boils down to matching these requested bit depths against the scanout
/// format's layout and checking that an on-screen surface was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferConfig {
    /// Bits for the red channel
    pub red: i32,
    /// Bits for the green channel
    pub green: i32,
    /// Bits for the blue channel
    pub blue: i32,
    /// Bits for the alpha channel
    pub alpha: i32,
    /// Bits for the depth buffer
    pub depth: i32,
    /// Whether an on-screen (window) surface is requested
    pub window_surface: bool,
}

impl FramebufferConfig {
    /// Whether this configuration can be satisfied by the given scanout
    /// format.
    ///
    /// Only 32-bit ARGB is scanned out; anything asking for more bits per
    /// channel, or for an off-screen surface, is rejected.
    pub fn compatible_with(&self, format: DrmFourcc) -> bool {
        if !self.window_surface {
            return false;
        }
        match format {
            DrmFourcc::Argb8888 => {
                self.red <= 8 && self.green <= 8 && self.blue <= 8 && self.alpha <= 8
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FramebufferConfig {
        FramebufferConfig {
            red: 8,
            green: 8,
            blue: 8,
            alpha: 8,
            depth: 24,
            window_surface: true,
        }
    }

    #[test]
    fn standard_config_matches_scanout_format() {
        assert!(config().compatible_with(DrmFourcc::Argb8888));
    }

    #[test]
    fn offscreen_configs_are_rejected() {
        let mut config = config();
        config.window_surface = false;
        assert!(!config.compatible_with(DrmFourcc::Argb8888));
    }

    #[test]
    fn deeper_channels_are_rejected() {
        let mut config = config();
        config.red = 10;
        assert!(!config.compatible_with(DrmFourcc::Argb8888));
    }
}

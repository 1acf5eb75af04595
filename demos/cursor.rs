//! Opens the first display output and drives the hardware cursor along a
//! diagonal, without involving any rendering stack.
//!
//! Run as root (or with drm master available):
//!
//! ```sh
//! cargo run --example cursor -- /dev/dri/card0
//! ```

use std::{thread, time::Duration};

use scanout::Output;

const CURSOR_SIZE: u32 = 64;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/dri/card0".into());

    let mut output = match Output::open(&path) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("failed to open {}: {}", path, err);
            std::process::exit(1);
        }
    };

    let geometry = output.screen_geometry(0);
    println!(
        "screen: {}x{} depth {} dpi {} scale {}",
        geometry.width, geometry.height, geometry.depth, geometry.dpi, geometry.scale
    );

    output.configure_cursor(CURSOR_SIZE, CURSOR_SIZE);
    output.set_cursor_image(&checkerboard());
    output.set_cursor_visibility(true);

    let steps = geometry.height.min(geometry.width);
    for pos in (0..steps).step_by(8) {
        output.set_cursor_position(pos, pos);
        thread::sleep(Duration::from_millis(16));
    }

    output.set_cursor_visibility(false);
}

fn checkerboard() -> Vec<u8> {
    let mut pixels = Vec::with_capacity((CURSOR_SIZE * CURSOR_SIZE * 4) as usize);
    for y in 0..CURSOR_SIZE {
        for x in 0..CURSOR_SIZE {
            let on = (x / 8 + y / 8) % 2 == 0;
            // b, g, r, a
            pixels.extend_from_slice(if on {
                &[0xff, 0xff, 0xff, 0xff]
            } else {
                &[0x00, 0x00, 0x00, 0x80]
            });
        }
    }
    pixels
}

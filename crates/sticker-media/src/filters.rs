//! FFmpeg video filter definitions.

/// Transparent padding so letterboxed stickers keep a clean edge.
const PAD_COLOR: &str = "0x00000000";

/// Scale into a `canvas`x`canvas` square, keeping aspect ratio, centered on
/// a transparent background.
pub fn filter_square_canvas(canvas: u32) -> String {
    format!(
        "scale={c}:{c}:force_original_aspect_ratio=decrease,\
         format=rgba,\
         pad={c}:{c}:(ow-iw)/2:(oh-ih)/2:color={pad}",
        c = canvas,
        pad = PAD_COLOR
    )
}

/// Fixed frame rate followed by the square canvas.
pub fn filter_animated_canvas(canvas: u32, fps: u32) -> String {
    format!("fps={},{}", fps, filter_square_canvas(canvas))
}

use nalgebra as na;
use na::Vector3;

use crate::error::PipelineError;
use crate::pipeline::buffers::try_alloc_with;

/// Float rgb image the fragment stage writes into.
/// (0, 0) is the top left pixel, rows are stored top to bottom.
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Vector3<f32>>, // Channels in [0.0, 1.0].
}

/// Maps a channel in [0.0, 1.0] to a byte, out of range values are clamped.
pub fn to_u8(channel: f32) -> u8 {
    return (channel.clamp(0.0, 1.0) * 255.0) as u8;
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        let pixels = try_alloc_with("framebuffer", width as usize * height as usize, Vector3::zeros)?;
        return Ok(Self { width, height, pixels });
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn pixels(&self) -> &[Vector3<f32>] {
        return &self.pixels[..];
    }

    pub fn pixels_mut(&mut self) -> &mut [Vector3<f32>] {
        return &mut self.pixels[..];
    }

    /// Color at (x, y), None outside of the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vector3<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        return Some(self.pixels[(x + y * self.width) as usize]);
    }

    /// Presentation format: interleaved rgba8, row major, top left origin, alpha is always 0.
    /// `out` is resized to fit and can be reused between frames.
    pub fn present_rgba8(&self, out: &mut Vec<u8>) {
        out.resize(4 * self.pixels.len(), 0);
        for (pixel, color) in out.chunks_exact_mut(4).zip(&self.pixels) {
            pixel[0] = to_u8(color.x);
            pixel[1] = to_u8(color.y);
            pixel[2] = to_u8(color.z);
            pixel[3] = 0;
        }
    }

    /// Copy as an rgb8 image, used for display and for saving to disk.
    pub fn to_rgb_image(&self) -> ::image::RgbImage {
        return ::image::RgbImage::from_fn(self.width, self.height, |x, y| {
            let color = self.pixels[(x + y * self.width) as usize];
            return ::image::Rgb([to_u8(color.x), to_u8(color.y), to_u8(color.z)]);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use na::vector;

    fn gradient() -> Framebuffer {
        let mut framebuffer = Framebuffer::new(3, 2).unwrap();
        for (i, pixel) in framebuffer.pixels_mut().iter_mut().enumerate() {
            *pixel = vector![i as f32 / 5.0, 1.0, 0.0];
        }
        return framebuffer;
    }

    #[test]
    fn channels_are_clamped_to_bytes() {
        assert_eq!(to_u8(0.0), 0);
        assert_eq!(to_u8(1.0), 255);
        assert_eq!(to_u8(2.0), 255);
        assert_eq!(to_u8(-0.5), 0);
        assert_eq!(to_u8(0.5), 127);
    }

    #[test]
    fn rgba8_is_row_major_with_zero_alpha() {
        let framebuffer = gradient();
        let mut out = Vec::new();
        framebuffer.present_rgba8(&mut out);
        assert_eq!(out.len(), 3 * 2 * 4);
        assert!(out.chunks_exact(4).all(|p| p[3] == 0 && p[1] == 255));
        // Pixel (2, 1) is the last one.
        assert_eq!(out[4 * 5], 255);
        assert_eq!(out[4 * 1], to_u8(0.2));
    }

    #[test]
    fn rgb_image_matches_pixels() {
        let framebuffer = gradient();
        let image = framebuffer.to_rgb_image();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 1)[0], to_u8(framebuffer.pixel(1, 1).unwrap().x));
        assert!(framebuffer.pixel(3, 0).is_none());
    }
}

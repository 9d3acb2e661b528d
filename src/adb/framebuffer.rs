// Raw framebuffer decoding into PNG bytes
use super::error::{AdbError, AdbResult};
use image::{ImageBuffer, ImageFormat, codecs::png::PngEncoder};
use std::io::Cursor;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Convert framebuffer bytes into PNG for a screen of `width` x `height`.
///
/// Handles already-encoded PNG/JPEG payloads and raw RGBA, RGB and RGB565
/// layouts. Raw data may carry a header; pixels are taken from the tail.
pub fn framebuffer_to_png(data: Vec<u8>, width: u32, height: u32) -> AdbResult<Vec<u8>> {
    let pixel_count = (width as usize) * (height as usize);
    let data_len = data.len();

    if data.starts_with(PNG_MAGIC) {
        return Ok(data);
    }
    if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
        return jpeg_to_png(&data);
    }

    if pixel_count == 0 || data_len < pixel_count * 2 {
        return Err(AdbError::FramebufferToPngFailed {
            description: format!(
                "{} bytes is too small for {}x{} (minimum {} bytes for RGB565)",
                data_len,
                width,
                height,
                pixel_count * 2
            ),
        });
    }

    let bytes_per_pixel = if data_len >= pixel_count * 4 {
        4
    } else if data_len >= pixel_count * 3 {
        3
    } else {
        2
    };
    let pixels = &data[data_len - pixel_count * bytes_per_pixel..];
    log::debug!(
        "framebuffer {}x{}: {} bytes, {} bytes/pixel",
        width,
        height,
        data_len,
        bytes_per_pixel
    );

    let malformed = || AdbError::FramebufferToPngFailed {
        description: format!("pixel buffer does not fit {}x{}", width, height),
    };

    let mut png = Vec::new();
    let encoder = PngEncoder::new(Cursor::new(&mut png));
    let encoded = match bytes_per_pixel {
        4 => ImageBuffer::<image::Rgba<u8>, _>::from_raw(width, height, pixels.to_vec())
            .ok_or_else(malformed)?
            .write_with_encoder(encoder),
        3 => ImageBuffer::<image::Rgb<u8>, _>::from_raw(width, height, pixels.to_vec())
            .ok_or_else(malformed)?
            .write_with_encoder(encoder),
        _ => ImageBuffer::<image::Rgb<u8>, _>::from_raw(width, height, rgb565_to_rgb(pixels))
            .ok_or_else(malformed)?
            .write_with_encoder(encoder),
    };
    encoded.map_err(|e| AdbError::FramebufferToPngFailed {
        description: e.to_string(),
    })?;
    Ok(png)
}

fn rgb565_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for chunk in pixels.chunks_exact(2) {
        let pixel = u16::from_le_bytes([chunk[0], chunk[1]]);
        let r = ((pixel >> 11) & 0x1F) as u8;
        let g = ((pixel >> 5) & 0x3F) as u8;
        let b = (pixel & 0x1F) as u8;
        rgb.push((r << 3) | (r >> 2));
        rgb.push((g << 2) | (g >> 4));
        rgb.push((b << 3) | (b >> 2));
    }
    rgb
}

pub fn jpeg_to_png(jpeg_data: &[u8]) -> AdbResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(jpeg_data, ImageFormat::Jpeg).map_err(|e| {
        AdbError::JpegToPngFailed {
            description: e.to_string(),
        }
    })?;
    let mut png = Vec::new();
    img.write_with_encoder(PngEncoder::new(Cursor::new(&mut png)))
        .map_err(|e| AdbError::JpegToPngFailed {
            description: e.to_string(),
        })?;
    Ok(png)
}

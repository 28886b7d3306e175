use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

use crate::models::qr_record::Customization;

/// Codes are rendered at level H so a centered logo can obscure up to ~30%
/// of the modules and still scan.
const LOGO_FRACTION: u32 = 4;

pub fn render_svg(content: &str, custom: &Customization) -> Result<String> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::H)
        .context("QR code generation failed")?;

    let svg = code
        .render::<svg::Color>()
        .min_dimensions(300, 300)
        .quiet_zone(custom.margin > 0)
        .dark_color(svg::Color(&custom.color))
        .light_color(svg::Color(&custom.background_color))
        .build();

    Ok(svg)
}

/// PNG rendering with the customization colors applied and, when configured,
/// the owner's logo composited over the center of the code.
pub fn render_png(content: &str, custom: &Customization) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::H)
        .context("QR code generation failed")?;

    let modules = code
        .render::<image::Luma<u8>>()
        .min_dimensions(300, 300)
        .quiet_zone(custom.margin > 0)
        .build();

    let dark = parse_hex_color(&custom.color).unwrap_or([0, 0, 0, 255]);
    let light = parse_hex_color(&custom.background_color).unwrap_or([255, 255, 255, 255]);

    let mut canvas = RgbaImage::new(modules.width(), modules.height());
    for (x, y, pixel) in modules.enumerate_pixels() {
        let color = if pixel.0[0] == 0 { dark } else { light };
        canvas.put_pixel(x, y, Rgba(color));
    }

    if let Some(path) = custom.logo.as_deref() {
        match image::open(path) {
            Ok(logo) => overlay_logo(&mut canvas, &logo),
            Err(e) => log::warn!("Skipping logo {}: {}", path, e),
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buffer, ImageFormat::Png)
        .context("PNG encoding failed")?;
    Ok(buffer.into_inner())
}

fn overlay_logo(canvas: &mut RgbaImage, logo: &DynamicImage) {
    let target = canvas.width() / LOGO_FRACTION;
    let scaled = logo
        .resize(target, target, imageops::FilterType::Lanczos3)
        .to_rgba8();
    let x = (canvas.width() - scaled.width()) / 2;
    let y = (canvas.height() - scaled.height()) / 2;
    imageops::overlay(canvas, &scaled, i64::from(x), i64::from(y));
}

fn parse_hex_color(hex: &str) -> Option<[u8; 4]> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b, 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_carries_the_customization_colors() {
        let custom = Customization {
            color: "#112233".to_string(),
            background_color: "#ffeedd".to_string(),
            logo: None,
            margin: 4,
        };
        let svg = render_svg("https://example.com/track/abc/def", &custom).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("#112233"));
        assert!(svg.contains("#ffeedd"));
    }

    #[test]
    fn png_round_trips_through_the_image_decoder() {
        let bytes = render_png("https://example.com", &Customization::default()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.width() >= 300);
    }

    #[test]
    fn hex_parsing_rejects_garbage() {
        assert_eq!(parse_hex_color("#000000"), Some([0, 0, 0, 255]));
        assert_eq!(parse_hex_color("#ff00ff"), Some([255, 0, 255, 255]));
        assert_eq!(parse_hex_color("ff00ff"), None);
        assert_eq!(parse_hex_color("#xyzxyz"), None);
        assert_eq!(parse_hex_color("#fff"), None);
    }
}

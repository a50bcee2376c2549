//! pairing code rendering.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Luma, imageops};
use qrcode::{EcLevel, QrCode};

use crate::error::WhatsAppError;

/// edge length of rendered codes.
pub const QR_SIZE: u32 = 256;

/// render `payload` as a 256px medium-ecc qr png, base64 encoded.
pub fn render_qr_png_base64(payload: &str) -> Result<String, WhatsAppError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| WhatsAppError::Qr(e.to_string()))?;
    let img = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();
    let img = imageops::resize(&img, QR_SIZE, QR_SIZE, imageops::FilterType::Nearest);

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| WhatsAppError::Qr(e.to_string()))?;
    Ok(STANDARD.encode(png))
}

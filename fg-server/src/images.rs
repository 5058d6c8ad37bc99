use anyhow::{anyhow, ensure, Context, Result};
use base64::Engine;

const MAX_UPLOAD_BYTES: usize = 20_000_000;
const MAX_SIDE: u32 = 2048;

/// Decode a client-supplied image and re-encode it as webp for storage.
///
/// Accepts either a `data:image/...;base64,` URL or bare base64.
pub fn decode_upload(data: &str) -> Result<Vec<u8>> {
    let encoded = match data.split_once("base64,") {
        Some((header, rest)) if header.starts_with("data:") => rest,
        _ => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .context("Image is not valid base64")?;
    // Do some rudimentary validation
    ensure!(bytes.len() < MAX_UPLOAD_BYTES, "Image is too large");
    let mut img = image::load_from_memory(&bytes).context("Image could not be decoded")?;
    // If it's larger than 2048x2048, resize it
    img = if img.width() > MAX_SIDE || img.height() > MAX_SIDE {
        img.resize(MAX_SIDE, MAX_SIDE, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };
    // The webp encoder only takes 8-bit RGB(A)
    let img = image::DynamicImage::ImageRgba8(img.to_rgba8());
    // image::DynamicImage doesn't offer lossy webp, but "webp" does.
    let content_bytes = webp::Encoder::from_image(&img)
        .map_err(|e| anyhow!("WebP encoding error: {:?}", e))?
        .encode(75.0);
    Ok(content_bytes.to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// A tiny PNG as a data URL, the way browsers submit it.
    pub(crate) fn png_data_url() -> String {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            4,
            4,
            image::Rgb([200, 120, 40]),
        ));
        let mut bytes = Cursor::new(vec![]);
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
        )
    }

    #[test]
    fn data_url_is_reencoded_as_webp() {
        let webp_bytes = decode_upload(&png_data_url()).unwrap();
        let decoded =
            image::load_from_memory_with_format(&webp_bytes, image::ImageFormat::WebP).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_upload("data:image/png;base64,!!!").is_err());
        let not_an_image = base64::engine::general_purpose::STANDARD.encode(b"hello");
        assert!(decode_upload(&not_an_image).is_err());
    }
}

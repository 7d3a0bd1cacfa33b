//! 静态图片解码

use std::path::Path;

use image::RgbImage;

use crate::session::SessionError;

/// 解码图片文件为 RGB 帧, 失败时返回 `SessionError::Input`
pub fn load_image(path: &Path) -> Result<RgbImage, SessionError> {
    let img = image::open(path).map_err(|e| {
        log::error!("❌ 图片读取失败 {}: {}", path.display(), e);
        SessionError::Input(format!("Failed to read image {}: {}", path.display(), e))
    })?;
    log::info!(
        "🖼️ 图片已加载: {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();
        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn garbage_is_an_input_error() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"definitely not a jpeg").unwrap();
        assert!(matches!(
            load_image(file.path()),
            Err(SessionError::Input(_))
        ));
    }
}

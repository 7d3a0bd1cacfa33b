//! 输入模式与文件扩展名白名单

use std::fmt;
use std::path::Path;

use phf::phf_map;

use crate::session::SessionError;

/// 输入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Image,
    Video,
    Camera,
}

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// 扩展名 (小写) → 所属模式
static EXTENSION_MODES: phf::Map<&'static str, InputMode> = phf_map! {
    "jpg" => InputMode::Image,
    "jpeg" => InputMode::Image,
    "png" => InputMode::Image,
    "bmp" => InputMode::Image,
    "mp4" => InputMode::Video,
    "avi" => InputMode::Video,
    "mov" => InputMode::Video,
    "mkv" => InputMode::Video,
};

impl InputMode {
    pub const ALL: [InputMode; 3] = [InputMode::Image, InputMode::Video, InputMode::Camera];

    pub fn label(&self) -> &'static str {
        match self {
            InputMode::Image => "Image",
            InputMode::Video => "Video",
            InputMode::Camera => "Camera",
        }
    }

    /// 是否需要先选择文件
    pub fn needs_file(&self) -> bool {
        !matches!(self, InputMode::Camera)
    }

    /// 是否走后台拉流路径
    pub fn is_streaming(&self) -> bool {
        !matches!(self, InputMode::Image)
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            InputMode::Image => IMAGE_EXTENSIONS,
            InputMode::Video => VIDEO_EXTENSIONS,
            InputMode::Camera => &[],
        }
    }

    /// 文件对话框过滤器 (名称, 扩展名)
    pub fn dialog_filter(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            InputMode::Image => Some(("Images", IMAGE_EXTENSIONS)),
            InputMode::Video => Some(("Videos", VIDEO_EXTENSIONS)),
            InputMode::Camera => None,
        }
    }

    /// 切换模式后的状态栏文本
    pub fn status(&self) -> String {
        if self.needs_file() {
            format!("Mode: {}. Select a file", self.label())
        } else {
            format!("Mode: {}. Ready to start", self.label())
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 校验文件扩展名属于当前模式的白名单 (大小写不敏感)
pub fn validate_extension(mode: InputMode, path: &Path) -> Result<(), SessionError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match EXTENSION_MODES.get(ext.as_str()) {
        Some(m) if *m == mode => Ok(()),
        _ => Err(SessionError::Input(format!(
            "Unsupported file for {} mode: {}",
            mode,
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_extension_matches_its_mode() {
        for mode in [InputMode::Image, InputMode::Video] {
            for ext in mode.extensions() {
                let lower = format!("clip.{}", ext);
                let upper = format!("CLIP.{}", ext.to_ascii_uppercase());
                assert!(validate_extension(mode, Path::new(&lower)).is_ok());
                assert!(validate_extension(mode, Path::new(&upper)).is_ok());
            }
        }
    }

    #[test]
    fn mismatched_or_missing_extensions_are_rejected() {
        assert!(validate_extension(InputMode::Image, Path::new("a.mp4")).is_err());
        assert!(validate_extension(InputMode::Video, Path::new("a.png")).is_err());
        assert!(validate_extension(InputMode::Image, Path::new("a.gif")).is_err());
        assert!(validate_extension(InputMode::Image, Path::new("noext")).is_err());
        assert!(validate_extension(InputMode::Camera, Path::new("a.jpg")).is_err());
    }

    #[test]
    fn status_text_per_mode() {
        assert_eq!(InputMode::Image.status(), "Mode: Image. Select a file");
        assert_eq!(InputMode::Video.status(), "Mode: Video. Select a file");
        assert_eq!(InputMode::Camera.status(), "Mode: Camera. Ready to start");
        assert!(InputMode::Camera.dialog_filter().is_none());
    }

    #[test]
    fn only_image_mode_runs_inline() {
        assert!(!InputMode::Image.is_streaming());
        assert!(InputMode::Video.is_streaming());
        assert!(InputMode::Camera.is_streaming());
    }
}

//! UI 线程可见的状态: 控件使能, 显示内容, 提示消息

use std::collections::BTreeSet;

use image::RgbaImage;

use super::SessionError;
use crate::detection::annotate::labels_summary;
use crate::detection::types::ProcessedFrame;
use crate::input::InputMode;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// 控件使能
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub file_enabled: bool,
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    /// 空闲配置: 摄像头无需文件; 图片/视频需要先选文件
    pub fn idle(mode: InputMode, has_input: bool) -> Self {
        Self {
            file_enabled: mode.needs_file(),
            start_enabled: !mode.needs_file() || has_input,
            stop_enabled: false,
        }
    }

    pub fn running() -> Self {
        Self {
            file_enabled: false,
            start_enabled: false,
            stop_enabled: true,
        }
    }
}

/// 弹窗提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(SessionError),
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::Info(_) => "Info",
            Notice::Error(e) => e.title(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::Info(msg) => msg.clone(),
            Notice::Error(e) => e.to_string(),
        }
    }
}

/// 最近一次显示的画面与标签; 只在 UI 线程修改
#[derive(Debug, Default)]
pub struct DisplayState {
    image: Option<RgbaImage>,
    labels: Option<BTreeSet<String>>,
    revision: u64,
}

impl DisplayState {
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// 每次画面变化自增, 渲染层据此决定是否重新上传纹理
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 标签栏文本: 尚未检测为 `None`, 无结果为 `No objects detected`
    pub fn labels_text(&self) -> String {
        match &self.labels {
            None => "None".to_string(),
            Some(labels) => labels_summary(labels),
        }
    }

    pub fn show_preview(&mut self, image: RgbaImage) {
        self.image = Some(image);
        self.revision += 1;
    }

    pub fn show_frame(&mut self, frame: ProcessedFrame) {
        self.image = Some(frame.image);
        self.labels = Some(frame.labels);
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_controls_follow_mode() {
        let cam = Controls::idle(InputMode::Camera, false);
        assert!(!cam.file_enabled && cam.start_enabled && !cam.stop_enabled);

        let img = Controls::idle(InputMode::Image, false);
        assert!(img.file_enabled && !img.start_enabled);
        assert!(Controls::idle(InputMode::Video, true).start_enabled);
    }

    #[test]
    fn labels_text_indicators() {
        let mut display = DisplayState::default();
        assert_eq!(display.labels_text(), "None");

        display.show_frame(ProcessedFrame {
            image: RgbaImage::new(2, 2),
            labels: BTreeSet::new(),
        });
        assert_eq!(display.labels_text(), "No objects detected");
        assert_eq!(display.revision(), 1);

        display.show_frame(ProcessedFrame {
            image: RgbaImage::new(2, 2),
            labels: ["person".to_string(), "car".to_string()].into(),
        });
        assert_eq!(display.labels_text(), "car, person");
    }
}

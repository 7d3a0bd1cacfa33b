//! 启动参数与工作台配置
//!
//! - `Args`: 命令行参数 (仅进程启动时解析一次)
//! - `StudioConfig`: JSON 配置文件, 不存在时写出默认值

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::detection::types::{DISPLAY_CONF_THRESHOLD, INF_SIZE};

/// 目标检测工作台参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLOv8 目标检测工作台 (图片 / 视频 / 摄像头)", long_about = None)]
pub struct Args {
    /// ONNX 模型路径
    #[arg(short, long, default_value = "models/yolov8s.onnx")]
    pub model: String,

    /// 模型不存在时的下载地址
    #[arg(long)]
    pub model_url: Option<String>,

    /// 摄像头设备索引
    #[arg(short, long, default_value_t = 0)]
    pub camera: usize,

    /// 配置文件路径
    #[arg(long, default_value = "studio.json")]
    pub config: String,

    /// 模型后处理置信度 (预过滤, 渲染阈值见配置文件)
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// NMS IOU阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 推理输入尺寸
    #[arg(long, default_value_t = INF_SIZE)]
    pub size: u32,

    /// 使用 CUDA 推理 (需要 `cuda` feature)
    #[arg(long)]
    pub cuda: bool,

    /// CUDA 设备ID
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 打印每个推理阶段耗时
    #[arg(long)]
    pub profile: bool,
}

/// ByteTrack 参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerParams {
    pub max_lost_frames: u32,      // 最大丢失帧数
    pub high_score_threshold: f32, // 高分阈值
    pub low_score_threshold: f32,  // 低分阈值
    pub high_iou_threshold: f32,   // 高分IOU阈值
    pub low_iou_threshold: f32,    // 低分IOU阈值
    pub kalman_obs_noise: f32,     // 卡尔曼观测噪声
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            max_lost_frames: 30,
            high_score_threshold: 0.4,
            low_score_threshold: 0.1,
            high_iou_threshold: 0.4,
            low_iou_threshold: 0.3,
            kalman_obs_noise: 0.5,
        }
    }
}

/// 工作台配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudioConfig {
    // === 渲染 ===
    pub display_conf_threshold: f32, // 绘制阈值 (严格大于)
    pub canvas_width: u32,           // 画布最大宽度
    pub canvas_height: u32,          // 画布最大高度
    pub box_thickness: u32,          // 检测框线宽
    pub label_font_size: f32,        // 标签字号
    pub font_paths: Vec<String>,     // 候选字体, 按顺序尝试

    // === 采集 ===
    pub camera_read_timeout_ms: u64, // 读帧超时, 超时视为流结束

    // === 跟踪 ===
    pub tracker: TrackerParams,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            display_conf_threshold: DISPLAY_CONF_THRESHOLD,
            canvas_width: 800,
            canvas_height: 600,
            box_thickness: 2,
            label_font_size: 16.0,
            font_paths: vec![
                "assets/font/DejaVuSans.ttf".to_string(),
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
                "/usr/share/fonts/TTF/DejaVuSans.ttf".to_string(),
                "/System/Library/Fonts/Supplemental/Arial.ttf".to_string(),
                "C:\\Windows\\Fonts\\arial.ttf".to_string(),
            ],
            camera_read_timeout_ms: 5000,
            tracker: TrackerParams::default(),
        }
    }
}

impl StudioConfig {
    /// 从JSON文件加载配置, 文件不存在时写出默认配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::error!("❌ 保存配置失败: {}", e);
                } else {
                    log::info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => log::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!(
            "🎛️ 绘制阈值 {:.2} | 画布 {}x{} | 读帧超时 {}ms | 最大丢失帧 {}",
            self.display_conf_threshold,
            self.canvas_width,
            self.canvas_height,
            self.camera_read_timeout_ms,
            self.tracker.max_lost_frames
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        let config = StudioConfig::load(&path);
        assert_eq!(config, StudioConfig::default());
        assert!(path.exists());
        assert_eq!(StudioConfig::load(&path), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        fs::write(&path, r#"{ "canvas_width": 1024, "tracker": { "max_lost_frames": 5 } }"#)
            .unwrap();
        let config = StudioConfig::load(&path);
        assert_eq!(config.canvas_width, 1024);
        assert_eq!(config.canvas_height, 600);
        assert_eq!(config.tracker.max_lost_frames, 5);
        assert_eq!(config.tracker.high_score_threshold, 0.4);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(StudioConfig::load(&path), StudioConfig::default());
    }

    #[test]
    fn args_defaults() {
        let args = Args::parse_from(["studio"]);
        assert_eq!(args.model, "models/yolov8s.onnx");
        assert_eq!(args.camera, 0);
        assert_eq!(args.size, INF_SIZE);
        assert!(!args.cuda);
    }
}

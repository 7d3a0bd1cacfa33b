/// 检测系统数据结构定义
/// Data structures for the detection session
use std::collections::BTreeSet;

use image::{RgbImage, RgbaImage};

// ========== 公共常量 ==========

/// YOLOv8推理输入尺寸
pub const INF_SIZE: u32 = 640;

/// 渲染阈值: 置信度严格大于该值的检测才会被绘制
pub const DISPLAY_CONF_THRESHOLD: f32 = 0.5;

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box), 原图像素坐标
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// 单个目标的检测结果 (检测器 → 会话)
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    /// 跟踪ID (仅 track 模式下存在)
    pub track_id: Option<u32>,
}

impl Detection {
    pub fn new(bbox: BBox) -> Self {
        Self {
            bbox,
            track_id: None,
        }
    }

    pub fn class_index(&self) -> usize {
        self.bbox.class_id as usize
    }

    pub fn confidence(&self) -> f32 {
        self.bbox.confidence
    }
}

/// 一帧的检测输出
#[derive(Clone, Debug, Default)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// 已标注并缩放的帧 (工作线程 → UI线程)
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    pub image: RgbaImage,
    pub labels: BTreeSet<String>,
}

/// 已解码帧 (采集 → 工作线程), RGB24
pub type Frame = RgbImage;

#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 启动参数与配置文件
pub mod detection; // 检测/跟踪/标注
pub mod input; // 图片/视频/摄像头输入
pub mod models; // 模型接口与具体实现
pub mod renderer; // macroquad + egui 界面
pub mod session; // 检测会话控制器

pub mod ort_backend;

pub use crate::config::{Args, StudioConfig};
pub use crate::models::{Model, YOLOv8};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};

use crate::detection::types::BBox;

/// 贪心NMS: 按置信度降序, 与已保留框 IOU 超过阈值的框被丢弃
pub fn non_max_suppression(xs: &mut Vec<BBox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = detection::tracker::compute_iou(&xs[prev_index], &xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, confidence: f32) -> BBox {
        BBox {
            x1,
            y1: 0.0,
            x2: x1 + 10.0,
            y2: 10.0,
            confidence,
            class_id: 0,
        }
    }

    #[test]
    fn nms_keeps_highest_of_overlapping_boxes() {
        let mut boxes = vec![bbox(0.0, 0.6), bbox(1.0, 0.9), bbox(50.0, 0.3)];
        non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence, 0.9);
        assert_eq!(boxes[1].confidence, 0.3);
    }
}

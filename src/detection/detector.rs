//! 检测器 (Detector)
//! 职责: 单帧 → YOLO检测 (→ ByteTrack跟踪) → 检测结果

use std::time::Instant;

use anyhow::Result;
use image::DynamicImage;

use super::bytetrack::ByteTracker;
use super::types::{Detection, DetectionBatch, Frame};
use crate::config::TrackerParams;
use crate::models::Model;

/// 检测/跟踪协作者接口
///
/// 会话层只通过该接口使用模型, 跟踪状态对会话层不可见。
pub trait Detect: Send {
    /// 单次检测, 不更新跟踪状态
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch>;

    /// 检测 + 跟踪, 同一逻辑视频流的连续调用保持目标ID
    fn track(&mut self, frame: &Frame) -> Result<DetectionBatch>;

    /// 开始新的逻辑视频流
    fn reset_tracks(&mut self);

    /// 类别索引 → 类别名
    fn names(&self) -> Vec<String>;
}

pub struct Detector {
    model: Box<dyn Model>,
    tracker: ByteTracker,

    // 统计
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl Detector {
    pub fn new(model: Box<dyn Model>, params: TrackerParams) -> Self {
        model.summary();
        Self {
            model,
            tracker: ByteTracker::new(params),
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<super::types::BBox>> {
        let t = Instant::now();
        // 这里的克隆与模型预处理的缩放相比开销很小
        let images = [DynamicImage::ImageRgb8(frame.clone())];
        let mut results = self.model.forward(&images)?;
        let boxes = results.pop().unwrap_or_default();
        let inference_ms = t.elapsed().as_secs_f64() * 1000.0;

        self.count += 1;
        let elapsed = self.last.elapsed();
        if elapsed.as_secs() >= 1 {
            self.current_fps = self.count as f64 / elapsed.as_secs_f64();
            log::info!(
                "🎯 检测: {}个目标 | {:.1}ms/帧 | {:.1}fps",
                boxes.len(),
                inference_ms,
                self.current_fps
            );
            self.count = 0;
            self.last = Instant::now();
        }
        Ok(boxes)
    }
}

impl Detect for Detector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        let boxes = self.infer(frame)?;
        Ok(DetectionBatch::new(
            boxes.into_iter().map(Detection::new).collect(),
        ))
    }

    fn track(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        let boxes = self.infer(frame)?;
        Ok(DetectionBatch::new(self.tracker.update(&boxes)))
    }

    fn reset_tracks(&mut self) {
        self.tracker.reset();
    }

    fn names(&self) -> Vec<String> {
        self.model.names().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;
    use ndarray::{Array, IxDyn};

    /// 固定输出的模型: 每次返回同一个框
    struct FixedModel {
        names: Vec<String>,
    }

    impl Model for FixedModel {
        fn preprocess(&mut self, _images: &[DynamicImage]) -> Result<Array<f32, IxDyn>> {
            Ok(Array::zeros(IxDyn(&[1])))
        }

        fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
            Ok(vec![xs])
        }

        fn postprocess(
            &self,
            _xs: Vec<Array<f32, IxDyn>>,
            _xs0: &[DynamicImage],
        ) -> Result<Vec<Vec<BBox>>> {
            Ok(vec![vec![BBox {
                x1: 10.0,
                y1: 10.0,
                x2: 60.0,
                y2: 80.0,
                confidence: 0.9,
                class_id: 1,
            }]])
        }

        fn names(&self) -> &[String] {
            &self.names
        }

        fn summary(&self) {}
    }

    fn detector() -> Detector {
        let model = FixedModel {
            names: vec!["person".into(), "dog".into()],
        };
        Detector::new(Box::new(model), TrackerParams::default())
    }

    #[test]
    fn detect_has_no_track_ids() {
        let mut d = detector();
        let batch = d.detect(&Frame::new(100, 100)).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.detections[0].track_id, None);
        assert_eq!(d.names(), vec!["person", "dog"]);
    }

    #[test]
    fn track_keeps_identity_until_reset() {
        let mut d = detector();
        let frame = Frame::new(100, 100);
        let first = d.track(&frame).unwrap().detections[0].track_id;
        let second = d.track(&frame).unwrap().detections[0].track_id;
        assert!(first.is_some());
        assert_eq!(first, second);

        d.reset_tracks();
        assert_eq!(d.track(&frame).unwrap().detections[0].track_id, Some(1));
    }
}

//! ByteTrack 算法实现
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 高低分检测框分开处理
//! 2. 高分框优先匹配 (IOU)
//! 3. 低分框救援丢失的轨迹
//! 4. 纯运动模型,无需外观特征
//!
//! 只在同类别之间关联, 跨类别的框永远不会共用一个ID。

use super::tracker::{compute_iou, KalmanBoxFilter};
use super::types::{BBox, Detection};
use crate::config::TrackerParams;

/// ByteTrack 跟踪对象
#[derive(Clone)]
pub struct ByteTrackedObject {
    /// 唯一跟踪ID
    pub id: u32,

    /// 当前边界框 (卡尔曼滤波平滑后)
    pub bbox: BBox,

    kalman: KalmanBoxFilter,

    /// 连续丢失帧数
    pub frames_lost: u32,

    /// 总共被跟踪的帧数
    pub total_frames: u32,
}

impl ByteTrackedObject {
    fn new(id: u32, bbox: BBox, obs_noise: f32) -> Self {
        let kalman = KalmanBoxFilter::new(&bbox, 0.1, obs_noise);
        Self {
            id,
            bbox: kalman.get_state_bbox(),
            kalman,
            frames_lost: 0,
            total_frames: 1,
        }
    }

    fn predict(&mut self) {
        self.kalman.predict();
        self.bbox = self.kalman.get_state_bbox();
    }

    fn update(&mut self, bbox: &BBox) {
        self.kalman.update(bbox);
        self.bbox = self.kalman.get_state_bbox();
        self.frames_lost = 0;
        self.total_frames += 1;
    }

    fn mark_lost(&mut self) {
        self.frames_lost += 1;
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    tracked: Vec<ByteTrackedObject>,
    next_id: u32,
    params: TrackerParams,
}

impl ByteTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            tracked: Vec::new(),
            next_id: 1,
            params,
        }
    }

    /// 更新跟踪 (ByteTrack 三步匹配)
    ///
    /// 返回本帧被关联上的目标, 置信度取本帧观测值, 坐标取滤波结果。
    pub fn update(&mut self, detections: &[BBox]) -> Vec<Detection> {
        // 1. 所有轨迹先预测
        for tracked in &mut self.tracked {
            tracked.predict();
        }

        // 2. 分离高低分检测框
        let mut high_dets = Vec::new();
        let mut low_dets = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if det.confidence >= self.params.high_score_threshold {
                high_dets.push(idx);
            } else if det.confidence >= self.params.low_score_threshold {
                low_dets.push(idx);
            }
        }

        let mut matched_det = vec![false; detections.len()];
        let mut matched_track = vec![false; self.tracked.len()];
        let mut output = Vec::new();

        // 3. 第一轮匹配: 高分检测 + 所有轨迹
        let all_tracks: Vec<usize> = (0..self.tracked.len()).collect();
        let assignments = self.associate(
            detections,
            &high_dets,
            &all_tracks,
            self.params.high_iou_threshold,
        );
        for (det_idx, track_idx) in assignments {
            matched_det[det_idx] = true;
            matched_track[track_idx] = true;
            output.push(self.apply(track_idx, &detections[det_idx]));
        }

        // 4. 第二轮匹配: 低分检测 + 未匹配的轨迹 (救援)
        let unmatched_tracks: Vec<usize> = (0..self.tracked.len())
            .filter(|&idx| !matched_track[idx])
            .collect();
        let low_assignments = self.associate(
            detections,
            &low_dets,
            &unmatched_tracks,
            self.params.low_iou_threshold,
        );
        for (det_idx, track_idx) in low_assignments {
            matched_det[det_idx] = true;
            matched_track[track_idx] = true;
            output.push(self.apply(track_idx, &detections[det_idx]));
        }

        // 5. 未匹配的轨迹 → 标记丢失
        for (track_idx, &matched) in matched_track.iter().enumerate() {
            if !matched {
                self.tracked[track_idx].mark_lost();
            }
        }

        // 6. 未匹配的高分检测 → 新建轨迹
        for &det_idx in &high_dets {
            if !matched_det[det_idx] {
                let det = &detections[det_idx];
                let obj = ByteTrackedObject::new(self.next_id, det.clone(), self.params.kalman_obs_noise);
                output.push(Detection {
                    bbox: det.clone(),
                    track_id: Some(obj.id),
                });
                self.tracked.push(obj);
                self.next_id += 1;
            }
        }

        // 7. 删除丢失太久的轨迹
        let max_lost = self.params.max_lost_frames;
        self.tracked.retain(|t| t.frames_lost <= max_lost);

        output
    }

    /// 清除所有轨迹, ID 从1重新分配
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.next_id = 1;
    }

    pub fn track_count(&self) -> usize {
        self.tracked.len()
    }

    fn apply(&mut self, track_idx: usize, det: &BBox) -> Detection {
        let track = &mut self.tracked[track_idx];
        track.update(det);
        let mut bbox = track.bbox.clone();
        bbox.confidence = det.confidence;
        Detection {
            bbox,
            track_id: Some(track.id),
        }
    }

    /// 贪心 IOU 匹配 (同类别)
    fn associate(
        &self,
        detections: &[BBox],
        det_indices: &[usize],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        if det_indices.is_empty() || track_indices.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for &det_idx in det_indices {
            let det = &detections[det_idx];
            for &track_idx in track_indices {
                let track = &self.tracked[track_idx];
                if track.bbox.class_id != det.class_id {
                    continue;
                }
                let iou = compute_iou(det, &track.kalman.get_predicted_bbox());
                if iou >= iou_threshold {
                    candidates.push((1.0 - iou, det_idx, track_idx));
                }
            }
        }

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut assignments = Vec::new();
        let mut used_det = Vec::new();
        let mut used_track = Vec::new();
        for (_, det_idx, track_idx) in candidates {
            if !used_det.contains(&det_idx) && !used_track.contains(&track_idx) {
                assignments.push((det_idx, track_idx));
                used_det.push(det_idx);
                used_track.push(track_idx);
            }
        }

        assignments
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(TrackerParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, conf: f32, class_id: u32) -> BBox {
        BBox {
            x1: x,
            y1: 100.0,
            x2: x + 100.0,
            y2: 200.0,
            confidence: conf,
            class_id,
        }
    }

    #[test]
    fn id_persists_across_small_motion() {
        let mut tracker = ByteTracker::default();
        let first = tracker.update(&[det(100.0, 0.9, 0)]);
        assert_eq!(first.len(), 1);
        let id = first[0].track_id;

        let second = tracker.update(&[det(104.0, 0.9, 0)]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].track_id, id);
    }

    #[test]
    fn low_score_detection_rescues_existing_track() {
        let mut tracker = ByteTracker::default();
        let id = tracker.update(&[det(100.0, 0.9, 0)])[0].track_id;
        let rescued = tracker.update(&[det(102.0, 0.2, 0)]);
        assert_eq!(rescued.len(), 1);
        assert_eq!(rescued[0].track_id, id);
        assert!((rescued[0].confidence() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn low_score_detection_alone_starts_nothing() {
        let mut tracker = ByteTracker::default();
        assert!(tracker.update(&[det(100.0, 0.2, 0)]).is_empty());
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn different_classes_never_share_an_id() {
        let mut tracker = ByteTracker::default();
        let id = tracker.update(&[det(100.0, 0.9, 0)])[0].track_id;
        let other = tracker.update(&[det(100.0, 0.9, 2)]);
        assert_eq!(other.len(), 1);
        assert_ne!(other[0].track_id, id);
    }

    #[test]
    fn reset_restarts_ids() {
        let mut tracker = ByteTracker::default();
        tracker.update(&[det(100.0, 0.9, 0), det(400.0, 0.9, 1)]);
        tracker.reset();
        assert_eq!(tracker.track_count(), 0);
        assert_eq!(tracker.update(&[det(100.0, 0.9, 0)])[0].track_id, Some(1));
    }
}

/// 检测系统 (Detection System)
///
/// - Detector: 目标检测 (YOLOv8)
/// - ByteTracker: 目标追踪
/// - Annotator: 检测框与标签绘制
pub mod annotate;
pub mod bytetrack;
pub mod detector;
pub mod tracker;
pub mod types;

pub use annotate::{class_color, labels_summary, Annotator, NO_OBJECTS, PALETTE};
pub use bytetrack::ByteTracker;
pub use detector::{Detect, Detector};
pub use types::{BBox, Detection, DetectionBatch, Frame, ProcessedFrame};

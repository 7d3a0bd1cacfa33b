//! 后台拉流线程: 取帧 → 检测+跟踪 → 标注 → 交给 UI 线程
//!
//! 每处理一帧前都要拿到 UI 线程发来的许可, 因此最多领先显示一帧。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use super::SessionError;
use crate::detection::{Annotator, Detect, Frame, ProcessedFrame};
use crate::input::FrameSource;

pub(crate) type SharedDetector = Arc<Mutex<Box<dyn Detect>>>;

/// 工作线程 → UI 线程
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Frame(ProcessedFrame),
    /// 流结束 (视频读完或摄像头读取失败)
    Finished,
    Failed(SessionError),
}

pub(crate) struct Worker {
    pub running: Arc<AtomicBool>,
    pub source: Box<dyn FrameSource>,
    pub detector: SharedDetector,
    pub annotator: Annotator,
    pub permits: Receiver<()>,
    pub events: Sender<WorkerEvent>,
}

impl Worker {
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("detect-worker".into())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        log::info!("🚀 检测线程启动");

        let names = match self.detector.lock() {
            Ok(mut detector) => {
                detector.reset_tracks();
                detector.names()
            }
            Err(e) => {
                let _ = self
                    .events
                    .send(WorkerEvent::Failed(SessionError::processing(e)));
                self.source.release();
                return;
            }
        };

        let mut count = 0u32;
        let mut last = Instant::now();

        // 许可通道关闭 = 会话已停止
        while self.permits.recv().is_ok() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let frame = match self.source.read(&self.running) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("📹 输入流结束");
                    let _ = self.events.send(WorkerEvent::Finished);
                    break;
                }
                Err(e) => {
                    log::error!("❌ 读帧失败: {}", e);
                    let _ = self.events.send(WorkerEvent::Failed(e));
                    break;
                }
            };

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let event = match self.process(frame, &names) {
                Ok(processed) => WorkerEvent::Frame(processed),
                Err(e) => {
                    log::error!("❌ 帧处理失败: {}", e);
                    let _ = self.events.send(WorkerEvent::Failed(e));
                    break;
                }
            };
            if self.events.send(event).is_err() {
                break;
            }

            count += 1;
            if last.elapsed().as_secs() >= 1 {
                log::info!(
                    "📊 已处理 {} 帧 | {:.1}fps",
                    count,
                    count as f64 / last.elapsed().as_secs_f64()
                );
                count = 0;
                last = Instant::now();
            }
        }

        self.source.release();
        log::info!("🛑 检测线程退出");
    }

    fn process(&self, frame: Frame, names: &[String]) -> Result<ProcessedFrame, SessionError> {
        let batch = self
            .detector
            .lock()
            .map_err(SessionError::processing)?
            .track(&frame)
            .map_err(SessionError::processing)?;
        self.annotator
            .render(frame, &batch.detections, names)
            .map_err(SessionError::processing)
    }
}

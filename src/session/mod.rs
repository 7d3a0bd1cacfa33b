/// 检测会话控制器 (Detection Session Controller)
///
/// - 模式与输入选择
/// - 图片: UI 线程同步检测一次
/// - 视频/摄像头: 一个后台工作线程, 结果经 bounded(1) 通道交给 UI 线程
///
/// 状态机: `Idle → Running → Idle`。无论因何停止, 都走同一条清理路径。
mod display;
mod error;
mod worker;

pub use display::{Controls, DisplayState, Notice, SessionState};
pub use error::SessionError;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::detection::{Annotator, Detect};
use crate::input::{load_image, validate_extension, InputMode, SourceOpener};
use worker::{SharedDetector, Worker, WorkerEvent};

pub const VIDEO_COMPLETED: &str = "Video processing completed";

pub struct Session {
    mode: InputMode,
    input: Option<PathBuf>,
    camera_index: usize,
    state: SessionState,
    running: Arc<AtomicBool>,

    detector: SharedDetector,
    opener: Arc<dyn SourceOpener>,
    annotator: Annotator,

    worker: Option<JoinHandle<()>>,
    events: Option<Receiver<WorkerEvent>>,
    permits: Option<Sender<()>>,

    display: DisplayState,
    status: String,
    notices: VecDeque<Notice>,
}

impl Session {
    pub fn new(
        detector: Box<dyn Detect>,
        opener: Arc<dyn SourceOpener>,
        annotator: Annotator,
        camera_index: usize,
    ) -> Self {
        Self {
            mode: InputMode::default(),
            input: None,
            camera_index,
            state: SessionState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            detector: Arc::new(Mutex::new(detector)),
            opener,
            annotator,
            worker: None,
            events: None,
            permits: None,
            display: DisplayState::default(),
            status: "Ready".to_string(),
            notices: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn controls(&self) -> Controls {
        match self.state {
            SessionState::Running => Controls::running(),
            SessionState::Idle => Controls::idle(self.mode, self.input.is_some()),
        }
    }

    /// 取出下一条待显示的提示
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    fn notify_error(&mut self, e: SessionError) {
        log::error!("❌ {}: {}", e.title(), e);
        self.notices.push_back(Notice::Error(e));
    }

    /// 切换模式; 正在拉流时先停止
    pub fn select_mode(&mut self, mode: InputMode) {
        if self.is_running() {
            self.stop();
        }
        log::info!("🔄 切换模式: {} → {}", self.mode, mode);
        self.mode = mode;
        self.input = None;
        self.status = mode.status();
    }

    /// 文件对话框返回; `None` (取消) 不改变任何状态
    pub fn select_file(&mut self, path: Option<PathBuf>) {
        let Some(path) = path else {
            return;
        };
        if self.is_running() || !self.mode.needs_file() {
            log::warn!("⚠️ 当前状态不接受文件选择: {}", path.display());
            return;
        }
        if let Err(e) = validate_extension(self.mode, &path) {
            self.notify_error(e);
            return;
        }

        // 图片立即显示未处理的预览
        if self.mode == InputMode::Image {
            let preview = load_image(&path).and_then(|img| {
                self.annotator
                    .preview(&img)
                    .map_err(|e| SessionError::Input(e.to_string()))
            });
            match preview {
                Ok(image) => self.display.show_preview(image),
                Err(e) => {
                    self.notify_error(e);
                    return;
                }
            }
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!("📂 已选择: {}", path.display());
        self.status = format!("Selected: {}", name);
        self.input = Some(path);
    }

    /// 开始检测; 控件未使能时什么也不做
    pub fn start(&mut self) {
        if !self.controls().start_enabled {
            return;
        }
        // 上一个工作线程在停止时已回收
        self.reap_worker();

        if !self.mode.is_streaming() {
            self.process_image();
        } else if let Err(e) = self.start_stream() {
            self.notify_error(e);
        }
    }

    fn process_image(&mut self) {
        let Some(path) = self.input.clone() else {
            return;
        };
        match self.detect_image(&path) {
            Ok(frame) => {
                log::info!("✅ 图片检测完成: {:?}", frame.labels);
                self.display.show_frame(frame);
                self.status = "Image processed successfully".to_string();
            }
            Err(e) => self.notify_error(e),
        }
    }

    fn detect_image(&self, path: &Path) -> Result<crate::detection::ProcessedFrame, SessionError> {
        let frame = load_image(path)?;
        let (batch, names) = {
            let mut detector = self.detector.lock().map_err(SessionError::processing)?;
            let batch = detector.detect(&frame).map_err(SessionError::processing)?;
            (batch, detector.names())
        };
        self.annotator
            .render(frame, &batch.detections, &names)
            .map_err(SessionError::processing)
    }

    fn start_stream(&mut self) -> Result<(), SessionError> {
        let source = match self.mode {
            InputMode::Camera => self.opener.open_camera(self.camera_index)?,
            _ => {
                let path = self
                    .input
                    .as_deref()
                    .ok_or_else(|| SessionError::Input("No file selected".to_string()))?;
                self.opener.open_file(path)?
            }
        };

        let (permit_tx, permit_rx) = bounded(1);
        let (event_tx, event_rx) = bounded(1);
        self.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            running: self.running.clone(),
            source,
            detector: self.detector.clone(),
            annotator: self.annotator.clone(),
            permits: permit_rx,
            events: event_tx,
        };
        let handle = worker.spawn().map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            SessionError::processing(format!("Failed to spawn worker: {}", e))
        })?;

        // 第一帧的许可
        let _ = permit_tx.send(());
        self.worker = Some(handle);
        self.events = Some(event_rx);
        self.permits = Some(permit_tx);
        self.state = SessionState::Running;
        self.status = format!("Detecting in {} mode...", self.mode.label().to_lowercase());
        log::info!("🚀 开始检测: {} 模式", self.mode);
        Ok(())
    }

    /// UI 线程每帧调用: 取出工作线程结果并更新显示, 返回画面是否变化
    pub fn poll(&mut self) -> bool {
        let Some(events) = &self.events else {
            return false;
        };
        match events.try_recv() {
            Ok(WorkerEvent::Frame(frame)) => {
                self.display.show_frame(frame);
                self.status = format!("Detecting in {} mode...", self.mode.label().to_lowercase());
                // 显示已更新, 允许工作线程处理下一帧
                if let Some(permits) = &self.permits {
                    let _ = permits.send(());
                }
                true
            }
            Ok(WorkerEvent::Finished) => {
                if self.mode == InputMode::Video {
                    self.notices
                        .push_back(Notice::Info(VIDEO_COMPLETED.to_string()));
                }
                self.stop();
                false
            }
            Ok(WorkerEvent::Failed(e)) => {
                self.notify_error(e);
                self.stop();
                false
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.notify_error(SessionError::Processing(
                    "Detection worker exited unexpectedly".to_string(),
                ));
                self.stop();
                false
            }
        }
    }

    /// 停止检测; 空闲时为空操作
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        // 关闭通道唤醒等待许可的工作线程
        self.permits = None;
        self.events = None;
        self.reap_worker();

        self.state = SessionState::Idle;
        self.status = "Detection stopped".to_string();
        log::info!("🛑 检测已停止");
    }

    /// 等待工作线程退出 (采集源在线程退出前释放)
    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("❌ 检测线程异常退出");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

//! 拉帧式采集: 视频文件 / 本地摄像头
//!
//! FFmpeg 在自己的线程里解码, `DecodeFilter` 把 rgb24 帧推入有界通道,
//! `FfmpegSource::read` 再从通道里逐帧取出。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::camera::camera_input;
use super::decode_filter::DecodeFilter;
use crate::detection::types::Frame;
use crate::session::SessionError;

/// 采集源: 逐帧读取, 可释放
pub trait FrameSource: Send {
    /// 下一帧; `Ok(None)` 表示流已结束 (文件读完, 摄像头读取失败, 或 `running` 已清除)
    fn read(&mut self, running: &AtomicBool) -> Result<Option<Frame>, SessionError>;

    /// 释放底层设备/文件, 可重复调用
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// 采集源工厂
pub trait SourceOpener: Send + Sync {
    fn open_camera(&self, index: usize) -> Result<Box<dyn FrameSource>, SessionError>;
    fn open_file(&self, path: &Path) -> Result<Box<dyn FrameSource>, SessionError>;
}

/// 基于 ez-ffmpeg 的采集源工厂
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    read_timeout: Duration,
}

impl FfmpegOpener {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    fn start(&self, input: Input, live: bool) -> Result<FfmpegSource, String> {
        let (tx, rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, stop.clone(), live);

        // 构建帧处理管线
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs(vec!["format=rgb24"])
            .output(out)
            .build()
            .map_err(|e| format!("构建失败: {}", e))?;

        let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
        let waiter = std::thread::Builder::new()
            .name("ffmpeg-wait".into())
            .spawn(move || {
                if let Err(e) = sch.wait() {
                    log::debug!("📹 FFmpeg 结束: {}", e);
                }
            })
            .map_err(|e| format!("线程创建失败: {}", e))?;

        Ok(FfmpegSource {
            rx: Some(rx),
            stop,
            waiter: Some(waiter),
            timeout: self.read_timeout,
            live,
        })
    }
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl SourceOpener for FfmpegOpener {
    fn open_camera(&self, index: usize) -> Result<Box<dyn FrameSource>, SessionError> {
        let (url, format) = camera_input(index);
        log::info!("📹 打开摄像头 #{}: {} ({})", index, url, format);

        let input = Input::new(url.as_str()).set_format(format);
        match self.start(input, true) {
            Ok(source) => {
                log::info!("✅ 摄像头连接成功");
                Ok(Box::new(source))
            }
            Err(e) => {
                log::error!("❌ 摄像头打开失败: {}", e);
                Err(SessionError::Device(format!(
                    "Camera {} is not available: {}",
                    index, e
                )))
            }
        }
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FrameSource>, SessionError> {
        if !path.is_file() {
            return Err(SessionError::Input(format!(
                "Video file not found: {}",
                path.display()
            )));
        }
        log::info!("📹 打开视频文件: {}", path.display());

        let url = path.to_string_lossy().into_owned();
        match self.start(Input::new(url.as_str()), false) {
            Ok(source) => Ok(Box::new(source)),
            Err(e) => {
                log::error!("❌ 视频打开失败: {}", e);
                Err(SessionError::Input(format!(
                    "Failed to open video {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

/// 正在运行的 FFmpeg 采集
pub struct FfmpegSource {
    rx: Option<Receiver<Frame>>,
    stop: Arc<AtomicBool>,
    waiter: Option<JoinHandle<()>>,
    timeout: Duration,
    /// 摄像头: 超时视为设备断开; 文件: 超时视为解码卡死
    live: bool,
}

impl FfmpegSource {
    const POLL: Duration = Duration::from_millis(100);
    /// 释放时等待解码线程退出的上限, 超过则分离
    const RELEASE_GRACE: Duration = Duration::from_millis(500);

    fn decoder_finished(&self) -> bool {
        self.waiter.as_ref().map_or(true, |w| w.is_finished())
    }
}

impl FrameSource for FfmpegSource {
    fn read(&mut self, running: &AtomicBool) -> Result<Option<Frame>, SessionError> {
        let started = Instant::now();
        loop {
            let Some(rx) = self.rx.as_ref() else {
                return Ok(None);
            };
            match rx.recv_timeout(Self::POLL) {
                Ok(frame) => return Ok(Some(frame)),
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
                Err(RecvTimeoutError::Timeout) => {
                    if !running.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                    if self.decoder_finished() && rx.is_empty() {
                        return Ok(None);
                    }
                    if started.elapsed() >= self.timeout {
                        if self.live {
                            log::warn!("⚠️ {:?} 内没有读到新帧, 摄像头视为断开", self.timeout);
                            return Ok(None);
                        }
                        log::error!("❌ {:?} 内没有解码出新帧", self.timeout);
                        return Err(SessionError::Processing(format!(
                            "Video decoding stalled: no frame within {:?}",
                            self.timeout
                        )));
                    }
                }
            }
        }
    }

    fn release(&mut self) {
        if self.is_released() {
            return;
        }
        self.stop.store(true, Ordering::Relaxed);
        // 先关闭接收端, 阻塞在发送上的解码线程会立即出错退出
        self.rx = None;
        if let Some(waiter) = self.waiter.take() {
            let deadline = Instant::now() + Self::RELEASE_GRACE;
            while !waiter.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if waiter.is_finished() {
                let _ = waiter.join();
            } else {
                // 设备拔出时 FFmpeg 可能阻塞在读取上, 不能让它拖住 UI 线程
                log::warn!("⚠️ 解码线程未在 {:?} 内退出, 已分离", Self::RELEASE_GRACE);
            }
        }
        log::info!("📹 采集已释放");
    }

    fn is_released(&self) -> bool {
        self.rx.is_none() && self.waiter.is_none()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;

    #[test]
    fn missing_video_file_is_an_input_error() {
        let opener = FfmpegOpener::default();
        let res = opener.open_file(Path::new("/definitely/not/here.mp4"));
        assert!(matches!(res, Err(SessionError::Input(_))));
    }

    /// 解码线程一直不产帧, 直到 `unblock` 被丢弃
    fn stalled_source(live: bool, timeout: Duration) -> (FfmpegSource, Sender<()>, Sender<Frame>) {
        let (frame_tx, frame_rx) = bounded(1);
        let (unblock_tx, unblock_rx) = bounded::<()>(0);
        let waiter = std::thread::spawn(move || {
            let _ = unblock_rx.recv();
        });
        let source = FfmpegSource {
            rx: Some(frame_rx),
            stop: Arc::new(AtomicBool::new(false)),
            waiter: Some(waiter),
            timeout,
            live,
        };
        (source, unblock_tx, frame_tx)
    }

    #[test]
    fn stalled_video_file_is_a_processing_error() {
        let (mut source, unblock, _frames) = stalled_source(false, Duration::from_millis(50));
        let running = AtomicBool::new(true);
        assert!(matches!(
            source.read(&running),
            Err(SessionError::Processing(_))
        ));
        drop(unblock);
        source.release();
    }

    #[test]
    fn silent_camera_ends_the_stream() {
        let (mut source, unblock, _frames) = stalled_source(true, Duration::from_millis(50));
        let running = AtomicBool::new(true);
        assert!(matches!(source.read(&running), Ok(None)));
        drop(unblock);
        source.release();
    }

    #[test]
    fn queued_frame_is_returned() {
        let (mut source, unblock, frames) = stalled_source(true, Duration::from_secs(5));
        frames.send(Frame::new(4, 4)).unwrap();
        let running = AtomicBool::new(true);
        let frame = source.read(&running).unwrap().unwrap();
        assert_eq!(frame.dimensions(), (4, 4));
        drop(unblock);
    }

    #[test]
    fn cleared_running_flag_interrupts_read() {
        let (mut source, unblock, _frames) = stalled_source(false, Duration::from_secs(60));
        let running = AtomicBool::new(false);
        let t = Instant::now();
        assert!(matches!(source.read(&running), Ok(None)));
        assert!(t.elapsed() < Duration::from_secs(2));
        drop(unblock);
    }

    #[test]
    fn release_does_not_wait_for_a_blocked_decoder() {
        let (mut source, unblock, _frames) = stalled_source(true, Duration::from_secs(60));
        let t = Instant::now();
        source.release();
        assert!(t.elapsed() < Duration::from_secs(2));
        assert!(source.is_released());
        drop(unblock);
    }
}

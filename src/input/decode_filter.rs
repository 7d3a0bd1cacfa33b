/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;

/// FFmpeg解码过滤器: rgb24 帧 → RgbImage → 通道
///
/// 文件输入阻塞发送 (不丢帧), 摄像头输入通道满时丢弃旧帧之后的新帧。
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    stop: Arc<AtomicBool>,
    live: bool,
    count: usize,
    last: Instant,
    current_fps: f64,
    dropped_frames: usize,
    total_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>, stop: Arc<AtomicBool>, live: bool) -> Self {
        Self {
            tx,
            stop,
            live,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
        }
    }

    /// 按行拷贝 (linesize 可能大于 width*3)
    fn copy_rgb24(frame: &Frame) -> Option<RgbImage> {
        unsafe {
            let ptr = frame.as_ptr();
            if ptr.is_null() {
                return None;
            }
            let w = (*ptr).width;
            let h = (*ptr).height;
            let data = (*ptr).data[0];
            let stride = (*ptr).linesize[0];
            if w <= 0 || h <= 0 || data.is_null() || stride < w * 3 {
                return None;
            }

            let (w, h, stride) = (w as usize, h as usize, stride as usize);
            let row_bytes = w * 3;
            let mut buf = Vec::with_capacity(row_bytes * h);
            for row in 0..h {
                let src = std::slice::from_raw_parts(data.add(row * stride), row_bytes);
                buf.extend_from_slice(src);
            }
            RgbImage::from_raw(w as u32, h as u32, buf)
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("capture released".to_string());
        }

        self.total_frames += 1;
        if unsafe { frame.is_empty() } || frame.is_corrupt() {
            self.dropped_frames += 1;
            return Ok(None);
        }
        let Some(image) = Self::copy_rgb24(&frame) else {
            self.dropped_frames += 1;
            if self.total_frames <= 10 {
                log::warn!("⚠️ 丢弃帧 #{}: 帧数据异常", self.total_frames);
            }
            return Ok(None);
        };

        if self.live {
            match self.tx.try_send(image) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.dropped_frames += 1,
                Err(TrySendError::Disconnected(_)) => {
                    return Err("frame receiver dropped".to_string())
                }
            }
        } else if self.tx.send(image).is_err() {
            return Err("frame receiver dropped".to_string());
        }

        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.current_fps = self.count as f64 / elapsed;
            log::debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.current_fps,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::info!("✅ 解码线程退出");
    }
}

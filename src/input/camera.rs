//! 摄像头输入 - 平台相关的设备地址与格式
//!
//! DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

/// 设备索引 → (FFmpeg 输入地址, 输入格式)
pub fn camera_input(index: usize) -> (String, &'static str) {
    #[cfg(target_os = "windows")]
    {
        // dshow 需要设备名称
        let name = get_camera_devices()
            .into_iter()
            .find(|(i, _)| *i == index)
            .map(|(_, name)| name)
            .unwrap_or_default();
        (format!("video={}", name), "dshow")
    }
    #[cfg(target_os = "macos")]
    {
        (format!("{}", index), "avfoundation")
    }
    #[cfg(target_os = "linux")]
    {
        (format!("/dev/video{}", index), "v4l2")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        (format!("{}", index), "video4linux2")
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            log::warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}

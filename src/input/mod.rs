/// 输入系统 (Input System)
///
/// - InputMode: 图片/视频/摄像头三种输入模式与扩展名白名单
/// - image_file: 静态图片解码
/// - FfmpegOpener/FfmpegSource: 视频文件与本地摄像头拉帧 (ez-ffmpeg)
pub mod camera;
pub mod capture;
pub mod decode_filter;
pub mod image_file;
pub mod selection;

pub use camera::{camera_input, get_camera_devices};
pub use capture::{FfmpegOpener, FfmpegSource, FrameSource, SourceOpener};
pub use decode_filter::DecodeFilter;
pub use image_file::load_image;
pub use selection::{validate_extension, InputMode};

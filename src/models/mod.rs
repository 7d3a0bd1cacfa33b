// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// ## Model Trait
/// 统一的模型接口，定义标准流程: preprocess → run → postprocess
///
/// ## 使用示例
/// ```no_run
/// use yolov8_studio::models::{Model, YOLOv8};
/// use yolov8_studio::Args;
/// use clap::Parser;
///
/// let args = Args::parse_from(["studio"]);
/// let mut model = YOLOv8::new(&args)?;
/// let image = image::open("bus.jpg")?;
/// let results = model.forward(&[image])?;
/// # Ok::<(), anyhow::Error>(())
/// ```
use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::detection::types::BBox;

pub mod yolov8;

pub use yolov8::YOLOv8;

/// 统一的深度学习模型接口
///
/// ## 核心流程
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 检测框 (原图坐标)
/// ```
pub trait Model: Send {
    /// 预处理: 图片 → NCHW 张量
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Array<f32, IxDyn>>;

    /// 推理: 执行模型前向传播, 返回原始输出
    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 每张图片的检测框
    fn postprocess(&self, xs: Vec<Array<f32, IxDyn>>, xs0: &[DynamicImage]) -> Result<Vec<Vec<BBox>>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[DynamicImage]) -> Result<Vec<Vec<BBox>>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs)?;
        self.postprocess(ys, images)
    }

    /// 类别索引 → 类别名
    fn names(&self) -> &[String];

    /// 打印模型信息
    fn summary(&self);
}

/// 确保模型文件存在
///
/// 本地路径存在时直接返回; 否则若给出下载地址, 下载到缓存目录
/// (`<cache>/yolov8-studio/<文件名>`), 已缓存的文件直接复用。
pub fn ensure_model(path: &str, url: Option<&str>) -> Result<PathBuf> {
    let local = Path::new(path);
    if local.exists() {
        return Ok(local.to_path_buf());
    }

    let url = url.with_context(|| format!("模型文件不存在: {} (可通过 --model-url 自动下载)", path))?;
    let file_name = local
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model.onnx".into());
    let cache_dir = dirs::cache_dir()
        .context("无法确定缓存目录")?
        .join("yolov8-studio");
    let cached = cache_dir.join(file_name);
    if cached.exists() {
        log::info!("📦 使用已缓存模型: {}", cached.display());
        return Ok(cached);
    }

    fs::create_dir_all(&cache_dir)?;
    log::info!("⬇️ 下载模型: {} → {}", url, cached.display());
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("下载模型失败: {}", url))?;

    // 先写临时文件, 完成后再改名, 避免中断留下半个模型
    let partial = cached.with_extension("part");
    let mut reader = response.into_reader();
    let mut file = fs::File::create(&partial)?;
    let bytes = io::copy(&mut reader, &mut file)?;
    drop(file);
    fs::rename(&partial, &cached)?;
    log::info!("✅ 模型下载完成 ({} 字节)", bytes);
    Ok(cached)
}

/// COCO 80类 (模型元数据缺少类别名时使用)
pub const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

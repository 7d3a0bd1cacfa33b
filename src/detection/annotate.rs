//! 检测结果标注: 检测框 + "类别 置信度" 文本, 以及显示前的缩放
//!
//! 颜色只取决于 `class_index % PALETTE.len()`, 同一类别跨帧/跨调用颜色不变。

use std::collections::BTreeSet;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use fast_image_resize as fr;
use image::{Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::types::{Detection, ProcessedFrame};
use crate::config::StudioConfig;

/// 类别颜色表 (RGB)
pub const PALETTE: [(u8, u8, u8); 9] = [
    (255, 0, 0),   // 红色
    (0, 255, 0),   // 绿色
    (0, 0, 255),   // 蓝色
    (255, 255, 0), // 黄色
    (255, 0, 255), // 品红
    (0, 255, 255), // 青色
    (128, 0, 0),   // 暗红
    (0, 128, 0),   // 暗绿
    (0, 0, 128),   // 藏青
];

/// 标签栏无检测时的显示文本
pub const NO_OBJECTS: &str = "No objects detected";

pub fn class_color(class_index: usize) -> Rgb<u8> {
    let (r, g, b) = PALETTE[class_index % PALETTE.len()];
    Rgb([r, g, b])
}

/// 标签文本, 例如 `person 0.87`
pub fn label_text(label: &str, confidence: f32) -> String {
    format!("{} {:.2}", label, confidence)
}

/// 标签集合 → 标签栏文本
pub fn labels_summary(labels: &BTreeSet<String>) -> String {
    if labels.is_empty() {
        NO_OBJECTS.to_string()
    } else {
        labels.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// 标注器: 持有绘制参数与字体
#[derive(Clone)]
pub struct Annotator {
    threshold: f32,
    thickness: u32,
    font: Option<FontArc>,
    font_scale: PxScale,
    canvas: (u32, u32),
}

impl Annotator {
    pub fn new(config: &StudioConfig) -> Self {
        let font = load_font(&config.font_paths);
        if font.is_none() {
            log::warn!("⚠️ 未找到可用字体, 标签文本将不绘制 (仅绘制检测框)");
        }
        Self {
            threshold: config.display_conf_threshold,
            thickness: config.box_thickness.max(1),
            font,
            font_scale: PxScale::from(config.label_font_size),
            canvas: (config.canvas_width, config.canvas_height),
        }
    }

    /// 在帧上原地绘制超过阈值的检测, 返回出现过的类别名集合
    pub fn draw(
        &self,
        frame: &mut RgbImage,
        detections: &[Detection],
        names: &[String],
    ) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();

        for det in detections.iter().filter(|d| d.confidence() > self.threshold) {
            let class_index = det.class_index();
            let label = names
                .get(class_index)
                .cloned()
                .unwrap_or_else(|| format!("class{}", class_index));
            let color = class_color(class_index);

            let x1 = det.bbox.x1.round() as i32;
            let y1 = det.bbox.y1.round() as i32;
            let w = det.bbox.width().round().max(1.0) as u32;
            let h = det.bbox.height().round().max(1.0) as u32;

            // 线宽: 逐像素内缩绘制多层矩形
            for t in 0..self.thickness {
                if w <= 2 * t || h <= 2 * t {
                    break;
                }
                let rect = Rect::at(x1 + t as i32, y1 + t as i32).of_size(w - 2 * t, h - 2 * t);
                draw_hollow_rect_mut(frame, rect, color);
            }

            if let Some(font) = &self.font {
                let text = label_text(&label, det.confidence());
                let text_y = (y1 - 10 - self.font_scale.y as i32 / 2).max(0);
                draw_text_mut(frame, color, x1, text_y, self.font_scale, font, &text);
            }

            labels.insert(label);
        }

        labels
    }

    /// 标注 → RGBA → 缩放到画布, 组装成待显示帧
    pub fn render(
        &self,
        mut frame: RgbImage,
        detections: &[Detection],
        names: &[String],
    ) -> Result<ProcessedFrame> {
        let labels = self.draw(&mut frame, detections, names);
        let image = fit_to_canvas(&to_rgba(&frame), self.canvas)?;
        Ok(ProcessedFrame { image, labels })
    }

    /// 未经处理的预览 (选择图片后立即显示)
    pub fn preview(&self, frame: &RgbImage) -> Result<RgbaImage> {
        fit_to_canvas(&to_rgba(frame), self.canvas)
    }
}

/// 按顺序尝试加载字体
pub fn load_font(paths: &[String]) -> Option<FontArc> {
    paths.iter().find_map(|path| {
        let bytes = std::fs::read(path).ok()?;
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                log::info!("✅ 字体加载成功: {}", path);
                Some(font)
            }
            Err(e) => {
                log::warn!("⚠️ 字体解析失败 {}: {}", path, e);
                None
            }
        }
    })
}

/// RGB → RGBA (显示颜色空间)
pub fn to_rgba(frame: &RgbImage) -> RgbaImage {
    let (w, h) = frame.dimensions();
    let mut rgba = Vec::with_capacity((w * h * 4) as usize);
    for chunk in frame.as_raw().chunks_exact(3) {
        rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
    }
    RgbaImage::from_raw(w, h, rgba).unwrap_or_else(|| RgbaImage::new(w, h))
}

/// 等比缩放到画布范围内, 只缩小不放大
pub fn fit_size((w, h): (u32, u32), (max_w, max_h): (u32, u32)) -> (u32, u32) {
    if w <= max_w && h <= max_h {
        return (w, h);
    }
    let r = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    (
        ((w as f64 * r).round() as u32).max(1),
        ((h as f64 * r).round() as u32).max(1),
    )
}

/// 使用 fast_image_resize 缩放到画布范围内
pub fn fit_to_canvas(img: &RgbaImage, canvas: (u32, u32)) -> Result<RgbaImage> {
    let (w, h) = img.dimensions();
    let (dst_w, dst_h) = fit_size((w, h), canvas);
    if (dst_w, dst_h) == (w, h) {
        return Ok(img.clone());
    }

    let src = fr::images::ImageRef::new(w, h, img.as_raw(), fr::PixelType::U8x4)
        .context("创建缩放源图像失败")?;
    let mut dst = fr::images::Image::new(dst_w, dst_h, fr::PixelType::U8x4);
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .context("图像缩放失败")?;

    RgbaImage::from_raw(dst_w, dst_h, dst.into_vec()).context("缩放结果尺寸异常")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection::new(BBox {
            x1: 10.0,
            y1: 10.0,
            x2: 50.0,
            y2: 40.0,
            confidence,
            class_id,
        })
    }

    fn annotator() -> Annotator {
        Annotator::new(&StudioConfig {
            font_paths: vec![],
            ..StudioConfig::default()
        })
    }

    fn names() -> Vec<String> {
        vec!["person".into(), "bicycle".into(), "car".into()]
    }

    #[test]
    fn class_color_wraps_around_palette() {
        for idx in 0..40 {
            assert_eq!(class_color(idx), class_color(idx + PALETTE.len()));
            assert_eq!(class_color(idx), class_color(idx % PALETTE.len()));
        }
    }

    #[test]
    fn label_text_has_two_decimals() {
        assert_eq!(label_text("person", 0.8765), "person 0.88");
    }

    #[test]
    fn only_detections_above_threshold_are_drawn() {
        let mut frame = RgbImage::new(64, 64);
        let labels = annotator().draw(&mut frame, &[det(0, 0.9), det(2, 0.5)], &names());
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec!["person"]);
        // 检测框左上角被绘制为类别0的颜色
        assert_eq!(*frame.get_pixel(10, 10), class_color(0));
    }

    #[test]
    fn nothing_above_threshold_leaves_frame_untouched() {
        let mut frame = RgbImage::new(64, 64);
        let labels = annotator().draw(&mut frame, &[det(1, 0.3)], &names());
        assert!(labels.is_empty());
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0]));
        assert_eq!(labels_summary(&labels), NO_OBJECTS);
    }

    #[test]
    fn unknown_class_gets_placeholder_label() {
        let mut frame = RgbImage::new(64, 64);
        let labels = annotator().draw(&mut frame, &[det(42, 0.9)], &names());
        assert!(labels.contains("class42"));
    }

    #[test]
    fn fit_size_preserves_aspect_and_never_upscales() {
        assert_eq!(fit_size((1600, 900), (800, 600)), (800, 450));
        assert_eq!(fit_size((600, 1200), (800, 600)), (300, 600));
        assert_eq!(fit_size((320, 240), (800, 600)), (320, 240));
    }

    #[test]
    fn render_downscales_into_canvas() {
        let frame = RgbImage::new(1600, 1200);
        let out = annotator().render(frame, &[det(0, 0.9)], &names()).unwrap();
        assert_eq!(out.image.dimensions(), (800, 600));
        assert_eq!(out.labels.len(), 1);
    }

    #[test]
    fn labels_summary_is_sorted_and_joined() {
        let labels: BTreeSet<String> = ["dog", "cat"].iter().map(|s| s.to_string()).collect();
        assert_eq!(labels_summary(&labels), "cat, dog");
    }
}

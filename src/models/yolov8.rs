// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型实现
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, IxDyn};
use std::time::Instant;

use super::COCO_NAMES;
use crate::detection::types::BBox;
use crate::{non_max_suppression, Args, OrtBackend, OrtConfig, OrtEP};

/// YOLOv8 检测模型
pub struct YOLOv8 {
    engine: OrtBackend,
    height: u32,
    width: u32,
    conf: f32,
    iou: f32,
    names: Vec<String>,
    profile: bool,
}

impl YOLOv8 {
    /// 从启动参数创建 YOLOv8 模型
    pub fn new(args: &Args) -> Result<Self> {
        let ep = if args.cuda {
            OrtEP::CUDA(args.device_id)
        } else {
            OrtEP::CPU
        };

        let engine = OrtBackend::build(OrtConfig {
            f: args.model.clone(),
            ep,
            image_size: (args.size, args.size),
        })?;

        let names = engine
            .names()
            .unwrap_or_else(|| COCO_NAMES.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            height: engine.height(),
            width: engine.width(),
            engine,
            conf: args.conf,
            iou: args.iou,
            names,
            profile: args.profile,
        })
    }
}

/// 等比缩放比例与缩放后尺寸
pub fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 解码单张图片的 YOLOv8 输出 `[4 + nc, anchors]`
///
/// 坐标按 `ratio` 还原到原图, 并裁剪到原图范围内。
pub fn decode_predictions(
    preds: ndarray::ArrayView2<f32>,
    ratio: f32,
    (width_original, height_original): (f32, f32),
    conf: f32,
) -> Vec<BBox> {
    const CXYWH_OFFSET: usize = 4;
    let mut boxes = Vec::new();

    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < conf {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        boxes.push(BBox {
            x1: (cx - w / 2.).clamp(0.0, width_original),
            y1: (cy - h / 2.).clamp(0.0, height_original),
            x2: (cx + w / 2.).clamp(0.0, width_original),
            y2: (cy + h / 2.).clamp(0.0, height_original),
            confidence,
            class_id: id as u32,
        });
    }

    boxes
}

impl super::Model for YOLOv8 {
    fn preprocess(&mut self, xs: &[DynamicImage]) -> Result<Array<f32, IxDyn>> {
        let t = Instant::now();
        let mut ys =
            Array::ones((xs.len(), 3, self.height as usize, self.width as usize)).into_dyn();
        ys.fill(144.0 / 255.0);
        for (idx, x) in xs.iter().enumerate() {
            let (w0, h0) = x.dimensions();
            let (_, w_new, h_new) =
                scale_wh(w0 as f32, h0 as f32, self.width as f32, self.height as f32);
            let img = x.resize_exact(
                w_new as u32,
                h_new as u32,
                image::imageops::FilterType::Triangle,
            );

            for (x, y, rgb) in img.pixels() {
                let x = x as usize;
                let y = y as usize;
                let [r, g, b, _] = rgb.0;
                ys[[idx, 0, y, x]] = (r as f32) / 255.0;
                ys[[idx, 1, y, x]] = (g as f32) / 255.0;
                ys[[idx, 2, y, x]] = (b as f32) / 255.0;
            }
        }
        if self.profile {
            log::debug!("[Model Preprocess]: {:?}", t.elapsed());
        }
        Ok(ys)
    }

    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs, self.profile)
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<Vec<BBox>>> {
        let t = Instant::now();
        let Some(preds) = xs.first() else {
            bail!("模型没有输出");
        };
        if preds.ndim() != 3 {
            bail!("YOLOv8 输出维度异常: {:?}", preds.shape());
        }

        let mut ys = Vec::with_capacity(xs0.len());
        for (idx, anchor) in preds.axis_iter(Axis(0)).enumerate() {
            let Some(original) = xs0.get(idx) else {
                break;
            };
            let width_original = original.width() as f32;
            let height_original = original.height() as f32;
            let ratio =
                (self.width as f32 / width_original).min(self.height as f32 / height_original);

            let anchor = anchor.into_dimensionality::<ndarray::Ix2>()?;
            let mut boxes = decode_predictions(
                anchor,
                ratio,
                (width_original, height_original),
                self.conf,
            );
            non_max_suppression(&mut boxes, self.iou);
            ys.push(boxes);
        }
        if self.profile {
            log::debug!("[Model Postprocess]: {:?}", t.elapsed());
        }
        Ok(ys)
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn summary(&self) {
        log::info!(
            "📦 YOLOv8 | EP: {:?} | 输入: {}x{} | 类别: {} | conf: {} | iou: {}",
            self.engine.ep(),
            self.width,
            self.height,
            self.names.len(),
            self.conf,
            self.iou,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn scale_keeps_aspect_ratio() {
        let (r, w, h) = scale_wh(1280.0, 720.0, 640.0, 640.0);
        assert_eq!(r, 0.5);
        assert_eq!((w, h), (640.0, 360.0));
    }

    #[test]
    fn decode_picks_best_class_and_rescales() {
        // 2 个 anchor, 3 个类别
        let mut preds = Array2::<f32>::zeros((7, 2));
        // anchor 0: 中心(100,50) 宽40 高20, 类别2 最高
        preds[[0, 0]] = 100.0;
        preds[[1, 0]] = 50.0;
        preds[[2, 0]] = 40.0;
        preds[[3, 0]] = 20.0;
        preds[[4, 0]] = 0.1;
        preds[[6, 0]] = 0.8;
        // anchor 1: 低于阈值
        preds[[4, 1]] = 0.05;

        let boxes = decode_predictions(preds.view(), 0.5, (1000.0, 1000.0), 0.25);
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.class_id, 2);
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (160.0, 80.0, 240.0, 120.0));
    }

    #[test]
    fn decode_clamps_to_image_bounds() {
        let mut preds = Array2::<f32>::zeros((5, 1));
        preds[[0, 0]] = 5.0;
        preds[[1, 0]] = 5.0;
        preds[[2, 0]] = 40.0;
        preds[[3, 0]] = 40.0;
        preds[[4, 0]] = 0.9;
        let boxes = decode_predictions(preds.view(), 1.0, (20.0, 20.0), 0.25);
        assert_eq!((boxes[0].x1, boxes[0].y1), (0.0, 0.0));
        assert_eq!((boxes[0].x2, boxes[0].y2), (20.0, 20.0));
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;

/// 类别名元数据格式: `{0: 'person', 1: 'bicycle', ...}`
static NAMES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\d+\s*:\s*(['"])([-()\w '"]+?)(['"])\s*[,}]"#)
        .expect("class-name pattern is valid")
});

/// 推理执行后端
#[derive(Debug, Clone, PartialEq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
}

impl OrtEP {
    fn dispatch(&self) -> Vec<ExecutionProviderDispatch> {
        match self {
            OrtEP::CPU => vec![CPUExecutionProvider::default().build()],
            #[cfg(feature = "cuda")]
            OrtEP::CUDA(device_id) => vec![
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(*device_id)
                    .build(),
                CPUExecutionProvider::default().build(),
            ],
            #[cfg(not(feature = "cuda"))]
            OrtEP::CUDA(_) => {
                log::warn!("⚠️ 未启用 `cuda` feature, 回退到CPU推理");
                vec![CPUExecutionProvider::default().build()]
            }
        }
    }
}

#[derive(Debug)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    pub image_size: (u32, u32), // (height, width)
}

/// ONNX Runtime 会话封装
pub struct OrtBackend {
    session: Session,
    input_name: String,
    ep: OrtEP,
    height: u32,
    width: u32,
    names: Option<Vec<String>>,
}

impl OrtBackend {
    pub fn build(args: OrtConfig) -> Result<Self> {
        let session = Session::builder()
            .context("创建ORT会话构建器失败")?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(args.ep.dispatch())?
            .commit_from_file(&args.f)
            .with_context(|| format!("加载ONNX模型失败: {}", args.f))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .map(|raw| parse_names(&raw))
            .filter(|names| !names.is_empty());

        let (height, width) = args.image_size;
        Ok(Self {
            session,
            input_name,
            ep: args.ep,
            height,
            width,
            names,
        })
    }

    /// 前向推理: NCHW 张量 → 全部输出
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = Instant::now();
        let tensor = Tensor::from_array(xs).context("构建输入张量失败")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .context("ONNX推理失败")?;

        let mut ys = Vec::new();
        for (_, value) in outputs.iter() {
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .context("提取输出张量失败")?;
            let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
            ys.push(Array::from_shape_vec(IxDyn(&dims), data.to_vec())?);
        }

        if profile {
            log::debug!("[ORT Inference]: {:?}", t.elapsed());
        }
        Ok(ys)
    }

    pub fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    pub fn ep(&self) -> &OrtEP {
        &self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

/// 解析模型元数据中的类别名
/// 格式: `{0: 'person', 1: 'bicycle', 2: 'sports ball', ..., 27: "yellow_lady's_slipper"}`
pub fn parse_names(raw: &str) -> Vec<String> {
    NAMES_RE
        .captures_iter(raw)
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ultralytics_names_metadata() {
        let raw = "{0: 'person', 1: 'bicycle', 2: 'sports ball', 3: \"yellow_lady's_slipper\"}";
        assert_eq!(
            parse_names(raw),
            vec!["person", "bicycle", "sports ball", "yellow_lady's_slipper"]
        );
    }

    #[test]
    fn repeated_parses_share_one_pattern() {
        let first: *const Regex = &*NAMES_RE;
        assert_eq!(parse_names("{0: 'cat'}"), vec!["cat"]);
        assert_eq!(parse_names("{0: 'dog'}"), vec!["dog"]);
        let second: *const Regex = &*NAMES_RE;
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_metadata_yields_no_names() {
        assert!(parse_names("not a dict").is_empty());
    }
}

/// 目标检测工作台 (Object Detection Studio)
///
/// 线程模型:
/// 1. 主线程: macroquad 事件循环 + egui 控制面板, 持有检测会话
/// 2. 检测线程: 视频/摄像头模式下逐帧检测与跟踪 (每次开始时新建)
///
/// 直接运行: cargo run --bin studio --release
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use macroquad::prelude::*;
use mimalloc::MiMalloc;
use yolov8_studio::detection::{Annotator, Detector};
use yolov8_studio::input::FfmpegOpener;
use yolov8_studio::models::ensure_model;
use yolov8_studio::renderer::{Renderer, WINDOW_HEIGHT, WINDOW_TITLE, WINDOW_WIDTH};
use yolov8_studio::session::Session;
use yolov8_studio::{Args, StudioConfig, YOLOv8};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: WINDOW_TITLE.to_owned(),
        window_width: WINDOW_WIDTH,
        window_height: WINDOW_HEIGHT,
        window_resizable: true,
        ..Default::default()
    }
}

fn build_session(mut args: Args) -> anyhow::Result<Session> {
    let config = StudioConfig::load(&args.config);
    config.print_summary();

    let model_path = ensure_model(&args.model, args.model_url.as_deref())?;
    args.model = model_path.to_string_lossy().into_owned();
    log::info!("📦 检测模型: {}", args.model);

    let model = YOLOv8::new(&args)?;
    let detector = Detector::new(Box::new(model), config.tracker.clone());
    let opener = FfmpegOpener::new(Duration::from_millis(config.camera_read_timeout_ms));
    let annotator = Annotator::new(&config);

    Ok(Session::new(
        Box::new(detector),
        Arc::new(opener),
        annotator,
        args.camera,
    ))
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    log::info!("🚀 目标检测工作台启动");

    let session = match build_session(args) {
        Ok(session) => session,
        Err(e) => {
            log::error!("❌ 初始化失败: {:#}", e);
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title("Startup Error")
                .set_description(format!("{:#}", e))
                .set_buttons(rfd::MessageButtons::Ok)
                .show();
            return;
        }
    };

    let mut renderer = Renderer::new(session);
    // 关闭窗口时先停止检测线程并释放采集
    prevent_quit();
    log::info!("✅ 系统就绪");

    loop {
        renderer.update();
        renderer.draw();
        renderer.draw_egui();

        if is_quit_requested() {
            break;
        }
        next_frame().await
    }

    renderer.shutdown();
}

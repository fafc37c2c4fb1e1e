//! fog_render - 多 pass 离屏到屏幕渲染示例
//!
//! 通过配置文件或命令行参数选择示例场景和图形设备。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件（Windows 上默认 DirectX 12）
//! cargo run
//!
//! # 选择示例
//! cargo run -- --sample render_to_texture
//!
//! # 无 GPU 运行 300 帧并校验每帧命令
//! cargo run -- --headless --frames 300 --validate
//! ```
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  配置 → 日志 → 设备 → 主循环
//! └──────┬──────┘
//!        │
//! ┌──────▼────────┐
//! │ FrameRenderer │  pass 录制、屏障、提交、呈现、排空
//! └──────┬────────┘
//!        │ GraphicsDevice
//!   ┌────┴─────┐
//!   │          │
//! ┌─▼──┐   ┌───▼────┐
//! │DX12│   │Headless│
//! └────┘   └────────┘
//! ```

use anyhow::{Context, Result};
use tracing::{error, info};

use fog_render::core::config::{Config, GraphicsBackend};
use fog_render::core::input::IdleInput;
use fog_render::core::log;
use fog_render::core::timer::FrameTimer;
use fog_render::gfx::HeadlessDevice;
use fog_render::renderer::{create_scene, FrameOptions, FrameRenderer};

/// `frames = 0` 时 headless 模式运行的帧数
const DEFAULT_HEADLESS_FRAMES: u64 = 120;

/// 应用程序入口点
///
/// 初始化失败或绘制失败时记录错误并以状态码 1 退出。
fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    config.apply_args(std::env::args().skip(1));

    // 3. 验证配置
    config.validate().context("invalid configuration")?;

    // 4. 初始化日志系统
    let log_file = config.logging.file_output.then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)
        .context("failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "fog_render starting");
    info!(
        backend = config.graphics.backend.name(),
        sample = ?config.sample.kind,
        width = config.window.width,
        height = config.window.height,
        "Configuration loaded"
    );

    match config.graphics.backend {
        GraphicsBackend::Headless => run_headless(&config),
        GraphicsBackend::Dx12 => run_windowed(&config),
    }
}

/// 无窗口运行固定帧数
fn run_headless(config: &Config) -> Result<()> {
    let (width, height) = (config.window.width, config.window.height);
    let device = HeadlessDevice::new(width, height, config.graphics.back_buffer_count)
        .context("failed to create headless device")?
        .with_validation(config.graphics.validate_commands);
    let mut renderer = FrameRenderer::new(
        device,
        create_scene(&config.sample),
        FrameOptions::from_config(&config.graphics),
    )
    .context("failed to initialize renderer")?;

    let frames = match config.sample.frames {
        0 => DEFAULT_HEADLESS_FRAMES,
        n => n,
    };

    // 光标停在客户区中心，相机不会转动
    let mut input = IdleInput::new();
    input.move_cursor((width / 2) as i32, (height / 2) as i32);

    let mut timer = FrameTimer::new();
    for frame in 0..frames {
        let elapsed = timer.tick();
        renderer
            .update(elapsed, &mut input)
            .and_then(|_| renderer.draw())
            .with_context(|| format!("frame {} failed", frame))?;
    }

    renderer.shutdown().context("failed to shut down renderer")?;
    let stats = renderer.stats();
    info!(
        frames = stats.frames,
        commands = stats.commands,
        draw_calls = stats.draw_calls,
        barriers = stats.barriers,
        presents = renderer.device().present_count(),
        seconds = timer.total_secs(),
        "Headless run finished"
    );
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn run_windowed(_config: &Config) -> Result<()> {
    anyhow::bail!("DirectX 12 is only available on Windows; run with --headless")
}

/// 窗口 + DX12 主循环
///
/// # 事件处理
///
/// - `CloseRequested` / Esc：退出
/// - 键盘与光标事件：交给 `WinitInput`，相机每帧轮询
/// - `RedrawRequested`：推进场景并绘制一帧
/// - `LoopExiting`：等待 GPU 并释放资源
#[cfg(target_os = "windows")]
fn run_windowed(config: &Config) -> Result<()> {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    use fog_render::core::input::WinitInput;
    use fog_render::gfx::Dx12Device;
    use tracing::debug;
    use winit::dpi::PhysicalSize;
    use winit::event::{Event, KeyEvent, WindowEvent};
    use winit::event_loop::EventLoop;
    use winit::keyboard::{KeyCode, PhysicalKey};
    use winit::window::WindowBuilder;

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("{} [{:?}]", config.window.title, config.sample.kind))
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
            .with_resizable(config.window.resizable)
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let device = Dx12Device::new(window.clone(), config).context("failed to create DX12 device")?;
    let mut renderer = FrameRenderer::new(
        device,
        create_scene(&config.sample),
        FrameOptions::from_config(&config.graphics),
    )
    .context("failed to initialize renderer")?;

    let mut input = WinitInput::new(window.clone());
    let mut timer = FrameTimer::new();
    let frame_limit = config.sample.frames;
    let failed = Rc::new(Cell::new(false));
    let failed_flag = failed.clone();

    info!("Entering main loop");
    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested, shutting down");
                    elwt.exit();
                }
                WindowEvent::KeyboardInput {
                    event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                    ..
                } => {
                    if code == KeyCode::Escape {
                        elwt.exit();
                    }
                    input.on_keyboard_input(code, state);
                }
                WindowEvent::CursorMoved { position, .. } => input.on_cursor_moved(position),
                WindowEvent::Focused(false) => input.reset(),
                WindowEvent::RedrawRequested => {
                    let elapsed = timer.tick();
                    let result = renderer.update(elapsed, &mut input).and_then(|_| renderer.draw());
                    if let Err(e) = result {
                        error!("Draw failed: {}", e);
                        failed_flag.set(true);
                        elwt.exit();
                        return;
                    }
                    let frames = renderer.stats().frames;
                    if frames % 300 == 0 {
                        debug!(frames, fps = timer.fps(), "Frame statistics");
                    }
                    if frame_limit > 0 && frames >= frame_limit {
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => {
                if let Err(e) = renderer.shutdown() {
                    error!("Shutdown failed: {}", e);
                    failed_flag.set(true);
                }
            }
            _ => {}
        })
        .context("event loop failed")?;

    if failed.get() {
        anyhow::bail!("rendering stopped after an error");
    }
    Ok(())
}

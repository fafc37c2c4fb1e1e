//! fog_render - 多 pass 离屏到屏幕渲染
//!
//! 在 DirectX 12（或无 GPU 的记录设备）上运行三个示例：Phong 光照立方体、
//! 渲染到纹理的房间、以及由正反面深度合成的体积雾。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理、输入、计时）
//! - `math`: nalgebra 类型别名与左手系矩阵工具
//! - `geometry`: 顶点格式、网格、内置图元与资产加载
//! - `component`: 第一人称相机与自转动画
//! - `gfx`: 图形设备接口及其 DX12 / Headless 实现
//! - `renderer`: pass 描述、命令列表、状态校验、帧循环与示例场景
//!
//! # 使用示例
//!
//! ```no_run
//! use fog_render::core::config::SampleConfig;
//! use fog_render::core::input::IdleInput;
//! use fog_render::gfx::HeadlessDevice;
//! use fog_render::renderer::{create_scene, FrameOptions, FrameRenderer};
//!
//! let device = HeadlessDevice::new(800, 600, 2)?;
//! let scene = create_scene(&SampleConfig::default());
//! let mut renderer = FrameRenderer::new(device, scene, FrameOptions::default())?;
//!
//! let mut input = IdleInput::new();
//! renderer.update(0.016, &mut input)?;
//! renderer.draw()?;
//! # Ok::<(), fog_render::core::RenderError>(())
//! ```

pub mod component;
pub mod core;
pub mod geometry;
pub mod gfx;
pub mod math;
pub mod renderer;

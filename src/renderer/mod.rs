//! 渲染器模块
//!
//! 与具体图形 API 无关的多 pass 渲染逻辑：
//!
//! - `pass`：pass 描述与顺序校验
//! - `command`：平台无关的命令列表
//! - `validation`：按资源状态校验命令列表
//! - `frame`：录制、提交、呈现与排空的帧循环
//! - `samples`：Phong、渲染到纹理和体积雾三个示例场景
//! - `resource` / `descriptor` / `sync` / `pipeline`：资源描述、句柄、Fence 与管线描述
//!
//! 底层实现在 `gfx` 模块中，通过 `GraphicsDevice` 接入。

pub mod command;
pub mod descriptor;
pub mod frame;
pub mod pass;
pub mod pipeline;
pub mod resource;
pub mod samples;
pub mod sync;
pub mod validation;

pub use frame::{FrameOptions, FrameRenderer, FrameState, FrameStats};
pub use samples::{create_scene, Scene};

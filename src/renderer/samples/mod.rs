//! 示例场景
//!
//! 每个场景在初始化时通过 [`GraphicsDevice`] 创建自己的网格、纹理、离屏目标和
//! 管线，并声明 pass 序列；每帧根据经过的时间和输入计算常量块。
//! 录制、屏障和同步全部由 [`FrameRenderer`](super::frame::FrameRenderer) 负责。
//!
//! - [`PhongScene`]：单 pass，旋转立方体的 Phong 光照
//! - [`RenderToTextureScene`]：房间渲染到离屏纹理，再由全屏四边形显示
//! - [`VolumeFogScene`]：正反面深度分别渲染到两个浮点目标，再叠加出雾的厚度

use std::path::Path;

use crate::core::config::{SampleConfig, SampleKind};
use crate::core::error::Result;
use crate::core::input::InputSource;
use crate::gfx::backend::GraphicsDevice;

use super::pass::RenderPassDesc;

mod phong;
mod render_to_texture;
mod volume_fog;

pub use phong::{PhongConstants, PhongScene};
pub use render_to_texture::{RenderToTextureScene, RoomConstants};
pub use volume_fog::{FogConstants, VolumeFogScene};

/// 场景背景色
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.125, 0.3, 1.0];

/// 场景初始化参数
#[derive(Debug, Clone, Copy)]
pub struct SceneContext<'a> {
    /// 客户区宽度
    pub width: u32,
    /// 客户区高度
    pub height: u32,
    /// HLSL 文件所在目录
    pub shader_dir: &'a Path,
}

impl SceneContext<'_> {
    /// 宽高比
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// 示例场景
pub trait Scene {
    /// 场景名称
    fn name(&self) -> &str;

    /// 常量块大小（字节，未对齐）
    fn constants_size(&self) -> u64;

    /// 创建 GPU 资源并声明 pass 序列
    fn build(&mut self, device: &mut dyn GraphicsDevice, ctx: &SceneContext<'_>) -> Result<Vec<RenderPassDesc>>;

    /// 推进动画 / 相机，返回本帧的常量块
    fn update(&mut self, elapsed: f32, input: &mut dyn InputSource) -> Vec<u8>;
}

/// 按配置创建场景
pub fn create_scene(config: &SampleConfig) -> Box<dyn Scene> {
    match config.kind {
        SampleKind::Phong => Box::new(PhongScene::new()),
        SampleKind::RenderToTexture => Box::new(RenderToTextureScene::new(
            config.mesh_path.clone(),
            config.texture_path.clone(),
        )),
        SampleKind::VolumeFog => Box::new(VolumeFogScene::new()),
    }
}

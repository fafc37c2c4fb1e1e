//! 体积雾
//!
//! 雾体是一个旋转的立方体，厚度由正反面的深度差得到：
//!
//! - Pass 0：剔除背面，把正面深度写入浮点目标
//! - Pass 1：剔除正面，把背面深度写入另一个浮点目标
//! - Pass 2：全屏四边形采样两个目标，按厚度叠加雾色到后备缓冲区

use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::component::SpinAnimation;
use crate::core::error::Result;
use crate::core::input::InputSource;
use crate::geometry::{primitives, VertexLayout};
use crate::gfx::backend::GraphicsDevice;
use crate::math::{constants, matrix, Matrix4, Vector3};
use crate::renderer::pass::{DrawCall, PassTarget, RenderPassDesc};
use crate::renderer::pipeline::{BlendMode, CullMode, PipelineDesc};
use crate::renderer::resource::{RenderTargetDesc, TextureFormat};

use super::{Scene, SceneContext, CLEAR_COLOR};

const CUBE_HALF_SIZE: f32 = 4.0;
const EYE: [f32; 3] = [0.0, 0.0, -25.0];
const Z_NEAR: f32 = 1.0;
/// 远裁剪面，同时用于把深度归一化
const Z_FAR: f32 = 100.0;
/// 深度目标的清除值
const DEPTH_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// 体积雾的常量块（对应 `fog_depth.hlsl`）
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FogConstants {
    pub world_view_proj: [[f32; 4]; 4],
    pub z_far: f32,
    pub _padding: [f32; 3],
}

/// 体积雾场景
pub struct VolumeFogScene {
    spin: SpinAnimation,
    view: Matrix4,
    projection: Matrix4,
}

impl VolumeFogScene {
    pub fn new() -> Self {
        Self {
            spin: SpinAnimation::new(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
        }
    }
}

impl Default for VolumeFogScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for VolumeFogScene {
    fn name(&self) -> &str {
        "volume_fog"
    }

    fn constants_size(&self) -> u64 {
        std::mem::size_of::<FogConstants>() as u64
    }

    fn build(&mut self, device: &mut dyn GraphicsDevice, ctx: &SceneContext<'_>) -> Result<Vec<RenderPassDesc>> {
        let cube = primitives::fog_cube(CUBE_HALF_SIZE);
        let index_count = cube.index_count();
        let cube_mesh = device.create_mesh(&cube)?;
        let quad_mesh = device.create_mesh(&primitives::screen_quad())?;

        let depth_target = |name: &str| {
            RenderTargetDesc::new(name, ctx.width, ctx.height, TextureFormat::Rgba16Float)
                .with_clear_color(DEPTH_CLEAR)
        };
        let front_depth = device.create_render_target(&depth_target("fog_front_depth"))?;
        let back_depth = device.create_render_target(&depth_target("fog_back_depth"))?;

        let depth_shader = ctx.shader_dir.join("fog_depth.hlsl");
        let front_pipeline = device.create_pipeline(
            &PipelineDesc::new("fog_front_depth", &depth_shader, VertexLayout::Position)
                .with_cull_mode(CullMode::Back)
                .with_target_format(TextureFormat::Rgba16Float),
        )?;
        let back_pipeline = device.create_pipeline(
            &PipelineDesc::new("fog_back_depth", &depth_shader, VertexLayout::Position)
                .with_cull_mode(CullMode::Front)
                .with_target_format(TextureFormat::Rgba16Float),
        )?;
        let composite_pipeline = device.create_pipeline(
            &PipelineDesc::new("fog_composite", ctx.shader_dir.join("fog_composite.hlsl"), VertexLayout::Position)
                .with_blend_mode(BlendMode::Additive),
        )?;

        self.view = matrix::look_at_lh(&Vector3::from(EYE), &Vector3::zeros(), &Vector3::y());
        self.projection = matrix::perspective_fov_lh(constants::QUARTER_PI, ctx.aspect(), Z_NEAR, Z_FAR);

        info!(indices = index_count, z_far = Z_FAR, "Volume fog scene built");

        Ok(vec![
            RenderPassDesc::new("front_depth", PassTarget::Offscreen(front_depth), front_pipeline)
                .clear(DEPTH_CLEAR)
                .with_depth()
                .draw(DrawCall::indexed(cube_mesh, index_count)),
            RenderPassDesc::new("back_depth", PassTarget::Offscreen(back_depth), back_pipeline)
                .clear(DEPTH_CLEAR)
                .with_depth()
                .draw(DrawCall::indexed(cube_mesh, index_count)),
            RenderPassDesc::new("composite", PassTarget::BackBuffer, composite_pipeline)
                .reads(&[front_depth, back_depth])
                .clear(CLEAR_COLOR)
                .with_depth()
                .without_constants()
                .draw(DrawCall::vertices(quad_mesh, 4, 2)),
        ])
    }

    fn update(&mut self, elapsed: f32, _input: &mut dyn InputSource) -> Vec<u8> {
        let world = self.spin.world_matrix();
        self.spin = self.spin.advance(elapsed);
        let block = FogConstants {
            world_view_proj: matrix::to_gpu(&(self.projection * self.view * world)),
            z_far: Z_FAR,
            _padding: [0.0; 3],
        };
        bytemuck::bytes_of(&block).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::IdleInput;
    use crate::gfx::headless::HeadlessDevice;
    use crate::renderer::pass::PassGraph;
    use std::path::Path;

    fn build() -> (VolumeFogScene, HeadlessDevice, Vec<RenderPassDesc>) {
        let mut device = HeadlessDevice::new(800, 600, 2).unwrap();
        let mut scene = VolumeFogScene::new();
        let ctx = SceneContext { width: 800, height: 600, shader_dir: Path::new("shaders") };
        let passes = scene.build(&mut device, &ctx).unwrap();
        (scene, device, passes)
    }

    #[test]
    fn test_constant_layout() {
        assert_eq!(std::mem::size_of::<FogConstants>(), 80);
    }

    #[test]
    fn test_pass_structure() {
        let (_, device, passes) = build();
        assert_eq!(passes.len(), 3);

        let front = device.pipeline(passes[0].pipeline).unwrap();
        let back = device.pipeline(passes[1].pipeline).unwrap();
        let composite = device.pipeline(passes[2].pipeline).unwrap();
        assert_eq!(front.cull_mode, CullMode::Back);
        assert_eq!(back.cull_mode, CullMode::Front);
        assert_eq!(composite.blend_mode, BlendMode::Additive);

        for pass in &passes[..2] {
            let desc = device.render_target(pass.offscreen_target().unwrap()).unwrap();
            assert_eq!(desc.format, TextureFormat::Rgba16Float);
        }

        let graph = PassGraph::new(passes).unwrap();
        assert!(graph.dead_outputs().is_empty());
        assert_eq!(graph.sampled_targets().len(), 2);
    }

    #[test]
    fn test_update_writes_z_far() {
        let (mut scene, _, _) = build();
        let bytes = scene.update(0.016, &mut IdleInput::new());
        let block: FogConstants = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(block.z_far, 100.0);
    }
}

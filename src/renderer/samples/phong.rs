//! Phong 光照立方体
//!
//! 一个 pass 直接画到后备缓冲区。立方体绕 X、Y 轴自转，
//! 像素着色器在观察空间中计算 Phong 光照。

use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::component::SpinAnimation;
use crate::core::error::Result;
use crate::core::input::InputSource;
use crate::geometry::{primitives, VertexLayout};
use crate::gfx::backend::GraphicsDevice;
use crate::math::{constants, matrix, Matrix4, Vector3};
use crate::renderer::pass::{DrawCall, PassTarget, RenderPassDesc};
use crate::renderer::pipeline::PipelineDesc;

use super::{Scene, SceneContext, CLEAR_COLOR};

/// 立方体半边长
const CUBE_HALF_SIZE: f32 = 15.0;
const EYE: [f32; 3] = [0.0, 0.0, -80.0];
const Z_NEAR: f32 = 1.0;
const Z_FAR: f32 = 1000.0;

/// Phong 场景的常量块（对应 `phong.hlsl` 的 `cbPerObject`）
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PhongConstants {
    pub world_view_proj: [[f32; 4]; 4],
    pub world_view: [[f32; 4]; 4],
}

/// Phong 光照立方体场景
pub struct PhongScene {
    spin: SpinAnimation,
    view: Matrix4,
    projection: Matrix4,
}

impl PhongScene {
    pub fn new() -> Self {
        Self {
            spin: SpinAnimation::new(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
        }
    }

    /// 当前动画状态
    pub fn spin(&self) -> SpinAnimation {
        self.spin
    }

    /// 计算当前角度下的常量
    pub fn constants(&self) -> PhongConstants {
        let world = self.spin.world_matrix();
        let world_view = self.view * world;
        PhongConstants {
            world_view_proj: matrix::to_gpu(&(self.projection * world_view)),
            world_view: matrix::to_gpu(&world_view),
        }
    }
}

impl Default for PhongScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for PhongScene {
    fn name(&self) -> &str {
        "phong"
    }

    fn constants_size(&self) -> u64 {
        std::mem::size_of::<PhongConstants>() as u64
    }

    fn build(&mut self, device: &mut dyn GraphicsDevice, ctx: &SceneContext<'_>) -> Result<Vec<RenderPassDesc>> {
        let cube = primitives::phong_cube(CUBE_HALF_SIZE);
        let index_count = cube.index_count();
        let mesh = device.create_mesh(&cube)?;

        let pipeline = device.create_pipeline(&PipelineDesc::new(
            "phong",
            ctx.shader_dir.join("phong.hlsl"),
            VertexLayout::PositionNormal,
        ))?;

        self.view = matrix::look_at_lh(&Vector3::from(EYE), &Vector3::zeros(), &Vector3::y());
        self.projection = matrix::perspective_fov_lh(constants::QUARTER_PI, ctx.aspect(), Z_NEAR, Z_FAR);

        info!(indices = index_count, "Phong scene built");

        Ok(vec![RenderPassDesc::new("lighting", PassTarget::BackBuffer, pipeline)
            .clear(CLEAR_COLOR)
            .with_depth()
            .draw(DrawCall::indexed(mesh, index_count))])
    }

    fn update(&mut self, elapsed: f32, _input: &mut dyn InputSource) -> Vec<u8> {
        // 使用推进前的角度
        let block = self.constants();
        self.spin = self.spin.advance(elapsed);
        bytemuck::bytes_of(&block).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::IdleInput;
    use crate::gfx::headless::HeadlessDevice;
    use crate::math::{Point3, Vector4};
    use std::path::Path;

    fn built_scene() -> (PhongScene, Vec<RenderPassDesc>) {
        let mut device = HeadlessDevice::new(800, 600, 2).unwrap();
        let mut scene = PhongScene::new();
        let ctx = SceneContext { width: 800, height: 600, shader_dir: Path::new("shaders") };
        let passes = scene.build(&mut device, &ctx).unwrap();
        (scene, passes)
    }

    #[test]
    fn test_constant_layout() {
        assert_eq!(std::mem::size_of::<PhongConstants>(), 128);
        assert_eq!(PhongScene::new().constants_size(), 128);
    }

    #[test]
    fn test_single_back_buffer_pass() {
        let (_, passes) = built_scene();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].target, PassTarget::BackBuffer);
        assert_eq!(passes[0].clear_color, Some(CLEAR_COLOR));
        assert!(passes[0].use_depth);
        assert_eq!(passes[0].draws[0].element_count, 36);
    }

    #[test]
    fn test_cube_center_projects_inside_depth_range() {
        let (scene, _) = built_scene();
        let world_view: Matrix4 = scene.constants().world_view.into();
        let center = world_view.transform_point(&Point3::origin());
        assert!((center.z - 80.0).abs() < 1e-3);

        let wvp: Matrix4 = scene.constants().world_view_proj.into();
        let clip = wvp * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn test_update_advances_spin() {
        let (mut scene, _) = built_scene();
        let mut input = IdleInput::new();
        let first = scene.update(0.5, &mut input);
        assert_eq!(first.len(), 128);
        assert!((scene.spin().angle() - 0.1).abs() < 1e-6);

        // 第一帧使用角度 0：world_view 只有平移
        let block: PhongConstants = bytemuck::pod_read_unaligned(&first);
        let world_view: Matrix4 = block.world_view.into();
        assert!((world_view[(0, 0)] - 1.0).abs() < 1e-6);

        let second = scene.update(0.5, &mut input);
        assert_ne!(first, second);
    }
}

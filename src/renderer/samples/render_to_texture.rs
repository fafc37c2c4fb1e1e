//! 渲染到纹理
//!
//! Pass 0 用第一人称相机把带纹理的房间画进离屏 RGBA8 目标，
//! Pass 1 用全屏四边形把这个目标采样到后备缓冲区。

use std::path::PathBuf;

use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::component::FirstPersonCamera;
use crate::core::error::Result;
use crate::core::input::InputSource;
use crate::geometry::loaders::{load_room_mesh, load_texture_or_placeholder};
use crate::geometry::{primitives, VertexLayout};
use crate::gfx::backend::GraphicsDevice;
use crate::math::{constants, matrix, Matrix4, Vector3};
use crate::renderer::pass::{DrawCall, PassTarget, RenderPassDesc};
use crate::renderer::pipeline::PipelineDesc;
use crate::renderer::resource::{RenderTargetDesc, TextureFormat};

use super::{Scene, SceneContext, CLEAR_COLOR};

/// 相机起点
const CAMERA_START: [f32; 3] = [25.0, 5.0, -6000.0];
const Z_NEAR: f32 = 1.0;
const Z_FAR: f32 = 50000.0;

/// 房间 pass 的常量块（对应 `room.hlsl`）
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RoomConstants {
    pub world_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub _padding: f32,
}

/// 渲染到纹理场景
pub struct RenderToTextureScene {
    mesh_path: PathBuf,
    texture_path: PathBuf,
    camera: FirstPersonCamera,
    world: Matrix4,
    projection: Matrix4,
}

impl RenderToTextureScene {
    pub fn new(mesh_path: PathBuf, texture_path: PathBuf) -> Self {
        Self {
            mesh_path,
            texture_path,
            camera: FirstPersonCamera::new(Vector3::from(CAMERA_START), 800, 600),
            world: Matrix4::identity(),
            projection: Matrix4::identity(),
        }
    }

    pub fn camera(&self) -> &FirstPersonCamera {
        &self.camera
    }
}

impl Scene for RenderToTextureScene {
    fn name(&self) -> &str {
        "render_to_texture"
    }

    fn constants_size(&self) -> u64 {
        std::mem::size_of::<RoomConstants>() as u64
    }

    fn build(&mut self, device: &mut dyn GraphicsDevice, ctx: &SceneContext<'_>) -> Result<Vec<RenderPassDesc>> {
        let room = load_room_mesh(&self.mesh_path)?;
        let room_vertices = room.vertex_count;
        let room_mesh = device.create_mesh(&room)?;
        let quad_mesh = device.create_mesh(&primitives::screen_quad())?;

        let texture = load_texture_or_placeholder(&self.texture_path).flipped_vertically();
        let texture = device.create_texture(&texture)?;

        let target = device.create_render_target(
            &RenderTargetDesc::new("scene_color", ctx.width, ctx.height, TextureFormat::Rgba8Unorm)
                .with_clear_color(CLEAR_COLOR),
        )?;

        let room_pipeline = device.create_pipeline(&PipelineDesc::new(
            "room",
            ctx.shader_dir.join("room.hlsl"),
            VertexLayout::PositionTexcoord,
        ))?;
        let quad_pipeline = device.create_pipeline(&PipelineDesc::new(
            "screen_quad",
            ctx.shader_dir.join("screen_quad.hlsl"),
            VertexLayout::Position,
        ))?;

        self.camera.set_client_size(ctx.width, ctx.height);
        self.projection = matrix::perspective_fov_lh(constants::QUARTER_PI, ctx.aspect(), Z_NEAR, Z_FAR);

        info!(vertices = room_vertices, "Render-to-texture scene built");

        Ok(vec![
            RenderPassDesc::new("room", PassTarget::Offscreen(target), room_pipeline)
                .reads(&[texture])
                .clear(CLEAR_COLOR)
                .with_depth()
                .draw(DrawCall::vertices(room_mesh, room_vertices, 1)),
            RenderPassDesc::new("screen_quad", PassTarget::BackBuffer, quad_pipeline)
                .reads(&[target])
                .clear(CLEAR_COLOR)
                .with_depth()
                .without_constants()
                .draw(DrawCall::vertices(quad_mesh, 4, 2)),
        ])
    }

    fn update(&mut self, elapsed: f32, input: &mut dyn InputSource) -> Vec<u8> {
        let view = self.camera.frame_move(elapsed, input);
        let block = RoomConstants {
            world_view_proj: matrix::to_gpu(&(self.projection * view * self.world)),
            camera_position: self.camera.position().into(),
            _padding: 0.0,
        };
        bytemuck::bytes_of(&block).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{AssetError, RenderError};
    use crate::core::input::IdleInput;
    use crate::gfx::headless::HeadlessDevice;
    use std::io::Write;
    use std::path::Path;
    use winit::keyboard::KeyCode;

    fn room_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1").unwrap();
        writeln!(file, "0 0 0 0 0").unwrap();
        writeln!(file, "0 100 0 0 1").unwrap();
        writeln!(file, "100 0 0 1 0").unwrap();
        file
    }

    fn ctx() -> SceneContext<'static> {
        SceneContext { width: 800, height: 600, shader_dir: Path::new("shaders") }
    }

    #[test]
    fn test_constant_layout() {
        assert_eq!(std::mem::size_of::<RoomConstants>(), 80);
    }

    #[test]
    fn test_two_passes_with_missing_texture() {
        let room = room_file();
        let mut scene = RenderToTextureScene::new(room.path().to_path_buf(), PathBuf::from("missing/Room.bmp"));
        let mut device = HeadlessDevice::new(800, 600, 2).unwrap();
        let passes = scene.build(&mut device, &ctx()).unwrap();

        assert_eq!(passes.len(), 2);
        let target = passes[0].offscreen_target().unwrap();
        assert_eq!(passes[1].inputs, vec![target]);
        let quad = passes[1].draws[0];
        assert_eq!((quad.element_count, quad.instance_count, quad.indexed), (4, 2, false));
        assert!(!passes[1].bind_constants);
        assert_eq!(passes[0].draws[0].element_count, 3);

        let desc = device.render_target(target).unwrap();
        assert_eq!((desc.width, desc.height), (800, 600));
        assert_eq!(desc.format, TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn test_missing_mesh_is_fatal() {
        let mut scene = RenderToTextureScene::new(PathBuf::from("missing/room.txt"), PathBuf::from("missing/Room.bmp"));
        let mut device = HeadlessDevice::new(800, 600, 2).unwrap();
        let err = scene.build(&mut device, &ctx()).unwrap_err();
        assert!(matches!(err, RenderError::Asset(AssetError::FileNotFound(_))));
    }

    #[test]
    fn test_update_moves_camera() {
        let room = room_file();
        let mut scene = RenderToTextureScene::new(room.path().to_path_buf(), PathBuf::from("missing/Room.bmp"));
        let mut device = HeadlessDevice::new(800, 600, 2).unwrap();
        scene.build(&mut device, &ctx()).unwrap();

        let mut input = IdleInput::new();
        input.move_cursor(400, 300);
        input.press(KeyCode::KeyW);
        let bytes = scene.update(0.1, &mut input);
        let block: RoomConstants = bytemuck::pod_read_unaligned(&bytes);
        assert!((block.camera_position[2] - (-5500.0)).abs() < 1e-2);
        assert_eq!(scene.camera().position().x, 25.0);
    }
}

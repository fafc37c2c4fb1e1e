//! 多 pass 帧渲染器
//!
//! `FrameRenderer` 驱动一个 [`Scene`] 在 [`GraphicsDevice`] 上逐帧渲染：
//!
//! ```text
//! Idle → Recording → Pass(0) … Pass(n-1) → Submitted → Presented → Draining → Idle
//! ```
//!
//! 每帧完整排空 GPU 之后才返回，因此常量缓冲只需一份，命令分配器也只需一个。
//! 被后续 pass 采样的离屏目标在产生它的 pass 末尾切换为 `PIXEL_SHADER_RESOURCE`，
//! 最后一个 pass 结束前全部切回 `RENDER_TARGET`，后备缓冲区回到 `PRESENT`，
//! 每帧从相同的资源状态开始。

use std::path::PathBuf;

use tracing::{debug, error, info, trace};

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, Result};
use crate::core::input::InputSource;
use crate::gfx::backend::GraphicsDevice;

use super::command::{CommandList, ScissorRect, Viewport};
use super::descriptor::GpuHandle;
use super::pass::{PassGraph, PassTarget};
use super::resource::{aligned_constant_size, BackBufferRing, ResourceState};
use super::samples::{Scene, SceneContext};
use super::sync::{FenceManager, FenceValue};
use super::validation::{validate_frame, StateMap};

/// 渲染器选项
#[derive(Debug, Clone)]
pub struct FrameOptions {
    /// 呈现时等待垂直同步
    pub vsync: bool,
    /// 提交前校验整帧命令
    pub validate: bool,
    /// HLSL 文件所在目录
    pub shader_dir: PathBuf,
}

impl FrameOptions {
    pub fn from_config(config: &GraphicsConfig) -> Self {
        Self {
            vsync: config.vsync,
            validate: config.validate_commands,
            shader_dir: config.shader_dir.clone(),
        }
    }
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self::from_config(&GraphicsConfig::default())
    }
}

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// 空闲，上一帧已排空
    Idle,
    /// 正在录制命令
    Recording,
    /// 正在录制第 i 个 pass
    Pass(usize),
    /// 命令已提交
    Submitted,
    /// 已呈现
    Presented,
    /// 等待 GPU 完成
    Draining,
}

/// 帧统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// 已完成的帧数
    pub frames: u64,
    /// 上一帧的命令数量
    pub commands: usize,
    /// 上一帧的绘制调用数量
    pub draw_calls: usize,
    /// 上一帧的资源屏障数量
    pub barriers: usize,
}

/// 多 pass 帧渲染器
pub struct FrameRenderer<D: GraphicsDevice> {
    device: D,
    scene: Box<dyn Scene>,
    graph: PassGraph,
    commands: CommandList,
    fence: FenceManager,
    ring: BackBufferRing,
    depth_stencil: GpuHandle,
    constants: GpuHandle,
    viewport: Viewport,
    scissor: ScissorRect,
    options: FrameOptions,
    state: FrameState,
    stats: FrameStats,
    shut_down: bool,
}

impl<D: GraphicsDevice> FrameRenderer<D> {
    /// 创建渲染器
    ///
    /// 创建深度缓冲和常量缓冲，由场景创建其余资源并声明 pass，
    /// 校验 pass 序列后提交一次性上传并等待完成。
    pub fn new(mut device: D, mut scene: Box<dyn Scene>, options: FrameOptions) -> Result<Self> {
        let (width, height) = device.client_size();
        let ring = BackBufferRing::new(device.back_buffer_count())?;

        let depth_stencil = device.create_depth_stencil(width, height)?;
        let constants = device.create_constant_buffer(aligned_constant_size(scene.constants_size()))?;

        let ctx = SceneContext { width, height, shader_dir: &options.shader_dir };
        let passes = scene.build(&mut device, &ctx)?;
        let graph = PassGraph::new(passes)?;

        device.flush_uploads()?;

        info!(
            backend = device.backend_name(),
            scene = scene.name(),
            passes = graph.len(),
            width,
            height,
            "Frame renderer initialized"
        );

        Ok(Self {
            device,
            scene,
            graph,
            commands: CommandList::new(),
            fence: FenceManager::new(),
            ring,
            depth_stencil,
            constants,
            viewport: Viewport::full(width, height),
            scissor: ScissorRect::full(width, height),
            options,
            state: FrameState::Idle,
            stats: FrameStats::default(),
            shut_down: false,
        })
    }

    /// 推进场景并写入常量缓冲
    ///
    /// 只在上一帧排空之后调用，设备会拒绝在 GPU 仍在读取时改写常量。
    pub fn update(&mut self, elapsed: f32, input: &mut dyn InputSource) -> Result<()> {
        let block = self.scene.update(elapsed, input);
        self.device.write_constant_buffer(self.constants, 0, &block)
    }

    /// 录制、提交、呈现一帧，并阻塞直到 GPU 完成
    pub fn draw(&mut self) -> Result<()> {
        self.device.reset_recorder()?;
        self.state = FrameState::Recording;

        let back_buffer = self.device.back_buffer(self.ring.current_index())?;
        self.record(back_buffer)?;

        if self.options.validate {
            validate_frame(self.commands.commands(), &self.initial_states(back_buffer))?;
        }

        self.device.execute(&self.commands)?;
        self.state = FrameState::Submitted;

        let sync_interval = if self.options.vsync { 1 } else { 0 };
        self.device.present(sync_interval)?;
        self.state = FrameState::Presented;
        self.ring.advance();

        let value = self.fence.next_value();
        self.device.signal(value)?;
        self.state = FrameState::Draining;
        self.wait_for(value)?;
        self.state = FrameState::Idle;

        self.stats = FrameStats {
            frames: self.stats.frames + 1,
            commands: self.commands.commands().len(),
            draw_calls: self.commands.draw_count(),
            barriers: self.commands.barriers().count(),
        };
        trace!(frame = self.stats.frames, fence = value.value(), "Frame drained");
        Ok(())
    }

    /// 等待 GPU 完成并释放渲染器创建的资源
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        if !self.fence.is_drained() {
            self.wait_for(self.fence.current_value())?;
        }

        let mut handles: Vec<GpuHandle> = Vec::new();
        for pass in self.graph.passes() {
            let owned = pass
                .offscreen_target()
                .into_iter()
                .chain(std::iter::once(pass.pipeline))
                .chain(pass.inputs.iter().copied())
                .chain(pass.draws.iter().map(|d| d.mesh));
            for handle in owned {
                if !handles.contains(&handle) {
                    handles.push(handle);
                }
            }
        }
        handles.push(self.constants);
        handles.push(self.depth_stencil);

        for handle in &handles {
            self.device.release(*handle)?;
        }
        debug!(resources = handles.len(), "Frame renderer resources released");
        Ok(())
    }

    fn wait_for(&mut self, value: FenceValue) -> Result<()> {
        self.device.wait_for(value)?;
        self.fence.update_completed_value(self.device.completed_value())?;
        if !self.fence.is_completed(value) {
            return Err(GraphicsError::FenceWait(format!(
                "wait returned before fence {} completed (completed {})",
                value.value(),
                self.fence.completed_value().value()
            ))
            .into());
        }
        Ok(())
    }

    fn record(&mut self, back_buffer: GpuHandle) -> Result<()> {
        let list = &mut self.commands;
        list.begin()?;
        list.set_viewport(self.viewport)?;
        list.set_scissor(self.scissor)?;

        let sampled = self.graph.sampled_targets();
        let last = self.graph.len() - 1;

        for (index, pass) in self.graph.passes().iter().enumerate() {
            self.state = FrameState::Pass(index);
            list.begin_pass(index, &pass.name)?;

            let target = match pass.target {
                PassTarget::Offscreen(handle) => handle,
                PassTarget::BackBuffer => {
                    list.barrier(back_buffer, ResourceState::Present, ResourceState::RenderTarget)?;
                    back_buffer
                }
            };

            if let Some(color) = pass.clear_color {
                list.clear_color(target, color)?;
            }
            let depth = if pass.use_depth {
                list.clear_depth(self.depth_stencil, 1.0, 0)?;
                Some(self.depth_stencil)
            } else {
                None
            };
            list.set_render_target(target, depth)?;
            list.set_pipeline(pass.pipeline)?;
            if pass.bind_constants {
                list.set_constants(self.constants)?;
            }
            if !pass.inputs.is_empty() {
                list.set_shader_inputs(&pass.inputs)?;
            }

            for draw in &pass.draws {
                list.set_mesh(draw.mesh)?;
                if draw.indexed {
                    list.draw_indexed(draw.element_count, draw.instance_count)?;
                } else {
                    list.draw(draw.element_count, draw.instance_count)?;
                }
            }

            if self.graph.is_consumed(index) {
                list.barrier(target, ResourceState::RenderTarget, ResourceState::ShaderResource)?;
            }

            if index == last {
                for handle in &sampled {
                    list.barrier(*handle, ResourceState::ShaderResource, ResourceState::RenderTarget)?;
                }
                list.barrier(back_buffer, ResourceState::RenderTarget, ResourceState::Present)?;
            }

            list.end_pass()?;
        }

        list.end()
    }

    /// 一帧开始时各资源应处的状态
    fn initial_states(&self, back_buffer: GpuHandle) -> StateMap {
        let mut states = StateMap::new();
        states.insert(back_buffer, ResourceState::Present);
        states.insert(self.depth_stencil, ResourceState::DepthWrite);
        for target in self.graph.offscreen_targets() {
            states.insert(target, ResourceState::RenderTarget);
        }
        for texture in self.graph.static_textures() {
            states.insert(texture, ResourceState::ShaderResource);
        }
        states
    }

    // ========== 访问器 ==========

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scene_name(&self) -> &str {
        self.scene.name()
    }

    pub fn graph(&self) -> &PassGraph {
        &self.graph
    }

    /// 最近一帧录制的命令
    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub fn fence(&self) -> &FenceManager {
        &self.fence
    }

    pub fn ring(&self) -> &BackBufferRing {
        &self.ring
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// 常量缓冲句柄
    pub fn constant_buffer(&self) -> GpuHandle {
        self.constants
    }
}

impl<D: GraphicsDevice> Drop for FrameRenderer<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down frame renderer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{SampleConfig, SampleKind};
    use crate::core::error::{PassError, RenderError};
    use crate::core::input::IdleInput;
    use crate::geometry::{primitives, VertexLayout};
    use crate::gfx::headless::{DeviceEvent, HeadlessDevice};
    use crate::renderer::command::Command;
    use crate::renderer::pass::{DrawCall, RenderPassDesc};
    use crate::renderer::pipeline::PipelineDesc;
    use crate::renderer::resource::{RenderTargetDesc, TextureFormat};
    use crate::renderer::samples::create_scene;
    use std::io::Write;

    fn options() -> FrameOptions {
        FrameOptions { vsync: true, validate: true, shader_dir: PathBuf::from("shaders") }
    }

    fn renderer(kind: SampleKind) -> FrameRenderer<HeadlessDevice> {
        let device = HeadlessDevice::new(800, 600, 2).unwrap();
        let config = SampleConfig { kind, ..SampleConfig::default() };
        FrameRenderer::new(device, create_scene(&config), options()).unwrap()
    }

    fn room_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2").unwrap();
        for line in ["0 0 0 0 0", "0 1 0 0 1", "1 0 0 1 0", "1 0 0 1 0", "0 1 0 0 1", "1 1 0 1 1"] {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn index_of(commands: &[Command], predicate: impl Fn(&Command) -> bool) -> usize {
        commands.iter().position(predicate).unwrap()
    }

    #[test]
    fn test_first_frame_end_to_end() {
        let mut renderer = renderer(SampleKind::Phong);
        let mut input = IdleInput::new();
        renderer.device_mut().clear_events();

        renderer.update(0.016, &mut input).unwrap();
        renderer.draw().unwrap();

        assert_eq!(renderer.device().present_count(), 1);
        assert_eq!(renderer.ring().current_index(), 1);
        assert_eq!(renderer.device().current_back_buffer_index(), 1);
        assert_eq!(renderer.fence().current_value(), FenceValue::new(1));
        assert_eq!(renderer.fence().completed_value(), FenceValue::new(1));
        assert_eq!(renderer.state(), FrameState::Idle);

        let events = renderer.device().events();
        let signaled = events.iter().position(|e| *e == DeviceEvent::Signaled(FenceValue::new(1))).unwrap();
        let waited = events
            .iter()
            .position(|e| *e == DeviceEvent::Waited { value: FenceValue::new(1), observed: FenceValue::new(1) })
            .unwrap();
        let presented = events.iter().position(|e| *e == DeviceEvent::Presented { back_buffer: 0 }).unwrap();
        assert!(presented < signaled && signaled < waited);
    }

    #[test]
    fn test_ring_and_fence_over_many_frames() {
        let mut renderer = renderer(SampleKind::VolumeFog);
        let mut input = IdleInput::new();
        for frame in 1..=10u64 {
            renderer.update(0.016, &mut input).unwrap();
            renderer.draw().unwrap();
            assert_eq!(renderer.ring().current_index(), (frame % 2) as usize);
            assert_eq!(renderer.fence().current_value(), FenceValue::new(frame));
            assert!(renderer.fence().is_drained());
        }
        assert_eq!(renderer.stats().frames, 10);
        assert_eq!(renderer.device().present_count(), 10);
    }

    #[test]
    fn test_fog_barriers_precede_reads() {
        let mut renderer = renderer(SampleKind::VolumeFog);
        renderer.update(0.016, &mut IdleInput::new()).unwrap();
        renderer.draw().unwrap();

        let targets = renderer.graph().sampled_targets();
        let commands = renderer.commands().commands();
        let read = index_of(commands, |c| matches!(c, Command::SetShaderInputs(_)));
        for target in targets {
            let to_read = index_of(commands, |c| {
                matches!(c, Command::Barrier(b) if b.resource == target && b.after == ResourceState::ShaderResource)
            });
            let to_write = index_of(commands, |c| {
                matches!(c, Command::Barrier(b) if b.resource == target && b.after == ResourceState::RenderTarget)
            });
            assert!(to_read < read);
            assert!(read < to_write);
        }
        // 3 个 pass 共 3 次绘制：两次立方体，一次四边形
        assert_eq!(renderer.stats().draw_calls, 3);
        // 2 次写→读、2 次读→写、后备缓冲区进出各 1 次
        assert_eq!(renderer.stats().barriers, 6);
    }

    #[test]
    fn test_render_to_texture_frame() {
        let room = room_file();
        let device = HeadlessDevice::new(640, 480, 3).unwrap();
        let config = SampleConfig {
            kind: SampleKind::RenderToTexture,
            mesh_path: room.path().to_path_buf(),
            texture_path: PathBuf::from("missing/Room.bmp"),
            frames: 0,
        };
        let mut renderer = FrameRenderer::new(device, create_scene(&config), options()).unwrap();
        let mut input = IdleInput::new();
        for _ in 0..3 {
            renderer.update(0.016, &mut input).unwrap();
            renderer.draw().unwrap();
        }
        assert_eq!(renderer.ring().current_index(), 0);
        assert_eq!(renderer.device().current_back_buffer_index(), 0);
    }

    #[test]
    fn test_constants_written_to_buffer() {
        let mut renderer = renderer(SampleKind::VolumeFog);
        renderer.update(0.016, &mut IdleInput::new()).unwrap();
        let bytes = renderer.device().constant_buffer(renderer.constant_buffer()).unwrap();
        assert_eq!(bytes.len(), 256);
        // z_far 紧跟在 64 字节的矩阵之后
        assert_eq!(&bytes[64..68], &100.0f32.to_le_bytes());
    }

    #[test]
    fn test_shutdown_releases_resources() {
        let mut renderer = renderer(SampleKind::VolumeFog);
        renderer.update(0.016, &mut IdleInput::new()).unwrap();
        renderer.draw().unwrap();
        renderer.shutdown().unwrap();
        // 只剩交换链的后备缓冲区
        assert_eq!(renderer.device().live_resources(), 2);
        // 重复关闭无副作用
        renderer.shutdown().unwrap();
    }

    struct TestScene {
        read_later_output: bool,
    }

    impl Scene for TestScene {
        fn name(&self) -> &str {
            "test"
        }

        fn constants_size(&self) -> u64 {
            64
        }

        fn build(&mut self, device: &mut dyn GraphicsDevice, ctx: &SceneContext<'_>) -> Result<Vec<RenderPassDesc>> {
            let quad = device.create_mesh(&primitives::screen_quad())?;
            let pipeline = device.create_pipeline(&PipelineDesc::new(
                "test",
                ctx.shader_dir.join("screen_quad.hlsl"),
                VertexLayout::Position,
            ))?;
            let target = |name: &str| RenderTargetDesc::new(name, ctx.width, ctx.height, TextureFormat::Rgba8Unorm);
            let unused = device.create_render_target(&target("unused"))?;
            let used = device.create_render_target(&target("used"))?;

            let mut first = RenderPassDesc::new("unused", PassTarget::Offscreen(unused), pipeline)
                .clear([0.0; 4])
                .draw(DrawCall::vertices(quad, 4, 2));
            if self.read_later_output {
                first = first.reads(&[used]);
            }
            Ok(vec![
                first,
                RenderPassDesc::new("used", PassTarget::Offscreen(used), pipeline)
                    .draw(DrawCall::vertices(quad, 4, 2)),
                RenderPassDesc::new("present", PassTarget::BackBuffer, pipeline)
                    .reads(&[used])
                    .draw(DrawCall::vertices(quad, 4, 2)),
            ])
        }

        fn update(&mut self, _elapsed: f32, _input: &mut dyn InputSource) -> Vec<u8> {
            vec![0; 64]
        }
    }

    #[test]
    fn test_dead_output_still_executes() {
        let device = HeadlessDevice::new(800, 600, 2).unwrap();
        let scene = Box::new(TestScene { read_later_output: false });
        let mut renderer = FrameRenderer::new(device, scene, options()).unwrap();
        assert_eq!(renderer.graph().dead_outputs(), &[0]);

        renderer.update(0.016, &mut IdleInput::new()).unwrap();
        renderer.draw().unwrap();
        assert_eq!(renderer.stats().draw_calls, 3);
    }

    #[test]
    fn test_out_of_order_read_is_rejected_at_init() {
        let device = HeadlessDevice::new(800, 600, 2).unwrap();
        let scene = Box::new(TestScene { read_later_output: true });
        let err = FrameRenderer::new(device, scene, options()).err().unwrap();
        assert!(matches!(err, RenderError::Pass(PassError::InputNotProduced { .. })));
    }

    #[test]
    fn test_draw_without_update_is_allowed() {
        let mut renderer = renderer(SampleKind::Phong);
        renderer.draw().unwrap();
        renderer.draw().unwrap();
        assert_eq!(renderer.fence().completed_value(), FenceValue::new(2));
    }
}

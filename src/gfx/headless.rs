//! 无 GPU 的图形设备
//!
//! `HeadlessDevice` 在宿主内存中模拟一个 DX12 风格的设备：资源由描述符表分配，
//! 资源状态按命令列表中的屏障推进，队列异步完成 Fence 信号。
//!
//! 与真实设备相比，它额外检查：
//!
//! - 每个提交的命令列表都通过 [`validate_commands`]（开启校验时）
//! - 提交的工作完成前，拒绝重置命令分配器、改写常量缓冲和释放资源
//! - 等待一个从未发出的 Fence 值时返回错误，而不是永远阻塞
//!
//! 设备把每一步记录在事件日志中，测试据此检查一帧的执行顺序。

use std::collections::VecDeque;

use tracing::{debug, info, trace};

use crate::core::error::{GraphicsError, Result};
use crate::geometry::MeshData;
use crate::gfx::backend::GraphicsDevice;
use crate::renderer::command::{Command, CommandList, CommandListState};
use crate::renderer::descriptor::{DescriptorTable, GpuHandle, HandleKind};
use crate::renderer::pipeline::PipelineDesc;
use crate::renderer::resource::{aligned_constant_size, RenderTargetDesc, ResourceState, TextureData};
use crate::renderer::sync::FenceValue;
use crate::renderer::validation::{validate_commands, StateMap};

/// 描述符表容量
const MAX_RESOURCES: u32 = 256;

/// 设备事件
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// 创建了资源
    Created(GpuHandle),
    /// 释放了资源
    Released(GpuHandle),
    /// 初始化上传批次完成
    Uploaded { resources: usize },
    /// 命令分配器被重置
    RecorderReset,
    /// 提交了命令列表
    Executed { commands: usize, draws: usize },
    /// 呈现了后备缓冲区
    Presented { back_buffer: usize },
    /// 发出了 Fence 信号
    Signaled(FenceValue),
    /// 等待返回，附带返回时观察到的完成值
    Waited { value: FenceValue, observed: FenceValue },
}

enum HeadlessResource {
    BackBuffer,
    RenderTarget(RenderTargetDesc),
    DepthStencil,
    Texture,
    Mesh,
    ConstantBuffer(Vec<u8>),
    Pipeline(PipelineDesc),
}

/// 无 GPU 的图形设备
pub struct HeadlessDevice {
    width: u32,
    height: u32,
    resources: DescriptorTable<HeadlessResource>,
    states: StateMap,
    back_buffers: Vec<GpuHandle>,
    current_back_buffer: usize,
    /// 排队等待上传的资源
    pending_uploads: Vec<GpuHandle>,
    /// 已发出但尚未完成的信号
    pending_signals: VecDeque<FenceValue>,
    last_signaled: FenceValue,
    completed: FenceValue,
    /// 已提交但之后还没有发出信号的工作
    unsignaled_work: bool,
    recorder_ready: bool,
    validate: bool,
    present_count: u64,
    events: Vec<DeviceEvent>,
}

impl HeadlessDevice {
    /// 创建设备和交换链
    pub fn new(width: u32, height: u32, back_buffer_count: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::DeviceCreation(format!(
                "client area must be non-empty, got {}x{}",
                width, height
            ))
            .into());
        }
        if back_buffer_count < 2 {
            return Err(GraphicsError::SwapchainError(format!(
                "swap chain needs at least 2 buffers, got {}",
                back_buffer_count
            ))
            .into());
        }

        let mut resources = DescriptorTable::new(MAX_RESOURCES);
        let mut states = StateMap::new();
        let mut back_buffers = Vec::with_capacity(back_buffer_count);
        for _ in 0..back_buffer_count {
            let handle = resources.allocate(HandleKind::BackBuffer, HeadlessResource::BackBuffer)?;
            states.insert(handle, ResourceState::Present);
            back_buffers.push(handle);
        }

        info!(width, height, buffers = back_buffer_count, "Headless device created");

        Ok(Self {
            width,
            height,
            resources,
            states,
            back_buffers,
            current_back_buffer: 0,
            pending_uploads: Vec::new(),
            pending_signals: VecDeque::new(),
            last_signaled: FenceValue::default(),
            completed: FenceValue::default(),
            unsignaled_work: false,
            recorder_ready: false,
            validate: true,
            present_count: 0,
            events: Vec::new(),
        })
    }

    /// 开启或关闭命令列表校验
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// 事件日志
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    /// 清空事件日志
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// 已呈现的次数
    pub fn present_count(&self) -> u64 {
        self.present_count
    }

    /// 交换链当前的后备缓冲区索引
    pub fn current_back_buffer_index(&self) -> usize {
        self.current_back_buffer
    }

    /// 资源当前状态
    pub fn resource_state(&self, handle: GpuHandle) -> Option<ResourceState> {
        self.states.get(&handle).copied()
    }

    /// 存活的资源数量（含后备缓冲区）
    pub fn live_resources(&self) -> u32 {
        self.resources.len()
    }

    /// 常量缓冲的内容
    pub fn constant_buffer(&self, handle: GpuHandle) -> Result<&[u8]> {
        match self.resources.get(handle.expect_kind(HandleKind::ConstantBuffer)?)? {
            HeadlessResource::ConstantBuffer(bytes) => Ok(bytes),
            _ => Err(GraphicsError::InvalidHandle(format!("{} is not a constant buffer", handle)).into()),
        }
    }

    /// 管线描述
    pub fn pipeline(&self, handle: GpuHandle) -> Result<&PipelineDesc> {
        match self.resources.get(handle.expect_kind(HandleKind::Pipeline)?)? {
            HeadlessResource::Pipeline(desc) => Ok(desc),
            _ => Err(GraphicsError::InvalidHandle(format!("{} is not a pipeline", handle)).into()),
        }
    }

    /// 离屏渲染目标描述
    pub fn render_target(&self, handle: GpuHandle) -> Result<&RenderTargetDesc> {
        match self.resources.get(handle.expect_kind(HandleKind::RenderTarget)?)? {
            HeadlessResource::RenderTarget(desc) => Ok(desc),
            _ => Err(GraphicsError::InvalidHandle(format!("{} is not a render target", handle)).into()),
        }
    }

    /// 是否有提交的工作尚未完成
    pub fn is_busy(&self) -> bool {
        self.unsignaled_work || self.completed < self.last_signaled
    }

    fn ensure_idle(&self, operation: &str) -> Result<()> {
        if self.is_busy() {
            return Err(GraphicsError::ResourceInFlight(format!(
                "{} while GPU work is in flight (signaled {}, completed {})",
                operation,
                self.last_signaled.value(),
                self.completed.value()
            ))
            .into());
        }
        Ok(())
    }

    fn register(&mut self, kind: HandleKind, resource: HeadlessResource, state: Option<ResourceState>) -> Result<GpuHandle> {
        let handle = self
            .resources
            .allocate(kind, resource)
            .map_err(|e| GraphicsError::ResourceCreation(e.to_string()))?;
        if let Some(state) = state {
            self.states.insert(handle, state);
        }
        trace!(%handle, "Resource created");
        self.events.push(DeviceEvent::Created(handle));
        Ok(handle)
    }

    fn check_handles(&self, list: &CommandList) -> Result<()> {
        for command in list.commands() {
            let handles: Vec<GpuHandle> = match command {
                Command::Barrier(barrier) => vec![barrier.resource],
                Command::ClearColor { target, .. } | Command::ClearDepth { target, .. } => vec![*target],
                Command::SetRenderTarget { color, depth } => {
                    let mut handles = vec![*color];
                    handles.extend(depth.iter().copied());
                    handles
                }
                Command::SetPipeline(handle) | Command::SetConstants(handle) | Command::SetMesh(handle) => {
                    vec![*handle]
                }
                Command::SetShaderInputs(inputs) => inputs.clone(),
                _ => Vec::new(),
            };
            for handle in handles {
                if !self.resources.contains(handle) {
                    return Err(GraphicsError::InvalidHandle(format!(
                        "command list references released or unknown {}",
                        handle
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// 模拟 GPU 向前推进，完成到 `value` 为止的所有信号
    fn advance_gpu(&mut self, value: FenceValue) {
        while let Some(&next) = self.pending_signals.front() {
            if next > value {
                break;
            }
            self.pending_signals.pop_front();
            self.completed = next;
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn backend_name(&self) -> &str {
        "Headless"
    }

    fn client_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn back_buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    fn back_buffer(&self, index: usize) -> Result<GpuHandle> {
        self.back_buffers.get(index).copied().ok_or_else(|| {
            GraphicsError::InvalidHandle(format!(
                "back buffer {} out of range (count {})",
                index,
                self.back_buffers.len()
            ))
            .into()
        })
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<GpuHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "render target '{}' has zero size",
                desc.name
            ))
            .into());
        }
        debug!(name = %desc.name, width = desc.width, height = desc.height, pixel_format = ?desc.format, "Creating render target");
        self.register(
            HandleKind::RenderTarget,
            HeadlessResource::RenderTarget(desc.clone()),
            Some(ResourceState::RenderTarget),
        )
    }

    fn create_depth_stencil(&mut self, width: u32, height: u32) -> Result<GpuHandle> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::ResourceCreation("depth buffer has zero size".to_string()).into());
        }
        self.register(HandleKind::DepthStencil, HeadlessResource::DepthStencil, Some(ResourceState::DepthWrite))
    }

    fn create_texture(&mut self, data: &TextureData) -> Result<GpuHandle> {
        let expected = data.width as usize * data.height as usize * 4;
        if expected == 0 || data.pixels.len() != expected {
            return Err(GraphicsError::ResourceCreation(format!(
                "texture {}x{} has {} bytes, expected {}",
                data.width,
                data.height,
                data.pixels.len(),
                expected
            ))
            .into());
        }
        let handle = self.register(HandleKind::Texture, HeadlessResource::Texture, Some(ResourceState::CopyDest))?;
        self.pending_uploads.push(handle);
        Ok(handle)
    }

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle> {
        mesh.validate().map_err(GraphicsError::ResourceCreation)?;
        debug!(name = %mesh.name, vertices = mesh.vertex_count, indices = mesh.index_count(), "Creating mesh");
        let handle = self.register(HandleKind::Mesh, HeadlessResource::Mesh, None)?;
        self.pending_uploads.push(handle);
        Ok(handle)
    }

    fn create_constant_buffer(&mut self, size: u64) -> Result<GpuHandle> {
        if size == 0 {
            return Err(GraphicsError::ResourceCreation("constant buffer has zero size".to_string()).into());
        }
        let bytes = vec![0u8; aligned_constant_size(size) as usize];
        self.register(HandleKind::ConstantBuffer, HeadlessResource::ConstantBuffer(bytes), None)
    }

    fn write_constant_buffer(&mut self, buffer: GpuHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.ensure_idle("writing a constant buffer")?;
        let buffer = buffer.expect_kind(HandleKind::ConstantBuffer)?;
        match self.resources.get_mut(buffer)? {
            HeadlessResource::ConstantBuffer(bytes) => {
                let start = offset as usize;
                let end = start + data.len();
                if end > bytes.len() {
                    return Err(GraphicsError::InvalidCommand(format!(
                        "write of {} bytes at offset {} overflows {} ({} bytes)",
                        data.len(),
                        offset,
                        buffer,
                        bytes.len()
                    ))
                    .into());
                }
                bytes[start..end].copy_from_slice(data);
                Ok(())
            }
            _ => Err(GraphicsError::InvalidHandle(format!("{} is not a constant buffer", buffer)).into()),
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuHandle> {
        if desc.vertex_shader.entry_point.is_empty() || desc.pixel_shader.entry_point.is_empty() {
            return Err(GraphicsError::ShaderCompilation(format!(
                "pipeline '{}' is missing a shader entry point",
                desc.name
            ))
            .into());
        }
        debug!(name = %desc.name, cull = ?desc.cull_mode, blend = ?desc.blend_mode, "Creating pipeline");
        self.register(HandleKind::Pipeline, HeadlessResource::Pipeline(desc.clone()), None)
    }

    fn release(&mut self, handle: GpuHandle) -> Result<()> {
        self.ensure_idle("releasing a resource")?;
        if handle.kind() == HandleKind::BackBuffer {
            return Err(GraphicsError::InvalidHandle(format!("{} is owned by the swap chain", handle)).into());
        }
        self.resources.release(handle)?;
        self.states.remove(&handle);
        self.pending_uploads.retain(|h| *h != handle);
        self.events.push(DeviceEvent::Released(handle));
        Ok(())
    }

    fn flush_uploads(&mut self) -> Result<()> {
        self.ensure_idle("flushing uploads")?;
        let resources = self.pending_uploads.len();
        for handle in self.pending_uploads.drain(..) {
            if handle.kind() == HandleKind::Texture {
                self.states.insert(handle, ResourceState::ShaderResource);
            }
        }
        debug!(resources, "Upload batch completed");
        self.events.push(DeviceEvent::Uploaded { resources });
        Ok(())
    }

    fn reset_recorder(&mut self) -> Result<()> {
        self.ensure_idle("resetting the command allocator")?;
        self.recorder_ready = true;
        self.events.push(DeviceEvent::RecorderReset);
        Ok(())
    }

    fn execute(&mut self, list: &CommandList) -> Result<()> {
        if list.state() != CommandListState::Executable {
            return Err(GraphicsError::CommandExecution(format!(
                "command list is not closed (state {:?})",
                list.state()
            ))
            .into());
        }
        if !self.recorder_ready {
            return Err(GraphicsError::CommandExecution(
                "command allocator was not reset before recording".to_string(),
            )
            .into());
        }
        self.check_handles(list)?;

        if self.validate {
            self.states = validate_commands(list.commands(), &self.states)?;
        } else {
            for barrier in list.barriers() {
                self.states.insert(barrier.resource, barrier.after);
            }
        }

        self.recorder_ready = false;
        self.unsignaled_work = true;
        let commands = list.commands().len();
        let draws = list.draw_count();
        trace!(commands, draws, "Command list executed");
        self.events.push(DeviceEvent::Executed { commands, draws });
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        let back_buffer = self.back_buffers[self.current_back_buffer];
        let state = self.resource_state(back_buffer);
        if state != Some(ResourceState::Present) {
            return Err(GraphicsError::SwapchainError(format!(
                "presenting {} in state {}",
                back_buffer,
                state.map(|s| s.name()).unwrap_or("UNKNOWN")
            ))
            .into());
        }

        trace!(back_buffer = self.current_back_buffer, sync_interval, "Present");
        self.events.push(DeviceEvent::Presented { back_buffer: self.current_back_buffer });
        self.present_count += 1;
        self.current_back_buffer = (self.current_back_buffer + 1) % self.back_buffers.len();
        Ok(())
    }

    fn signal(&mut self, value: FenceValue) -> Result<()> {
        if value <= self.last_signaled {
            return Err(GraphicsError::FenceWait(format!(
                "fence value {} does not advance past {}",
                value.value(),
                self.last_signaled.value()
            ))
            .into());
        }
        self.pending_signals.push_back(value);
        self.last_signaled = value;
        self.unsignaled_work = false;
        self.events.push(DeviceEvent::Signaled(value));
        Ok(())
    }

    fn completed_value(&self) -> FenceValue {
        self.completed
    }

    fn wait_for(&mut self, value: FenceValue) -> Result<()> {
        if value > self.last_signaled {
            return Err(GraphicsError::FenceWait(format!(
                "waiting for fence {} which was never signaled (last {})",
                value.value(),
                self.last_signaled.value()
            ))
            .into());
        }
        self.advance_gpu(value);
        self.events.push(DeviceEvent::Waited { value, observed: self.completed });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RenderError;
    use crate::geometry::primitives;
    use crate::renderer::resource::TextureFormat;

    fn device() -> HeadlessDevice {
        HeadlessDevice::new(800, 600, 2).unwrap()
    }

    fn submit_empty_frame(device: &mut HeadlessDevice) {
        device.reset_recorder().unwrap();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.end().unwrap();
        device.execute(&list).unwrap();
    }

    #[test]
    fn test_rejects_bad_swap_chain() {
        assert!(HeadlessDevice::new(0, 600, 2).is_err());
        assert!(HeadlessDevice::new(800, 600, 1).is_err());
    }

    #[test]
    fn test_initial_states() {
        let mut device = device();
        let back = device.back_buffer(0).unwrap();
        assert_eq!(device.resource_state(back), Some(ResourceState::Present));
        assert!(device.back_buffer(2).is_err());

        let target = device
            .create_render_target(&RenderTargetDesc::new("rt", 800, 600, TextureFormat::Rgba8Unorm))
            .unwrap();
        assert_eq!(device.resource_state(target), Some(ResourceState::RenderTarget));

        let depth = device.create_depth_stencil(800, 600).unwrap();
        assert_eq!(device.resource_state(depth), Some(ResourceState::DepthWrite));
    }

    #[test]
    fn test_texture_becomes_readable_after_upload() {
        let mut device = device();
        let texture = device.create_texture(&TextureData::checkerboard(4, 2)).unwrap();
        let mesh = device.create_mesh(&primitives::screen_quad()).unwrap();
        assert!(device.resources.contains(mesh));
        assert_eq!(device.resource_state(texture), Some(ResourceState::CopyDest));

        device.flush_uploads().unwrap();
        assert_eq!(device.resource_state(texture), Some(ResourceState::ShaderResource));
        assert!(device.events().contains(&DeviceEvent::Uploaded { resources: 2 }));
    }

    #[test]
    fn test_malformed_texture_is_rejected() {
        let mut device = device();
        let texture = TextureData { width: 2, height: 2, pixels: vec![0; 3] };
        assert!(device.create_texture(&texture).is_err());
    }

    #[test]
    fn test_fence_completes_only_on_wait() {
        let mut device = device();
        submit_empty_frame(&mut device);
        device.signal(FenceValue::new(1)).unwrap();
        assert_eq!(device.completed_value(), FenceValue::new(0));
        assert!(device.is_busy());

        device.wait_for(FenceValue::new(1)).unwrap();
        assert_eq!(device.completed_value(), FenceValue::new(1));
        assert!(!device.is_busy());
        assert_eq!(
            device.events().last(),
            Some(&DeviceEvent::Waited { value: FenceValue::new(1), observed: FenceValue::new(1) })
        );
    }

    #[test]
    fn test_wait_for_unsignaled_value_fails() {
        let mut device = device();
        let err = device.wait_for(FenceValue::new(1)).unwrap_err();
        assert!(matches!(err, RenderError::Graphics(GraphicsError::FenceWait(_))));
    }

    #[test]
    fn test_signal_must_advance() {
        let mut device = device();
        device.signal(FenceValue::new(1)).unwrap();
        assert!(device.signal(FenceValue::new(1)).is_err());
    }

    #[test]
    fn test_in_flight_work_blocks_reuse() {
        let mut device = device();
        let cb = device.create_constant_buffer(128).unwrap();
        assert_eq!(device.constant_buffer(cb).unwrap().len(), 256);

        submit_empty_frame(&mut device);
        for result in [
            device.write_constant_buffer(cb, 0, &[1, 2, 3]),
            device.reset_recorder(),
            device.release(cb),
        ] {
            assert!(matches!(result, Err(RenderError::Graphics(GraphicsError::ResourceInFlight(_)))));
        }

        device.signal(FenceValue::new(1)).unwrap();
        assert!(device.write_constant_buffer(cb, 0, &[1, 2, 3]).is_err());

        device.wait_for(FenceValue::new(1)).unwrap();
        device.write_constant_buffer(cb, 0, &[1, 2, 3]).unwrap();
        assert_eq!(&device.constant_buffer(cb).unwrap()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_constant_write_bounds() {
        let mut device = device();
        let cb = device.create_constant_buffer(16).unwrap();
        assert!(device.write_constant_buffer(cb, 250, &[0; 8]).is_err());
    }

    #[test]
    fn test_execute_requires_reset_and_closed_list() {
        let mut device = device();
        let mut list = CommandList::new();
        list.begin().unwrap();
        device.reset_recorder().unwrap();
        assert!(device.execute(&list).is_err());

        list.end().unwrap();
        device.execute(&list).unwrap();
        device.signal(FenceValue::new(1)).unwrap();
        device.wait_for(FenceValue::new(1)).unwrap();
        // 没有重新 reset
        assert!(device.execute(&list).is_err());
    }

    #[test]
    fn test_execute_rejects_released_handle() {
        let mut device = device();
        let cb = device.create_constant_buffer(64).unwrap();
        device.release(cb).unwrap();

        let mut list = CommandList::new();
        list.begin().unwrap();
        list.set_constants(cb).unwrap();
        list.end().unwrap();
        device.reset_recorder().unwrap();
        let err = device.execute(&list).unwrap_err();
        assert!(matches!(err, RenderError::Graphics(GraphicsError::InvalidHandle(_))));
    }

    #[test]
    fn test_present_rotates_back_buffers() {
        let mut device = device();
        let back = device.back_buffer(0).unwrap();

        device.reset_recorder().unwrap();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.barrier(back, ResourceState::Present, ResourceState::RenderTarget).unwrap();
        list.end().unwrap();
        device.execute(&list).unwrap();
        // 后备缓冲区仍处于 RENDER_TARGET
        assert!(device.present(1).is_err());

        device.signal(FenceValue::new(1)).unwrap();
        device.wait_for(FenceValue::new(1)).unwrap();
        device.reset_recorder().unwrap();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.barrier(back, ResourceState::RenderTarget, ResourceState::Present).unwrap();
        list.end().unwrap();
        device.execute(&list).unwrap();

        device.present(1).unwrap();
        assert_eq!(device.current_back_buffer_index(), 1);
        assert_eq!(device.present_count(), 1);
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let mut device = device().with_validation(false);
        let back = device.back_buffer(0).unwrap();

        // before 状态与跟踪状态不符，只有开启校验时才会被拒绝
        device.reset_recorder().unwrap();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.barrier(back, ResourceState::RenderTarget, ResourceState::Present).unwrap();
        list.end().unwrap();
        device.execute(&list).unwrap();
        assert_eq!(device.resource_state(back), Some(ResourceState::Present));

        let mut strict = self::device().with_validation(true);
        strict.reset_recorder().unwrap();
        assert!(strict.execute(&list).is_err());
    }

    #[test]
    fn test_back_buffers_cannot_be_released() {
        let mut device = device();
        let back = device.back_buffer(1).unwrap();
        assert!(device.release(back).is_err());
    }
}

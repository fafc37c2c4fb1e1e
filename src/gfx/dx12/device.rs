//! DirectX 12 设备
//!
//! [`Dx12Device`] 把平台无关的 [`CommandList`] 翻译成 D3D12 命令。
//! 初始化阶段的网格和纹理经上传堆拷贝到默认堆，拷贝命令录制在同一个命令列表里，
//! 由 `flush_uploads` 使用独立的 Fence 一次性提交并等待。

use std::sync::Arc;

use tracing::{debug, info, trace};
use windows::core::Interface;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::DXGI_PRESENT;
use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};
use crate::geometry::{MeshData, PrimitiveTopology};
use crate::gfx::backend::GraphicsDevice;
use crate::renderer::command::{Command, CommandList, CommandListState};
use crate::renderer::descriptor::{DescriptorTable, GpuHandle, HandleKind};
use crate::renderer::pipeline::PipelineDesc;
use crate::renderer::resource::{aligned_constant_size, RenderTargetDesc, TextureData};
use crate::renderer::sync::FenceValue;

use super::context::{Dx12Context, DEPTH_FORMAT};
use super::convert;
use super::shader::{self, MAX_SHADER_INPUTS, ROOT_CONSTANTS, ROOT_FIRST_INPUT};

const RESOURCE_BUDGET: u32 = 256;

enum Dx12Resource {
    BackBuffer(usize),
    RenderTarget {
        resource: ID3D12Resource,
        rtv: u32,
        srv: u32,
    },
    DepthStencil {
        resource: ID3D12Resource,
        dsv: u32,
    },
    Texture {
        resource: ID3D12Resource,
        srv: u32,
    },
    Mesh {
        vertex_buffer: ID3D12Resource,
        vertex_view: D3D12_VERTEX_BUFFER_VIEW,
        index_buffer: Option<(ID3D12Resource, D3D12_INDEX_BUFFER_VIEW)>,
        topology: PrimitiveTopology,
    },
    ConstantBuffer {
        resource: ID3D12Resource,
        mapped: *mut u8,
        size: u64,
    },
    Pipeline(ID3D12PipelineState),
}

/// DirectX 12 图形设备
pub struct Dx12Device {
    ctx: Dx12Context,
    root_signature: ID3D12RootSignature,
    allocator: ID3D12CommandAllocator,
    list: ID3D12GraphicsCommandList,
    resources: DescriptorTable<Dx12Resource>,
    back_buffers: Vec<GpuHandle>,
    /// 上传完成前必须存活的中转缓冲
    staging: Vec<ID3D12Resource>,
    /// 命令列表处于打开状态并录制着上传命令
    recording_uploads: bool,
    recorder_ready: bool,
    last_signaled: u64,
    upload_fence: ID3D12Fence,
    upload_fence_value: u64,
}

impl Dx12Device {
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let ctx = Dx12Context::new(window, config)?;
        let root_signature = shader::create_root_signature(&ctx.device)?;

        unsafe {
            let allocator: ID3D12CommandAllocator = ctx
                .device
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                .map_err(|e| GraphicsError::DeviceCreation(format!("command allocator: {}", e)))?;
            let list: ID3D12GraphicsCommandList = ctx
                .device
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None)
                .map_err(|e| GraphicsError::DeviceCreation(format!("command list: {}", e)))?;
            let upload_fence: ID3D12Fence = ctx
                .device
                .CreateFence(0, D3D12_FENCE_FLAG_NONE)
                .map_err(|e| GraphicsError::DeviceCreation(format!("upload fence: {}", e)))?;

            let mut resources = DescriptorTable::new(RESOURCE_BUDGET);
            let back_buffers = (0..ctx.back_buffers.len())
                .map(|index| resources.allocate(HandleKind::BackBuffer, Dx12Resource::BackBuffer(index)))
                .collect::<Result<Vec<_>>>()?;

            info!(buffers = back_buffers.len(), "DX12 device ready");

            // 新建的命令列表处于打开状态，直接用于初始化上传
            Ok(Self {
                ctx,
                root_signature,
                allocator,
                list,
                resources,
                back_buffers,
                staging: Vec::new(),
                recording_uploads: true,
                recorder_ready: false,
                last_signaled: 0,
                upload_fence,
                upload_fence_value: 0,
            })
        }
    }

    pub fn window(&self) -> &Window {
        &self.ctx.window
    }

    fn completed(&self) -> u64 {
        unsafe { self.ctx.fence.GetCompletedValue() }
    }

    fn ensure_idle(&self, action: &str) -> Result<()> {
        let completed = self.completed();
        if completed < self.last_signaled {
            return Err(GraphicsError::ResourceInFlight(format!(
                "{} while fence {} is pending (completed {})",
                action, self.last_signaled, completed
            ))
            .into());
        }
        Ok(())
    }

    /// 确保命令列表打开并可录制上传命令
    fn upload_list(&mut self) -> Result<&ID3D12GraphicsCommandList> {
        if !self.recording_uploads {
            self.ensure_idle("recording uploads")?;
            unsafe {
                self.allocator
                    .Reset()
                    .map_err(|e| GraphicsError::CommandExecution(format!("allocator reset: {}", e)))?;
                self.list
                    .Reset(&self.allocator, None)
                    .map_err(|e| GraphicsError::CommandExecution(format!("list reset: {}", e)))?;
            }
            self.recording_uploads = true;
            self.recorder_ready = false;
        }
        Ok(&self.list)
    }

    fn create_buffer(&self, heap: D3D12_HEAP_TYPE, size: u64, state: D3D12_RESOURCE_STATES) -> Result<ID3D12Resource> {
        let heap_props = D3D12_HEAP_PROPERTIES { Type: heap, ..Default::default() };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: size.max(1),
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.ctx
                .device
                .CreateCommittedResource(&heap_props, D3D12_HEAP_FLAG_NONE, &desc, state, None, &mut resource)
                .map_err(|e| GraphicsError::ResourceCreation(format!("buffer of {} bytes: {}", size, e)))?;
        }
        resource.ok_or_else(|| GraphicsError::ResourceCreation("buffer was not returned".to_string()).into())
    }

    fn create_texture_2d(
        &self,
        width: u32,
        height: u32,
        format: DXGI_FORMAT,
        flags: D3D12_RESOURCE_FLAGS,
        state: D3D12_RESOURCE_STATES,
        clear: Option<D3D12_CLEAR_VALUE>,
    ) -> Result<ID3D12Resource> {
        let heap_props = D3D12_HEAP_PROPERTIES { Type: D3D12_HEAP_TYPE_DEFAULT, ..Default::default() };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: format,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: flags,
            ..Default::default()
        };
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.ctx
                .device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &desc,
                    state,
                    clear.as_ref().map(|c| c as *const _),
                    &mut resource,
                )
                .map_err(|e| GraphicsError::ResourceCreation(format!("{}x{} texture: {}", width, height, e)))?;
        }
        resource.ok_or_else(|| GraphicsError::ResourceCreation("texture was not returned".to_string()).into())
    }

    /// 创建默认堆缓冲并录制从上传堆的拷贝
    fn upload_buffer(&mut self, bytes: &[u8], final_state: D3D12_RESOURCE_STATES) -> Result<ID3D12Resource> {
        let size = bytes.len() as u64;
        let buffer = self.create_buffer(D3D12_HEAP_TYPE_DEFAULT, size, D3D12_RESOURCE_STATE_COPY_DEST)?;
        let staging = self.create_buffer(D3D12_HEAP_TYPE_UPLOAD, size, D3D12_RESOURCE_STATE_GENERIC_READ)?;
        unsafe {
            let mut data = std::ptr::null_mut();
            staging
                .Map(0, None, Some(&mut data))
                .map_err(|e| GraphicsError::ResourceCreation(format!("map staging: {}", e)))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data as *mut u8, bytes.len());
            staging.Unmap(0, None);

            let list = self.upload_list()?;
            list.CopyBufferRegion(&buffer, 0, &staging, 0, size);
            list.ResourceBarrier(&[transition(&buffer, D3D12_RESOURCE_STATE_COPY_DEST, final_state)]);
        }
        self.staging.push(staging);
        Ok(buffer)
    }

    fn native(&self, handle: GpuHandle) -> Result<&ID3D12Resource> {
        match self.resources.get(handle)? {
            Dx12Resource::BackBuffer(index) => self
                .ctx
                .back_buffers
                .get(*index)
                .ok_or_else(|| GraphicsError::InvalidHandle(handle.to_string()).into()),
            Dx12Resource::RenderTarget { resource, .. }
            | Dx12Resource::DepthStencil { resource, .. }
            | Dx12Resource::Texture { resource, .. }
            | Dx12Resource::ConstantBuffer { resource, .. } => Ok(resource),
            Dx12Resource::Mesh { vertex_buffer, .. } => Ok(vertex_buffer),
            Dx12Resource::Pipeline(_) => {
                Err(GraphicsError::InvalidHandle(format!("{} is not a GPU resource", handle)).into())
            }
        }
    }

    fn rtv(&self, handle: GpuHandle) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        match self.resources.get(handle)? {
            // 后备缓冲区占用 RTV 堆的前几个槽位
            Dx12Resource::BackBuffer(index) => Ok(self.ctx.rtv_heap.cpu(*index as u32)),
            Dx12Resource::RenderTarget { rtv, .. } => Ok(self.ctx.rtv_heap.cpu(*rtv)),
            _ => Err(GraphicsError::InvalidHandle(format!("{} has no render target view", handle)).into()),
        }
    }

    fn dsv(&self, handle: GpuHandle) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        match self.resources.get(handle)? {
            Dx12Resource::DepthStencil { dsv, .. } => Ok(self.ctx.dsv_heap.cpu(*dsv)),
            _ => Err(GraphicsError::InvalidHandle(format!("{} has no depth stencil view", handle)).into()),
        }
    }

    fn srv(&self, handle: GpuHandle) -> Result<D3D12_GPU_DESCRIPTOR_HANDLE> {
        match self.resources.get(handle)? {
            Dx12Resource::RenderTarget { srv, .. } | Dx12Resource::Texture { srv, .. } => {
                Ok(self.ctx.srv_heap.gpu(*srv))
            }
            _ => Err(GraphicsError::InvalidHandle(format!("{} has no shader resource view", handle)).into()),
        }
    }

    fn create_srv(&mut self, resource: &ID3D12Resource, format: DXGI_FORMAT) -> Result<u32> {
        let slot = self.ctx.srv_heap.slots.allocate()?;
        let desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: format,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV { MipLevels: 1, ..Default::default() },
            },
        };
        unsafe {
            self.ctx
                .device
                .CreateShaderResourceView(resource, Some(&desc), self.ctx.srv_heap.cpu(slot));
        }
        Ok(slot)
    }

    /// 把一条平台无关命令录制到原生命令列表
    unsafe fn translate(&self, command: &Command) -> Result<()> {
        let list = &self.list;
        match command {
            Command::BeginPass { index, name } => trace!(pass = *index, "Recording pass '{}'", name),
            Command::EndPass => {}
            Command::SetViewport(v) => list.RSSetViewports(&[D3D12_VIEWPORT {
                TopLeftX: v.x,
                TopLeftY: v.y,
                Width: v.width,
                Height: v.height,
                MinDepth: v.min_depth,
                MaxDepth: v.max_depth,
            }]),
            Command::SetScissor(r) => list.RSSetScissorRects(&[RECT {
                left: r.left,
                top: r.top,
                right: r.right,
                bottom: r.bottom,
            }]),
            Command::Barrier(b) => {
                let resource = self.native(b.resource)?;
                list.ResourceBarrier(&[transition(
                    resource,
                    convert::resource_state(b.before),
                    convert::resource_state(b.after),
                )]);
            }
            Command::ClearColor { target, color } => list.ClearRenderTargetView(self.rtv(*target)?, color, None),
            Command::ClearDepth { target, depth, stencil } => list.ClearDepthStencilView(
                self.dsv(*target)?,
                D3D12_CLEAR_FLAG_DEPTH | D3D12_CLEAR_FLAG_STENCIL,
                *depth,
                *stencil,
                None,
            ),
            Command::SetRenderTarget { color, depth } => {
                let rtv = self.rtv(*color)?;
                let dsv = depth.map(|d| self.dsv(d)).transpose()?;
                list.OMSetRenderTargets(1, Some(&rtv), false, dsv.as_ref().map(|d| d as *const _));
            }
            Command::SetPipeline(handle) => match self.resources.get(*handle)? {
                Dx12Resource::Pipeline(pso) => list.SetPipelineState(pso),
                _ => return Err(GraphicsError::InvalidHandle(format!("{} is not a pipeline", handle)).into()),
            },
            Command::SetConstants(handle) => match self.resources.get(*handle)? {
                Dx12Resource::ConstantBuffer { resource, .. } => {
                    list.SetGraphicsRootConstantBufferView(ROOT_CONSTANTS, resource.GetGPUVirtualAddress())
                }
                _ => return Err(GraphicsError::InvalidHandle(format!("{} is not a constant buffer", handle)).into()),
            },
            Command::SetShaderInputs(inputs) => {
                if inputs.len() > MAX_SHADER_INPUTS {
                    return Err(GraphicsError::InvalidCommand(format!(
                        "{} shader inputs bound, at most {} are supported",
                        inputs.len(),
                        MAX_SHADER_INPUTS
                    ))
                    .into());
                }
                for (slot, input) in inputs.iter().enumerate() {
                    list.SetGraphicsRootDescriptorTable(ROOT_FIRST_INPUT + slot as u32, self.srv(*input)?);
                }
            }
            Command::SetMesh(handle) => match self.resources.get(*handle)? {
                Dx12Resource::Mesh { vertex_view, index_buffer, topology, .. } => {
                    list.IASetPrimitiveTopology(convert::topology(*topology));
                    list.IASetVertexBuffers(0, Some(&[*vertex_view]));
                    if let Some((_, view)) = index_buffer {
                        list.IASetIndexBuffer(Some(view));
                    }
                }
                _ => return Err(GraphicsError::InvalidHandle(format!("{} is not a mesh", handle)).into()),
            },
            Command::Draw { vertex_count, instance_count } => {
                list.DrawInstanced(*vertex_count, *instance_count, 0, 0)
            }
            Command::DrawIndexed { index_count, instance_count } => {
                list.DrawIndexedInstanced(*index_count, *instance_count, 0, 0, 0)
            }
        }
        Ok(())
    }
}

impl GraphicsDevice for Dx12Device {
    fn backend_name(&self) -> &str {
        "DirectX 12"
    }

    fn client_size(&self) -> (u32, u32) {
        (self.ctx.width, self.ctx.height)
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
        let format = convert::texture_format(desc.format);
        let clear = D3D12_CLEAR_VALUE {
            Format: format,
            Anonymous: D3D12_CLEAR_VALUE_0 { Color: desc.clear_color },
        };
        let resource = self.create_texture_2d(
            desc.width,
            desc.height,
            format,
            D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET,
            D3D12_RESOURCE_STATE_RENDER_TARGET,
            Some(clear),
        )?;

        let rtv = self.ctx.rtv_heap.slots.allocate()?;
        unsafe {
            self.ctx.device.CreateRenderTargetView(&resource, None, self.ctx.rtv_heap.cpu(rtv));
        }
        let srv = self.create_srv(&resource, format)?;

        debug!(name = %desc.name, width = desc.width, height = desc.height, "Render target created");
        self.resources
            .allocate(HandleKind::RenderTarget, Dx12Resource::RenderTarget { resource, rtv, srv })
    }

    fn create_depth_stencil(&mut self, width: u32, height: u32) -> Result<GpuHandle> {
        let clear = D3D12_CLEAR_VALUE {
            Format: DEPTH_FORMAT,
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE { Depth: 1.0, Stencil: 0 },
            },
        };
        let resource = self.create_texture_2d(
            width,
            height,
            DEPTH_FORMAT,
            D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
            D3D12_RESOURCE_STATE_DEPTH_WRITE,
            Some(clear),
        )?;
        let dsv = self.ctx.dsv_heap.slots.allocate()?;
        unsafe {
            self.ctx.device.CreateDepthStencilView(&resource, None, self.ctx.dsv_heap.cpu(dsv));
        }
        debug!(width, height, "Depth stencil buffer created");
        self.resources
            .allocate(HandleKind::DepthStencil, Dx12Resource::DepthStencil { resource, dsv })
    }

    fn create_texture(&mut self, data: &TextureData) -> Result<GpuHandle> {
        let expected = data.width as usize * data.height as usize * 4;
        if data.pixels.len() != expected {
            return Err(GraphicsError::ResourceCreation(format!(
                "texture {}x{} has {} bytes, expected {}",
                data.width,
                data.height,
                data.pixels.len(),
                expected
            ))
            .into());
        }

        let format = DXGI_FORMAT_R8G8B8A8_UNORM;
        let texture = self.create_texture_2d(
            data.width,
            data.height,
            format,
            D3D12_RESOURCE_FLAG_NONE,
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
        )?;

        unsafe {
            let desc = texture.GetDesc();
            let mut footprint = D3D12_PLACED_SUBRESOURCE_FOOTPRINT::default();
            let mut total_bytes = 0u64;
            self.ctx.device.GetCopyableFootprints(
                &desc,
                0,
                1,
                0,
                Some(&mut footprint),
                None,
                None,
                Some(&mut total_bytes),
            );

            let staging = self.create_buffer(D3D12_HEAP_TYPE_UPLOAD, total_bytes, D3D12_RESOURCE_STATE_GENERIC_READ)?;
            let mut mapped = std::ptr::null_mut();
            staging
                .Map(0, None, Some(&mut mapped))
                .map_err(|e| GraphicsError::ResourceCreation(format!("map texture staging: {}", e)))?;
            let dst = (mapped as *mut u8).add(footprint.Offset as usize);
            let pitch = data.row_pitch();
            for (row, src) in data.pixels.chunks_exact(pitch).enumerate() {
                std::ptr::copy_nonoverlapping(
                    src.as_ptr(),
                    dst.add(row * footprint.Footprint.RowPitch as usize),
                    pitch,
                );
            }
            staging.Unmap(0, None);

            let dst_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: std::mem::transmute_copy(&texture),
                Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { SubresourceIndex: 0 },
            };
            let src_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: std::mem::transmute_copy(&staging),
                Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { PlacedFootprint: footprint },
            };
            let list = self.upload_list()?;
            list.CopyTextureRegion(&dst_location, 0, 0, 0, &src_location, None);
            list.ResourceBarrier(&[transition(
                &texture,
                D3D12_RESOURCE_STATE_COPY_DEST,
                D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
            )]);
            self.staging.push(staging);
        }

        let srv = self.create_srv(&texture, format)?;
        debug!(width = data.width, height = data.height, "Texture upload recorded");
        self.resources
            .allocate(HandleKind::Texture, Dx12Resource::Texture { resource: texture, srv })
    }

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle> {
        mesh.validate()
            .map_err(|reason| GraphicsError::ResourceCreation(format!("mesh '{}': {}", mesh.name, reason)))?;

        let vertex_buffer = self.upload_buffer(&mesh.vertex_bytes, D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER)?;
        let vertex_view = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { vertex_buffer.GetGPUVirtualAddress() },
            SizeInBytes: mesh.vertex_bytes.len() as u32,
            StrideInBytes: mesh.vertex_stride(),
        };

        let index_buffer = if mesh.is_indexed() {
            let bytes = mesh.index_bytes();
            let buffer = self.upload_buffer(bytes, D3D12_RESOURCE_STATE_INDEX_BUFFER)?;
            let view = D3D12_INDEX_BUFFER_VIEW {
                BufferLocation: unsafe { buffer.GetGPUVirtualAddress() },
                SizeInBytes: bytes.len() as u32,
                Format: DXGI_FORMAT_R16_UINT,
            };
            Some((buffer, view))
        } else {
            None
        };

        debug!(name = %mesh.name, vertices = mesh.vertex_count, indices = mesh.index_count(), "Mesh upload recorded");
        self.resources.allocate(
            HandleKind::Mesh,
            Dx12Resource::Mesh { vertex_buffer, vertex_view, index_buffer, topology: mesh.topology },
        )
    }

    fn create_constant_buffer(&mut self, size: u64) -> Result<GpuHandle> {
        let size = aligned_constant_size(size);
        let resource = self.create_buffer(D3D12_HEAP_TYPE_UPLOAD, size, D3D12_RESOURCE_STATE_GENERIC_READ)?;
        let mut mapped = std::ptr::null_mut();
        unsafe {
            resource
                .Map(0, None, Some(&mut mapped))
                .map_err(|e| GraphicsError::ResourceCreation(format!("map constant buffer: {}", e)))?;
            std::ptr::write_bytes(mapped as *mut u8, 0, size as usize);
        }
        debug!(size, "Constant buffer created and mapped");
        self.resources.allocate(
            HandleKind::ConstantBuffer,
            Dx12Resource::ConstantBuffer { resource, mapped: mapped as *mut u8, size },
        )
    }

    fn write_constant_buffer(&mut self, buffer: GpuHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.ensure_idle("writing a constant buffer")?;
        match self.resources.get(buffer)? {
            Dx12Resource::ConstantBuffer { mapped, size, .. } => {
                if offset + data.len() as u64 > *size {
                    return Err(GraphicsError::InvalidCommand(format!(
                        "write of {} bytes at {} overflows {} (size {})",
                        data.len(),
                        offset,
                        buffer,
                        size
                    ))
                    .into());
                }
                unsafe {
                    std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
                }
                Ok(())
            }
            _ => Err(GraphicsError::InvalidHandle(format!("{} is not a constant buffer", buffer)).into()),
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuHandle> {
        let pso = shader::create_pipeline_state(&self.ctx.device, &self.root_signature, desc)?;
        info!(name = %desc.name, "Pipeline state created");
        self.resources.allocate(HandleKind::Pipeline, Dx12Resource::Pipeline(pso))
    }

    fn release(&mut self, handle: GpuHandle) -> Result<()> {
        self.ensure_idle("releasing a resource")?;
        if handle.kind() == HandleKind::BackBuffer {
            return Err(GraphicsError::InvalidHandle(format!("{} is owned by the swap chain", handle)).into());
        }
        match self.resources.release(handle)? {
            Dx12Resource::RenderTarget { rtv, srv, .. } => {
                self.ctx.rtv_heap.slots.free(rtv);
                self.ctx.srv_heap.slots.free(srv);
            }
            Dx12Resource::DepthStencil { dsv, .. } => self.ctx.dsv_heap.slots.free(dsv),
            Dx12Resource::Texture { srv, .. } => self.ctx.srv_heap.slots.free(srv),
            Dx12Resource::ConstantBuffer { resource, .. } => unsafe { resource.Unmap(0, None) },
            Dx12Resource::BackBuffer(_) | Dx12Resource::Mesh { .. } | Dx12Resource::Pipeline(_) => {}
        }
        Ok(())
    }

    fn flush_uploads(&mut self) -> Result<()> {
        if !self.recording_uploads {
            return Ok(());
        }
        unsafe {
            self.list
                .Close()
                .map_err(|e| GraphicsError::CommandExecution(format!("close upload list: {}", e)))?;
            let lists = [Some(self.list.cast::<ID3D12CommandList>().map_err(|e| {
                GraphicsError::CommandExecution(e.to_string())
            })?)];
            self.ctx.command_queue.ExecuteCommandLists(&lists);

            self.upload_fence_value += 1;
            self.ctx
                .command_queue
                .Signal(&self.upload_fence, self.upload_fence_value)
                .map_err(|e| GraphicsError::FenceWait(e.to_string()))?;
        }
        self.ctx.wait_on(&self.upload_fence, self.upload_fence_value)?;
        self.recording_uploads = false;

        info!(buffers = self.staging.len(), "Initial uploads completed");
        self.staging.clear();
        Ok(())
    }

    fn reset_recorder(&mut self) -> Result<()> {
        if self.recording_uploads {
            return Err(GraphicsError::CommandExecution(
                "uploads must be flushed before recording a frame".to_string(),
            )
            .into());
        }
        self.ensure_idle("resetting the command allocator")?;
        unsafe {
            self.allocator
                .Reset()
                .map_err(|e| GraphicsError::CommandExecution(format!("allocator reset: {}", e)))?;
            self.list
                .Reset(&self.allocator, None)
                .map_err(|e| GraphicsError::CommandExecution(format!("list reset: {}", e)))?;
        }
        self.recorder_ready = true;
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

        unsafe {
            self.list.SetGraphicsRootSignature(&self.root_signature);
            self.list.SetDescriptorHeaps(&[Some(self.ctx.srv_heap.heap.clone())]);
            for command in list.commands() {
                self.translate(command)?;
            }
            self.list
                .Close()
                .map_err(|e| GraphicsError::CommandExecution(format!("close command list: {}", e)))?;
            let lists = [Some(self.list.cast::<ID3D12CommandList>().map_err(|e| {
                GraphicsError::CommandExecution(e.to_string())
            })?)];
            self.ctx.command_queue.ExecuteCommandLists(&lists);
        }
        self.recorder_ready = false;

        trace!(commands = list.commands().len(), draws = list.draw_count(), "Command list executed");
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        unsafe {
            self.ctx
                .swap_chain
                .Present(sync_interval, DXGI_PRESENT(0))
                .ok()
                .map_err(|e| GraphicsError::SwapchainError(format!("present: {}", e)))?;
        }
        trace!(next = self.ctx.current_back_buffer_index(), "Presented");
        Ok(())
    }

    fn signal(&mut self, value: FenceValue) -> Result<()> {
        if value.value() <= self.last_signaled {
            return Err(GraphicsError::FenceWait(format!(
                "fence value {} is not greater than last signaled {}",
                value.value(),
                self.last_signaled
            ))
            .into());
        }
        unsafe {
            self.ctx
                .command_queue
                .Signal(&self.ctx.fence, value.value())
                .map_err(|e| GraphicsError::FenceWait(format!("signal {}: {}", value.value(), e)))?;
        }
        self.last_signaled = value.value();
        Ok(())
    }

    fn completed_value(&self) -> FenceValue {
        FenceValue::new(self.completed())
    }

    fn wait_for(&mut self, value: FenceValue) -> Result<()> {
        if value.value() > self.last_signaled {
            return Err(GraphicsError::FenceWait(format!(
                "fence value {} was never signaled (last {})",
                value.value(),
                self.last_signaled
            ))
            .into());
        }
        self.ctx.wait_for_fence(value.value())
    }
}

impl Drop for Dx12Device {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_for_fence(self.last_signaled) {
            tracing::error!("Failed to drain the GPU before destroying the device: {}", e);
        }
    }
}

/// 资源状态转换屏障
///
/// 屏障不持有资源引用，调用者保证资源在录制期间存活。
fn transition(
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: std::mem::ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    }
}

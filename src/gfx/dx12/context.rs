//! DirectX 12 基础设施
//!
//! 封装设备、命令队列、交换链、三个描述符堆和同步对象。
//!
//! # 初始化流程
//!
//! 1. 启用调试层（仅 Debug 构建）
//! 2. 创建 DXGI 工厂
//! 3. 创建 D3D12 设备，硬件设备失败时回退到 WARP
//! 4. 创建命令队列
//! 5. 创建 flip-discard 交换链
//! 6. 创建 RTV / DSV / 着色器可见的 SRV 堆，并为后备缓冲区创建 RTV
//! 7. 创建 Fence 和等待事件

use std::sync::Arc;

use tracing::{debug, info, warn};
use windows::core::Interface;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND};
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};
use crate::renderer::descriptor::SlotAllocator;

/// 交换链格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
/// 深度缓冲格式
pub const DEPTH_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D24_UNORM_S8_UINT;

const RTV_HEAP_SIZE: u32 = 32;
const DSV_HEAP_SIZE: u32 = 4;
const SRV_HEAP_SIZE: u32 = 64;

/// 一个描述符堆及其槽位分配
pub struct DescriptorHeap {
    pub heap: ID3D12DescriptorHeap,
    pub increment: usize,
    pub slots: SlotAllocator,
    shader_visible: bool,
}

impl DescriptorHeap {
    fn new(
        device: &ID3D12Device,
        name: &'static str,
        kind: D3D12_DESCRIPTOR_HEAP_TYPE,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Self> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: kind,
            NumDescriptors: capacity,
            Flags: if shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            },
            NodeMask: 0,
        };
        unsafe {
            let heap: ID3D12DescriptorHeap = device
                .CreateDescriptorHeap(&desc)
                .map_err(|e| GraphicsError::ResourceCreation(format!("{} heap: {}", name, e)))?;
            let increment = device.GetDescriptorHandleIncrementSize(kind) as usize;
            Ok(Self {
                heap,
                increment,
                slots: SlotAllocator::new(name, capacity),
                shader_visible,
            })
        }
    }

    /// 槽位的 CPU 句柄
    pub fn cpu(&self, slot: u32) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let start = unsafe { self.heap.GetCPUDescriptorHandleForHeapStart() };
        D3D12_CPU_DESCRIPTOR_HANDLE { ptr: start.ptr + slot as usize * self.increment }
    }

    /// 槽位的 GPU 句柄（仅着色器可见堆）
    pub fn gpu(&self, slot: u32) -> D3D12_GPU_DESCRIPTOR_HANDLE {
        debug_assert!(self.shader_visible);
        let start = unsafe { self.heap.GetGPUDescriptorHandleForHeapStart() };
        D3D12_GPU_DESCRIPTOR_HANDLE { ptr: start.ptr + slot as u64 * self.increment as u64 }
    }
}

/// DirectX 12 核心对象
pub struct Dx12Context {
    pub device: ID3D12Device,
    pub command_queue: ID3D12CommandQueue,
    pub swap_chain: IDXGISwapChain3,
    pub back_buffers: Vec<ID3D12Resource>,
    pub rtv_heap: DescriptorHeap,
    pub dsv_heap: DescriptorHeap,
    pub srv_heap: DescriptorHeap,
    pub fence: ID3D12Fence,
    fence_event: HANDLE,
    pub window: Arc<Window>,
    pub width: u32,
    pub height: u32,
}

impl Dx12Context {
    /// 为窗口创建设备和交换链
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let buffer_count = config.graphics.back_buffer_count as u32;

        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug: Option<ID3D12Debug> = None;
                match D3D12GetDebugInterface(&mut debug) {
                    Ok(()) => {
                        if let Some(debug) = debug {
                            debug.EnableDebugLayer();
                            debug!("DX12 debug layer enabled");
                        }
                    }
                    Err(e) => warn!("Failed to enable DX12 debug layer: {}", e),
                }
            }

            let factory_flags = if cfg!(debug_assertions) {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 = CreateDXGIFactory2(factory_flags)
                .map_err(|e| GraphicsError::DeviceCreation(format!("DXGI factory: {}", e)))?;

            let device = create_device(&factory)?;

            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let command_queue: ID3D12CommandQueue = device
                .CreateCommandQueue(&queue_desc)
                .map_err(|e| GraphicsError::DeviceCreation(format!("command queue: {}", e)))?;

            let hwnd = window_hwnd(&window)?;
            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: buffer_count,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                ..Default::default()
            };
            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)
                .map_err(|e| GraphicsError::SwapchainError(e.to_string()))?;
            let swap_chain: IDXGISwapChain3 = swap_chain
                .cast()
                .map_err(|e| GraphicsError::SwapchainError(format!("IDXGISwapChain3: {}", e)))?;

            info!(width, height, buffers = buffer_count, "Swap chain created");

            let mut rtv_heap = DescriptorHeap::new(&device, "RTV", D3D12_DESCRIPTOR_HEAP_TYPE_RTV, RTV_HEAP_SIZE, false)?;
            let dsv_heap = DescriptorHeap::new(&device, "DSV", D3D12_DESCRIPTOR_HEAP_TYPE_DSV, DSV_HEAP_SIZE, false)?;
            let srv_heap = DescriptorHeap::new(
                &device,
                "SRV",
                D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                SRV_HEAP_SIZE,
                true,
            )?;

            // 后备缓冲区占用 RTV 堆的前 buffer_count 个槽位
            let mut back_buffers = Vec::with_capacity(buffer_count as usize);
            for i in 0..buffer_count {
                let surface: ID3D12Resource = swap_chain
                    .GetBuffer(i)
                    .map_err(|e| GraphicsError::SwapchainError(format!("back buffer {}: {}", i, e)))?;
                let slot = rtv_heap.slots.allocate()?;
                device.CreateRenderTargetView(&surface, None, rtv_heap.cpu(slot));
                back_buffers.push(surface);
            }

            let fence: ID3D12Fence = device
                .CreateFence(0, D3D12_FENCE_FLAG_NONE)
                .map_err(|e| GraphicsError::DeviceCreation(format!("fence: {}", e)))?;
            let fence_event = CreateEventA(None, false, false, None)
                .map_err(|e| GraphicsError::DeviceCreation(format!("fence event: {}", e)))?;

            debug!("Synchronization objects created");

            Ok(Self {
                device,
                command_queue,
                swap_chain,
                back_buffers,
                rtv_heap,
                dsv_heap,
                srv_heap,
                fence,
                fence_event,
                window,
                width,
                height,
            })
        }
    }

    /// 交换链当前的后备缓冲区索引
    pub fn current_back_buffer_index(&self) -> usize {
        unsafe { self.swap_chain.GetCurrentBackBufferIndex() as usize }
    }

    /// 阻塞直到帧 Fence 达到 `value`
    pub fn wait_for_fence(&self, value: u64) -> Result<()> {
        self.wait_on(&self.fence, value)
    }

    /// 阻塞直到任意 Fence 达到 `value`
    pub fn wait_on(&self, fence: &ID3D12Fence, value: u64) -> Result<()> {
        unsafe {
            if fence.GetCompletedValue() < value {
                fence
                    .SetEventOnCompletion(value, self.fence_event)
                    .map_err(|e| GraphicsError::FenceWait(e.to_string()))?;
                WaitForSingleObject(self.fence_event, INFINITE);
            }
        }
        Ok(())
    }
}

impl Drop for Dx12Context {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = CloseHandle(self.fence_event) {
                warn!("Failed to close fence event: {}", e);
            }
        }
    }
}

/// 创建硬件设备，失败时回退到 WARP
unsafe fn create_device(factory: &IDXGIFactory4) -> Result<ID3D12Device> {
    let mut device: Option<ID3D12Device> = None;
    match D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device) {
        Ok(()) => {
            if let Some(device) = device {
                info!("D3D12 hardware device created");
                return Ok(device);
            }
        }
        Err(e) => warn!("Hardware device unavailable ({}), falling back to WARP", e),
    }

    let adapter: IDXGIAdapter = factory
        .EnumWarpAdapter()
        .map_err(|e| GraphicsError::DeviceCreation(format!("WARP adapter: {}", e)))?;
    let mut device: Option<ID3D12Device> = None;
    D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device)
        .map_err(|e| GraphicsError::DeviceCreation(format!("WARP device: {}", e)))?;
    device.ok_or_else(|| GraphicsError::DeviceCreation("WARP device was not returned".to_string()).into())
}

fn window_hwnd(window: &Window) -> Result<HWND> {
    let handle = window
        .window_handle()
        .map_err(|e| GraphicsError::DeviceCreation(format!("window handle: {}", e)))?;
    match handle.as_raw() {
        RawWindowHandle::Win32(win32) => Ok(HWND(win32.hwnd.get() as *mut core::ffi::c_void)),
        _ => Err(GraphicsError::DeviceCreation("expected a Win32 window handle".to_string()).into()),
    }
}

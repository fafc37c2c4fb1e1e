//! 图形设备的统一抽象接口
//!
//! 本模块定义了渲染器与具体图形 API 之间的接缝。渲染器只通过 [`GraphicsDevice`]
//! 创建资源、提交命令列表、呈现和等待 Fence，因此同一套多 pass 逻辑既能驱动
//! DirectX 12，也能驱动无 GPU 的 [`HeadlessDevice`](super::headless::HeadlessDevice)。
//!
//! 资源一律以 [`GpuHandle`] 表示，由设备内部的描述符表分配和回收。

use crate::core::error::Result;
use crate::geometry::MeshData;
use crate::renderer::command::CommandList;
use crate::renderer::descriptor::GpuHandle;
use crate::renderer::pipeline::PipelineDesc;
use crate::renderer::resource::{RenderTargetDesc, TextureData};
use crate::renderer::sync::FenceValue;

/// 图形设备的统一接口
///
/// # 生命周期
///
/// 1. 初始化：`create_*` 创建资源，上传数据进入设备内部的一次性批次，
///    由 [`flush_uploads`](Self::flush_uploads) 提交并等待完成
/// 2. 每帧：`reset_recorder` → 记录 [`CommandList`] → `execute` → `present`
///    → `signal` → `wait_for`
/// 3. 关闭：等待最后一个 Fence 值后释放资源
///
/// 设备在提交的工作完成前拒绝复用命令分配器、改写常量缓冲或释放资源。
pub trait GraphicsDevice {
    /// 后端名称，用于日志
    fn backend_name(&self) -> &str;

    /// 客户区尺寸
    fn client_size(&self) -> (u32, u32);

    /// 交换链缓冲区数量
    fn back_buffer_count(&self) -> usize;

    /// 第 `index` 个后备缓冲区的句柄
    fn back_buffer(&self, index: usize) -> Result<GpuHandle>;

    /// 创建离屏渲染目标，初始状态为 `RENDER_TARGET`
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<GpuHandle>;

    /// 创建深度模板缓冲，初始状态为 `DEPTH_WRITE`
    fn create_depth_stencil(&mut self, width: u32, height: u32) -> Result<GpuHandle>;

    /// 创建静态纹理并排队上传，上传后处于 `PIXEL_SHADER_RESOURCE`
    fn create_texture(&mut self, data: &TextureData) -> Result<GpuHandle>;

    /// 创建顶点/索引缓冲并排队上传
    fn create_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle>;

    /// 创建常驻映射的常量缓冲，大小按 256 字节对齐
    fn create_constant_buffer(&mut self, size: u64) -> Result<GpuHandle>;

    /// 改写常量缓冲内容
    fn write_constant_buffer(&mut self, buffer: GpuHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// 编译着色器并创建管线
    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuHandle>;

    /// 释放资源，句柄随即失效
    fn release(&mut self, handle: GpuHandle) -> Result<()>;

    /// 提交初始化阶段排队的上传并等待完成
    fn flush_uploads(&mut self) -> Result<()>;

    /// 重置命令分配器，要求上一帧已经排空
    fn reset_recorder(&mut self) -> Result<()>;

    /// 提交一个已关闭的命令列表
    fn execute(&mut self, list: &CommandList) -> Result<()>;

    /// 呈现当前后备缓冲区
    fn present(&mut self, sync_interval: u32) -> Result<()>;

    /// 在队列上发出 Fence 信号
    fn signal(&mut self, value: FenceValue) -> Result<()>;

    /// 设备已完成的 Fence 值
    fn completed_value(&self) -> FenceValue;

    /// 阻塞直到 Fence 达到 `value`
    fn wait_for(&mut self, value: FenceValue) -> Result<()>;
}

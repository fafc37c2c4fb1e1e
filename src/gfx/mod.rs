//! 图形设备模块
//!
//! 本模块实现了渲染器所依赖的 [`GraphicsDevice`] 接口：
//! - DirectX 12：Windows 平台上的真实 GPU 设备
//! - Headless：无 GPU 的记录设备，模拟异步队列并校验资源状态，用于测试和 `--headless` 运行
//!
//! 多 pass 的录制、屏障和同步逻辑只写一份，位于 `renderer::frame`。

pub mod backend;
pub mod headless;
#[cfg(target_os = "windows")]
pub mod dx12;

pub use backend::GraphicsDevice;
pub use headless::HeadlessDevice;
#[cfg(target_os = "windows")]
pub use dx12::Dx12Device;

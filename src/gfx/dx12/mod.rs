//! DirectX 12 图形设备实现
//!
//! - `context`: 设备、命令队列、交换链、描述符堆与同步对象
//! - `device`: 实现 `GraphicsDevice`，把命令列表翻译为 D3D12 调用
//! - `shader`: HLSL 编译、共享根签名与 PSO
//! - `convert`: 平台无关枚举到 D3D12 枚举的转换

pub mod context;
pub mod convert;
pub mod device;
pub mod shader;

// 重新导出常用类型
pub use context::Dx12Context;
pub use device::Dx12Device;

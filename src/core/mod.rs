//! 核心功能模块
//!
//! 与具体图形 API 无关的基础设施：日志、配置、错误处理、输入和计时。
//!
//! # 模块组织
//!
//! - `log`：日志系统，基于 `tracing` 的结构化日志
//! - `config`：配置管理，从 TOML 文件加载并支持命令行覆盖
//! - `error`：错误处理，定义统一的错误类型
//! - `input`：相机轮询的指针与按键状态
//! - `timer`：帧间隔与帧率统计

pub mod config;
pub mod error;
pub mod input;
pub mod log;
pub mod timer;

// 重新导出常用类型，方便使用
pub use config::Config;
pub use error::{RenderError, Result};

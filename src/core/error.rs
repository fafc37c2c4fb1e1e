//! 错误处理模块
//!
//! 定义了渲染器中使用的统一错误类型。每个设备操作、资产加载和 pass 声明
//! 都返回 `Result`，由调用者决定是否致命。
//!
//! # 设计原则
//!
//! - 手写 `Display` 和 `Error` 实现，不引入额外的派生宏
//! - 为每种错误类型提供清晰的上下文信息
//! - 通过 `From` 支持 `?` 运算符的自动转换
//! - 易于模式匹配（测试中大量使用 `matches!`）

use std::fmt;
use std::path::PathBuf;

/// 渲染器统一的 Result 类型
pub type Result<T> = std::result::Result<T, RenderError>;

/// 渲染器的错误类型
#[derive(Debug)]
pub enum RenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形设备错误
    Graphics(GraphicsError),

    /// 资产（网格 / 纹理）加载错误
    Asset(AssetError),

    /// Pass 声明错误
    Pass(PassError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形设备相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 命令提交 / 执行失败
    CommandExecution(String),

    /// 句柄无效（已释放、代数不匹配或类型不符）
    InvalidHandle(String),

    /// 记录的命令列表违反资源状态规则
    InvalidCommand(String),

    /// GPU 仍在使用资源时 CPU 试图复用它
    ResourceInFlight(String),

    /// Fence 等待失败
    FenceWait(String),
}

/// 资产加载相关的错误
#[derive(Debug)]
pub enum AssetError {
    /// 文件不存在
    FileNotFound(PathBuf),

    /// 解析失败
    ParseError { path: PathBuf, line: usize, reason: String },

    /// 图像解码失败
    ImageDecode(String),
}

/// Pass 声明相关的错误
#[derive(Debug)]
pub enum PassError {
    /// 没有声明任何 pass
    Empty,

    /// 读取了尚未在更早 pass 中产生的渲染目标
    InputNotProduced { pass: String, input: String },

    /// pass 读取了自己正在写入的目标
    ReadsOwnTarget(String),

    /// 最后一个 pass 不是写入后备缓冲区
    FinalPassOffscreen(String),

    /// 非最后一个 pass 写入了后备缓冲区
    EarlyBackBufferWrite(String),

    /// 两个 pass 写入同一个离屏目标
    DuplicateTarget(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Config(e) => write!(f, "Configuration error: {}", e),
            RenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            RenderError::Asset(e) => write!(f, "Asset error: {}", e),
            RenderError::Pass(e) => write!(f, "Pass error: {}", e),
            RenderError::Io(e) => write!(f, "IO error: {}", e),
            RenderError::Log(msg) => write!(f, "Log error: {}", msg),
            RenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            GraphicsError::InvalidCommand(msg) => write!(f, "Invalid command: {}", msg),
            GraphicsError::ResourceInFlight(msg) => write!(f, "Resource still in flight: {}", msg),
            GraphicsError::FenceWait(msg) => write!(f, "Fence wait failed: {}", msg),
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::FileNotFound(path) => write!(f, "Asset file not found: {}", path.display()),
            AssetError::ParseError { path, line, reason } => {
                write!(f, "Failed to parse {} at line {}: {}", path.display(), line, reason)
            }
            AssetError::ImageDecode(msg) => write!(f, "Failed to decode image: {}", msg),
        }
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::Empty => write!(f, "No render passes declared"),
            PassError::InputNotProduced { pass, input } => write!(
                f,
                "Pass '{}' reads {} before any earlier pass produced it",
                pass, input
            ),
            PassError::ReadsOwnTarget(pass) => write!(f, "Pass '{}' samples its own target", pass),
            PassError::FinalPassOffscreen(pass) => {
                write!(f, "Final pass '{}' must target the back buffer", pass)
            }
            PassError::EarlyBackBufferWrite(pass) => {
                write!(f, "Pass '{}' writes the back buffer but is not the final pass", pass)
            }
            PassError::DuplicateTarget(pass) => {
                write!(f, "Pass '{}' writes a target already written this frame", pass)
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(e) => Some(e),
            RenderError::Config(e) => Some(e),
            RenderError::Graphics(e) => Some(e),
            RenderError::Asset(e) => Some(e),
            RenderError::Pass(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for AssetError {}
impl std::error::Error for PassError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        RenderError::Config(err)
    }
}

impl From<GraphicsError> for RenderError {
    fn from(err: GraphicsError) -> Self {
        RenderError::Graphics(err)
    }
}

impl From<AssetError> for RenderError {
    fn from(err: AssetError) -> Self {
        RenderError::Asset(err)
    }
}

impl From<PassError> for RenderError {
    fn from(err: PassError) -> Self {
        RenderError::Pass(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_includes_context() {
        let err: RenderError = PassError::InputNotProduced {
            pass: "composite".into(),
            input: "front_depth".into(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("composite"));
        assert!(msg.contains("front_depth"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "room.txt");
        let err: RenderError = io.into();
        assert!(matches!(err, RenderError::Io(_)));
    }
}

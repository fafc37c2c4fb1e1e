//! 配置管理模块
//!
//! 提供渲染器配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "fog_render"
//! resizable = false
//!
//! [graphics]
//! # backend = "dx12"        # 省略时 Windows 上为 "dx12"，其他平台为 "headless"
//! vsync = true              # 省略时为 false
//! back_buffer_count = 2
//! validate_commands = true  # 省略时仅 Debug 构建开启
//! shader_dir = "shaders"
//!
//! [sample]
//! kind = "volume_fog"       # phong / render_to_texture / volume_fog
//! mesh_path = "assets/room.txt"
//! texture_path = "assets/Room.bmp"
//! frames = 0                # 0 表示一直运行（headless 模式下运行 120 帧）
//!
//! [logging]
//! level = "info"            # trace, debug, info, warn, error
//! file_output = false
//! log_file = "fog_render.log"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};

/// 渲染器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 示例场景配置
    #[serde(default)]
    pub sample: SampleConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度（客户区）
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度（客户区）
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择
    #[serde(default = "default_backend")]
    pub backend: GraphicsBackend,

    /// 垂直同步（Present 的 sync interval 为 1）
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 后备缓冲区环的大小
    #[serde(default = "default_back_buffer_count")]
    pub back_buffer_count: usize,

    /// 提交前是否校验命令列表的资源状态
    #[serde(default = "default_validate_commands")]
    pub validate_commands: bool,

    /// HLSL 着色器目录
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
}

/// 图形后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    /// DirectX 12 后端（仅 Windows）
    Dx12,
    /// 无 GPU 的记录设备
    Headless,
}

/// 示例场景种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// 单 pass 的 Phong 光照立方体
    Phong,
    /// 场景渲染到纹理，再贴到全屏四边形
    RenderToTexture,
    /// 正反面深度 + 叠加合成的体积雾
    VolumeFog,
}

/// 示例场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    /// 场景种类
    #[serde(default = "default_sample_kind")]
    pub kind: SampleKind,

    /// 房间网格文本文件
    #[serde(default = "default_mesh_path")]
    pub mesh_path: PathBuf,

    /// 房间纹理图像
    #[serde(default = "default_texture_path")]
    pub texture_path: PathBuf,

    /// 运行的帧数，0 表示直到窗口关闭
    #[serde(default)]
    pub frames: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "fog_render".to_string() }
fn default_resizable() -> bool { false }
fn default_backend() -> GraphicsBackend {
    if cfg!(target_os = "windows") { GraphicsBackend::Dx12 } else { GraphicsBackend::Headless }
}
fn default_vsync() -> bool { false }
fn default_back_buffer_count() -> usize { 2 }
fn default_validate_commands() -> bool { cfg!(debug_assertions) }
fn default_shader_dir() -> PathBuf { PathBuf::from("shaders") }
fn default_sample_kind() -> SampleKind { SampleKind::VolumeFog }
fn default_mesh_path() -> PathBuf { PathBuf::from("assets/room.txt") }
fn default_texture_path() -> PathBuf { PathBuf::from("assets/Room.bmp") }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "fog_render.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            vsync: default_vsync(),
            back_buffer_count: default_back_buffer_count(),
            validate_commands: default_validate_commands(),
            shader_dir: default_shader_dir(),
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            kind: default_sample_kind(),
            mesh_path: default_mesh_path(),
            texture_path: default_texture_path(),
            frames: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// # 说明
    ///
    /// 支持的参数：
    /// - `--dx12`: 使用 DirectX 12 后端
    /// - `--headless`: 使用无 GPU 的记录设备
    /// - `--sample <phong|render_to_texture|volume_fog>`: 选择示例场景
    /// - `--frames <value>`: 运行指定帧数后退出
    /// - `--width <value>` / `--height <value>`: 设置客户区尺寸
    /// - `--validate`: 开启命令列表校验
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--dx12") {
            self.graphics.backend = GraphicsBackend::Dx12;
        }

        if args.iter().any(|a| a == "--headless") {
            self.graphics.backend = GraphicsBackend::Headless;
        }

        if args.iter().any(|a| a == "--validate") {
            self.graphics.validate_commands = true;
        }

        let value_of = |flag: &str| -> Option<&String> {
            args.iter().position(|a| a == flag).and_then(|idx| args.get(idx + 1))
        };

        if let Some(kind) = value_of("--sample").and_then(|s| SampleKind::parse(s)) {
            self.sample.kind = kind;
        }

        if let Some(frames) = value_of("--frames").and_then(|s| s.parse().ok()) {
            self.sample.frames = frames;
        }

        if let Some(width) = value_of("--width").and_then(|s| s.parse().ok()) {
            self.window.width = width;
        }

        if let Some(height) = value_of("--height").and_then(|s| s.parse().ok()) {
            self.window.height = height;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        // 交换链至少需要两个缓冲区，DXGI 上限为 16
        if !(2..=16).contains(&self.graphics.back_buffer_count) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.back_buffer_count".to_string(),
                reason: "Back buffer count must be between 2 and 16".to_string(),
            }.into());
        }

        if self.graphics.backend == GraphicsBackend::Dx12 && !cfg!(target_os = "windows") {
            return Err(ConfigError::InvalidValue {
                field: "graphics.backend".to_string(),
                reason: "DirectX 12 is only available on Windows".to_string(),
            }.into());
        }

        Ok(())
    }
}

impl GraphicsBackend {
    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Dx12 => "DirectX 12",
            GraphicsBackend::Headless => "Headless",
        }
    }
}

impl SampleKind {
    /// 从命令行字符串解析
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "phong" => Some(SampleKind::Phong),
            "render_to_texture" | "rtt" => Some(SampleKind::RenderToTexture),
            "volume_fog" | "fog" => Some(SampleKind::VolumeFog),
            _ => None,
        }
    }
}

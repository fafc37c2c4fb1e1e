//! 管线描述
//!
//! 每个 pass 绑定一个管线：一对着色器（顶点 + 像素）加上光栅化、混合和
//! 深度状态。描述与 API 无关，DX12 设备据此编译 HLSL 并创建 PSO。

use std::path::{Path, PathBuf};

use crate::geometry::vertex::VertexLayout;

use super::resource::TextureFormat;

/// 着色器源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// HLSL 文件路径
    pub path: PathBuf,
    /// 入口函数
    pub entry_point: String,
    /// 编译目标（如 `vs_5_0`）
    pub profile: String,
}

impl ShaderSource {
    /// 顶点着色器，入口 `VS`
    pub fn vertex(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entry_point: "VS".to_string(),
            profile: "vs_5_0".to_string(),
        }
    }

    /// 像素着色器，入口 `PS`
    pub fn pixel(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entry_point: "PS".to_string(),
            profile: "ps_5_0".to_string(),
        }
    }
}

/// 面剔除模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// 混合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// 覆盖写入
    Opaque,
    /// `src * 1 + dst * 1`
    Additive,
}

/// 管线描述
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    pub name: String,
    pub vertex_shader: ShaderSource,
    pub pixel_shader: ShaderSource,
    pub vertex_layout: VertexLayout,
    pub cull_mode: CullMode,
    pub blend_mode: BlendMode,
    /// 是否启用深度测试与写入
    pub depth_enabled: bool,
    /// 颜色输出格式
    pub target_format: TextureFormat,
}

impl PipelineDesc {
    /// 使用同一个 HLSL 文件的 `VS` / `PS` 入口创建管线描述
    ///
    /// 默认：背面剔除、不混合、开启深度、输出 RGBA8。
    pub fn new(name: impl Into<String>, shader: impl AsRef<Path>, vertex_layout: VertexLayout) -> Self {
        Self {
            name: name.into(),
            vertex_shader: ShaderSource::vertex(&shader),
            pixel_shader: ShaderSource::pixel(&shader),
            vertex_layout,
            cull_mode: CullMode::Back,
            blend_mode: BlendMode::Opaque,
            depth_enabled: true,
            target_format: TextureFormat::Rgba8Unorm,
        }
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_depth(mut self, enabled: bool) -> Self {
        self.depth_enabled = enabled;
        self
    }

    pub fn with_target_format(mut self, format: TextureFormat) -> Self {
        self.target_format = format;
        self
    }
}

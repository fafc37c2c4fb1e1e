/// 顶点定义模块
///
/// 示例场景使用的三种顶点格式。内存布局与着色器输入布局一一对应，
/// 使用 `#[repr(C)]` 保证顺序和对齐。

use bytemuck::{Pod, Zeroable};

/// 顶点输入布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// POSITION (R32G32B32_FLOAT)
    Position,
    /// POSITION + NORMAL
    PositionNormal,
    /// POSITION + TEXCOORD (R32G32_FLOAT)
    PositionTexcoord,
}

impl VertexLayout {
    /// 每个顶点的字节数
    pub fn stride(&self) -> u32 {
        match self {
            VertexLayout::Position => 12,
            VertexLayout::PositionNormal => 24,
            VertexLayout::PositionTexcoord => 20,
        }
    }
}

/// 带布局信息的顶点类型
pub trait Vertex: Pod {
    const LAYOUT: VertexLayout;
}

/// 仅有位置的顶点（体积雾立方体、全屏四边形）
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 3],
}

/// 位置 + 法线（Phong 立方体）
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct NormalVertex {
    pub position: [f32; 3],
    /// 表面法线，应为单位向量
    pub normal: [f32; 3],
}

/// 位置 + 纹理坐标（房间网格）
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
}

impl Vertex for PositionVertex {
    const LAYOUT: VertexLayout = VertexLayout::Position;
}

impl Vertex for NormalVertex {
    const LAYOUT: VertexLayout = VertexLayout::PositionNormal;
}

impl Vertex for TexturedVertex {
    const LAYOUT: VertexLayout = VertexLayout::PositionTexcoord;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_matches_struct_size() {
        assert_eq!(std::mem::size_of::<PositionVertex>() as u32, PositionVertex::LAYOUT.stride());
        assert_eq!(std::mem::size_of::<NormalVertex>() as u32, NormalVertex::LAYOUT.stride());
        assert_eq!(std::mem::size_of::<TexturedVertex>() as u32, TexturedVertex::LAYOUT.stride());
    }
}

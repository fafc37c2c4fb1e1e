/// 网格数据结构模块
///
/// CPU 侧的不可变网格：打包好的顶点字节、可选的 16 位索引和图元拓扑。
/// 初始化时由设备上传一次，之后只通过句柄引用。

use bytemuck::cast_slice;

use super::vertex::{Vertex, VertexLayout};

/// 图元拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
}

/// 网格数据
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// 网格名称
    pub name: String,
    /// 顶点布局
    pub layout: VertexLayout,
    /// 紧密排列的顶点字节
    pub vertex_bytes: Vec<u8>,
    /// 顶点数量
    pub vertex_count: u32,
    /// 索引（为空表示非索引绘制）
    pub indices: Option<Vec<u16>>,
    /// 图元拓扑
    pub topology: PrimitiveTopology,
}

impl MeshData {
    /// 从顶点数组创建网格
    pub fn new<V: Vertex>(
        name: impl Into<String>,
        vertices: &[V],
        indices: Option<Vec<u16>>,
        topology: PrimitiveTopology,
    ) -> Self {
        Self {
            name: name.into(),
            layout: V::LAYOUT,
            vertex_bytes: cast_slice(vertices).to_vec(),
            vertex_count: vertices.len() as u32,
            indices,
            topology,
        }
    }

    /// 顶点步长
    pub fn vertex_stride(&self) -> u32 {
        self.layout.stride()
    }

    /// 索引数量
    pub fn index_count(&self) -> u32 {
        self.indices.as_ref().map(|i| i.len() as u32).unwrap_or(0)
    }

    /// 是否为索引网格
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// 索引字节（小端 u16）
    pub fn index_bytes(&self) -> &[u8] {
        match &self.indices {
            Some(indices) => cast_slice(indices.as_slice()),
            None => &[],
        }
    }

    /// 三角形数量
    pub fn triangle_count(&self) -> u32 {
        let count = if self.is_indexed() { self.index_count() } else { self.vertex_count };
        match self.topology {
            PrimitiveTopology::TriangleList => count / 3,
            PrimitiveTopology::TriangleStrip => count.saturating_sub(2),
        }
    }

    /// 验证网格数据的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.vertex_count == 0 {
            return Err(format!("Mesh '{}' has no vertices", self.name));
        }

        let expected = self.vertex_count as usize * self.vertex_stride() as usize;
        if self.vertex_bytes.len() != expected {
            return Err(format!(
                "Mesh '{}' has {} vertex bytes, expected {}",
                self.name,
                self.vertex_bytes.len(),
                expected
            ));
        }

        if let Some(indices) = &self.indices {
            if self.topology == PrimitiveTopology::TriangleList && indices.len() % 3 != 0 {
                return Err(format!(
                    "Mesh '{}' index count {} is not a multiple of 3",
                    self.name,
                    indices.len()
                ));
            }
            if let Some(&bad) = indices.iter().find(|&&i| i as u32 >= self.vertex_count) {
                return Err(format!(
                    "Mesh '{}' index {} out of range (vertex count {})",
                    self.name, bad, self.vertex_count
                ));
            }
        }

        Ok(())
    }
}

/// 几何体模块
///
/// 提供示例场景使用的顶点格式、网格数据、内置图元和资产加载器。
///
/// # 模块结构
///
/// - `vertex`: 顶点数据结构与输入布局
/// - `mesh`: CPU 侧网格数据
/// - `primitives`: 立方体、全屏四边形等内置几何体
/// - `loaders`: 房间文本网格与纹理加载
///
/// # 架构设计
///
/// ```text
/// 文件 (room.txt / Room.bmp) 或内置图元
///     ↓
/// MeshData / TextureData (CPU侧数据)
///     ↓
/// GraphicsDevice (一次性上传到GPU)
/// ```

pub mod vertex;
pub mod mesh;
pub mod primitives;
pub mod loaders;

// 重新导出常用类型
pub use vertex::{NormalVertex, PositionVertex, TexturedVertex, Vertex, VertexLayout};
pub use mesh::{MeshData, PrimitiveTopology};

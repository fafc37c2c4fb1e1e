/// 资产加载器模块
///
/// 提供统一的网格加载接口，以及纹理图像的解码。
///
/// # 支持的格式
///
/// - **房间文本网格**：首行为三角形数量，随后每行一个 `x y z u v` 顶点
/// - **纹理**：`image` crate 支持的格式（BMP、PNG 等），统一转换为 RGBA8
///
/// # 使用示例
///
/// ```rust,no_run
/// use fog_render::geometry::loaders::{MeshLoader, RoomLoader};
/// use std::path::Path;
///
/// let mesh = RoomLoader::load_from_file(Path::new("assets/room.txt"))?;
/// println!("三角形数: {}", mesh.triangle_count());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
use crate::core::error::Result;
use crate::geometry::mesh::MeshData;
use std::path::Path;

pub mod room_loader;
pub mod texture_loader;

// 重新导出加载器
pub use room_loader::RoomLoader;
pub use texture_loader::{load_texture_or_placeholder, load_texture_rgba};

/// 加载房间文本网格
pub fn load_room_mesh(path: &Path) -> Result<MeshData> {
    RoomLoader::load_from_file(path)
}

/// 网格加载器 trait
///
/// 定义统一的加载接口，所有格式的加载器都实现此 trait。
pub trait MeshLoader {
    /// 从文件路径加载网格
    ///
    /// # 错误
    ///
    /// - 文件不存在：`AssetError::FileNotFound`
    /// - 内容格式错误：`AssetError::ParseError`（带行号）
    fn load_from_file(path: &Path) -> Result<MeshData>;

    /// 从内存数据加载网格
    fn load_from_memory(data: &[u8]) -> Result<MeshData>;

    /// 获取支持的文件扩展名列表（小写，不含点号）
    fn supported_extensions() -> &'static [&'static str];
}

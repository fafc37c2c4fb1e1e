/// 纹理加载器
///
/// 使用 `image` crate 解码图像文件并转换为紧密排列的 RGBA8。
/// 24 位 BMP 的 BGR 数据会被重新排列为 RGBA，alpha 固定为 255。
use crate::core::error::{AssetError, Result};
use crate::renderer::resource::TextureData;
use std::path::Path;
use tracing::{info, warn};

/// 加载纹理并转换为 RGBA8
pub fn load_texture_rgba(path: &Path) -> Result<TextureData> {
    if !path.exists() {
        return Err(AssetError::FileNotFound(path.to_path_buf()).into());
    }

    let image = image::open(path).map_err(|e| AssetError::ImageDecode(format!("{}: {}", path.display(), e)))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    info!(width, height, "Loaded texture {}", path.display());
    Ok(TextureData { width, height, pixels: rgba.into_raw() })
}

/// 加载纹理，失败时返回棋盘格占位纹理
///
/// 缺失或损坏的纹理不视为致命错误：记录一条警告后继续运行。
pub fn load_texture_or_placeholder(path: &Path) -> TextureData {
    match load_texture_rgba(path) {
        Ok(texture) => texture,
        Err(e) => {
            warn!("{}; using a checkerboard placeholder", e);
            TextureData::checkerboard(256, 32)
        }
    }
}

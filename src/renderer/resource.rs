//! 资源描述模块
//!
//! 描述渲染器向设备申请的资源：离屏渲染目标、静态纹理、常量缓冲，
//! 以及资源在一帧内经历的状态。后备缓冲区的轮换由 [`BackBufferRing`] 管理。
//!
//! # 设计原则
//!
//! - **显式状态**：每个可写资源都有明确的 [`ResourceState`]，切换必须记录屏障
//! - **自动对齐**：常量缓冲区按 256 字节对齐
//! - **一帧闭合**：帧结束时所有资源回到初始状态，下一帧从相同状态开始

use crate::core::error::{ConfigError, Result};

/// DirectX 12 常量缓冲区的对齐要求
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// 计算对齐后的常量缓冲区大小
pub fn aligned_constant_size(size: u64) -> u64 {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// 资源状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// 交换链可呈现
    Present,
    /// 作为颜色输出写入
    RenderTarget,
    /// 作为像素着色器输入读取
    ShaderResource,
    /// 作为深度缓冲写入
    DepthWrite,
    /// 上传拷贝的目标
    CopyDest,
}

impl ResourceState {
    /// 获取状态名称
    pub fn name(&self) -> &'static str {
        match self {
            ResourceState::Present => "PRESENT",
            ResourceState::RenderTarget => "RENDER_TARGET",
            ResourceState::ShaderResource => "PIXEL_SHADER_RESOURCE",
            ResourceState::DepthWrite => "DEPTH_WRITE",
            ResourceState::CopyDest => "COPY_DEST",
        }
    }
}

/// 纹理格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// RGBA 8位无符号归一化
    Rgba8Unorm,
    /// RGBA 16位浮点（体积雾的深度目标）
    Rgba16Float,
    /// 深度 24位 + 模板 8位
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// 每像素字节数
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Depth24PlusStencil8 => 4,
        }
    }
}

/// 离屏渲染目标描述
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    /// 调试名称
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// 优化清除值
    pub clear_color: [f32; 4],
}

impl RenderTargetDesc {
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }

    /// 设置优化清除值
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }
}

/// CPU 侧的 RGBA8 纹理数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// 逐行紧密排列的 RGBA8 像素
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// 每行字节数
    pub fn row_pitch(&self) -> usize {
        self.width as usize * 4
    }

    /// 上下翻转行顺序
    ///
    /// 房间模型的纹理坐标按 BMP 自底向上的行顺序编写，图像解码得到的是自顶向下。
    pub fn flipped_vertically(mut self) -> Self {
        let pitch = self.row_pitch();
        let rows = self.height as usize;
        for y in 0..rows / 2 {
            let (top, bottom) = self.pixels.split_at_mut((rows - 1 - y) * pitch);
            top[y * pitch..(y + 1) * pitch].swap_with_slice(&mut bottom[..pitch]);
        }
        self
    }

    /// 生成棋盘格纹理，用于缺失资产时的替代
    pub fn checkerboard(size: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let light = ((x / cell) + (y / cell)) % 2 == 0;
                let value = if light { 200 } else { 55 };
                pixels.extend_from_slice(&[value, 0, value, 255]);
            }
        }
        Self { width: size, height: size, pixels }
    }
}

/// 后备缓冲区环
///
/// 固定大小的交换链缓冲区轮换，任一时刻恰好有一个当前缓冲区。
/// 呈现之后前进一格：`current = (current + 1) % count`。
#[derive(Debug, Clone)]
pub struct BackBufferRing {
    /// 当前后备缓冲区索引
    current_index: usize,
    /// 缓冲区数量
    count: usize,
    /// 已前进的次数
    presented: u64,
}

impl BackBufferRing {
    /// 创建新的后备缓冲区环
    ///
    /// # 参数
    ///
    /// * `count` - 缓冲区数量（至少为 2）
    pub fn new(count: usize) -> Result<Self> {
        if count < 2 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.back_buffer_count".to_string(),
                reason: format!("a swap chain ring needs at least 2 buffers, got {}", count),
            }
            .into());
        }

        Ok(Self { current_index: 0, count, presented: 0 })
    }

    /// 获取当前缓冲区索引
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// 获取缓冲区数量
    pub fn count(&self) -> usize {
        self.count
    }

    /// 已呈现的帧数
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// 移动到下一个缓冲区
    pub fn advance(&mut self) -> usize {
        self.current_index = (self.current_index + 1) % self.count;
        self.presented += 1;
        self.current_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_alignment() {
        assert_eq!(aligned_constant_size(1), 256);
        assert_eq!(aligned_constant_size(128), 256);
        assert_eq!(aligned_constant_size(256), 256);
        assert_eq!(aligned_constant_size(257), 512);
    }

    #[test]
    fn test_ring_advances_modulo_count() {
        for count in 2..=4 {
            let mut ring = BackBufferRing::new(count).unwrap();
            for frame in 0..20 {
                let before = ring.current_index();
                assert_eq!(before, frame % count);
                let after = ring.advance();
                assert_eq!(after, (before + 1) % count);
            }
            assert_eq!(ring.presented(), 20);
        }
    }

    #[test]
    fn test_ring_rejects_single_buffer() {
        assert!(BackBufferRing::new(1).is_err());
        assert!(BackBufferRing::new(0).is_err());
    }

    #[test]
    fn test_flip_rows() {
        let rows: Vec<u8> = (0..3u8).flat_map(|row| [row; 8]).collect();
        let texture = TextureData { width: 2, height: 3, pixels: rows }.flipped_vertically();
        assert_eq!(&texture.pixels[..8], &[2; 8]);
        assert_eq!(&texture.pixels[8..16], &[1; 8]);
        assert_eq!(&texture.pixels[16..], &[0; 8]);
    }

    #[test]
    fn test_checkerboard() {
        let texture = TextureData::checkerboard(8, 4);
        assert_eq!(texture.pixels.len(), 8 * 8 * 4);
        assert_eq!(texture.row_pitch(), 32);
        // 相邻格子颜色不同
        assert_ne!(texture.pixels[0], texture.pixels[4 * 4]);
        // 不透明
        assert!(texture.pixels.chunks(4).all(|p| p[3] == 255));
    }
}

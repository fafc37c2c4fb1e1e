//! 描述符管理模块
//!
//! 渲染器不直接持有原生描述符，而是持有 [`GpuHandle`]：一个指向宿主侧
//! 描述符表的索引，附带代数（generation）和资源类别。设备实现用
//! [`DescriptorTable`] 把句柄映射到自己的原生对象，并显式地分配和释放。
//!
//! # 设计原则
//!
//! - **值类型句柄**：`GpuHandle` 是 `Copy`，可以放进命令列表和 pass 描述
//! - **失效检测**：释放后槽位代数加一，旧句柄再访问会得到错误而不是别的资源
//! - **预算**：表有固定容量，超过即报错，对应原生描述符堆的大小
//!
//! DX12 的 RTV / DSV / SRV 堆内的槽位由 [`SlotAllocator`] 管理。

use std::fmt;

use crate::core::error::{GraphicsError, Result};

/// 句柄指向的资源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// 离屏颜色渲染目标（可被后续 pass 采样）
    RenderTarget,
    /// 交换链后备缓冲区
    BackBuffer,
    /// 深度模板缓冲
    DepthStencil,
    /// 静态纹理（初始化时上传，只读）
    Texture,
    /// 顶点 / 索引缓冲
    Mesh,
    /// 常量缓冲
    ConstantBuffer,
    /// 管线状态（着色器 + 光栅化 / 混合状态）
    Pipeline,
}

impl HandleKind {
    /// 获取类别名称
    pub fn name(&self) -> &'static str {
        match self {
            HandleKind::RenderTarget => "RenderTarget",
            HandleKind::BackBuffer => "BackBuffer",
            HandleKind::DepthStencil => "DepthStencil",
            HandleKind::Texture => "Texture",
            HandleKind::Mesh => "Mesh",
            HandleKind::ConstantBuffer => "ConstantBuffer",
            HandleKind::Pipeline => "Pipeline",
        }
    }

    /// 是否可以绑定为着色器输入
    pub fn is_sampleable(&self) -> bool {
        matches!(self, HandleKind::RenderTarget | HandleKind::Texture)
    }

    /// 是否可以绑定为颜色输出
    pub fn is_color_target(&self) -> bool {
        matches!(self, HandleKind::RenderTarget | HandleKind::BackBuffer)
    }
}

/// GPU 资源句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuHandle {
    index: u32,
    generation: u32,
    kind: HandleKind,
}

impl GpuHandle {
    /// 表内索引
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 槽位代数
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// 资源类别
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// 检查句柄类别
    pub fn expect_kind(&self, kind: HandleKind) -> Result<Self> {
        if self.kind != kind {
            return Err(GraphicsError::InvalidHandle(format!(
                "{} used where a {} was expected",
                self,
                kind.name()
            ))
            .into());
        }
        Ok(*self)
    }
}

impl fmt::Display for GpuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.kind.name(), self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    kind: HandleKind,
    value: Option<T>,
}

/// 描述符表
///
/// 宿主侧的句柄表：`allocate` 存入原生对象并返回句柄，`release` 取回对象，
/// 槽位进入空闲链表，代数加一。
pub struct DescriptorTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    capacity: u32,
    live: u32,
}

impl<T> DescriptorTable<T> {
    /// 创建新的描述符表
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            live: 0,
        }
    }

    /// 分配一个句柄
    pub fn allocate(&mut self, kind: HandleKind, value: T) -> Result<GpuHandle> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.kind = kind;
            slot.value = Some(value);
            self.live += 1;
            return Ok(GpuHandle { index, generation: slot.generation, kind });
        }

        // 检查预算
        if self.slots.len() as u32 >= self.capacity {
            return Err(GraphicsError::ResourceCreation(format!(
                "Descriptor table out of budget: {}/{} while allocating {}",
                self.live,
                self.capacity,
                kind.name()
            ))
            .into());
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, kind, value: Some(value) });
        self.live += 1;
        Ok(GpuHandle { index, generation: 0, kind })
    }

    fn slot(&self, handle: GpuHandle) -> Result<&Slot<T>> {
        match self.slots.get(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.value.is_some() => {
                if slot.kind != handle.kind {
                    return Err(GraphicsError::InvalidHandle(format!(
                        "{} refers to a {} slot",
                        handle,
                        slot.kind.name()
                    ))
                    .into());
                }
                Ok(slot)
            }
            _ => Err(GraphicsError::InvalidHandle(format!("{} is stale or unknown", handle)).into()),
        }
    }

    /// 获取句柄对应的对象
    pub fn get(&self, handle: GpuHandle) -> Result<&T> {
        let slot = self.slot(handle)?;
        slot.value
            .as_ref()
            .ok_or_else(|| GraphicsError::InvalidHandle(handle.to_string()).into())
    }

    /// 获取句柄对应的对象（可变）
    pub fn get_mut(&mut self, handle: GpuHandle) -> Result<&mut T> {
        self.slot(handle)?;
        self.slots[handle.index as usize]
            .value
            .as_mut()
            .ok_or_else(|| GraphicsError::InvalidHandle(handle.to_string()).into())
    }

    /// 释放句柄，返回其对象
    pub fn release(&mut self, handle: GpuHandle) -> Result<T> {
        self.slot(handle)?;
        let slot = &mut self.slots[handle.index as usize];
        let value = slot
            .value
            .take()
            .ok_or_else(|| GraphicsError::InvalidHandle(handle.to_string()))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Ok(value)
    }

    /// 句柄是否仍然有效
    pub fn contains(&self, handle: GpuHandle) -> bool {
        self.slot(handle).is_ok()
    }

    /// 获取已分配数量
    pub fn len(&self) -> u32 {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// 获取最大容量
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// 原生描述符堆内的槽位分配器
///
/// 线性分配，释放的槽位优先复用。
#[derive(Debug)]
pub struct SlotAllocator {
    name: &'static str,
    capacity: u32,
    next: u32,
    free: Vec<u32>,
}

impl SlotAllocator {
    /// 创建新的槽位分配器
    pub fn new(name: &'static str, capacity: u32) -> Self {
        Self { name, capacity, next: 0, free: Vec::new() }
    }

    /// 分配一个槽位
    pub fn allocate(&mut self) -> Result<u32> {
        if let Some(slot) = self.free.pop() {
            return Ok(slot);
        }
        if self.next >= self.capacity {
            return Err(GraphicsError::ResourceCreation(format!(
                "{} heap out of budget: {}/{}",
                self.name, self.next, self.capacity
            ))
            .into());
        }
        let slot = self.next;
        self.next += 1;
        Ok(slot)
    }

    /// 释放槽位
    pub fn free(&mut self, slot: u32) {
        debug_assert!(slot < self.next);
        self.free.push(slot);
    }

    /// 获取最大容量
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

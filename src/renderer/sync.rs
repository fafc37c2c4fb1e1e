//! GPU 同步机制模块
//!
//! 提供 CPU-GPU 帧同步所需的 Fence 计数器。
//!
//! # 设计原则
//!
//! - **单调递增**：每提交一帧，CPU 侧的 Fence 值加一，永不回退
//! - **完全排空**：每帧提交后等待 GPU 完成该值，下一帧才能复用命令分配器和常量缓冲
//! - **设备无关**：真正的 Signal / Wait 由 `GraphicsDevice` 实现，这里只记账

use crate::core::error::{GraphicsError, Result};

/// Fence 值
///
/// 用于 CPU-GPU 同步的单调递增值。
/// CPU 可以等待 GPU 完成特定 Fence 值对应的工作。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 创建新的 Fence 值
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }

    /// 下一个 Fence 值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// Fence 管理器
///
/// 记录 CPU 已请求的最新 Fence 值和设备报告的已完成值。
///
/// # 示例
///
/// ```
/// use fog_render::renderer::sync::{FenceManager, FenceValue};
///
/// let mut fences = FenceManager::new();
/// let value = fences.next_value();
/// // device.signal(value)?; device.wait_for(value)?;
/// fences.update_completed_value(value).unwrap();
/// assert!(fences.is_drained());
/// ```
#[derive(Debug, Default)]
pub struct FenceManager {
    /// 当前 Fence 值（CPU 侧）
    current_value: FenceValue,
    /// 已完成的 Fence 值（GPU 侧）
    completed_value: FenceValue,
}

impl FenceManager {
    /// 创建新的 Fence 管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前 Fence 值
    pub fn current_value(&self) -> FenceValue {
        self.current_value
    }

    /// 获取已完成的 Fence 值
    pub fn completed_value(&self) -> FenceValue {
        self.completed_value
    }

    /// 获取下一个 Fence 值并递增计数器
    pub fn next_value(&mut self) -> FenceValue {
        self.current_value = self.current_value.next();
        self.current_value
    }

    /// 更新已完成的 Fence 值
    ///
    /// 设备报告的值不能小于已知的完成值，也不能超过 CPU 已请求的值。
    pub fn update_completed_value(&mut self, value: FenceValue) -> Result<()> {
        if value < self.completed_value {
            return Err(GraphicsError::FenceWait(format!(
                "completed fence went backwards: {} -> {}",
                self.completed_value.value(),
                value.value()
            ))
            .into());
        }
        if value > self.current_value {
            return Err(GraphicsError::FenceWait(format!(
                "completed fence {} is ahead of the last signaled value {}",
                value.value(),
                self.current_value.value()
            ))
            .into());
        }
        self.completed_value = value;
        Ok(())
    }

    /// 检查特定 Fence 值是否已完成
    pub fn is_completed(&self, value: FenceValue) -> bool {
        self.completed_value >= value
    }

    /// 所有已提交的工作是否都已完成
    pub fn is_drained(&self) -> bool {
        self.completed_value == self.current_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_value() {
        let fence = FenceValue::new(1);
        assert_eq!(fence.value(), 1);
        assert_eq!(fence.next().value(), 2);
        assert_eq!(fence.value(), 1); // 原值不变
    }

    #[test]
    fn test_fence_manager() {
        let mut manager = FenceManager::new();

        assert_eq!(manager.current_value().value(), 0);
        assert_eq!(manager.completed_value().value(), 0);
        assert!(manager.is_drained());

        let v1 = manager.next_value();
        assert_eq!(v1.value(), 1);
        let v2 = manager.next_value();
        assert_eq!(v2.value(), 2);
        assert!(!manager.is_drained());

        // 模拟 GPU 完成
        manager.update_completed_value(v1).unwrap();
        assert!(manager.is_completed(v1));
        assert!(!manager.is_completed(v2));

        manager.update_completed_value(v2).unwrap();
        assert!(manager.is_drained());
    }

    #[test]
    fn test_fence_is_monotonic() {
        let mut manager = FenceManager::new();
        let mut last = manager.current_value();
        for _ in 0..100 {
            let value = manager.next_value();
            assert!(value > last);
            manager.update_completed_value(value).unwrap();
            last = value;
        }

        assert!(manager.update_completed_value(FenceValue::new(3)).is_err());
        assert_eq!(manager.completed_value(), last);
    }

    #[test]
    fn test_completed_cannot_pass_signaled() {
        let mut manager = FenceManager::new();
        manager.next_value();
        assert!(manager.update_completed_value(FenceValue::new(2)).is_err());
    }

    #[test]
    fn test_fence_ordering() {
        let f1 = FenceValue::new(1);
        let f2 = FenceValue::new(2);
        assert!(f1 < f2);
        assert_eq!(f1, FenceValue::new(1));
    }
}

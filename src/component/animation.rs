//! 旋转动画
//!
//! 物体绕 Y 轴和 X 轴以相同角度自转。角度作为普通值保存在场景里，
//! 每次更新返回新的状态。

use crate::math::{constants, matrix, Matrix4};

/// 角速度：每秒 1/5 弧度
const RADIANS_PER_SECOND: f32 = 1.0 / 5.0;

/// 自转状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpinAnimation {
    angle: f32,
}

impl SpinAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前角度（弧度）
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// 推进 `elapsed` 秒，超过 2π 时归零
    pub fn advance(self, elapsed: f32) -> Self {
        let mut angle = self.angle + elapsed * RADIANS_PER_SECOND;
        if angle > constants::TAU {
            angle = 0.0;
        }
        Self { angle }
    }

    /// 世界矩阵：先绕 X 轴，再绕 Y 轴
    pub fn world_matrix(&self) -> Matrix4 {
        matrix::rotation_y(self.angle) * matrix::rotation_x(self.angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn test_advance_rate() {
        let spin = SpinAnimation::new().advance(1.0);
        assert!((spin.angle() - 0.2).abs() < 1e-6);
        // 原值不变
        let start = SpinAnimation::new();
        let _ = start.advance(1.0);
        assert_eq!(start.angle(), 0.0);
    }

    #[test]
    fn test_angle_wraps_to_zero() {
        let mut spin = SpinAnimation::new();
        let mut wrapped = false;
        for _ in 0..10_000 {
            let next = spin.advance(0.016);
            assert!(next.angle() <= constants::TAU);
            if next.angle() < spin.angle() {
                assert_eq!(next.angle(), 0.0);
                wrapped = true;
            }
            spin = next;
        }
        assert!(wrapped);
    }

    #[test]
    fn test_large_step_still_wraps() {
        let spin = SpinAnimation::new().advance(100.0);
        assert_eq!(spin.angle(), 0.0);
    }

    #[test]
    fn test_world_matrix_order() {
        let spin = SpinAnimation { angle: constants::PI / 2.0 };
        // Y 轴先经 X 旋转到 +Z，再经 Y 旋转到 +X
        let v = spin.world_matrix().transform_vector(&Vector3::y());
        assert!((v - Vector3::x()).norm() < 1e-5);
    }
}

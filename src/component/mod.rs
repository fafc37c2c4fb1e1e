//! 组件系统模块
//!
//! 示例场景中可复用的状态：第一人称相机和自转动画。

mod camera;
mod animation;

pub use camera::{FirstPersonCamera, DEFAULT_MOVE_SPEED, DEFAULT_YAW_STEP};
pub use animation::SpinAnimation;

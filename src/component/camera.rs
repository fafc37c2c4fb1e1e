//! Camera 组件
//!
//! 第一人称相机：鼠标水平移动转向，WASD 在水平面内移动。
//! 每次 `frame_move` 都把光标放回客户区中心，转向只取偏移的符号，
//! 因此转速与鼠标速度无关，固定为每帧一个角度步长。

use winit::keyboard::KeyCode;

use crate::core::input::InputSource;
use crate::math::{matrix, utils, Matrix4, Vector3};

/// 默认水平转向步长（度）
pub const DEFAULT_YAW_STEP: f32 = 2.0;
/// 默认移动速度（单位 / 秒）
pub const DEFAULT_MOVE_SPEED: f32 = 5000.0;

/// 第一人称相机
#[derive(Debug, Clone)]
pub struct FirstPersonCamera {
    /// 相机位置
    position: Vector3,

    /// 相机坐标系：右向量
    right: Vector3,

    /// 相机坐标系：上向量
    up: Vector3,

    /// 相机坐标系：前向量（Look）
    look: Vector3,

    /// 客户区尺寸，用于计算光标中心
    client_width: u32,
    client_height: u32,

    /// 每帧水平转向角度（度）
    yaw_step: f32,

    /// 每帧俯仰角度（度），0 表示禁用
    pitch_step: f32,

    /// 移动速度
    move_speed: f32,

    /// 视图矩阵
    view_matrix: Matrix4,
}

impl FirstPersonCamera {
    /// 创建相机，初始朝向 +Z
    pub fn new(position: Vector3, client_width: u32, client_height: u32) -> Self {
        let mut camera = Self {
            position,
            right: Vector3::x(),
            up: Vector3::y(),
            look: Vector3::z(),
            client_width,
            client_height,
            yaw_step: DEFAULT_YAW_STEP,
            pitch_step: 0.0,
            move_speed: DEFAULT_MOVE_SPEED,
            view_matrix: Matrix4::identity(),
        };
        camera.update_view_matrix();
        camera
    }

    /// 设置俯仰步长（度）
    pub fn with_pitch_step(mut self, degrees: f32) -> Self {
        self.pitch_step = degrees;
        self
    }

    // ========== 位置与坐标系 ==========

    /// 获取相机位置
    pub fn position(&self) -> Vector3 {
        self.position
    }

    /// 获取右向量
    pub fn right(&self) -> Vector3 {
        self.right
    }

    /// 获取上向量
    pub fn up(&self) -> Vector3 {
        self.up
    }

    /// 获取前向量（Look）
    pub fn look(&self) -> Vector3 {
        self.look
    }

    /// 获取视图矩阵
    pub fn view_matrix(&self) -> Matrix4 {
        self.view_matrix
    }

    /// 客户区尺寸变化时更新光标中心
    pub fn set_client_size(&mut self, width: u32, height: u32) {
        self.client_width = width;
        self.client_height = height;
    }

    // ========== 每帧更新 ==========

    /// 读取输入、更新相机并返回新的视图矩阵
    ///
    /// 1. 读取光标并放回中心，`delta = center - cursor`
    /// 2. 绕世界 Y 轴转向 `-sign(delta.x) * yaw_step`，绕右轴俯仰 `-sign(delta.y) * pitch_step`
    /// 3. W/S/D/A 沿 look / right 在 XZ 平面上的投影移动，按 W、S、D、A 顺序后者覆盖前者
    /// 4. 重新正交化并重建视图矩阵
    pub fn frame_move(&mut self, elapsed: f32, input: &mut dyn InputSource) -> Matrix4 {
        let center_x = (self.client_width / 2) as i32;
        let center_y = (self.client_height / 2) as i32;
        let (cursor_x, cursor_y) = input.cursor_position();
        input.set_cursor_position(center_x, center_y);

        let delta_x = center_x - cursor_x;
        let delta_y = center_y - cursor_y;

        let yaw = -(delta_x.signum() as f32) * self.yaw_step;
        if yaw != 0.0 {
            let rotation = matrix::rotation_y(utils::deg_to_rad(yaw));
            self.rotate(&rotation);
        }

        let pitch = -(delta_y.signum() as f32) * self.pitch_step;
        if pitch != 0.0 {
            let rotation = matrix::rotation_axis(&self.right, utils::deg_to_rad(pitch));
            self.rotate(&rotation);
        }

        let step = self.move_speed * elapsed;
        let flat_look = Vector3::new(self.look.x, 0.0, self.look.z);
        let flat_right = Vector3::new(self.right.x, 0.0, self.right.z);
        let mut movement = Vector3::zeros();
        if input.is_key_down(KeyCode::KeyW) {
            movement = flat_look * step;
        }
        if input.is_key_down(KeyCode::KeyS) {
            movement = flat_look * -step;
        }
        if input.is_key_down(KeyCode::KeyD) {
            movement = flat_right * step;
        }
        if input.is_key_down(KeyCode::KeyA) {
            movement = flat_right * -step;
        }
        self.position += movement;

        self.orthonormalize();
        debug_assert!(is_orthonormal(&self.right, &self.up, &self.look, 1e-3));
        self.update_view_matrix();
        self.view_matrix
    }

    fn rotate(&mut self, rotation: &Matrix4) {
        self.right = rotation.transform_vector(&self.right);
        self.up = rotation.transform_vector(&self.up);
        self.look = rotation.transform_vector(&self.look);
    }

    /// 消除累积误差，保持基向量两两正交且为单位长度
    fn orthonormalize(&mut self) {
        self.look = self.look.normalize();
        self.up = self.look.cross(&self.right).normalize();
        self.right = self.up.cross(&self.look).normalize();
    }

    fn update_view_matrix(&mut self) {
        self.view_matrix = matrix::view_from_basis(&self.position, &self.right, &self.up, &self.look);
    }
}

/// 基向量是否为单位正交基
pub fn is_orthonormal(right: &Vector3, up: &Vector3, look: &Vector3, epsilon: f32) -> bool {
    let unit = |v: &Vector3| (v.norm() - 1.0).abs() < epsilon;
    unit(right)
        && unit(up)
        && unit(look)
        && right.dot(up).abs() < epsilon
        && up.dot(look).abs() < epsilon
        && look.dot(right).abs() < epsilon
}

impl Default for FirstPersonCamera {
    fn default() -> Self {
        Self::new(Vector3::zeros(), 800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::IdleInput;

    fn camera() -> FirstPersonCamera {
        FirstPersonCamera::new(Vector3::new(25.0, 5.0, -6000.0), 800, 600)
    }

    #[test]
    fn test_centered_cursor_does_not_turn() {
        let mut camera = camera();
        let mut input = IdleInput::new();
        input.move_cursor(400, 300);
        camera.frame_move(0.016, &mut input);
        assert!((camera.look() - Vector3::z()).norm() < 1e-6);
        assert_eq!(input.cursor_position(), (400, 300));
    }

    #[test]
    fn test_yaw_sign_follows_cursor() {
        // 光标在中心右侧：delta.x < 0，正角度转向
        let mut camera = camera();
        let mut input = IdleInput::new();
        input.move_cursor(500, 300);
        camera.frame_move(0.0, &mut input);
        let expected = matrix::rotation_y(utils::deg_to_rad(DEFAULT_YAW_STEP)).transform_vector(&Vector3::z());
        assert!((camera.look() - expected).norm() < 1e-5);
        // 光标被放回中心
        assert_eq!(input.cursor_position(), (400, 300));

        // 左侧：反方向转回
        input.move_cursor(10, 300);
        camera.frame_move(0.0, &mut input);
        assert!((camera.look() - Vector3::z()).norm() < 1e-5);
    }

    #[test]
    fn test_turn_step_is_independent_of_distance() {
        let mut near = camera();
        let mut far = camera();
        let mut input = IdleInput::new();
        input.move_cursor(401, 300);
        near.frame_move(0.0, &mut input);
        input.move_cursor(799, 300);
        far.frame_move(0.0, &mut input);
        assert!((near.look() - far.look()).norm() < 1e-6);
    }

    #[test]
    fn test_pitch_disabled_by_default() {
        let mut camera = camera();
        let mut input = IdleInput::new();
        input.move_cursor(400, 0);
        camera.frame_move(0.0, &mut input);
        assert!((camera.look() - Vector3::z()).norm() < 1e-6);

        let mut camera = camera.with_pitch_step(1.0);
        input.move_cursor(400, 0);
        camera.frame_move(0.0, &mut input);
        assert!(camera.look().y.abs() > 1e-3);
    }

    #[test]
    fn test_movement_is_horizontal_and_scaled() {
        let mut camera = camera().with_pitch_step(10.0);
        let mut input = IdleInput::new();
        // 先抬头
        input.move_cursor(400, 0);
        camera.frame_move(0.0, &mut input);
        let start = camera.position();
        let look = camera.look();

        input.press(KeyCode::KeyW);
        camera.frame_move(0.5, &mut input);
        let moved = camera.position() - start;
        assert_eq!(moved.y, 0.0);
        let expected = Vector3::new(look.x, 0.0, look.z) * DEFAULT_MOVE_SPEED * 0.5;
        assert!((moved - expected).norm() < 1e-2);
    }

    #[test]
    fn test_last_key_wins() {
        let mut camera = camera();
        let mut input = IdleInput::new();
        input.move_cursor(400, 300);
        input.press(KeyCode::KeyW);
        input.press(KeyCode::KeyA);
        let start = camera.position();
        camera.frame_move(1.0, &mut input);
        let moved = camera.position() - start;
        assert!((moved - Vector3::new(-DEFAULT_MOVE_SPEED, 0.0, 0.0)).norm() < 1e-3);
    }

    #[test]
    fn test_basis_stays_orthonormal() {
        let mut camera = camera().with_pitch_step(3.0);
        let mut input = IdleInput::new();
        let keys = [KeyCode::KeyW, KeyCode::KeyS, KeyCode::KeyD, KeyCode::KeyA];
        let mut seed: u32 = 12345;
        for frame in 0..500 {
            // 线性同余，保证可复现
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let x = (seed >> 8) % 800;
            let y = (seed >> 16) % 600;
            input.move_cursor(x as i32, y as i32);
            let key = keys[frame % keys.len()];
            input.press(key);
            camera.frame_move(0.016, &mut input);
            input.release(key);

            assert!(
                is_orthonormal(&camera.right(), &camera.up(), &camera.look(), 1e-4),
                "basis degenerated at frame {}",
                frame
            );
        }
    }

    #[test]
    fn test_view_matrix_moves_camera_to_origin() {
        let mut camera = camera();
        let mut input = IdleInput::new();
        input.move_cursor(400, 300);
        let view = camera.frame_move(0.0, &mut input);
        let p = view.transform_point(&crate::math::Point3::from(camera.position()));
        assert!(p.coords.norm() < 1e-2);
    }
}

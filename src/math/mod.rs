//! 统一的数学库模块
//!
//! 基于 `nalgebra` 提供图形编程常用的类型别名，以及左手坐标系下的
//! 视图 / 投影矩阵构造函数。
//!
//! # 约定
//!
//! - 矩阵使用列向量约定：`clip = proj * view * world * v`
//! - 观察空间为左手系，+Z 指向屏幕内，深度范围 [0, 1]
//! - 上传到着色器时按列主序存储（HLSL 默认的 `column_major`），
//!   着色器中使用 `mul(M, v)`，无需转置

pub use nalgebra::{
    Matrix4 as Mat4, Point3,
    Vector2 as Vec2, Vector3 as Vec3, Vector4 as Vec4,
};

// 类型别名，使用更简洁的名称
pub type Vector2 = Vec2<f32>;
pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;

/// 数学常量
pub mod constants {
    /// 圆周率
    pub const PI: f32 = std::f32::consts::PI;

    /// 2π
    pub const TAU: f32 = std::f32::consts::TAU;

    /// π/4，示例场景统一使用的垂直视场角
    pub const QUARTER_PI: f32 = std::f32::consts::FRAC_PI_4;

    /// 角度转弧度
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    pub const EPSILON: f32 = 1e-6;
}

/// 工具函数
pub mod utils {
    /// 角度转弧度
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * super::constants::DEG_TO_RAD
    }

    /// 浮点数近似相等
    pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }
}

/// 矩阵辅助函数
pub mod matrix {
    use super::*;

    /// 创建绕 X 轴的旋转矩阵
    pub fn rotation_x(angle: f32) -> Matrix4 {
        Matrix4::from_axis_angle(&Vector3::x_axis(), angle)
    }

    /// 创建绕 Y 轴的旋转矩阵
    pub fn rotation_y(angle: f32) -> Matrix4 {
        Matrix4::from_axis_angle(&Vector3::y_axis(), angle)
    }

    /// 创建绕任意轴的旋转矩阵，轴会先被归一化
    pub fn rotation_axis(axis: &Vector3, angle: f32) -> Matrix4 {
        Matrix4::from_axis_angle(&nalgebra::Unit::new_normalize(*axis), angle)
    }

    /// 创建左手系透视投影矩阵（深度映射到 [0, 1]）
    ///
    /// # 参数
    ///
    /// * `fov_y` - 垂直视场角（弧度）
    /// * `aspect` - 宽高比
    /// * `near` / `far` - 近 / 远裁剪面
    pub fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
        let y_scale = 1.0 / (fov_y * 0.5).tan();
        let x_scale = y_scale / aspect;
        let range = far / (far - near);

        Matrix4::new(
            x_scale, 0.0, 0.0, 0.0,
            0.0, y_scale, 0.0, 0.0,
            0.0, 0.0, range, -range * near,
            0.0, 0.0, 1.0, 0.0,
        )
    }

    /// 创建左手系 Look-At 视图矩阵
    pub fn look_at_lh(eye: &Vector3, target: &Vector3, up: &Vector3) -> Matrix4 {
        let look = (target - eye).normalize();
        let right = up.cross(&look).normalize();
        let up = look.cross(&right);
        view_from_basis(eye, &right, &up, &look)
    }

    /// 由相机的正交基和位置构造视图矩阵
    ///
    /// 基向量作为矩阵的行，平移分量为 `-dot(position, axis)`。
    pub fn view_from_basis(position: &Vector3, right: &Vector3, up: &Vector3, look: &Vector3) -> Matrix4 {
        Matrix4::new(
            right.x, right.y, right.z, -position.dot(right),
            up.x, up.y, up.z, -position.dot(up),
            look.x, look.y, look.z, -position.dot(look),
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// 转换为着色器常量布局（列主序）
    pub fn to_gpu(m: &Matrix4) -> [[f32; 4]; 4] {
        (*m).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::utils::approx_eq;

    fn project(m: &Matrix4, p: Vector3) -> Vector3 {
        let clip = m * Vector4::new(p.x, p.y, p.z, 1.0);
        Vector3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = matrix::perspective_fov_lh(constants::QUARTER_PI, 4.0 / 3.0, 1.0, 100.0);
        let near = project(&proj, Vector3::new(0.0, 0.0, 1.0));
        let far = project(&proj, Vector3::new(0.0, 0.0, 100.0));
        assert!(approx_eq(near.z, 0.0, 1e-5));
        assert!(approx_eq(far.z, 1.0, 1e-5));
    }

    #[test]
    fn test_look_at_lh_places_target_on_positive_z() {
        let eye = Vector3::new(0.0, 0.0, -25.0);
        let view = matrix::look_at_lh(&eye, &Vector3::zeros(), &Vector3::y());
        let origin = view.transform_point(&Point3::new(0.0, 0.0, 0.0));
        assert!(approx_eq(origin.z, 25.0, 1e-5));

        let at_eye = view.transform_point(&Point3::from(eye));
        assert!(at_eye.coords.norm() < 1e-5);

        // 左手系：世界 +X 仍在观察空间 +X
        let right = view.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(right.x > 0.0);
    }

    #[test]
    fn test_rotation_y_turns_x_toward_negative_z() {
        let r = matrix::rotation_y(constants::PI / 2.0);
        let v = r.transform_vector(&Vector3::x());
        assert!(approx_eq(v.z, -1.0, 1e-5));
    }

    #[test]
    fn test_to_gpu_is_column_major() {
        let m = matrix::view_from_basis(
            &Vector3::new(1.0, 2.0, 3.0),
            &Vector3::x(),
            &Vector3::y(),
            &Vector3::z(),
        );
        let gpu = matrix::to_gpu(&m);
        // 第 4 列保存平移
        assert_eq!(gpu[3][0], -1.0);
        assert_eq!(gpu[3][1], -2.0);
        assert_eq!(gpu[3][2], -3.0);
    }
}

/// 内置几何体
///
/// 示例场景使用的固定网格：带法线的 Phong 立方体、体积雾的 8 顶点立方体、
/// 以及覆盖整个裁剪空间的全屏四边形（screen-aligned quad）。

use super::mesh::{MeshData, PrimitiveTopology};
use super::vertex::{NormalVertex, PositionVertex};

/// 每个面 4 个顶点、带面法线的立方体（共 24 个顶点，36 个索引）
pub fn phong_cube(half_size: f32) -> MeshData {
    let s = half_size;
    let face = |normal: [f32; 3], corners: [[f32; 3]; 4]| {
        corners.map(|position| NormalVertex { position, normal })
    };

    let faces = [
        // -Y
        face([0.0, -1.0, 0.0], [[-s, -s, -s], [-s, -s, s], [s, -s, s], [s, -s, -s]]),
        // +Y
        face([0.0, 1.0, 0.0], [[-s, s, -s], [s, s, -s], [s, s, s], [-s, s, s]]),
        // -Z
        face([0.0, 0.0, -1.0], [[-s, -s, -s], [s, -s, -s], [s, s, -s], [-s, s, -s]]),
        // +X
        face([1.0, 0.0, 0.0], [[s, -s, -s], [s, -s, s], [s, s, s], [s, s, -s]]),
        // +Z
        face([0.0, 0.0, 1.0], [[s, -s, s], [-s, -s, s], [-s, s, s], [s, s, s]]),
        // -X
        face([-1.0, 0.0, 0.0], [[-s, -s, s], [-s, -s, -s], [-s, s, -s], [-s, s, s]]),
    ];
    let vertices: Vec<NormalVertex> = faces.iter().flatten().copied().collect();

    let indices: Vec<u16> = (0..6u16)
        .flat_map(|f| {
            let b = f * 4;
            [b, b + 2, b + 1, b + 2, b, b + 3]
        })
        .collect();

    MeshData::new("phong_cube", &vertices, Some(indices), PrimitiveTopology::TriangleList)
}

/// 8 个共享顶点的立方体，用于体积雾的正反面深度
pub fn fog_cube(half_size: f32) -> MeshData {
    let s = half_size;
    const A: u16 = 0;
    const B: u16 = 1;
    const C: u16 = 2;
    const D: u16 = 3;
    const E: u16 = 4;
    const F: u16 = 5;
    const G: u16 = 6;
    const H: u16 = 7;

    let vertices = [
        [-s, -s, -s], // A
        [s, -s, -s],  // B
        [-s, s, -s],  // C
        [s, s, -s],   // D
        [-s, -s, s],  // E
        [s, -s, s],   // F
        [-s, s, s],   // G
        [s, s, s],    // H
    ]
    .map(|position| PositionVertex { position });

    let indices = vec![
        A, C, D, A, D, B, // 前
        G, E, F, G, F, H, // 后
        E, G, C, E, C, A, // 左
        B, D, H, B, H, F, // 右
        C, G, H, C, H, D, // 上
        E, A, B, E, B, F, // 下
    ];

    MeshData::new("fog_cube", &vertices, Some(indices), PrimitiveTopology::TriangleList)
}

/// 全屏四边形（三角形带，z = 0.5）
pub fn screen_quad() -> MeshData {
    let vertices = [
        [1.0, 1.0, 0.5],
        [1.0, -1.0, 0.5],
        [-1.0, 1.0, 0.5],
        [-1.0, -1.0, 0.5],
    ]
    .map(|position| PositionVertex { position });

    MeshData::new("screen_quad", &vertices, None, PrimitiveTopology::TriangleStrip)
}

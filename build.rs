/// Build script for fog_render
///
/// # Shader Compilation Strategy:
/// - DX12: HLSL shaders under `shaders/` are compiled at runtime via D3DCompile
/// - Headless: shaders are never compiled, only their paths are recorded
fn main() {
    // Trigger rebuild if shader files change
    for shader in [
        "shaders/phong.hlsl",
        "shaders/fog_depth.hlsl",
        "shaders/fog_composite.hlsl",
        "shaders/room.hlsl",
        "shaders/screen_quad.hlsl",
    ] {
        println!("cargo:rerun-if-changed={}", shader);
    }
}

//! 渲染 Pass 声明
//!
//! 一帧由有序的 pass 组成。每个 pass 写一个目标（离屏颜色缓冲或当前后备缓冲区），
//! 可以采样更早 pass 的输出或静态纹理，并绑定一个管线。
//!
//! [`PassGraph::new`] 在初始化时检查声明：
//!
//! - 至少有一个 pass，且只有最后一个 pass 写后备缓冲区
//! - 被读取的渲染目标必须由严格更早的 pass 产生，pass 不能采样自己的目标
//! - 每个离屏目标每帧只被一个 pass 写入
//!
//! 没有被任何后续 pass 读取的离屏输出照常执行，只在初始化时警告一次。

use tracing::{debug, warn};

use crate::core::error::{GraphicsError, PassError, Result};

use super::descriptor::{GpuHandle, HandleKind};

/// Pass 的输出目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// 离屏渲染目标
    Offscreen(GpuHandle),
    /// 当前帧的后备缓冲区
    BackBuffer,
}

/// 一次绘制调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub mesh: GpuHandle,
    /// 索引绘制时为索引数量，否则为顶点数量
    pub element_count: u32,
    pub instance_count: u32,
    pub indexed: bool,
}

impl DrawCall {
    /// 索引绘制
    pub fn indexed(mesh: GpuHandle, index_count: u32) -> Self {
        Self { mesh, element_count: index_count, instance_count: 1, indexed: true }
    }

    /// 非索引绘制
    pub fn vertices(mesh: GpuHandle, vertex_count: u32, instance_count: u32) -> Self {
        Self { mesh, element_count: vertex_count, instance_count, indexed: false }
    }
}

/// 渲染 Pass 描述
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    pub name: String,
    pub target: PassTarget,
    /// 采样的资源（按着色器寄存器 t0, t1, ... 顺序）
    pub inputs: Vec<GpuHandle>,
    pub pipeline: GpuHandle,
    /// 清除颜色，`None` 表示不清除
    pub clear_color: Option<[f32; 4]>,
    /// 是否使用深度缓冲（绑定并清除）
    pub use_depth: bool,
    /// 是否绑定每帧常量
    pub bind_constants: bool,
    pub draws: Vec<DrawCall>,
}

impl RenderPassDesc {
    pub fn new(name: impl Into<String>, target: PassTarget, pipeline: GpuHandle) -> Self {
        Self {
            name: name.into(),
            target,
            inputs: Vec::new(),
            pipeline,
            clear_color: None,
            use_depth: false,
            bind_constants: true,
            draws: Vec::new(),
        }
    }

    /// 采样指定资源
    pub fn reads(mut self, inputs: &[GpuHandle]) -> Self {
        self.inputs.extend_from_slice(inputs);
        self
    }

    pub fn clear(mut self, color: [f32; 4]) -> Self {
        self.clear_color = Some(color);
        self
    }

    pub fn with_depth(mut self) -> Self {
        self.use_depth = true;
        self
    }

    pub fn without_constants(mut self) -> Self {
        self.bind_constants = false;
        self
    }

    pub fn draw(mut self, draw: DrawCall) -> Self {
        self.draws.push(draw);
        self
    }

    /// 离屏目标句柄
    pub fn offscreen_target(&self) -> Option<GpuHandle> {
        match self.target {
            PassTarget::Offscreen(handle) => Some(handle),
            PassTarget::BackBuffer => None,
        }
    }
}

/// 经过校验的 pass 序列
#[derive(Debug, Clone)]
pub struct PassGraph {
    passes: Vec<RenderPassDesc>,
    /// 第 i 个 pass 的输出是否被后续 pass 读取
    consumed: Vec<bool>,
    dead_outputs: Vec<usize>,
}

impl PassGraph {
    /// 校验并创建 pass 序列
    pub fn new(passes: Vec<RenderPassDesc>) -> Result<Self> {
        let last = match passes.len() {
            0 => return Err(PassError::Empty.into()),
            n => n - 1,
        };

        for (index, pass) in passes.iter().enumerate() {
            match pass.target {
                PassTarget::BackBuffer if index != last => {
                    return Err(PassError::EarlyBackBufferWrite(pass.name.clone()).into());
                }
                PassTarget::Offscreen(_) if index == last => {
                    return Err(PassError::FinalPassOffscreen(pass.name.clone()).into());
                }
                PassTarget::Offscreen(handle) => {
                    handle.expect_kind(HandleKind::RenderTarget)?;
                    if passes[..index].iter().any(|p| p.offscreen_target() == Some(handle)) {
                        return Err(PassError::DuplicateTarget(pass.name.clone()).into());
                    }
                }
                PassTarget::BackBuffer => {}
            }

            pass.pipeline.expect_kind(HandleKind::Pipeline)?;
            for draw in &pass.draws {
                draw.mesh.expect_kind(HandleKind::Mesh)?;
            }

            for input in &pass.inputs {
                if !input.kind().is_sampleable() {
                    return Err(GraphicsError::InvalidHandle(format!(
                        "pass '{}' samples {}, which is not a texture",
                        pass.name, input
                    ))
                    .into());
                }
                if input.kind() != HandleKind::RenderTarget {
                    continue;
                }
                if pass.offscreen_target() == Some(*input) {
                    return Err(PassError::ReadsOwnTarget(pass.name.clone()).into());
                }
                let produced = passes[..index]
                    .iter()
                    .any(|p| p.offscreen_target() == Some(*input));
                if !produced {
                    return Err(PassError::InputNotProduced {
                        pass: pass.name.clone(),
                        input: input.to_string(),
                    }
                    .into());
                }
            }
        }

        let consumed: Vec<bool> = passes
            .iter()
            .enumerate()
            .map(|(index, pass)| match pass.offscreen_target() {
                Some(target) => passes[index + 1..].iter().any(|p| p.inputs.contains(&target)),
                None => false,
            })
            .collect();

        let dead_outputs: Vec<usize> = passes
            .iter()
            .enumerate()
            .filter(|(index, pass)| pass.offscreen_target().is_some() && !consumed[*index])
            .map(|(index, _)| index)
            .collect();

        for &index in &dead_outputs {
            warn!(
                pass = index,
                "Output of pass '{}' is never sampled; it still runs every frame",
                passes[index].name
            );
        }

        debug!(passes = passes.len(), "Pass graph validated");
        Ok(Self { passes, consumed, dead_outputs })
    }

    /// 所有 pass（声明顺序）
    pub fn passes(&self) -> &[RenderPassDesc] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// 第 `index` 个 pass 的输出是否被后续 pass 采样
    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed.get(index).copied().unwrap_or(false)
    }

    /// 输出从未被读取的 pass 索引
    pub fn dead_outputs(&self) -> &[usize] {
        &self.dead_outputs
    }

    /// 被采样的离屏目标（按产生顺序）
    pub fn sampled_targets(&self) -> Vec<GpuHandle> {
        self.passes
            .iter()
            .enumerate()
            .filter(|(index, _)| self.consumed[*index])
            .filter_map(|(_, pass)| pass.offscreen_target())
            .collect()
    }

    /// 所有离屏目标
    pub fn offscreen_targets(&self) -> Vec<GpuHandle> {
        self.passes.iter().filter_map(|p| p.offscreen_target()).collect()
    }

    /// 所有静态纹理输入（去重）
    pub fn static_textures(&self) -> Vec<GpuHandle> {
        let mut textures: Vec<GpuHandle> = Vec::new();
        for input in self.passes.iter().flat_map(|p| p.inputs.iter()) {
            if input.kind() == HandleKind::Texture && !textures.contains(input) {
                textures.push(*input);
            }
        }
        textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RenderError;
    use crate::renderer::descriptor::DescriptorTable;

    struct Handles {
        front: GpuHandle,
        back: GpuHandle,
        texture: GpuHandle,
        pipeline: GpuHandle,
        mesh: GpuHandle,
    }

    fn handles() -> Handles {
        let mut table = DescriptorTable::new(16);
        Handles {
            front: table.allocate(HandleKind::RenderTarget, ()).unwrap(),
            back: table.allocate(HandleKind::RenderTarget, ()).unwrap(),
            texture: table.allocate(HandleKind::Texture, ()).unwrap(),
            pipeline: table.allocate(HandleKind::Pipeline, ()).unwrap(),
            mesh: table.allocate(HandleKind::Mesh, ()).unwrap(),
        }
    }

    fn fog_passes(h: &Handles) -> Vec<RenderPassDesc> {
        vec![
            RenderPassDesc::new("front", PassTarget::Offscreen(h.front), h.pipeline)
                .with_depth()
                .draw(DrawCall::indexed(h.mesh, 36)),
            RenderPassDesc::new("back", PassTarget::Offscreen(h.back), h.pipeline)
                .with_depth()
                .draw(DrawCall::indexed(h.mesh, 36)),
            RenderPassDesc::new("composite", PassTarget::BackBuffer, h.pipeline)
                .reads(&[h.front, h.back])
                .draw(DrawCall::vertices(h.mesh, 4, 2)),
        ]
    }

    #[test]
    fn test_valid_graph() {
        let h = handles();
        let graph = PassGraph::new(fog_passes(&h)).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.is_consumed(0));
        assert!(graph.is_consumed(1));
        assert!(!graph.is_consumed(2));
        assert!(graph.dead_outputs().is_empty());
        assert_eq!(graph.sampled_targets(), vec![h.front, h.back]);
    }

    #[test]
    fn test_reading_a_later_output_is_rejected() {
        let h = handles();
        let mut passes = fog_passes(&h);
        // 第一个 pass 读取第二个 pass 的输出
        passes[0].inputs.push(h.back);
        let err = PassGraph::new(passes).unwrap_err();
        assert!(matches!(err, RenderError::Pass(PassError::InputNotProduced { .. })));
    }

    #[test]
    fn test_reading_own_target_is_rejected() {
        let h = handles();
        let mut passes = fog_passes(&h);
        passes[1].inputs.push(h.back);
        let err = PassGraph::new(passes).unwrap_err();
        assert!(matches!(err, RenderError::Pass(PassError::ReadsOwnTarget(_))));
    }

    #[test]
    fn test_final_pass_must_target_back_buffer() {
        let h = handles();
        let mut passes = fog_passes(&h);
        passes.pop();
        let err = PassGraph::new(passes).unwrap_err();
        assert!(matches!(err, RenderError::Pass(PassError::FinalPassOffscreen(_))));
    }

    #[test]
    fn test_only_final_pass_writes_back_buffer() {
        let h = handles();
        let mut passes = fog_passes(&h);
        passes[0].target = PassTarget::BackBuffer;
        let err = PassGraph::new(passes).unwrap_err();
        assert!(matches!(err, RenderError::Pass(PassError::EarlyBackBufferWrite(_))));
    }

    #[test]
    fn test_duplicate_target_is_rejected() {
        let h = handles();
        let mut passes = fog_passes(&h);
        passes[1].target = PassTarget::Offscreen(h.front);
        let err = PassGraph::new(passes).unwrap_err();
        assert!(matches!(err, RenderError::Pass(PassError::DuplicateTarget(_))));
    }

    #[test]
    fn test_empty_graph() {
        assert!(matches!(
            PassGraph::new(Vec::new()).unwrap_err(),
            RenderError::Pass(PassError::Empty)
        ));
    }

    #[test]
    fn test_dead_output_is_kept() {
        let h = handles();
        let mut passes = fog_passes(&h);
        passes[2].inputs = vec![h.front];
        let graph = PassGraph::new(passes).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.dead_outputs(), &[1]);
        assert_eq!(graph.sampled_targets(), vec![h.front]);
    }

    #[test]
    fn test_static_texture_input() {
        let h = handles();
        let passes = vec![
            RenderPassDesc::new("scene", PassTarget::Offscreen(h.front), h.pipeline)
                .reads(&[h.texture])
                .draw(DrawCall::vertices(h.mesh, 6, 1)),
            RenderPassDesc::new("present", PassTarget::BackBuffer, h.pipeline)
                .reads(&[h.front])
                .draw(DrawCall::vertices(h.mesh, 4, 2)),
        ];
        let graph = PassGraph::new(passes).unwrap();
        assert_eq!(graph.static_textures(), vec![h.texture]);
    }

    #[test]
    fn test_non_texture_input_is_rejected() {
        let h = handles();
        let mut passes = fog_passes(&h);
        passes[2].inputs.push(h.mesh);
        let err = PassGraph::new(passes).unwrap_err();
        assert!(matches!(err, RenderError::Graphics(GraphicsError::InvalidHandle(_))));
    }
}

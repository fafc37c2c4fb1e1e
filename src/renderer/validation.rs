//! 命令列表校验
//!
//! 在提交前模拟一遍资源状态，拒绝以下记录：
//!
//! - 屏障的 `before` 与资源当前状态不一致，或 `before == after`
//! - 以非 `RENDER_TARGET` 状态清除 / 绑定颜色目标，以非 `DEPTH_WRITE` 状态使用深度缓冲
//! - 采样不处于 `PIXEL_SHADER_RESOURCE` 状态的资源（即读取了尚未完成写→读切换的目标）
//! - 在 pass 之外绘制，或绘制前缺少目标 / 管线 / 网格
//! - 引用了没有初始状态的资源
//!
//! [`validate_frame`] 额外要求帧结束时每个资源回到初始状态。

use std::collections::HashMap;

use crate::core::error::{GraphicsError, Result};

use super::command::Command;
use super::descriptor::GpuHandle;
use super::resource::ResourceState;

/// 资源状态表
pub type StateMap = HashMap<GpuHandle, ResourceState>;

#[derive(Default)]
struct Bindings {
    color: Option<GpuHandle>,
    depth: Option<GpuHandle>,
    inputs: Vec<GpuHandle>,
    pipeline: bool,
    mesh: bool,
}

struct Validator {
    states: StateMap,
    bindings: Bindings,
    in_pass: Option<String>,
}

impl Validator {
    fn fail(&self, at: usize, reason: String) -> crate::core::error::RenderError {
        let context = match &self.in_pass {
            Some(pass) => format!("command {} in pass '{}'", at, pass),
            None => format!("command {}", at),
        };
        GraphicsError::InvalidCommand(format!("{}: {}", context, reason)).into()
    }

    fn state_of(&self, at: usize, resource: GpuHandle) -> Result<ResourceState> {
        self.states
            .get(&resource)
            .copied()
            .ok_or_else(|| self.fail(at, format!("{} has no tracked state", resource)))
    }

    fn require(&self, at: usize, resource: GpuHandle, expected: ResourceState, usage: &str) -> Result<()> {
        let actual = self.state_of(at, resource)?;
        if actual != expected {
            return Err(self.fail(
                at,
                format!(
                    "{} {} requires {} but it is in {}",
                    usage,
                    resource,
                    expected.name(),
                    actual.name()
                ),
            ));
        }
        Ok(())
    }

    fn step(&mut self, at: usize, command: &Command) -> Result<()> {
        match command {
            Command::BeginPass { name, .. } => {
                self.in_pass = Some(name.clone());
                self.bindings = Bindings::default();
            }
            Command::EndPass => {
                self.in_pass = None;
            }
            Command::SetViewport(_) | Command::SetScissor(_) | Command::SetConstants(_) => {}
            Command::Barrier(barrier) => {
                if barrier.before == barrier.after {
                    return Err(self.fail(
                        at,
                        format!("barrier on {} does not change state", barrier.resource),
                    ));
                }
                self.require(at, barrier.resource, barrier.before, "barrier on")?;
                self.states.insert(barrier.resource, barrier.after);
            }
            Command::ClearColor { target, .. } => {
                self.require(at, *target, ResourceState::RenderTarget, "clearing")?;
            }
            Command::ClearDepth { target, .. } => {
                self.require(at, *target, ResourceState::DepthWrite, "clearing")?;
            }
            Command::SetRenderTarget { color, depth } => {
                if !color.kind().is_color_target() {
                    return Err(self.fail(at, format!("{} cannot be bound as a color target", color)));
                }
                self.require(at, *color, ResourceState::RenderTarget, "binding")?;
                if let Some(depth) = depth {
                    self.require(at, *depth, ResourceState::DepthWrite, "binding")?;
                }
                self.bindings.color = Some(*color);
                self.bindings.depth = *depth;
            }
            Command::SetPipeline(_) => self.bindings.pipeline = true,
            Command::SetMesh(_) => self.bindings.mesh = true,
            Command::SetShaderInputs(inputs) => {
                for input in inputs {
                    if !input.kind().is_sampleable() {
                        return Err(self.fail(at, format!("{} cannot be sampled", input)));
                    }
                    self.require(at, *input, ResourceState::ShaderResource, "sampling")?;
                }
                self.bindings.inputs = inputs.clone();
            }
            Command::Draw { .. } | Command::DrawIndexed { .. } => {
                if self.in_pass.is_none() {
                    return Err(self.fail(at, "draw outside of a pass".to_string()));
                }
                let color = self
                    .bindings
                    .color
                    .ok_or_else(|| self.fail(at, "draw without a render target".to_string()))?;
                if !self.bindings.pipeline {
                    return Err(self.fail(at, "draw without a pipeline".to_string()));
                }
                if !self.bindings.mesh {
                    return Err(self.fail(at, "draw without a mesh".to_string()));
                }
                // 绑定之后记录的屏障可能已经改变了状态
                self.require(at, color, ResourceState::RenderTarget, "drawing to")?;
                if let Some(depth) = self.bindings.depth {
                    self.require(at, depth, ResourceState::DepthWrite, "drawing with")?;
                }
                for input in &self.bindings.inputs {
                    self.require(at, *input, ResourceState::ShaderResource, "sampling")?;
                }
            }
        }
        Ok(())
    }
}

/// 校验命令序列，返回结束时的资源状态
pub fn validate_commands(commands: &[Command], initial: &StateMap) -> Result<StateMap> {
    let mut validator = Validator {
        states: initial.clone(),
        bindings: Bindings::default(),
        in_pass: None,
    };

    for (at, command) in commands.iter().enumerate() {
        validator.step(at, command)?;
    }

    if let Some(pass) = &validator.in_pass {
        return Err(GraphicsError::InvalidCommand(format!("pass '{}' is never closed", pass)).into());
    }

    Ok(validator.states)
}

/// 校验一整帧：除 [`validate_commands`] 的规则外，要求所有资源回到初始状态
pub fn validate_frame(commands: &[Command], initial: &StateMap) -> Result<()> {
    let finals = validate_commands(commands, initial)?;
    for (resource, state) in initial {
        let end = finals.get(resource).copied().unwrap_or(*state);
        if end != *state {
            return Err(GraphicsError::InvalidCommand(format!(
                "frame leaves {} in {} instead of {}",
                resource,
                end.name(),
                state.name()
            ))
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RenderError;
    use crate::renderer::command::CommandList;
    use crate::renderer::descriptor::{DescriptorTable, HandleKind};

    struct Fixture {
        target: GpuHandle,
        back_buffer: GpuHandle,
        depth: GpuHandle,
        pipeline: GpuHandle,
        mesh: GpuHandle,
        initial: StateMap,
    }

    fn fixture() -> Fixture {
        let mut table = DescriptorTable::new(8);
        let target = table.allocate(HandleKind::RenderTarget, ()).unwrap();
        let back_buffer = table.allocate(HandleKind::BackBuffer, ()).unwrap();
        let depth = table.allocate(HandleKind::DepthStencil, ()).unwrap();
        let pipeline = table.allocate(HandleKind::Pipeline, ()).unwrap();
        let mesh = table.allocate(HandleKind::Mesh, ()).unwrap();

        let mut initial = StateMap::new();
        initial.insert(target, ResourceState::RenderTarget);
        initial.insert(back_buffer, ResourceState::Present);
        initial.insert(depth, ResourceState::DepthWrite);

        Fixture { target, back_buffer, depth, pipeline, mesh, initial }
    }

    /// 正确的两 pass 帧；`late_barrier` 为真时把写→读屏障放到读取之后
    fn two_pass_frame(f: &Fixture, late_barrier: bool) -> CommandList {
        let mut list = CommandList::new();
        list.begin().unwrap();

        list.begin_pass(0, "scene").unwrap();
        list.clear_color(f.target, [0.0; 4]).unwrap();
        list.clear_depth(f.depth, 1.0, 0).unwrap();
        list.set_render_target(f.target, Some(f.depth)).unwrap();
        list.set_pipeline(f.pipeline).unwrap();
        list.set_mesh(f.mesh).unwrap();
        list.draw_indexed(36, 1).unwrap();
        if !late_barrier {
            list.barrier(f.target, ResourceState::RenderTarget, ResourceState::ShaderResource).unwrap();
        }
        list.end_pass().unwrap();

        list.begin_pass(1, "present").unwrap();
        list.barrier(f.back_buffer, ResourceState::Present, ResourceState::RenderTarget).unwrap();
        list.clear_color(f.back_buffer, [0.0, 0.125, 0.3, 1.0]).unwrap();
        list.set_render_target(f.back_buffer, None).unwrap();
        list.set_pipeline(f.pipeline).unwrap();
        list.set_shader_inputs(&[f.target]).unwrap();
        list.set_mesh(f.mesh).unwrap();
        list.draw(4, 2).unwrap();
        if late_barrier {
            list.barrier(f.target, ResourceState::RenderTarget, ResourceState::ShaderResource).unwrap();
        }
        list.barrier(f.target, ResourceState::ShaderResource, ResourceState::RenderTarget).unwrap();
        list.barrier(f.back_buffer, ResourceState::RenderTarget, ResourceState::Present).unwrap();
        list.end_pass().unwrap();

        list.end().unwrap();
        list
    }

    #[test]
    fn test_rejects_wrong_handle_kinds() {
        let f = fixture();

        let mut list = CommandList::new();
        list.begin().unwrap();
        list.set_render_target(f.depth, None).unwrap();
        list.end().unwrap();
        let err = validate_commands(list.commands(), &f.initial).unwrap_err();
        assert!(err.to_string().contains("color target"));

        let mut list = CommandList::new();
        list.begin().unwrap();
        list.set_shader_inputs(&[f.mesh]).unwrap();
        list.end().unwrap();
        let err = validate_commands(list.commands(), &f.initial).unwrap_err();
        assert!(err.to_string().contains("cannot be sampled"));
    }

    #[test]
    fn test_valid_frame() {
        let f = fixture();
        let list = two_pass_frame(&f, false);
        validate_frame(list.commands(), &f.initial).unwrap();
    }

    #[test]
    fn test_sampling_before_barrier_is_rejected() {
        let f = fixture();
        let list = two_pass_frame(&f, true);
        let err = validate_frame(list.commands(), &f.initial).unwrap_err();
        assert!(matches!(err, RenderError::Graphics(GraphicsError::InvalidCommand(_))));
        assert!(err.to_string().contains("sampling"));
    }

    #[test]
    fn test_barrier_before_mismatch_is_rejected() {
        let f = fixture();
        let mut list = CommandList::new();
        list.begin().unwrap();
        // 后备缓冲区初始为 PRESENT
        list.barrier(f.back_buffer, ResourceState::RenderTarget, ResourceState::Present).unwrap();
        list.end().unwrap();
        assert!(validate_commands(list.commands(), &f.initial).is_err());
    }

    #[test]
    fn test_frame_must_close_states() {
        let f = fixture();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.barrier(f.back_buffer, ResourceState::Present, ResourceState::RenderTarget).unwrap();
        list.end().unwrap();

        assert!(validate_commands(list.commands(), &f.initial).is_ok());
        let err = validate_frame(list.commands(), &f.initial).unwrap_err();
        assert!(err.to_string().contains("PRESENT"));
    }

    #[test]
    fn test_writing_back_buffer_in_present_state_is_rejected() {
        let f = fixture();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.begin_pass(0, "present").unwrap();
        list.clear_color(f.back_buffer, [0.0; 4]).unwrap();
        list.end_pass().unwrap();
        list.end().unwrap();
        assert!(validate_commands(list.commands(), &f.initial).is_err());
    }

    #[test]
    fn test_draw_requires_bindings() {
        let f = fixture();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.begin_pass(0, "scene").unwrap();
        list.set_render_target(f.target, None).unwrap();
        list.draw(3, 1).unwrap();
        list.end_pass().unwrap();
        list.end().unwrap();
        let err = validate_commands(list.commands(), &f.initial).unwrap_err();
        assert!(err.to_string().contains("pipeline"));
    }

    #[test]
    fn test_untracked_resource_is_rejected() {
        let f = fixture();
        let mut initial = f.initial.clone();
        initial.remove(&f.depth);
        let list = two_pass_frame(&f, false);
        assert!(validate_commands(list.commands(), &initial).is_err());
    }
}

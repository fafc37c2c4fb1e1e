//! 命令列表模块
//!
//! 渲染器每帧把绘制工作记录成一个与图形 API 无关的 [`CommandList`]，
//! 由设备翻译成原生命令后作为一个批次提交。记录阶段用状态机保证
//! begin / end 与 pass 边界的配对。
//!
//! # 命令类别
//!
//! - **状态**：视口、裁剪矩形、渲染目标、管线、常量、着色器输入、网格
//! - **清除**：颜色 / 深度
//! - **屏障**：资源状态切换，`before` 必须等于资源当前状态
//! - **绘制**：非索引 / 索引绘制
//! - **标记**：pass 开始 / 结束，用于校验和调试

use crate::core::error::{GraphicsError, Result};

use super::descriptor::GpuHandle;
use super::resource::ResourceState;

/// 视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// 覆盖整个客户区的视口
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 裁剪矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScissorRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self { left: 0, top: 0, right: width as i32, bottom: height as i32 }
    }
}

/// 资源状态屏障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBarrier {
    pub resource: GpuHandle,
    pub before: ResourceState,
    pub after: ResourceState,
}

/// 一条记录的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginPass { index: usize, name: String },
    EndPass,
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    Barrier(ResourceBarrier),
    ClearColor { target: GpuHandle, color: [f32; 4] },
    ClearDepth { target: GpuHandle, depth: f32, stencil: u8 },
    SetRenderTarget { color: GpuHandle, depth: Option<GpuHandle> },
    SetPipeline(GpuHandle),
    SetConstants(GpuHandle),
    SetShaderInputs(Vec<GpuHandle>),
    SetMesh(GpuHandle),
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
}

/// 命令列表状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    /// 初始状态
    Initial,
    /// 正在记录
    Recording,
    /// 已关闭，可以提交
    Executable,
}

/// 命令列表
///
/// ```
/// use fog_render::renderer::command::CommandList;
///
/// let mut list = CommandList::new();
/// list.begin().unwrap();
/// list.begin_pass(0, "scene").unwrap();
/// list.end_pass().unwrap();
/// list.end().unwrap();
/// assert_eq!(list.commands().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CommandList {
    state: CommandListState,
    current_pass: Option<usize>,
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self {
            state: CommandListState::Initial,
            current_pass: None,
            commands: Vec::new(),
        }
    }

    /// 开始记录命令，丢弃之前记录的内容
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            CommandListState::Initial | CommandListState::Executable => {
                self.commands.clear();
                self.current_pass = None;
                self.state = CommandListState::Recording;
                Ok(())
            }
            CommandListState::Recording => Err(GraphicsError::CommandExecution(
                "Command list is already recording".to_string(),
            )
            .into()),
        }
    }

    /// 结束记录命令
    pub fn end(&mut self) -> Result<()> {
        self.ensure_recording("end")?;
        if let Some(pass) = self.current_pass {
            return Err(GraphicsError::CommandExecution(format!(
                "Pass {} is still open",
                pass
            ))
            .into());
        }
        self.state = CommandListState::Executable;
        Ok(())
    }

    /// 开始一个 pass
    pub fn begin_pass(&mut self, index: usize, name: &str) -> Result<()> {
        self.ensure_recording("begin_pass")?;
        if let Some(open) = self.current_pass {
            return Err(GraphicsError::CommandExecution(format!(
                "Cannot begin pass {} while pass {} is open",
                index, open
            ))
            .into());
        }
        self.current_pass = Some(index);
        self.commands.push(Command::BeginPass { index, name: name.to_string() });
        Ok(())
    }

    /// 结束当前 pass
    pub fn end_pass(&mut self) -> Result<()> {
        self.ensure_recording("end_pass")?;
        if self.current_pass.take().is_none() {
            return Err(GraphicsError::CommandExecution("No pass is open".to_string()).into());
        }
        self.commands.push(Command::EndPass);
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(Command::SetViewport(viewport))
    }

    pub fn set_scissor(&mut self, rect: ScissorRect) -> Result<()> {
        self.record(Command::SetScissor(rect))
    }

    /// 记录资源状态切换
    pub fn barrier(&mut self, resource: GpuHandle, before: ResourceState, after: ResourceState) -> Result<()> {
        self.record(Command::Barrier(ResourceBarrier { resource, before, after }))
    }

    pub fn clear_color(&mut self, target: GpuHandle, color: [f32; 4]) -> Result<()> {
        self.record(Command::ClearColor { target, color })
    }

    pub fn clear_depth(&mut self, target: GpuHandle, depth: f32, stencil: u8) -> Result<()> {
        self.record(Command::ClearDepth { target, depth, stencil })
    }

    pub fn set_render_target(&mut self, color: GpuHandle, depth: Option<GpuHandle>) -> Result<()> {
        self.record(Command::SetRenderTarget { color, depth })
    }

    pub fn set_pipeline(&mut self, pipeline: GpuHandle) -> Result<()> {
        self.record(Command::SetPipeline(pipeline))
    }

    pub fn set_constants(&mut self, buffer: GpuHandle) -> Result<()> {
        self.record(Command::SetConstants(buffer))
    }

    pub fn set_shader_inputs(&mut self, inputs: &[GpuHandle]) -> Result<()> {
        self.record(Command::SetShaderInputs(inputs.to_vec()))
    }

    pub fn set_mesh(&mut self, mesh: GpuHandle) -> Result<()> {
        self.record(Command::SetMesh(mesh))
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.record(Command::Draw { vertex_count, instance_count })
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> Result<()> {
        self.record(Command::DrawIndexed { index_count, instance_count })
    }

    fn record(&mut self, command: Command) -> Result<()> {
        self.ensure_recording("record")?;
        self.commands.push(command);
        Ok(())
    }

    fn ensure_recording(&self, op: &str) -> Result<()> {
        if self.state != CommandListState::Recording {
            return Err(GraphicsError::CommandExecution(format!(
                "Cannot {} in state {:?}",
                op, self.state
            ))
            .into());
        }
        Ok(())
    }

    /// 获取当前状态
    pub fn state(&self) -> CommandListState {
        self.state
    }

    /// 已记录的命令
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// 已记录的绘制调用数量
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. } | Command::DrawIndexed { .. }))
            .count()
    }

    /// 已记录的屏障
    pub fn barriers(&self) -> impl Iterator<Item = &ResourceBarrier> {
        self.commands.iter().filter_map(|c| match c {
            Command::Barrier(b) => Some(b),
            _ => None,
        })
    }
}

impl Default for CommandList {
    fn default() -> Self {
        Self::new()
    }
}

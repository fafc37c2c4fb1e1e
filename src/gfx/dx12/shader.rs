//! HLSL 编译、根签名与 PSO
//!
//! 所有管线共享一个根签名：
//!
//! | 参数 | 内容 | 可见性 |
//! |------|------|--------|
//! | 0 | 根 CBV `b0` | 全部 |
//! | 1 | SRV 表 `t0` | 像素着色器 |
//! | 2 | SRV 表 `t1` | 像素着色器 |
//!
//! 外加静态采样器 `s0`（线性、Clamp）。

use std::ffi::CString;
use std::mem::ManuallyDrop;

use tracing::debug;
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::pipeline::{PipelineDesc, ShaderSource};

use super::context::DEPTH_FORMAT;
use super::convert;

/// 像素着色器最多可采样的纹理数
pub const MAX_SHADER_INPUTS: usize = 2;

/// 根参数索引
pub const ROOT_CONSTANTS: u32 = 0;
pub const ROOT_FIRST_INPUT: u32 = 1;

/// 编译一个着色器阶段
pub fn compile(source: &ShaderSource) -> Result<ID3DBlob> {
    let hlsl = std::fs::read_to_string(&source.path).map_err(|e| {
        GraphicsError::ShaderCompilation(format!("{}: {}", source.path.display(), e))
    })?;
    let entry = CString::new(source.entry_point.as_str())
        .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?;
    let profile = CString::new(source.profile.as_str())
        .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?;

    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        0
    };

    let mut blob: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let result = unsafe {
        D3DCompile(
            hlsl.as_ptr() as _,
            hlsl.len(),
            None,
            None,
            None,
            PCSTR(entry.as_ptr() as *const u8),
            PCSTR(profile.as_ptr() as *const u8),
            flags,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };

    if let Err(e) = result {
        let message = errors
            .map(|blob| unsafe { blob_text(&blob) })
            .unwrap_or_else(|| e.to_string());
        return Err(GraphicsError::ShaderCompilation(format!(
            "{} ({} {}): {}",
            source.path.display(),
            source.entry_point,
            source.profile,
            message
        ))
        .into());
    }

    debug!(path = %source.path.display(), entry = %source.entry_point, "Shader compiled");
    blob.ok_or_else(|| GraphicsError::ShaderCompilation("compiler returned no bytecode".to_string()).into())
}

unsafe fn blob_text(blob: &ID3DBlob) -> String {
    let bytes = std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize());
    String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()
}

unsafe fn bytecode(blob: &ID3DBlob) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: blob.GetBufferPointer(),
        BytecodeLength: blob.GetBufferSize(),
    }
}

/// 创建共享根签名
pub fn create_root_signature(device: &ID3D12Device) -> Result<ID3D12RootSignature> {
    let ranges: Vec<D3D12_DESCRIPTOR_RANGE> = (0..MAX_SHADER_INPUTS as u32)
        .map(|register| D3D12_DESCRIPTOR_RANGE {
            RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
            NumDescriptors: 1,
            BaseShaderRegister: register,
            RegisterSpace: 0,
            OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
        })
        .collect();

    let mut parameters = vec![D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            Descriptor: D3D12_ROOT_DESCRIPTOR { ShaderRegister: 0, RegisterSpace: 0 },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }];
    for range in &ranges {
        parameters.push(D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                    NumDescriptorRanges: 1,
                    pDescriptorRanges: range,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
        });
    }

    let sampler = D3D12_STATIC_SAMPLER_DESC {
        Filter: D3D12_FILTER_MIN_MAG_MIP_LINEAR,
        AddressU: D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
        AddressV: D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
        AddressW: D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
        MipLODBias: 0.0,
        MaxAnisotropy: 1,
        ComparisonFunc: D3D12_COMPARISON_FUNC_ALWAYS,
        BorderColor: D3D12_STATIC_BORDER_COLOR_OPAQUE_BLACK,
        MinLOD: 0.0,
        MaxLOD: D3D12_FLOAT32_MAX,
        ShaderRegister: 0,
        RegisterSpace: 0,
        ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
    };

    let desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: parameters.len() as u32,
        pParameters: parameters.as_ptr(),
        NumStaticSamplers: 1,
        pStaticSamplers: &sampler,
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    unsafe {
        let mut signature: Option<ID3DBlob> = None;
        let mut errors: Option<ID3DBlob> = None;
        if let Err(e) = D3D12SerializeRootSignature(&desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut signature, Some(&mut errors)) {
            let message = errors.map(|blob| blob_text(&blob)).unwrap_or_else(|| e.to_string());
            return Err(GraphicsError::ResourceCreation(format!("root signature: {}", message)).into());
        }
        let signature = signature
            .ok_or_else(|| GraphicsError::ResourceCreation("root signature blob missing".to_string()))?;
        let bytes = std::slice::from_raw_parts(signature.GetBufferPointer() as *const u8, signature.GetBufferSize());
        device
            .CreateRootSignature(0, bytes)
            .map_err(|e| GraphicsError::ResourceCreation(format!("root signature: {}", e)).into())
    }
}

/// 编译着色器并创建 PSO
pub fn create_pipeline_state(
    device: &ID3D12Device,
    root_signature: &ID3D12RootSignature,
    desc: &PipelineDesc,
) -> Result<ID3D12PipelineState> {
    let vs = compile(&desc.vertex_shader)?;
    let ps = compile(&desc.pixel_shader)?;
    let elements = convert::input_elements(desc.vertex_layout);

    let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        pRootSignature: ManuallyDrop::new(Some(root_signature.clone())),
        VS: unsafe { bytecode(&vs) },
        PS: unsafe { bytecode(&ps) },
        BlendState: convert::blend_desc(desc.blend_mode),
        SampleMask: u32::MAX,
        RasterizerState: D3D12_RASTERIZER_DESC {
            FillMode: D3D12_FILL_MODE_SOLID,
            CullMode: convert::cull_mode(desc.cull_mode),
            DepthClipEnable: true.into(),
            ..Default::default()
        },
        DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: desc.depth_enabled.into(),
            DepthWriteMask: if desc.depth_enabled {
                D3D12_DEPTH_WRITE_MASK_ALL
            } else {
                D3D12_DEPTH_WRITE_MASK_ZERO
            },
            DepthFunc: D3D12_COMPARISON_FUNC_LESS,
            StencilEnable: false.into(),
            ..Default::default()
        },
        InputLayout: D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: elements.as_ptr(),
            NumElements: elements.len() as u32,
        },
        PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
        NumRenderTargets: 1,
        DSVFormat: DEPTH_FORMAT,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        ..Default::default()
    };
    pso_desc.RTVFormats[0] = convert::texture_format(desc.target_format);

    let result = unsafe { device.CreateGraphicsPipelineState(&pso_desc) };
    // 释放描述里持有的根签名引用
    unsafe { ManuallyDrop::drop(&mut pso_desc.pRootSignature) };

    result.map_err(|e| GraphicsError::ResourceCreation(format!("PSO '{}': {}", desc.name, e)).into())
}

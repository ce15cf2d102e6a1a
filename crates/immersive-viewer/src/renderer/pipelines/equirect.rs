use super::mesh_bind_group_layout;
use projmesh::EquirectVertex;

const EQUIRECT_WGSL: &str = r#"
struct MeshUniform {
    view_proj: mat4x4<f32>,
    eye: u32,
};

@group(0) @binding(0) var<uniform> u: MeshUniform;
@group(0) @binding(1) var frame_tex: texture_2d<f32>;
@group(0) @binding(2) var frame_smp: sampler;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) uv_left: vec2<f32>,
    @location(2) uv_right: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(v: VsIn) -> VsOut {
    var out: VsOut;
    out.clip = u.view_proj * vec4<f32>(v.position, 1.0);
    out.uv = select(v.uv_left, v.uv_right, u.eye == 1u);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(frame_tex, frame_smp, in.uv);
}
"#;

/// Sphere patch drawn as one triangle strip, viewed from the inside.
pub struct EquirectPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub mesh_layout: wgpu::BindGroupLayout,
}

impl EquirectPipeline {
    pub fn new(device: &wgpu::Device, color_fmt: wgpu::TextureFormat) -> Self {
        let mesh_layout =
            mesh_bind_group_layout(device, "Equirect Mesh Layout", wgpu::TextureViewDimension::D2);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Equirect WGSL"),
            source: wgpu::ShaderSource::Wgsl(EQUIRECT_WGSL.into()),
        });

        // position (vec3) + left uv (vec2) + right uv (vec2)
        let vbuf_layouts = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<EquirectVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    shader_location: 1,
                    offset: 12,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    shader_location: 2,
                    offset: 20,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Equirect PipelineLayout"),
            bind_group_layouts: &[&mesh_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Equirect Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                // Seam degenerates flip winding; draw both sides.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            mesh_layout,
        }
    }
}

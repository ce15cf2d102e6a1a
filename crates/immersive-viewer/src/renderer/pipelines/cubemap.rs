use super::mesh_bind_group_layout;
use projmesh::CubeVertex;

// Depth is forced to the far plane (xyww) so the cube reads as a skybox
// regardless of its scale.
const CUBEMAP_WGSL: &str = r#"
struct MeshUniform {
    view_proj: mat4x4<f32>,
    eye: u32,
};

@group(0) @binding(0) var<uniform> u: MeshUniform;
@group(0) @binding(1) var cube_tex: texture_cube<f32>;
@group(0) @binding(2) var cube_smp: sampler;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) sampling: vec3<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) dir: vec3<f32>,
};

@vertex
fn vs_main(v: VsIn) -> VsOut {
    var out: VsOut;
    let clip = u.view_proj * vec4<f32>(v.position, 1.0);
    out.clip = clip.xyww;
    out.dir = v.sampling;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(cube_tex, cube_smp, in.dir);
}
"#;

pub struct CubemapPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub mesh_layout: wgpu::BindGroupLayout,
}

impl CubemapPipeline {
    pub fn new(device: &wgpu::Device, color_fmt: wgpu::TextureFormat) -> Self {
        let mesh_layout =
            mesh_bind_group_layout(device, "Cubemap Mesh Layout", wgpu::TextureViewDimension::Cube);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cubemap WGSL"),
            source: wgpu::ShaderSource::Wgsl(CUBEMAP_WGSL.into()),
        });

        let vbuf_layouts = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CubeVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Rasterised position
                wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Sampling direction, rewritten by face correction
                wgpu::VertexAttribute {
                    shader_location: 1,
                    offset: 12,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cubemap PipelineLayout"),
            bind_group_layouts: &[&mesh_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cubemap Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
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

use std::borrow::Cow;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::projection::{GpuScreenPoint, ProjectionInput, ScreenPoint};
use crate::stage::{BackendError, Completion, ProjectionBackend, ProjectionBatch};
use crate::uniforms::GpuUniforms;

const WORKGROUP_SIZE: u32 = 64;

const PROJECTION_SHADER: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    viewport: vec2<f32>,
    elapsed: f32,
    mode: u32,
    camera_lat: f32,
    camera_lon: f32,
    globe_radius: f32,
    point_count: u32,
};

struct Input {
    location: vec2<f32>,
    transform: u32,
    pad: u32,
};

struct Output {
    position: vec2<f32>,
    visible: u32,
    pad: u32,
};

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var<storage, read> inputs: array<Input>;
@group(0) @binding(2) var<storage, read> transforms: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read_write> outputs: array<Output>;

const PI: f32 = 3.141592653589793;

fn to_screen(clip: vec4<f32>, visible: bool) -> Output {
    var out: Output;
    out.pad = 0u;
    if (clip.w == 0.0) {
        out.position = vec2<f32>(0.0, 0.0);
        out.visible = 0u;
        return out;
    }
    let ndc = clip.xy / clip.w;
    out.position = (ndc + vec2<f32>(1.0, 1.0)) * 0.5 * u.viewport;
    out.visible = select(0u, 1u, visible);
    return out;
}

fn project_flat(input: Input) -> Output {
    let base = input.transform * 4u;
    let model = mat4x4<f32>(
        transforms[base],
        transforms[base + 1u],
        transforms[base + 2u],
        transforms[base + 3u],
    );
    let clip = u.projection * u.view * model * vec4<f32>(input.location, 0.0, 1.0);
    return to_screen(clip, clip.w > 0.0);
}

fn project_globe(input: Input) -> Output {
    let tile = transforms[input.transform];
    let uv = tile.xy + input.location * tile.z;
    let lon = uv.x * PI;
    let lat = atan(sinh(uv.y * PI));

    let d_lon = lon - u.camera_lon;
    let x = cos(lat) * sin(d_lon);
    let y = sin(lat);
    let z = cos(lat) * cos(d_lon);
    let c = u.camera_lat;
    let p = vec3<f32>(x, y * cos(c) - z * sin(c), y * sin(c) + z * cos(c));

    let clip = u.projection * u.view * vec4<f32>(p * u.globe_radius, 1.0);
    return to_screen(clip, p.z > 0.0 && clip.w > 0.0);
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= u.point_count) {
        return;
    }
    let input = inputs[i];
    if (u.mode == 1u) {
        outputs[i] = project_globe(input);
    } else {
        outputs[i] = project_flat(input);
    }
}
"#;

struct Pending {
    done: Completion,
    len: usize,
    mapped: Receiver<Result<(), wgpu::BufferAsyncError>>,
}

/// Compute-shader projection with fixed-size buffers and non-blocking readback.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    uniforms: wgpu::Buffer,
    inputs: wgpu::Buffer,
    transforms: wgpu::Buffer,
    outputs: wgpu::Buffer,
    staging: wgpu::Buffer,
    max_points: usize,
    max_transform_words: usize,
    pending: Option<Pending>,
}

impl WgpuBackend {
    /// Creates a backend on its own headless device.
    pub fn headless(max_points: usize, max_transforms: usize) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| BackendError::Device(format!("adapter error: {e}")))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("labels-projection-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            ..Default::default()
        }))
        .map_err(|e| BackendError::Device(format!("device error: {e}")))?;
        Ok(Self::new(device, queue, max_points, max_transforms))
    }

    /// Builds the pipeline and buffers on an existing device.
    ///
    /// The transform buffer is sized for flat mode, which uses four `vec4`
    /// columns per tile.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, max_points: usize, max_transforms: usize) -> Self {
        let max_points = max_points.max(1);
        let max_transform_words = max_transforms.max(1) * 4;
        let point_bytes = (max_points * std::mem::size_of::<GpuScreenPoint>()) as u64;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("labels-projection-shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(PROJECTION_SHADER)),
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("labels-projection-uniforms"),
            size: std::mem::size_of::<GpuUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let inputs = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("labels-projection-inputs"),
            size: (max_points * std::mem::size_of::<ProjectionInput>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let transforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("labels-projection-transforms"),
            size: (max_transform_words * std::mem::size_of::<[f32; 4]>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let outputs = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("labels-projection-outputs"),
            size: point_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("labels-projection-readback"),
            size: point_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("labels-projection-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, false),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("labels-projection-bg"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: inputs.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: transforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: outputs.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("labels-projection-pipeline-layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("labels-projection-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            device,
            queue,
            pipeline,
            bind_group,
            uniforms,
            inputs,
            transforms,
            outputs,
            staging,
            max_points,
            max_transform_words,
            pending: None,
        }
    }

    fn finish_readback(&mut self, pending: Pending) {
        let bytes = (pending.len * std::mem::size_of::<GpuScreenPoint>()) as u64;
        let points: Vec<ScreenPoint> = {
            let mapped = self.staging.slice(..bytes).get_mapped_range();
            let raw: &[GpuScreenPoint] = bytemuck::cast_slice(&mapped);
            raw.iter().copied().map(ScreenPoint::from).collect()
        };
        self.staging.unmap();
        pending.done.complete(points);
    }
}

impl ProjectionBackend for WgpuBackend {
    fn dispatch(&mut self, batch: &ProjectionBatch, done: Completion) -> Result<(), BackendError> {
        if self.pending.is_some() {
            return Err(BackendError::Device("readback still pending".into()));
        }
        let transforms = batch.mode.packed_transforms();
        if batch.len() > self.max_points || transforms.len() > self.max_transform_words {
            return Err(BackendError::Device(format!(
                "batch exceeds device buffers: points={} transform_words={}",
                batch.len(),
                transforms.len()
            )));
        }

        let len = batch.len();
        let gpu_uniforms = GpuUniforms::new(&batch.uniforms, batch.mode.globe_camera(), len as u32);
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&gpu_uniforms));
        self.queue
            .write_buffer(&self.inputs, 0, bytemuck::cast_slice(&batch.inputs));
        if !transforms.is_empty() {
            self.queue
                .write_buffer(&self.transforms, 0, bytemuck::cast_slice(&transforms));
        }

        let bytes = (len * std::mem::size_of::<GpuScreenPoint>()) as u64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("labels-projection-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("labels-projection-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups((len as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&self.outputs, 0, &self.staging, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        self.staging
            .slice(..bytes)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        self.pending = Some(Pending {
            done,
            len,
            mapped: rx,
        });
        Ok(())
    }

    fn pump(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            tracing::warn!(error = %e, "projection device poll failed");
        }
        match pending.mapped.try_recv() {
            Ok(Ok(())) => self.finish_readback(pending),
            Ok(Err(e)) => pending.done.fail(BackendError::Readback(e.to_string())),
            Err(TryRecvError::Empty) => self.pending = Some(pending),
            Err(TryRecvError::Disconnected) => pending.done.fail(BackendError::Disconnected),
        }
    }
}

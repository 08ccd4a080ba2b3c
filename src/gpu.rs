//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu device and queue plus the configuration of the
//! frame target. It is created either from a winit [`Window`] (presenting to a
//! surface) or headless for offscreen rendering and tests.
//!
//! The presentation format is chosen to be non-sRGB when the surface offers one:
//! the lighting shader applies its own gamma encoding.
//!
//! [`Window`]: winit::window::Window

use std::sync::Arc;

use thiserror::Error;
use winit::window::Window;

/// Format used for the frame target when running headless.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Failures while bringing up the GPU.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("GPU ran out of memory while acquiring a frame")]
    OutOfMemory,
}

/// Core GPU context holding wgpu resources.
///
/// All fields are public to allow direct access to wgpu APIs when needed.
pub struct GpuContext {
    /// Presentation surface, absent when running headless.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current frame target configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a GPU context presenting to a winit window.
    pub fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = request_device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        log::info!(
            "GPU ready: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            config.format,
            config.width,
            config.height
        );

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
        })
    }

    /// Create a GPU context without a window. Frames are rendered into
    /// caller-provided textures of [`HEADLESS_FORMAT`].
    pub fn headless(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = request_device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: HEADLESS_FORMAT,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        log::info!(
            "headless GPU ready: {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    /// Resize the frame target.
    ///
    /// Zero-sized dimensions (window minimize) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Acquire the next surface texture.
    ///
    /// Returns `Ok(None)` when this frame should be skipped: the surface was
    /// lost or outdated (it is reconfigured for the next frame), acquisition
    /// timed out, or the context is headless.
    pub fn acquire_frame(&self) -> Result<Option<wgpu::SurfaceTexture>, GpuError> {
        let Some(surface) = &self.surface else {
            return Ok(None);
        };

        match surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                surface.configure(&self.device, &self.config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out acquiring surface texture");
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(GpuError::OutOfMemory),
            Err(e) => {
                log::warn!("failed to acquire surface texture: {e}");
                Ok(None)
            }
        }
    }

    /// Format of the frame target.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current frame target width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current frame target height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    // The G-Buffer writes four 32-bit float attachments per sample, above the
    // default limit, so ask for whatever the adapter supports.
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Lumen Device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: Default::default(),
        trace: Default::default(),
        experimental_features: Default::default(),
    }))?;
    Ok((device, queue))
}

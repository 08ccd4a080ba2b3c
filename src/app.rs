use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::error::{EventLoopError, OsError};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::assets::{Assets, GeometryId, MaterialId, ShaderId, TextureId};
use crate::camera::{Camera, PerspectiveCamera};
use crate::geometry::{GeometryError, VertexData};
use crate::gpu::{GpuContext, GpuError};
use crate::input::{InputEvent, InputQueue};
use crate::light::PointLight;
use crate::material::Material;
use crate::mesh::MeshInstance;
use crate::obj::{ObjError, load_obj};
use crate::orbit_camera::{OrbitConfig, OrbitController};
use crate::plan::FrameStats;
use crate::renderer::DeferredRenderer;
use crate::scene::{LightKey, MeshKey, Scene};
use crate::settings::RenderSettings;
use crate::shader::ShaderSource;
use crate::texture::Texture;

/// Anything that stops the app before or during the frame loop.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] OsError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Obj(#[from] ObjError),
}

/// Context provided during app setup.
pub struct SetupContext<'a> {
    pub gpu: &'a GpuContext,
    pub assets: &'a mut Assets,
    pub renderer: &'a mut DeferredRenderer,
    pub settings: &'a mut RenderSettings,
}

impl SetupContext<'_> {
    // ========================================================================
    // Shaders
    // ========================================================================

    /// The built-in G-Buffer program.
    pub fn geometry_shader(&mut self) -> ShaderId {
        self.renderer.geometry_shader(self.gpu, self.assets)
    }

    /// Compile a custom G-Buffer program from WGSL sources. A failed compile
    /// is logged and the returned handle draws nothing.
    pub fn shader(&mut self, label: &str, vertex: &str, fragment: &str) -> ShaderId {
        let options = self.renderer.geometry_options();
        self.assets
            .add_shader(self.gpu, &ShaderSource::new(label, vertex, fragment), options)
    }

    // ========================================================================
    // Geometry and textures
    // ========================================================================

    pub fn geometry(&mut self, data: &VertexData, label: &str) -> Result<GeometryId, GeometryError> {
        self.assets.upload_geometry(self.gpu, data, label)
    }

    /// Parse an OBJ file and upload it, recentered and scaled to unit size.
    pub fn obj(&mut self, path: impl AsRef<Path>) -> Result<GeometryId, AppError> {
        let path = path.as_ref();
        let mut data = load_obj(path)?.to_vertex_data();
        data.normalize();
        Ok(self.geometry(&data, &path.display().to_string())?)
    }

    pub fn texture(&mut self, texture: Texture) -> TextureId {
        self.assets.add_texture(texture)
    }

    /// Start decoding an image in the background. A placeholder is bound
    /// until it finishes.
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> TextureId {
        self.assets.load_texture(self.gpu, path)
    }

    pub fn material(&mut self, material: Material) -> MaterialId {
        self.assets.add_material(material)
    }

    // ========================================================================
    // Scene
    // ========================================================================

    pub fn add_mesh(&mut self, instance: MeshInstance) -> MeshKey {
        self.renderer.scene.add_mesh(instance)
    }

    pub fn add_light(&mut self, light: PointLight) -> LightKey {
        self.renderer.scene.add_light(light)
    }

    /// Replace the main camera.
    pub fn camera(&mut self, camera: impl Into<Camera>) {
        let mut camera = camera.into();
        camera.resize(self.gpu.width(), self.gpu.height());
        self.renderer.camera = camera;
    }
}

/// Context provided each frame, before rendering.
pub struct Frame<'a> {
    pub gpu: &'a GpuContext,
    pub assets: &'a Assets,
    pub scene: &'a mut Scene,
    pub settings: &'a mut RenderSettings,
    /// Total elapsed time in seconds.
    pub time: f32,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// What the previous frame drew.
    pub stats: FrameStats,
}

impl Frame<'_> {
    /// Current frames per second.
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    pub fn width(&self) -> u32 {
        self.gpu.width()
    }

    pub fn height(&self) -> u32 {
        self.gpu.height()
    }
}

/// Configuration for the app window.
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub settings: RenderSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Lumen".to_string(),
            width: 1280,
            height: 720,
            settings: RenderSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Run a Lumen application with setup and frame closures.
///
/// # Example
/// ```no_run
/// use lumen::*;
///
/// fn main() -> Result<(), AppError> {
///     run(|ctx| {
///         let shader = ctx.geometry_shader();
///         let sphere = ctx.geometry(&VertexData::sphere(32, 16), "Sphere")?;
///         let white = ctx.texture(Texture::solid(ctx.gpu, [255; 4], "White"));
///         let flat = ctx.texture(Texture::solid(ctx.gpu, FLAT_NORMAL_PIXEL, "Flat"));
///         let material = ctx.material(Material::new(white, flat, white));
///         ctx.add_mesh(MeshInstance::new(sphere, shader, material));
///         ctx.add_light(PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0)));
///
///         Ok(move |frame: &mut Frame| {
///             log::trace!("{:.0} fps", frame.fps());
///         })
///     })
/// }
/// ```
pub fn run<S, F>(setup: S) -> Result<(), AppError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, AppError> + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    run_with_config(AppConfig::default(), setup)
}

/// Run a Lumen application with custom configuration.
pub fn run_with_config<S, F>(config: AppConfig, setup: S) -> Result<(), AppError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, AppError> + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = LumenApp {
        state: AppState::Pending {
            config,
            setup: Some(Box::new(move |ctx| {
                let frame_fn = setup(ctx)?;
                Ok(Box::new(frame_fn) as FrameFn)
            })),
        },
        error: None,
    };

    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

type FrameFn = Box<dyn FnMut(&mut Frame)>;
type SetupFn = Box<dyn FnOnce(&mut SetupContext) -> Result<FrameFn, AppError>>;

struct LumenApp {
    state: AppState,
    error: Option<AppError>,
}

enum AppState {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running(Box<Running>),
    Stopped,
}

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    assets: Assets,
    renderer: DeferredRenderer,
    settings: RenderSettings,
    input: InputQueue,
    frame_fn: FrameFn,
    stats: FrameStats,
    start_time: Instant,
    last_frame: Instant,
    last_report: f32,
}

impl Running {
    fn start(event_loop: &ActiveEventLoop, config: &AppConfig, setup: SetupFn) -> Result<Self, AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = GpuContext::new(window.clone())?;
        let mut assets = Assets::new(&gpu);
        let mut renderer = DeferredRenderer::new(&gpu, &mut assets, default_camera())?;
        let mut settings = config.settings;

        let mut ctx = SetupContext {
            gpu: &gpu,
            assets: &mut assets,
            renderer: &mut renderer,
            settings: &mut settings,
        };
        let frame_fn = setup(&mut ctx)?;

        log::info!(
            "scene ready: {} meshes, {} lights",
            renderer.scene.meshes().len(),
            renderer.scene.lights().len()
        );
        window.request_redraw();

        Ok(Self {
            window,
            gpu,
            assets,
            renderer,
            settings,
            input: InputQueue::new(),
            frame_fn,
            stats: FrameStats::default(),
            start_time: Instant::now(),
            last_frame: Instant::now(),
            last_report: 0.0,
        })
    }

    /// Feed queued input to the orbit controller and the settings. Returns
    /// false when the user asked to quit.
    fn apply_input(&mut self) -> bool {
        for event in self.input.drain() {
            match event {
                InputEvent::Orbit(gesture) => {
                    if let Some(orbit) = self.renderer.camera.orbit_mut() {
                        orbit.apply(gesture);
                    }
                }
                InputEvent::Key(KeyCode::Escape) => return false,
                InputEvent::Key(key) => {
                    if self.settings.apply_key(key, &mut self.renderer.scene) {
                        log::debug!("{key:?} -> {:?}", self.settings);
                    }
                }
            }
        }
        true
    }

    fn redraw(&mut self) -> Result<bool, AppError> {
        let now = Instant::now();
        let time = self.start_time.elapsed().as_secs_f32();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let loaded = self.assets.poll_loads(&self.gpu);
        if loaded > 0 {
            log::debug!("{loaded} textures finished loading");
        }
        if !self.apply_input() {
            return Ok(false);
        }

        let mut frame = Frame {
            gpu: &self.gpu,
            assets: &self.assets,
            scene: &mut self.renderer.scene,
            settings: &mut self.settings,
            time,
            dt,
            stats: self.stats,
        };
        (self.frame_fn)(&mut frame);

        self.stats = self
            .renderer
            .render(&self.gpu, &mut self.assets, &self.settings, time, dt)?;

        if time - self.last_report >= 5.0 {
            self.last_report = time;
            log::debug!("{:.0} fps, {:?}", if dt > 0.0 { 1.0 / dt } else { 0.0 }, self.stats);
        }

        self.window.request_redraw();
        Ok(true)
    }
}

fn default_camera() -> Camera {
    PerspectiveCamera::new()
        .with_orbit(OrbitController::new(OrbitConfig::default()).boom(100.0))
        .into()
}

impl ApplicationHandler for LumenApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending { config, setup } = &mut self.state else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };
        match Running::start(event_loop, config, setup) {
            Ok(running) => self.state = AppState::Running(Box::new(running)),
            Err(e) => {
                log::error!("startup failed: {e}");
                self.error = Some(e);
                self.state = AppState::Stopped;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(running) = &mut self.state else {
            return;
        };

        running.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                running.renderer.resize(&mut running.gpu, size.width, size.height);
            }
            WindowEvent::RedrawRequested => match running.redraw() {
                Ok(true) => {}
                Ok(false) => event_loop.exit(),
                Err(e) => {
                    log::error!("rendering stopped: {e}");
                    self.error = Some(e);
                    event_loop.exit();
                }
            },
            _ => {}
        }
    }
}

//! Registries for GPU resources, addressed by typed handles.
//!
//! Everything a draw references lives here and is looked up by id, so scene
//! data and frame plans stay plain `Copy` values that never touch the GPU.
//! Image files are decoded on worker threads; see [`Assets::load_texture`].

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use image::RgbaImage;

use crate::geometry::{Geometry, GeometryError, VertexData};
use crate::gpu::GpuContext;
use crate::material::Material;
use crate::shader::{PipelineOptions, ShaderError, ShaderProgram, ShaderSource};
use crate::texture::{Texture, TextureError, decode_image};

/// Type-safe handle to a texture in [`Assets`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Type-safe handle to uploaded geometry in [`Assets`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeometryId(pub(crate) usize);

/// Type-safe handle to a material in [`Assets`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

/// Type-safe handle to a shader program in [`Assets`].
///
/// A handle is returned even when compilation fails; draws using it are
/// skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(pub(crate) usize);

struct DecodedImage {
    id: TextureId,
    path: PathBuf,
    result: Result<RgbaImage, TextureError>,
}

/// Asset manager owning every texture, geometry, material and shader.
pub struct Assets {
    textures: Vec<Texture>,
    geometries: Vec<Geometry>,
    materials: Vec<Material>,
    shaders: Vec<Result<ShaderProgram, ShaderError>>,
    fallback: Texture,
    decoded_tx: mpsc::Sender<DecodedImage>,
    decoded_rx: mpsc::Receiver<DecodedImage>,
    pending: usize,
    revision: u64,
}

impl Assets {
    pub fn new(gpu: &GpuContext) -> Self {
        let (decoded_tx, decoded_rx) = mpsc::channel();
        Self {
            textures: Vec::new(),
            geometries: Vec::new(),
            materials: Vec::new(),
            shaders: Vec::new(),
            fallback: Texture::solid(gpu, [255, 255, 255, 255], "Fallback"),
            decoded_tx,
            decoded_rx,
            pending: 0,
            revision: 0,
        }
    }

    // ========================================================================
    // Textures
    // ========================================================================

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = TextureId(self.textures.len());
        self.textures.push(texture);
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.revision += 1;
        self.textures.get_mut(id.0)
    }

    /// White 1x1 texture bound to slots a material leaves empty.
    pub fn fallback(&self) -> &Texture {
        &self.fallback
    }

    /// Start decoding an image file in the background.
    ///
    /// The returned texture is a 1x1 blue placeholder until
    /// [`poll_loads`](Self::poll_loads) swaps in the decoded image. If decoding
    /// fails the placeholder stays.
    pub fn load_texture(&mut self, gpu: &GpuContext, path: impl AsRef<Path>) -> TextureId {
        let path = path.as_ref().to_path_buf();
        let id = self.add_texture(Texture::placeholder(gpu, &path.display().to_string()));

        let tx = self.decoded_tx.clone();
        let worker_path = path.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("texture-decode-{}", id.0))
            .spawn(move || {
                let result = decode_image(&worker_path);
                let _ = tx.send(DecodedImage {
                    id,
                    path: worker_path,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                self.pending += 1;
                log::debug!("decoding {} in the background", path.display());
            }
            Err(e) => log::warn!("could not start decoder for {}: {e}", path.display()),
        }
        id
    }

    /// Upload every image decoded since the last call. Returns how many
    /// textures were replaced.
    pub fn poll_loads(&mut self, gpu: &GpuContext) -> usize {
        let mut replaced = 0;
        while let Ok(decoded) = self.decoded_rx.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            match decoded.result {
                Ok(image) => {
                    if let Some(texture) = self.textures.get_mut(decoded.id.0) {
                        texture.replace_with_image(gpu, &image);
                        self.revision += 1;
                        log::info!(
                            "loaded {} ({}x{})",
                            decoded.path.display(),
                            image.width(),
                            image.height()
                        );
                        replaced += 1;
                    }
                }
                Err(e) => log::warn!("{e}; keeping placeholder"),
            }
        }
        replaced
    }

    /// Bumped whenever existing textures or materials may have changed, so
    /// bind groups built from them must be rebuilt.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Images still being decoded.
    pub fn pending_loads(&self) -> usize {
        self.pending
    }

    // ========================================================================
    // Geometry and materials
    // ========================================================================

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = GeometryId(self.geometries.len());
        self.geometries.push(geometry);
        id
    }

    /// Validate and upload vertex data.
    pub fn upload_geometry(
        &mut self,
        gpu: &GpuContext,
        data: &VertexData,
        label: &str,
    ) -> Result<GeometryId, GeometryError> {
        let geometry = Geometry::upload(gpu, data, label)?;
        Ok(self.add_geometry(geometry))
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id.0)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len());
        self.materials.push(material);
        id
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.revision += 1;
        self.materials.get_mut(id.0)
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Compile a program. Failures are logged and kept so the id stays valid.
    pub fn add_shader(&mut self, gpu: &GpuContext, source: &ShaderSource, options: PipelineOptions) -> ShaderId {
        let program = ShaderProgram::new(gpu, source, options);
        if let Err(e) = &program {
            log::error!("{e}");
        }
        let id = ShaderId(self.shaders.len());
        self.shaders.push(program);
        id
    }

    /// The compiled program, or `None` if it failed to build.
    pub fn shader(&self, id: ShaderId) -> Option<&ShaderProgram> {
        self.shaders.get(id.0).and_then(|s| s.as_ref().ok())
    }

    pub fn shader_mut(&mut self, id: ShaderId) -> Option<&mut ShaderProgram> {
        self.shaders.get_mut(id.0).and_then(|s| s.as_mut().ok())
    }

    /// Why a program is unusable, if it is.
    pub fn shader_error(&self, id: ShaderId) -> Option<&ShaderError> {
        self.shaders.get(id.0).and_then(|s| s.as_ref().err())
    }

    /// Make sure `shader` has a pipeline for `geometry`. False means the draw
    /// must be skipped.
    pub fn prepare(&mut self, gpu: &GpuContext, shader: ShaderId, geometry: GeometryId) -> bool {
        let Some(geometry) = self.geometries.get(geometry.0) else {
            return false;
        };
        match self.shaders.get_mut(shader.0) {
            Some(Ok(program)) => program.prepare(gpu, geometry),
            _ => false,
        }
    }
}

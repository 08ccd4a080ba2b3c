use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

use crate::gpu::GpuContext;

/// Attachment format for G-Buffer style render targets.
pub const BUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Pixel shown while an image is still decoding (or failed to).
pub const PLACEHOLDER_PIXEL: [u8; 4] = [0, 0, 255, 255];

/// Tangent-space normal pointing straight out of the surface.
pub const FLAT_NORMAL_PIXEL: [u8; 4] = [128, 128, 255, 255];

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode image `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("`{0}` is an image texture and cannot be resized")]
    NotResizable(String),
}

/// Whether a texture is sampled from an image or rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// 8-bit RGBA with a mip chain and linear filtering.
    Image,
    /// Float render target sampled with nearest filtering.
    Buffer,
}

/// A GPU texture that can be bound to shaders.
#[derive(Debug)]
pub struct Texture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    kind: TextureKind,
    format: wgpu::TextureFormat,
    label: String,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a single-level image texture from raw RGBA data with nearest sampling.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let format = wgpu::TextureFormat::Rgba8Unorm;
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = nearest_sampler(gpu, label);

        Self {
            texture,
            view,
            sampler,
            kind: TextureKind::Image,
            format,
            label: label.to_string(),
            width,
            height,
        }
    }

    /// A 1x1 texture of a single colour.
    pub fn solid(gpu: &GpuContext, pixel: [u8; 4], label: &str) -> Self {
        Self::from_rgba(gpu, &pixel, 1, 1, label)
    }

    /// The opaque blue stand-in used until an image finishes loading.
    pub fn placeholder(gpu: &GpuContext, label: &str) -> Self {
        Self::solid(gpu, PLACEHOLDER_PIXEL, label)
    }

    /// Upload a decoded image with a full mip chain and linear filtering.
    pub fn from_image(gpu: &GpuContext, image: &RgbaImage, label: &str) -> Self {
        let (texture, view, sampler) = upload_mipmapped(gpu, image, label);
        Self {
            texture,
            view,
            sampler,
            kind: TextureKind::Image,
            format: wgpu::TextureFormat::Rgba8Unorm,
            label: label.to_string(),
            width: image.width(),
            height: image.height(),
        }
    }

    /// Load and upload an image file synchronously.
    pub fn from_file(gpu: &GpuContext, path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let image = decode_image(path)?;
        Ok(Self::from_image(gpu, &image, &path.display().to_string()))
    }

    /// Create a render-target texture of `format` sampled with nearest filtering.
    ///
    /// Dimensions are clamped to at least one pixel.
    pub fn buffer(
        gpu: &GpuContext,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let (texture, view) = allocate_buffer(gpu, width, height, format, label);
        let sampler = nearest_sampler(gpu, label);

        Self {
            texture,
            view,
            sampler,
            kind: TextureKind::Buffer,
            format,
            label: label.to_string(),
            width,
            height,
        }
    }

    /// Reallocate a buffer texture at a new size. Contents are discarded.
    ///
    /// Reallocates even when the size is unchanged.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> Result<(), TextureError> {
        if self.kind != TextureKind::Buffer {
            return Err(TextureError::NotResizable(self.label.clone()));
        }
        let width = width.max(1);
        let height = height.max(1);
        let (texture, view) = allocate_buffer(gpu, width, height, self.format, &self.label);
        self.texture = texture;
        self.view = view;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Swap in freshly decoded image data, replacing storage, mips and sampler.
    ///
    /// Everything holding this texture's id sees the new image on the next draw.
    pub fn replace_with_image(&mut self, gpu: &GpuContext, image: &RgbaImage) {
        let (texture, view, sampler) = upload_mipmapped(gpu, image, &self.label);
        self.texture = texture;
        self.view = view;
        self.sampler = sampler;
        self.kind = TextureKind::Image;
        self.format = wgpu::TextureFormat::Rgba8Unorm;
        self.width = image.width();
        self.height = image.height();
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Mip levels in the current storage.
    pub fn mip_levels(&self) -> u32 {
        self.texture.mip_level_count()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

/// Decode an image file to 8-bit RGBA.
pub fn decode_image(path: &Path) -> Result<RgbaImage, TextureError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| TextureError::Decode {
            path: path.display().to_string(),
            source,
        })
}

/// Number of mip levels for a full chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Build the mip chain for `image`, level 0 first.
pub fn mip_chain(image: &RgbaImage) -> Vec<RgbaImage> {
    let levels = mip_level_count(image.width(), image.height());
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(image.clone());
    for level in 1..levels {
        let width = (image.width() >> level).max(1);
        let height = (image.height() >> level).max(1);
        let Some(previous) = chain.last() else { break };
        let next = image::imageops::resize(
            previous,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        chain.push(next);
    }
    chain
}

/// Generate a two-tone checkerboard, `cells` squares per side.
pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> RgbaImage {
    let cell = (size / cells.max(1)).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            image::Rgba(a)
        } else {
            image::Rgba(b)
        }
    })
}

/// Pack metallic, roughness and ambient occlusion into one RGBA pixel.
pub fn material_pixel(metallic: f32, roughness: f32, ao: f32) -> [u8; 4] {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(metallic), to_byte(roughness), to_byte(ao), 255]
}

fn upload_mipmapped(
    gpu: &GpuContext,
    image: &RgbaImage,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView, wgpu::Sampler) {
    let chain = mip_chain(image);

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: chain.len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (level, mip) in chain.iter().enumerate() {
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            mip.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * mip.width()),
                rows_per_image: Some(mip.height()),
            },
            wgpu::Extent3d {
                width: mip.width(),
                height: mip.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{} Sampler", label)),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    (texture, view, sampler)
}

fn allocate_buffer(
    gpu: &GpuContext,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

pub(crate) fn nearest_sampler(gpu: &GpuContext, label: &str) -> wgpu::Sampler {
    gpu.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{} Sampler", label)),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

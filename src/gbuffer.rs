use crate::gpu::GpuContext;
use crate::material::{MaterialView, TextureRole};
use crate::texture::{BUFFER_FORMAT, Texture, TextureError};

/// Material slot of each color attachment, in `@location` order.
///
/// Albedo is exposed as `base` so the lighting and debug shaders can sample
/// it under that name.
pub const ATTACHMENTS: [TextureRole; 4] = [
    TextureRole::Position,
    TextureRole::Base,
    TextureRole::Normal,
    TextureRole::Material,
];

const ATTACHMENT_LABELS: [&str; 4] = ["GBuffer Position", "GBuffer Albedo", "GBuffer Normal", "GBuffer Material"];

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Pick the attachment format the device can render four of at once.
pub fn attachment_format(max_color_attachment_bytes_per_sample: u32) -> wgpu::TextureFormat {
    // Four Rgba32Float targets at 16 bytes each.
    if max_color_attachment_bytes_per_sample >= 64 {
        BUFFER_FORMAT
    } else {
        wgpu::TextureFormat::Rgba16Float
    }
}

/// Four float color attachments plus depth, written by the geometry pass.
pub struct GBuffer {
    channels: [Texture; 4],
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

impl GBuffer {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let limit = gpu.device.limits().max_color_attachment_bytes_per_sample;
        let format = attachment_format(limit);
        if format != BUFFER_FORMAT {
            log::warn!("device allows {limit} bytes per sample, using {format:?} G-Buffer");
        }

        let channels =
            std::array::from_fn(|i| Texture::buffer(gpu, width, height, format, ATTACHMENT_LABELS[i]));
        let (depth, depth_view) = create_depth(gpu, width, height);

        Self {
            channels,
            depth,
            depth_view,
            format,
        }
    }

    /// Reallocate every attachment at the new size. Calling it twice with
    /// the same size leaves the same dimensions.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> Result<(), TextureError> {
        for channel in &mut self.channels {
            channel.resize(gpu, width, height)?;
        }
        let (depth, depth_view) = create_depth(gpu, width, height);
        self.depth = depth;
        self.depth_view = depth_view;
        log::debug!("G-Buffer resized to {width}x{height}");
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        self.channels[0].size()
    }

    pub fn depth_size(&self) -> (u32, u32) {
        (self.depth.width(), self.depth.height())
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Color target formats for a program writing every attachment.
    pub fn color_formats(&self) -> Vec<wgpu::TextureFormat> {
        vec![self.format; ATTACHMENTS.len()]
    }

    pub fn channel(&self, role: TextureRole) -> Option<&Texture> {
        ATTACHMENTS
            .iter()
            .position(|r| *r == role)
            .map(|i| &self.channels[i])
    }

    /// Attachments paired with their material slot, in attachment order.
    pub fn channels(&self) -> impl Iterator<Item = (TextureRole, &Texture)> {
        ATTACHMENTS.into_iter().zip(self.channels.iter())
    }

    /// Borrow the attachments as a material for the lighting pass.
    pub fn material_view(&self) -> MaterialView<'_> {
        self.channels()
            .fold(MaterialView::new(), |view, (role, texture)| view.with(role, texture))
    }

    pub(crate) fn color_attachments(&self) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        self.channels
            .iter()
            .map(|channel| {
                Some(wgpu::RenderPassColorAttachment {
                    view: channel.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect()
    }

    pub(crate) fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }
}

fn create_depth(gpu: &GpuContext, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("GBuffer Depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    (depth, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_order_matches_fragment_outputs() {
        assert_eq!(
            ATTACHMENTS,
            [
                TextureRole::Position,
                TextureRole::Base,
                TextureRole::Normal,
                TextureRole::Material
            ]
        );
    }

    #[test]
    fn full_precision_when_device_allows() {
        assert_eq!(attachment_format(64), wgpu::TextureFormat::Rgba32Float);
        assert_eq!(attachment_format(128), wgpu::TextureFormat::Rgba32Float);
    }

    #[test]
    fn half_precision_under_default_limit() {
        assert_eq!(attachment_format(32), wgpu::TextureFormat::Rgba16Float);
    }
}

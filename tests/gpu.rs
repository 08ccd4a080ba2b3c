//! Tests that need a real device.
//!
//! Without an adapter each test prints `skipping <name>` and returns. Set
//! `LUMEN_REQUIRE_GPU=1` to make a missing adapter fail the run instead.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use lumen::*;

fn gpu(test: &str) -> Option<GpuContext> {
    match GpuContext::headless(64, 48) {
        Ok(gpu) => Some(gpu),
        Err(e) if std::env::var_os("LUMEN_REQUIRE_GPU").is_some() => {
            panic!("{test}: no GPU adapter: {e}")
        }
        Err(e) => {
            eprintln!("skipping {test}: no GPU adapter ({e})");
            None
        }
    }
}

/// Drain decoded images until nothing is pending or five seconds pass.
fn drain_loads(gpu: &GpuContext, assets: &mut Assets) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut replaced = 0;
    while assets.pending_loads() > 0 && Instant::now() < deadline {
        replaced += assets.poll_loads(gpu);
        std::thread::sleep(Duration::from_millis(5));
    }
    replaced
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("lumen-{}-{name}", std::process::id()))
}

fn target(gpu: &GpuContext) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: gpu.width(),
            height: gpu.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: gpu.format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[test]
fn buffer_texture_resize_reports_new_size() {
    let Some(gpu) = gpu("buffer_texture_resize_reports_new_size") else { return };
    let mut texture = Texture::buffer(&gpu, 32, 16, BUFFER_FORMAT, "Buffer");
    assert_eq!(texture.size(), (32, 16));

    texture.resize(&gpu, 100, 70).unwrap();
    assert_eq!(texture.size(), (100, 70));
    assert_eq!(texture.kind(), TextureKind::Buffer);
}

#[test]
fn image_texture_refuses_resize() {
    let Some(gpu) = gpu("image_texture_refuses_resize") else { return };
    let mut texture = Texture::solid(&gpu, [1, 2, 3, 255], "Solid");
    let err = texture.resize(&gpu, 8, 8).unwrap_err();
    assert!(matches!(err, TextureError::NotResizable(_)));
    assert_eq!(texture.size(), (1, 1));
}

#[test]
fn gbuffer_resize_is_idempotent() {
    let Some(gpu) = gpu("gbuffer_resize_is_idempotent") else { return };
    let mut gbuffer = GBuffer::new(&gpu, 64, 48);

    gbuffer.resize(&gpu, 200, 120).unwrap();
    gbuffer.resize(&gpu, 200, 120).unwrap();

    assert_eq!(gbuffer.size(), (200, 120));
    assert_eq!(gbuffer.depth_size(), (200, 120));
    for (_, channel) in gbuffer.channels() {
        assert_eq!(channel.size(), (200, 120));
    }
}

#[test]
fn broken_shader_is_reported_not_panicked() {
    let Some(gpu) = gpu("broken_shader_is_reported_not_panicked") else { return };
    let source = ShaderSource::new("Broken", shaders::SCREEN_QUAD_VERTEX, "@fragment fn fs( {");
    let options = PipelineOptions {
        color_targets: vec![gpu.format()],
        depth_format: None,
        cull_mode: None,
        filterable: false,
    };
    assert!(ShaderProgram::new(&gpu, &source, options.clone()).is_err());

    let mut assets = Assets::new(&gpu);
    let id = assets.add_shader(&gpu, &source, options);
    assert!(assets.shader(id).is_none());
    assert!(assets.shader_error(id).is_some());
}

#[test]
fn built_in_programs_compile() {
    let Some(gpu) = gpu("built_in_programs_compile") else { return };
    let mut assets = Assets::new(&gpu);
    let renderer = DeferredRenderer::new(&gpu, &mut assets, PerspectiveCamera::new().into()).unwrap();
    let geometry = renderer.geometry_shader(&gpu, &mut assets);
    let programs = renderer.programs();

    for id in [geometry, programs.lighting, programs.passthrough] {
        assert!(assets.shader(id).is_some(), "{:?}", assets.shader_error(id));
    }
}

#[test]
fn headless_frame_skips_hidden_and_broken_draws() {
    let Some(mut gpu) = gpu("headless_frame_skips_hidden_and_broken_draws") else { return };
    let mut assets = Assets::new(&gpu);
    let camera = PerspectiveCamera::new().at(Vec3::new(0.0, 0.0, 100.0)).looking_at(Vec3::ZERO);
    let mut renderer = DeferredRenderer::new(&gpu, &mut assets, camera.into()).unwrap();

    let shader = renderer.geometry_shader(&gpu, &mut assets);
    let broken = assets.add_shader(
        &gpu,
        &ShaderSource::new("Broken", "not wgsl", "not wgsl"),
        renderer.geometry_options(),
    );
    let sphere = assets.upload_geometry(&gpu, &VertexData::sphere(16, 8), "Sphere").unwrap();
    let white = assets.add_texture(Texture::solid(&gpu, [255; 4], "White"));
    let flat = assets.add_texture(Texture::solid(&gpu, FLAT_NORMAL_PIXEL, "Flat"));
    let rough = assets.add_texture(Texture::solid(&gpu, material_pixel(0.0, 1.0, 1.0), "Rough"));
    let material = assets.add_material(Material::new(white, flat, rough));

    let scene = &mut renderer.scene;
    scene.add_mesh(MeshInstance::new(sphere, shader, material).with_transform(Transform::new().uniform_scale(20.0)));
    scene.add_mesh(MeshInstance::new(sphere, shader, material).visible(false));
    scene.add_mesh(MeshInstance::new(sphere, broken, material));
    scene.add_light(PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0)));
    scene.add_light(PointLight::new(Vec3::X, Vec3::splat(255.0)).visible(false));

    renderer.resize(&mut gpu, 80, 60);
    let (_texture, view) = target(&gpu);
    let settings = RenderSettings::default().debug(true);
    let stats = renderer.render_to(&gpu, &mut assets, &settings, &view, 0.0, 0.016);

    assert_eq!(stats.geometry_draws, 1);
    assert_eq!(stats.lighting_draws, 1);
    assert_eq!(stats.debug_draws, 3);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.visible_lights, 1);
    assert_eq!(renderer.gbuffer().size(), (80, 60));
}

#[test]
fn decoded_image_replaces_placeholder() {
    let Some(gpu) = gpu("decoded_image_replaces_placeholder") else { return };
    let path = temp_path("decoded.png");
    image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]))
        .save(&path)
        .unwrap();

    let mut assets = Assets::new(&gpu);
    let id = assets.load_texture(&gpu, &path);
    assert_eq!(assets.texture(id).unwrap().size(), (1, 1));
    let revision = assets.revision();

    let replaced = drain_loads(&gpu, &mut assets);
    std::fs::remove_file(&path).ok();

    assert_eq!(replaced, 1);
    assert_eq!(assets.pending_loads(), 0);
    assert!(assets.revision() > revision);
    let texture = assets.texture(id).unwrap();
    assert_eq!(texture.size(), (8, 4));
    assert_eq!(texture.mip_levels(), mip_level_count(8, 4));
    assert_eq!(texture.kind(), TextureKind::Image);
}

#[test]
fn missing_image_keeps_placeholder() {
    let Some(gpu) = gpu("missing_image_keeps_placeholder") else { return };
    let mut assets = Assets::new(&gpu);
    let id = assets.load_texture(&gpu, temp_path("does-not-exist.png"));

    assert_eq!(drain_loads(&gpu, &mut assets), 0);
    assert_eq!(assets.pending_loads(), 0);
    assert_eq!(assets.revision(), 0);
    assert_eq!(assets.texture(id).unwrap().size(), (1, 1));
}

#[test]
fn material_bind_groups_are_reused_until_invalidated() {
    let Some(mut gpu) = gpu("material_bind_groups_are_reused_until_invalidated") else { return };
    let mut assets = Assets::new(&gpu);
    let camera = PerspectiveCamera::new().at(Vec3::new(0.0, 0.0, 100.0)).looking_at(Vec3::ZERO);
    let mut renderer = DeferredRenderer::new(&gpu, &mut assets, camera.into()).unwrap();

    let shader = renderer.geometry_shader(&gpu, &mut assets);
    let cube = assets.upload_geometry(&gpu, &VertexData::cube(), "Cube").unwrap();
    let white = assets.add_texture(Texture::solid(&gpu, [255; 4], "White"));
    let flat = assets.add_texture(Texture::solid(&gpu, FLAT_NORMAL_PIXEL, "Flat"));
    let rough = assets.add_texture(Texture::solid(&gpu, material_pixel(0.0, 1.0, 1.0), "Rough"));
    let material = assets.add_material(Material::new(white, flat, rough));
    for x in [-20.0, 0.0, 20.0] {
        renderer.scene.add_mesh(
            MeshInstance::new(cube, shader, material)
                .with_transform(Transform::from_position(Vec3::new(x, 0.0, 0.0)).uniform_scale(5.0)),
        );
    }
    renderer.scene.add_light(PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0)));

    let (_texture, view) = target(&gpu);
    let settings = RenderSettings::default();
    renderer.render_to(&gpu, &mut assets, &settings, &view, 0.0, 0.016);
    // One group for the shared cube material, one for the lighting pass.
    assert_eq!(renderer.cached_material_groups(), 2);

    renderer.render_to(&gpu, &mut assets, &settings, &view, 0.016, 0.016);
    assert_eq!(renderer.cached_material_groups(), 2);

    renderer.resize(&mut gpu, 80, 60);
    assert_eq!(renderer.cached_material_groups(), 0);
    let (_texture, view) = target(&gpu);
    let stats = renderer.render_to(&gpu, &mut assets, &settings, &view, 0.032, 0.016);
    assert_eq!(stats.geometry_draws, 3);
    assert_eq!(renderer.cached_material_groups(), 2);

    assert!(assets.texture_mut(white).is_some());
    renderer.render_to(&gpu, &mut assets, &settings, &view, 0.048, 0.016);
    assert_eq!(renderer.cached_material_groups(), 2);
}

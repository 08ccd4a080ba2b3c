//! Demo scene: a few lit meshes on a floor, orbit camera, keyboard settings.
//!
//! ```text
//! lumen [model.obj] [albedo.png]
//! ```
//!
//! Drag to orbit, scroll to zoom. `G` toggles the G-Buffer overlay, `Space`
//! animation, `1`..`9` lights, `[`/`]` ambience, `-`/`=` intensity.

use std::path::PathBuf;

use lumen::{
    AppConfig, AppError, FLAT_NORMAL_PIXEL, LoggingConfig, Material, MeshInstance, MeshKey, PointLight,
    Quat, Texture, Transform, Vec3, VertexData, checkerboard, init_logging, material_pixel,
    run_with_config,
};

fn main() {
    init_logging(LoggingConfig::default());

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let model = args.next();
    let albedo = args.next();

    let config = AppConfig::new().title("Lumen").size(1280, 720);

    let result = run_with_config(config, move |ctx| {
        let shader = ctx.geometry_shader();

        let checker = checkerboard(256, 8, [230, 230, 230, 255], [90, 90, 100, 255]);
        let checker = ctx.texture(Texture::from_image(ctx.gpu, &checker, "Checker"));
        let white = ctx.texture(Texture::solid(ctx.gpu, [255, 255, 255, 255], "White"));
        let flat = ctx.texture(Texture::solid(ctx.gpu, FLAT_NORMAL_PIXEL, "Flat Normal"));
        let rough = ctx.texture(Texture::solid(ctx.gpu, material_pixel(0.0, 0.9, 1.0), "Rough"));
        let polished = ctx.texture(Texture::solid(ctx.gpu, material_pixel(1.0, 0.3, 1.0), "Polished"));

        let hero_albedo = match &albedo {
            Some(path) => ctx.load_texture(path),
            None => white,
        };
        let hero_material = ctx.material(Material::new(hero_albedo, flat, rough));
        let floor_material = ctx.material(Material::new(checker, flat, rough));
        let metal_material = ctx.material(Material::new(white, flat, polished));

        let hero = match &model {
            Some(path) => ctx.obj(path)?,
            None => ctx.geometry(&VertexData::sphere(48, 24), "Sphere")?,
        };
        let cube = ctx.geometry(&VertexData::cube(), "Cube")?;
        let floor = ctx.geometry(&VertexData::plane(1.0), "Floor")?;

        let spinning: Vec<MeshKey> = vec![
            ctx.add_mesh(
                MeshInstance::new(hero, shader, hero_material)
                    .with_transform(Transform::new().uniform_scale(20.0)),
            ),
            ctx.add_mesh(
                MeshInstance::new(cube, shader, metal_material).with_transform(
                    Transform::from_position(Vec3::new(-25.0, -4.0, 0.0)).uniform_scale(8.0),
                ),
            ),
            ctx.add_mesh(
                MeshInstance::new(cube, shader, floor_material).with_transform(
                    Transform::from_position(Vec3::new(25.0, -4.0, 0.0)).uniform_scale(8.0),
                ),
            ),
        ];
        ctx.add_mesh(
            MeshInstance::new(floor, shader, floor_material).with_transform(
                Transform::from_position(Vec3::new(0.0, -10.0, 0.0)).uniform_scale(120.0),
            ),
        );

        ctx.add_light(PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0)));
        ctx.add_light(
            PointLight::new(Vec3::new(-60.0, 20.0, -30.0), Vec3::new(255.0, 120.0, 60.0))
                .attenuation(1.0, 0.01, 0.0005),
        );
        ctx.add_light(
            PointLight::new(Vec3::new(60.0, 20.0, -30.0), Vec3::new(60.0, 140.0, 255.0))
                .attenuation(1.0, 0.01, 0.0005),
        );

        Ok(move |frame: &mut lumen::Frame| {
            if !frame.settings.animate {
                return;
            }
            let spin = Quat::from_rotation_y(frame.settings.animation_speed * frame.dt);
            for key in &spinning {
                if let Some(instance) = frame.scene.mesh_mut(*key) {
                    instance.transform.rotate(spin);
                }
            }
        })
    });

    if let Err(e) = result {
        log::error!("{e}");
        report_exit(e);
    }
}

fn report_exit(error: AppError) -> ! {
    let code = match error {
        AppError::Gpu(_) | AppError::Window(_) | AppError::EventLoop(_) => 2,
        AppError::Geometry(_) | AppError::Obj(_) => 1,
    };
    std::process::exit(code)
}

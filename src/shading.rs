//! CPU reference for the lighting resolve.
//!
//! Mirrors `lighting.frag.wgsl` term by term so shading behavior can be
//! checked without a GPU. Keep the two in step.

use std::f32::consts::PI;

use glam::Vec3;

use crate::light::LightArray;

/// Base reflectance of non-metals.
pub const DIELECTRIC_F0: f32 = 0.4;

/// What the G-Buffer holds for one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Surface {
    /// A non-metallic surface with full ambient occlusion term.
    pub fn dielectric(position: Vec3, normal: Vec3, albedo: Vec3, roughness: f32) -> Self {
        Self {
            position,
            normal: normal.normalize_or(Vec3::Z),
            albedo,
            metallic: 0.0,
            roughness,
            ao: 1.0,
        }
    }
}

/// Linear radiance split by source, before tonemapping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadingTerms {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl ShadingTerms {
    pub fn total(&self) -> Vec3 {
        self.ambient + self.diffuse + self.specular
    }
}

/// GGX normal distribution with `alpha = roughness^2`.
pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a2 = roughness.powi(4);
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d).max(1e-7)
}

pub fn geometry_schlick_ggx(n_dot: f32, roughness: f32) -> f32 {
    let k = (roughness + 1.0).powi(2) / 8.0;
    n_dot / (n_dot * (1.0 - k) + k)
}

pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Inverse-quadratic falloff from `(constant, linear, quadratic)`.
pub fn falloff(attenuation: Vec3, distance: f32) -> f32 {
    1.0 / (attenuation.x + attenuation.y * distance + attenuation.z * distance * distance)
}

/// Accumulate every light in `lights` on `surface` seen from `eye`.
pub fn shade_terms(surface: &Surface, eye: Vec3, lights: &LightArray) -> ShadingTerms {
    let [_, ambience, intensity] = lights.header();
    let n = surface.normal.normalize_or(Vec3::Z);
    let v = (eye - surface.position).normalize_or(Vec3::Z);
    let n_dot_v = n.dot(v).max(0.0);
    let f0 = Vec3::splat(DIELECTRIC_F0).lerp(surface.albedo, surface.metallic);

    let mut terms = ShadingTerms {
        ambient: ambience * surface.albedo * (surface.ao * surface.albedo),
        ..Default::default()
    };

    for (position, color, attenuation) in lights.lights() {
        let to_light = position - surface.position;
        let distance = to_light.length();
        let l = to_light / distance.max(1e-4);
        let h = (v + l).normalize_or(n);
        let n_dot_l = n.dot(l).max(0.0);

        let radiance = color / 255.0 * falloff(attenuation, distance) * (0.1 / intensity);

        let ndf = distribution_ggx(n.dot(h).max(0.0), surface.roughness);
        let g = geometry_schlick_ggx(n_dot_v, surface.roughness)
            * geometry_schlick_ggx(n_dot_l, surface.roughness);
        let f = fresnel_schlick(h.dot(v).max(0.0), f0);

        let specular = ndf * g * f / (4.0 * n_dot_v * n_dot_l).max(1e-4);
        let kd = (Vec3::ONE - f) * (1.0 - surface.metallic);

        terms.diffuse += kd * surface.albedo / PI * radiance * n_dot_l;
        terms.specular += specular * radiance * n_dot_l;
    }
    terms
}

/// Reinhard `c / (c + 1)` followed by gamma 2.2.
pub fn tonemap(color: Vec3) -> Vec3 {
    let mapped = color / (color + Vec3::ONE);
    mapped.powf(1.0 / 2.2)
}

/// Final display color for one pixel.
pub fn shade(surface: &Surface, eye: Vec3, lights: &LightArray) -> Vec3 {
    tonemap(shade_terms(surface, eye, lights).total())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::PointLight;

    fn white_light_scene() -> LightArray {
        let light = PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0));
        LightArray::build([&light], 0.5, 0.8)
    }

    fn sphere_points(radius: f32) -> impl Iterator<Item = Vec3> {
        (0..16).flat_map(move |i| {
            (1..8).map(move |j| {
                let theta = i as f32 / 16.0 * std::f32::consts::TAU;
                let phi = j as f32 / 8.0 * PI;
                Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()) * radius
            })
        })
    }

    #[test]
    fn rough_white_sphere_is_diffuse_dominated() {
        let lights = white_light_scene();
        let eye = Vec3::new(0.0, 0.0, 100.0);
        let mut lit = 0;

        for point in sphere_points(10.0) {
            let surface = Surface::dielectric(point, point, Vec3::ONE, 1.0);
            let terms = shade_terms(&surface, eye, &lights);
            let color = tonemap(terms.total());

            assert!(color.min_element() >= 0.0 && color.max_element() <= 1.0, "{color}");
            if terms.diffuse.x > 0.0 {
                lit += 1;
                assert!(terms.specular.x < terms.diffuse.x, "{terms:?} at {point}");
                assert!(terms.specular.x < terms.ambient.x + terms.diffuse.x);
            }
        }
        assert!(lit > 0);
    }

    #[test]
    fn facing_point_matches_hand_computation() {
        let lights = white_light_scene();
        let surface = Surface::dielectric(Vec3::new(0.0, 0.0, 10.0), Vec3::Z, Vec3::ONE, 1.0);
        let terms = shade_terms(&surface, Vec3::new(0.0, 0.0, 100.0), &lights);

        assert!((terms.ambient.x - 0.04).abs() < 1e-5);
        assert!((terms.diffuse.x - 0.652).abs() < 0.01, "{terms:?}");
        assert!((terms.specular.x - 0.116).abs() < 0.01, "{terms:?}");
    }

    #[test]
    fn unlit_side_keeps_only_ambient() {
        let lights = white_light_scene();
        let surface = Surface::dielectric(Vec3::new(0.0, 0.0, -10.0), -Vec3::Z, Vec3::ONE, 1.0);
        let terms = shade_terms(&surface, Vec3::new(0.0, 0.0, -100.0), &lights);
        assert_eq!(terms.diffuse, Vec3::ZERO);
        assert_eq!(terms.specular, Vec3::ZERO);
        assert!(terms.ambient.x > 0.0);
    }

    #[test]
    fn no_lights_is_ambient_only() {
        let lights = LightArray::build(std::iter::empty(), 0.5, 0.8);
        let surface = Surface::dielectric(Vec3::ZERO, Vec3::Z, Vec3::splat(0.5), 0.5);
        let terms = shade_terms(&surface, Vec3::Z, &lights);
        assert!((terms.total().x - 0.04 * 0.25).abs() < 1e-6);
    }

    #[test]
    fn tonemap_stays_in_unit_range() {
        for c in [0.0, 0.5, 1.0, 10.0, 1e6] {
            let mapped = tonemap(Vec3::splat(c));
            assert!((0.0..=1.0).contains(&mapped.x), "{c} -> {mapped}");
        }
        assert_eq!(tonemap(Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn fresnel_at_normal_incidence_is_f0() {
        let f0 = Vec3::splat(DIELECTRIC_F0);
        assert!(fresnel_schlick(1.0, f0).abs_diff_eq(f0, 1e-6));
        assert!(fresnel_schlick(0.0, f0).abs_diff_eq(Vec3::ONE, 1e-6));
    }

    #[test]
    fn smoother_surfaces_have_sharper_highlights() {
        assert!(distribution_ggx(1.0, 0.2) > distribution_ggx(1.0, 0.8));
    }
}

use glam::Vec3;

/// Most lights the lighting shader reads in one frame.
pub const MAX_LIGHTS: usize = 16;

/// `vec4` elements in the shader's light array: one header plus three per light.
pub const LIGHT_ARRAY_LEN: usize = 1 + MAX_LIGHTS * 3;

/// A point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    /// RGB, 0 to 255 per channel.
    pub color: Vec3,
    /// Constant, linear and quadratic falloff coefficients.
    pub attenuation: Vec3,
    pub visible: bool,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::splat(255.0),
            attenuation: Vec3::new(1.0, 0.0014, 0.000007),
            visible: true,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            ..Default::default()
        }
    }

    pub fn attenuation(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.attenuation = Vec3::new(constant, linear, quadratic);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// Ambient strength as the lighting shader sees it.
pub fn ambience_term(ambience: f32) -> f32 {
    (ambience * 0.1 * 4.0).powi(2)
}

/// Light divisor as the lighting shader sees it; higher intensity gives a smaller term.
pub fn intensity_term(intensity: f32) -> f32 {
    (1.0 - intensity) * 0.1 + 0.001
}

/// Per-frame light list in the layout the lighting shader reads.
///
/// Element 0 is `[shaded * 3, ambience term, intensity term]`; each shaded
/// light then contributes position, color and attenuation, densely packed.
///
/// At most [`MAX_LIGHTS`] lights are shaded. Visible lights past the cap are
/// dropped in scene order with a warning, so the header count is
/// `3 * min(visible, MAX_LIGHTS)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LightArray {
    entries: Vec<[f32; 3]>,
}

impl LightArray {
    pub fn build<'a>(
        lights: impl IntoIterator<Item = &'a PointLight>,
        ambience: f32,
        intensity: f32,
    ) -> Self {
        let mut visible: Vec<&PointLight> = lights.into_iter().filter(|l| l.visible).collect();
        if visible.len() > MAX_LIGHTS {
            log::warn!(
                "{} visible lights, only the first {MAX_LIGHTS} are shaded",
                visible.len()
            );
            visible.truncate(MAX_LIGHTS);
        }

        let mut entries = Vec::with_capacity(1 + visible.len() * 3);
        entries.push([
            (visible.len() * 3) as f32,
            ambience_term(ambience),
            intensity_term(intensity),
        ]);
        for light in visible {
            entries.push(light.position.to_array());
            entries.push(light.color.to_array());
            entries.push(light.attenuation.to_array());
        }
        Self { entries }
    }

    pub fn header(&self) -> [f32; 3] {
        self.entries[0]
    }

    pub fn visible_count(&self) -> usize {
        (self.entries.len() - 1) / 3
    }

    pub fn entries(&self) -> &[[f32; 3]] {
        &self.entries
    }

    /// Visible lights as `(position, color, attenuation)`.
    pub fn lights(&self) -> impl Iterator<Item = (Vec3, Vec3, Vec3)> + '_ {
        self.entries[1..].chunks_exact(3).map(|light| {
            (
                Vec3::from_array(light[0]),
                Vec3::from_array(light[1]),
                Vec3::from_array(light[2]),
            )
        })
    }

    /// Pad each entry to a `vec4` for a uniform array.
    pub fn to_uniform(&self) -> Vec<[f32; 4]> {
        self.entries
            .iter()
            .map(|[x, y, z]| [*x, *y, *z, 0.0])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lights() -> Vec<PointLight> {
        vec![
            PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0)),
            PointLight::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(255.0, 0.0, 0.0)).visible(false),
            PointLight::new(Vec3::new(-5.0, 2.0, 0.0), Vec3::new(0.0, 0.0, 255.0))
                .attenuation(1.0, 0.1, 0.01),
        ]
    }

    #[test]
    fn header_counts_visible_lights_times_three() {
        let array = LightArray::build(&lights(), 0.5, 0.8);
        assert_eq!(array.header()[0], 6.0);
        assert_eq!(array.visible_count(), 2);
        assert_eq!(array.entries().len(), 7);
    }

    #[test]
    fn header_terms_match_formulas() {
        let array = LightArray::build(&lights(), 0.5, 0.8);
        let [_, ambience, intensity] = array.header();
        assert!((ambience - 0.04).abs() < 1e-6);
        assert!((intensity - 0.021).abs() < 1e-6);
    }

    #[test]
    fn invisible_lights_are_skipped_densely() {
        let array = LightArray::build(&lights(), 0.5, 0.8);
        let positions: Vec<Vec3> = array.lights().map(|(p, _, _)| p).collect();
        assert_eq!(positions, vec![Vec3::new(0.0, 50.0, 100.0), Vec3::new(-5.0, 2.0, 0.0)]);
        assert_eq!(array.entries()[6], [1.0, 0.1, 0.01]);
    }

    #[test]
    fn no_visible_lights_leaves_only_header() {
        let hidden: Vec<_> = lights().into_iter().map(|l| l.visible(false)).collect();
        let array = LightArray::build(&hidden, 0.0, 1.0);
        assert_eq!(array.entries().len(), 1);
        assert_eq!(array.header(), [0.0, 0.0, 0.001]);
    }

    #[test]
    fn excess_lights_are_capped() {
        let many = vec![PointLight::default(); MAX_LIGHTS + 4];
        let array = LightArray::build(&many, 0.5, 0.5);
        assert_eq!(array.visible_count(), MAX_LIGHTS);
        assert_eq!(array.header()[0], (MAX_LIGHTS * 3) as f32);
        assert!(array.to_uniform().len() <= LIGHT_ARRAY_LEN);
    }

    #[test]
    fn lights_past_the_cap_are_dropped_in_scene_order() {
        let mut many: Vec<PointLight> = (0..MAX_LIGHTS + 2)
            .map(|i| PointLight::new(Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE))
            .collect();
        many[0] = many[0].visible(false);
        let array = LightArray::build(&many, 0.5, 0.5);

        assert_eq!(array.visible_count(), MAX_LIGHTS);
        assert_eq!(array.entries()[1], [1.0, 0.0, 0.0]);
        let last = array.entries()[1 + (MAX_LIGHTS - 1) * 3];
        assert_eq!(last, [MAX_LIGHTS as f32, 0.0, 0.0]);
    }

    #[test]
    fn uniform_pads_to_vec4() {
        let array = LightArray::build(&lights(), 0.5, 0.8);
        let uniform = array.to_uniform();
        assert_eq!(uniform.len(), 7);
        assert_eq!(uniform[1], [0.0, 50.0, 100.0, 0.0]);
    }
}

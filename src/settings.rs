use winit::keyboard::KeyCode;

use crate::scene::Scene;

/// Flat control-surface snapshot, read once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    /// Draw the G-Buffer channels down the left edge.
    pub debug: bool,
    pub animate: bool,
    /// Radians per second for animated instances.
    pub animation_speed: f32,
    /// 0 to 1, fed through [`ambience_term`](crate::light::ambience_term).
    pub ambience: f32,
    /// 0 to 1, fed through [`intensity_term`](crate::light::intensity_term).
    pub intensity: f32,
    pub clear_color: wgpu::Color,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            debug: false,
            animate: true,
            animation_speed: 0.5,
            ambience: 0.5,
            intensity: 0.8,
            clear_color: wgpu::Color {
                r: 0.02,
                g: 0.02,
                b: 0.03,
                a: 1.0,
            },
        }
    }
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn animate(mut self, animate: bool, speed: f32) -> Self {
        self.animate = animate;
        self.animation_speed = speed;
        self
    }

    pub fn lighting(mut self, ambience: f32, intensity: f32) -> Self {
        self.ambience = ambience;
        self.intensity = intensity;
        self
    }

    pub fn clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Apply a demo key binding. Returns false for unbound keys.
    ///
    /// `G` debug overlay, `Space` animation, `1`..`9` light visibility,
    /// `[`/`]` ambience, `-`/`=` intensity.
    pub fn apply_key(&mut self, key: KeyCode, scene: &mut Scene) -> bool {
        const STEP: f32 = 0.05;
        match key {
            KeyCode::KeyG => self.debug = !self.debug,
            KeyCode::Space => self.animate = !self.animate,
            KeyCode::BracketLeft => self.ambience = (self.ambience - STEP).max(0.0),
            KeyCode::BracketRight => self.ambience = (self.ambience + STEP).min(1.0),
            KeyCode::Minus => self.intensity = (self.intensity - STEP).max(0.0),
            KeyCode::Equal => self.intensity = (self.intensity + STEP).min(1.0),
            _ => {
                let Some(index) = light_index(key) else {
                    return false;
                };
                match scene.lights_mut().get_mut(index) {
                    Some(light) => {
                        light.visible = !light.visible;
                        log::info!("light {} {}", index + 1, if light.visible { "on" } else { "off" });
                    }
                    None => return false,
                }
            }
        }
        true
    }
}

fn light_index(key: KeyCode) -> Option<usize> {
    let digits = [
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
    ];
    digits.iter().position(|d| *d == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::PointLight;
    use glam::Vec3;

    #[test]
    fn defaults_match_demo() {
        let settings = RenderSettings::default();
        assert_eq!(settings.ambience, 0.5);
        assert_eq!(settings.intensity, 0.8);
        assert!(!settings.debug);
    }

    #[test]
    fn keys_toggle_flags() {
        let mut settings = RenderSettings::default();
        let mut scene = Scene::new();
        assert!(settings.apply_key(KeyCode::KeyG, &mut scene));
        assert!(settings.debug);
        assert!(settings.apply_key(KeyCode::Space, &mut scene));
        assert!(!settings.animate);
        assert!(!settings.apply_key(KeyCode::KeyQ, &mut scene));
    }

    #[test]
    fn lighting_keys_stay_in_range() {
        let mut settings = RenderSettings::default().lighting(0.98, 0.02);
        let mut scene = Scene::new();
        settings.apply_key(KeyCode::BracketRight, &mut scene);
        settings.apply_key(KeyCode::Minus, &mut scene);
        assert_eq!(settings.ambience, 1.0);
        assert_eq!(settings.intensity, 0.0);
    }

    #[test]
    fn digit_toggles_matching_light() {
        let mut settings = RenderSettings::default();
        let mut scene = Scene::new();
        scene.add_light(PointLight::new(Vec3::ZERO, Vec3::splat(255.0)));
        scene.add_light(PointLight::new(Vec3::X, Vec3::splat(255.0)));

        assert!(settings.apply_key(KeyCode::Digit2, &mut scene));
        assert!(scene.lights()[0].visible);
        assert!(!scene.lights()[1].visible);
        assert!(!settings.apply_key(KeyCode::Digit3, &mut scene));
    }
}

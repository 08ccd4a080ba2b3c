use crate::light::{LightArray, PointLight};
use crate::mesh::MeshInstance;

/// Index of a mesh instance in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshKey(usize);

/// Index of a light in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightKey(usize);

/// Mesh instances and point lights in insertion order.
///
/// Nothing is ever removed; hide things with their `visible` flag.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    meshes: Vec<MeshInstance>,
    lights: Vec<PointLight>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, instance: MeshInstance) -> MeshKey {
        self.meshes.push(instance);
        MeshKey(self.meshes.len() - 1)
    }

    pub fn add_light(&mut self, light: PointLight) -> LightKey {
        self.lights.push(light);
        LightKey(self.lights.len() - 1)
    }

    pub fn mesh(&self, key: MeshKey) -> Option<&MeshInstance> {
        self.meshes.get(key.0)
    }

    pub fn mesh_mut(&mut self, key: MeshKey) -> Option<&mut MeshInstance> {
        self.meshes.get_mut(key.0)
    }

    pub fn light(&self, key: LightKey) -> Option<&PointLight> {
        self.lights.get(key.0)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut PointLight> {
        self.lights.get_mut(key.0)
    }

    pub fn meshes(&self) -> &[MeshInstance] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [MeshInstance] {
        &mut self.meshes
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.lights
    }

    pub fn visible_meshes(&self) -> impl Iterator<Item = &MeshInstance> {
        self.meshes.iter().filter(|m| m.visible)
    }

    /// Serialize the visible lights for the lighting pass.
    pub fn light_array(&self, ambience: f32, intensity: f32) -> LightArray {
        LightArray::build(&self.lights, ambience, intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{GeometryId, MaterialId, ShaderId};
    use glam::Vec3;

    fn instance() -> MeshInstance {
        MeshInstance::new(GeometryId(0), ShaderId(0), MaterialId(0))
    }

    #[test]
    fn keeps_insertion_order() {
        let mut scene = Scene::new();
        let a = scene.add_mesh(instance());
        let b = scene.add_mesh(instance().visible(false));
        assert_eq!(scene.meshes().len(), 2);
        assert!(scene.mesh(a).is_some_and(|m| m.visible));
        assert!(scene.mesh(b).is_some_and(|m| !m.visible));
    }

    #[test]
    fn visible_meshes_skips_hidden() {
        let mut scene = Scene::new();
        scene.add_mesh(instance());
        let hidden = scene.add_mesh(instance());
        scene.add_mesh(instance());
        if let Some(mesh) = scene.mesh_mut(hidden) {
            mesh.visible = false;
        }
        assert_eq!(scene.visible_meshes().count(), 2);
    }

    #[test]
    fn light_array_counts_visible_lights() {
        let mut scene = Scene::new();
        scene.add_light(PointLight::new(Vec3::ZERO, Vec3::splat(255.0)));
        let off = scene.add_light(PointLight::new(Vec3::X, Vec3::splat(255.0)));
        scene.add_light(PointLight::new(Vec3::Y, Vec3::splat(255.0)));
        if let Some(light) = scene.light_mut(off) {
            light.visible = false;
        }
        let array = scene.light_array(0.5, 0.8);
        assert_eq!(array.header()[0], 6.0);
        assert_eq!(array.visible_count(), 2);
    }
}

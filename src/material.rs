use crate::assets::{Assets, TextureId};
use crate::texture::Texture;

/// Texture slot a shader samples, in binding order.
///
/// Slot `n` binds its texture at `@binding(2n)` and its sampler at
/// `@binding(2n + 1)` of the material group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureRole {
    Albedo,
    Normal,
    Material,
    Base,
    Position,
}

impl TextureRole {
    pub const COUNT: usize = 5;

    pub const ALL: [TextureRole; Self::COUNT] = [
        TextureRole::Albedo,
        TextureRole::Normal,
        TextureRole::Material,
        TextureRole::Base,
        TextureRole::Position,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextureRole::Albedo => "albedo",
            TextureRole::Normal => "normal",
            TextureRole::Material => "material",
            TextureRole::Base => "base",
            TextureRole::Position => "position",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn texture_binding(self) -> u32 {
        self.slot() as u32 * 2
    }

    pub fn sampler_binding(self) -> u32 {
        self.slot() as u32 * 2 + 1
    }
}

impl std::fmt::Display for TextureRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared mapping from texture role to texture handle.
///
/// Albedo, normal and packed material (metallic, roughness, AO) are required;
/// base and position are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    slots: [Option<TextureId>; TextureRole::COUNT],
}

impl Material {
    pub fn new(albedo: TextureId, normal: TextureId, material: TextureId) -> Self {
        let mut slots = [None; TextureRole::COUNT];
        slots[TextureRole::Albedo.slot()] = Some(albedo);
        slots[TextureRole::Normal.slot()] = Some(normal);
        slots[TextureRole::Material.slot()] = Some(material);
        Self { slots }
    }

    pub fn with(mut self, role: TextureRole, texture: TextureId) -> Self {
        self.set(role, texture);
        self
    }

    pub fn set(&mut self, role: TextureRole, texture: TextureId) {
        self.slots[role.slot()] = Some(texture);
    }

    pub fn texture(&self, role: TextureRole) -> Option<TextureId> {
        self.slots[role.slot()]
    }

    /// Present slots in binding order.
    pub fn bindings(&self) -> impl Iterator<Item = (TextureRole, TextureId)> + '_ {
        TextureRole::ALL
            .into_iter()
            .filter_map(|role| self.texture(role).map(|id| (role, id)))
    }

    /// Resolve handles against the registry for binding.
    pub fn view<'a>(&self, assets: &'a Assets) -> MaterialView<'a> {
        self.bindings()
            .filter_map(|(role, id)| assets.texture(id).map(|texture| (role, texture)))
            .fold(MaterialView::new(), |view, (role, texture)| {
                view.with(role, texture)
            })
    }
}

/// Borrowed textures ready to bind. Does not own anything; used both for
/// registry materials and for the G-Buffer attachments.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialView<'a> {
    slots: [Option<&'a Texture>; TextureRole::COUNT],
}

impl<'a> MaterialView<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: TextureRole, texture: &'a Texture) -> Self {
        self.slots[role.slot()] = Some(texture);
        self
    }

    pub fn get(&self, role: TextureRole) -> Option<&'a Texture> {
        self.slots[role.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureRole, &'a Texture)> + '_ {
        TextureRole::ALL
            .into_iter()
            .filter_map(|role| self.get(role).map(|texture| (role, texture)))
    }
}

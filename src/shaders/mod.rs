//! Built-in WGSL sources.

pub const GBUFFER_VERTEX: &str = include_str!("gbuffer.vert.wgsl");
pub const GBUFFER_FRAGMENT: &str = include_str!("gbuffer.frag.wgsl");
pub const SCREEN_QUAD_VERTEX: &str = include_str!("screen_quad.vert.wgsl");
pub const LIGHTING_FRAGMENT: &str = include_str!("lighting.frag.wgsl");
pub const PASSTHROUGH_FRAGMENT: &str = include_str!("passthrough.frag.wgsl");

mod backend;
mod headless;
mod shapes;
mod wgpu_backend;

pub use backend::{
    BlendMode, CompositeTarget, Framebuffer, GraphicsStateSnapshot, LightingBackend, Program,
    SceneRenderer, StencilMode, StencilTest, TargetBinding,
};
pub use headless::{BackendCommand, HeadlessBackend, HeadlessFramebuffer};
pub use shapes::{ShapeRenderer, ShapeVertex};
pub use wgpu_backend::{
    OffscreenTarget, WgpuBackend, LIGHT_ACCUMULATION_FORMAT, MAX_LIGHT_DRAWS,
    SCENE_COLOR_FORMAT, STENCIL_FORMAT,
};

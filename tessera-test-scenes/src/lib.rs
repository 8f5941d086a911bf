pub mod expectations;
pub mod scene;
pub mod shaders;

pub use expectations::{check_draws, DrawExpectation};
pub use scene::{
    build_main_scene, canvas_projection, checkerboard_rgba, font_atlas_rgba, SceneResources,
    CANVAS_HEIGHT, CANVAS_WIDTH,
};

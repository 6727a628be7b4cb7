//! HTTP handlers

pub mod components;
pub mod extract;
pub mod folder;
pub mod health;
pub mod quality;
pub mod templates;

pub use components::{
    components_get_by_doc, components_get_by_user, components_patch_by_doc,
    components_patch_by_user,
};
pub use extract::extract;
pub use folder::validate_folder;
pub use health::{health_check, root};
pub use quality::quality;
pub use templates::{list_templates, save_template};

pub mod adjustments;
pub mod clipboard;
pub mod effects;
pub mod filters;
pub mod stroke;
pub mod transform;

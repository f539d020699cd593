pub mod color;
pub mod fill;
pub mod merge;
pub mod shapes;
pub mod text;
pub mod transform;

pub mod fonts;
pub mod shape;

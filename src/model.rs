pub mod dataset;
pub mod element;
pub mod patch;
pub mod template;

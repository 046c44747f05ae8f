pub mod archive;
pub mod batch;
pub mod blur;
pub mod compositor;
pub mod encode;
pub mod settings;

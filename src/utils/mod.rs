pub mod color;
pub mod duration;
pub mod file_size;
pub mod mime;
pub mod naming;

//! 子命令实现

pub mod linear;
pub mod nddf;
pub mod notion;

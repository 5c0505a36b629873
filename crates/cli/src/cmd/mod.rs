mod build;
mod describe;

pub use build::cmd_build;
pub use describe::cmd_describe;

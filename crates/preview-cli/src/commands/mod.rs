pub mod apply;
pub mod content;
pub mod init;
pub mod plan;
pub mod route;
pub mod sync;
pub mod synth;

// Library interface for studyfeed modules
// This allows tests and other binaries to import modules

pub mod assembler;
pub mod auth;
pub mod collector;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod snapshot;

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod rules;

pub use codegen::{GeneratedProgram, ProgramUnit};
pub use error::{CompileError, ErrorKind};
pub use pipeline::{compile, Compiler};

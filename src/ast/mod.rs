/// Query AST and the SQL frontend/backend around it.
///
/// ```text
/// Athena SQL text
///       ↓
/// Parser (parser.rs, over sqlparser)
///       ↓
/// Query AST (types.rs)
///       ↓
/// Spark SQL compiler / formatter (compiler.rs, formatter.rs)
/// ```
///
/// Dependency extraction, rule rewriting and program generation work on the
/// AST in between; see the crate root.
pub mod compiler;
pub mod formatter;
pub mod parser;
pub mod types;

// Re-export key types for convenience
pub use compiler::{compile, compile_expr};
pub use formatter::format_sql;
pub use parser::{parse, parse_sql, ParsedQuery};
pub use types::*;

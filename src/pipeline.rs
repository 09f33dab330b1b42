//! The compile pipeline: parse → extract → rewrite → generate.
//!
//! Each stage consumes the complete output of the previous one and the
//! first failure stops the compile. Nothing is shared between calls, so
//! independent files can be compiled in parallel by the caller.

use tracing::debug;

use crate::ast::parse;
use crate::codegen::{GeneratedProgram, Generator};
use crate::config::Config;
use crate::error::CompileError;
use crate::extract::Extractor;
use crate::rules::RuleSet;

/// Compile with the default configuration.
pub fn compile(sql: &str, context: &str) -> Result<GeneratedProgram, CompileError> {
    Compiler::default().compile(sql, context)
}

pub struct Compiler {
    extractor: Extractor,
    rules: RuleSet,
    generator: Generator,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Compiler {
    pub fn new(config: &Config) -> Self {
        Self {
            extractor: Extractor::new(config.extract.clone(), config.catalog.clone()),
            rules: RuleSet::athena_to_spark(config),
            generator: Generator::new(config.pretty),
        }
    }

    /// Replace the rule set, e.g. with one carrying extra rules.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Compile `sql` into a program tagged with `context`. Errors carry the
    /// exact source text of the offending span.
    pub fn compile(&self, sql: &str, context: &str) -> Result<GeneratedProgram, CompileError> {
        self.run(sql, context)
            .map_err(|e| e.with_source_snippet(sql))
    }

    fn run(&self, sql: &str, context: &str) -> Result<GeneratedProgram, CompileError> {
        let parsed = parse(sql)?;
        debug!(units = parsed.spans.len(), "parsed");

        let extraction = self.extractor.extract(&parsed.query)?;
        let rewritten = self.rules.rewrite(parsed.query)?;

        Ok(self.generator.generate(&rewritten, &extraction, context))
    }
}

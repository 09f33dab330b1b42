//! Program generation: one unit per CTE in dependency-first order, then the
//! outer statement as the single materialization unit.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::ast::compiler::{compile_cte_body, compile_query_body};
use crate::ast::formatter::{format_cte_body, format_query_body};
use crate::ast::Query;
use crate::extract::{Extraction, PhysicalTable, References, TemporalLiteral};

const FINAL_UNIT: &str = "final";

/// One named stage of a generated program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramUnit {
    pub name: String,
    /// Spark SQL of the unit, without a WITH clause.
    pub body: String,
    /// Units this one reads, in definition order.
    pub depends_on: Vec<String>,
    /// Physical tables this unit reads, as catalog-qualified target names.
    pub tables: Vec<String>,
    pub context: String,
    /// Set only on the last unit.
    pub materialization: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedProgram {
    pub context: String,
    pub units: Vec<ProgramUnit>,
    pub tables: Vec<PhysicalTable>,
    pub temporal_literals: Vec<TemporalLiteral>,
}

impl GeneratedProgram {
    pub fn unit(&self, name: &str) -> Option<&ProgramUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    /// The materialization unit.
    pub fn final_unit(&self) -> Option<&ProgramUnit> {
        self.units.last()
    }

    /// Most frequent date among the temporal literals; ties go to the
    /// earliest date.
    pub fn dominant_cutoff(&self) -> Option<NaiveDate> {
        let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for date in self.temporal_literals.iter().filter_map(|l| l.date) {
            *counts.entry(date).or_default() += 1;
        }
        let mut best: Option<(NaiveDate, usize)> = None;
        for (date, count) in counts {
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((date, count));
            }
        }
        best.map(|(date, _)| date)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Generator {
    pub pretty: bool,
}

impl Generator {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Emit the program for a rewritten query. `extraction` must come from
    /// the same query before rewriting; CTE indices line up.
    pub fn generate(&self, query: &Query, extraction: &Extraction, context: &str) -> GeneratedProgram {
        let graph = &extraction.graph;
        let ctes = query.ctes();
        let mut units = Vec::with_capacity(graph.order.len() + 1);

        for &idx in &graph.order {
            let (Some(cte), Some(node)) = (ctes.get(idx), graph.nodes.get(idx)) else {
                continue;
            };
            let body = if self.pretty {
                format_cte_body(cte)
            } else {
                compile_cte_body(cte)
            };
            units.push(self.unit(&node.name, body, &node.refs, extraction, context, false));
        }

        let body = if self.pretty {
            format_query_body(query)
        } else {
            compile_query_body(query)
        };
        let name = final_unit_name(graph.nodes.iter().map(|n| n.name.as_str()));
        units.push(self.unit(&name, body, &graph.root, extraction, context, true));

        debug!(units = units.len(), context, "generated program");

        GeneratedProgram {
            context: context.to_string(),
            units,
            tables: extraction.tables.clone(),
            temporal_literals: extraction.temporal_literals.clone(),
        }
    }

    fn unit(
        &self,
        name: &str,
        body: String,
        refs: &References,
        extraction: &Extraction,
        context: &str,
        materialization: bool,
    ) -> ProgramUnit {
        let graph = &extraction.graph;
        ProgramUnit {
            name: name.to_string(),
            body,
            depends_on: refs
                .depends_on
                .keys()
                .filter_map(|&i| graph.nodes.get(i))
                .map(|n| n.name.clone())
                .collect(),
            tables: refs
                .tables
                .iter()
                .filter_map(|&i| extraction.tables.get(i))
                .map(|t| t.qualified_name().to_string())
                .collect(),
            context: context.to_string(),
            materialization,
        }
    }
}

/// `final`, with `_` appended until it differs from every CTE name.
fn final_unit_name<'a>(ctes: impl Iterator<Item = &'a str> + Clone) -> String {
    let mut name = FINAL_UNIT.to_string();
    while ctes.clone().any(|c| c.eq_ignore_ascii_case(&name)) {
        name.push('_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_sql;
    use crate::extract::extract;

    fn generate(sql: &str, pretty: bool) -> GeneratedProgram {
        let query = parse_sql(sql).unwrap();
        let extraction = extract(&query).unwrap();
        Generator::new(pretty).generate(&query, &extraction, "ctx")
    }

    #[test]
    fn test_units_in_dependency_order() {
        let program = generate(
            "WITH a AS (SELECT id FROM s.t), b AS (SELECT id FROM a) SELECT * FROM b",
            false,
        );
        assert_eq!(program.unit_names(), vec!["a", "b", "final"]);
        assert_eq!(program.units[0].body, "SELECT id FROM s.t");
        assert_eq!(program.units[0].tables, vec!["spark_catalog.s.t"]);
        assert_eq!(program.units[1].depends_on, vec!["a"]);
        assert_eq!(program.units[2].body, "SELECT * FROM b");
        assert_eq!(program.units[2].depends_on, vec!["b"]);
    }

    #[test]
    fn test_only_final_unit_materializes() {
        let program = generate("WITH a AS (SELECT 1 AS x) SELECT * FROM a", false);
        let flags: Vec<bool> = program.units.iter().map(|u| u.materialization).collect();
        assert_eq!(flags, vec![false, true]);
        assert_eq!(program.final_unit().map(|u| u.name.as_str()), Some("final"));
    }

    #[test]
    fn test_context_tags_every_unit() {
        let program = generate("WITH a AS (SELECT 1 AS x) SELECT * FROM a", false);
        assert_eq!(program.context, "ctx");
        assert!(program.units.iter().all(|u| u.context == "ctx"));
    }

    #[test]
    fn test_final_name_avoids_cte_collision() {
        let program = generate(
            "WITH final AS (SELECT 1 AS x), final_ AS (SELECT * FROM final) SELECT * FROM final_",
            false,
        );
        assert_eq!(program.unit_names(), vec!["final", "final_", "final__"]);
    }

    #[test]
    fn test_statement_without_ctes() {
        let program = generate("SELECT * FROM s.t LIMIT 5", false);
        assert_eq!(program.units.len(), 1);
        assert_eq!(program.units[0].body, "SELECT * FROM s.t LIMIT 5");
        assert_eq!(program.units[0].tables, vec!["spark_catalog.s.t"]);
    }

    #[test]
    fn test_pretty_bodies() {
        let program = generate("WITH a AS (SELECT id, n FROM s.t) SELECT * FROM a", true);
        assert_eq!(program.units[0].body, "SELECT\n    id,\n    n\nFROM s.t");
        assert_eq!(program.units[1].body, "SELECT *\nFROM a");
    }

    #[test]
    fn test_dominant_cutoff() {
        let program = generate(
            "WITH a AS (SELECT * FROM s.t WHERE fecha_corte = 20251107), \
             b AS (SELECT * FROM s.u WHERE fecha_corte = '2025-11-07') \
             SELECT * FROM a JOIN b ON a.k = b.k WHERE dt < '2024-01-01'",
            false,
        );
        assert_eq!(program.dominant_cutoff(), NaiveDate::from_ymd_opt(2025, 11, 7));
    }

    #[test]
    fn test_dominant_cutoff_tie_prefers_earliest() {
        let program = generate(
            "SELECT * FROM s.t WHERE fecha > '2025-02-01' AND fecha < '2025-01-01'",
            false,
        );
        assert_eq!(program.dominant_cutoff(), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(generate("SELECT 1", false).dominant_cutoff(), None);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let sql = "WITH z AS (SELECT 1 AS x), y AS (SELECT * FROM z), w AS (SELECT * FROM z) \
                   SELECT * FROM y JOIN w ON y.x = w.x";
        assert_eq!(generate(sql, false), generate(sql, false));
    }
}

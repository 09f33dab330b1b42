//! Dependency extraction.
//!
//! Walks the parsed query once and produces:
//! - the CTE dependency graph (dense indices, definition order) with a
//!   dependency-first unit order,
//! - the physical tables read by each unit, classified into target catalogs,
//! - literals compared against temporal-looking columns (informational).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, trace};

use crate::ast::*;
use crate::config::{CatalogConfig, ExtractConfig, ForwardReferences, TableFormat};
use crate::error::ExtractError;

type Result<T> = std::result::Result<T, ExtractError>;

/// An external table referenced in table position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhysicalTable {
    /// Catalog as written in the source, if any (source catalogs dropped).
    pub catalog: Option<String>,
    pub schema: String,
    pub name: String,
    pub format: TableFormat,
    /// Catalog the table resolves to on the target engine.
    pub target_catalog: String,
    #[serde(skip)]
    pub span: SourceSpan,
}

impl PhysicalTable {
    /// `catalog.schema.table` on the target engine.
    pub fn qualified_name(&self) -> TableName {
        TableName::new([
            self.target_catalog.as_str(),
            self.schema.as_str(),
            self.name.as_str(),
        ])
    }

    fn same_table(&self, other: &PhysicalTable) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema)
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.target_catalog.eq_ignore_ascii_case(&other.target_catalog)
    }
}

/// A literal compared against a column whose name looks temporal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalLiteral {
    /// CTE the comparison appears in; `None` for the outer statement.
    pub unit: Option<String>,
    pub column: String,
    pub operator: String,
    /// Literal as written (rendered SQL).
    pub literal: String,
    /// The literal read as a calendar date, when it is one.
    pub date: Option<NaiveDate>,
    #[serde(skip)]
    pub span: SourceSpan,
}

/// CTE and table references of one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    /// Referenced CTE indices, with the span of the first reference.
    pub depends_on: BTreeMap<usize, SourceSpan>,
    /// Indices into [`Extraction::tables`], in first-appearance order.
    pub tables: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteNode {
    pub name: String,
    pub span: SourceSpan,
    pub refs: References,
}

/// CTE reference graph plus a synthetic root for the outer statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    /// One node per CTE, indexed by definition order.
    pub nodes: Vec<CteNode>,
    pub root: References,
    /// Dependency-first order of node indices.
    pub order: Vec<usize>,
}

impl DependencyGraph {
    /// Node index of a CTE name (case-insensitive).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.name.eq_ignore_ascii_case(name))
    }

    /// Names a CTE depends on, in definition order.
    pub fn dependencies_of(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.index_of(name)?;
        Some(self.names(&self.nodes[idx].refs))
    }

    /// Names the outer statement depends on, in definition order.
    pub fn root_dependencies(&self) -> Vec<&str> {
        self.names(&self.root)
    }

    /// CTE names in dependency-first order.
    pub fn ordered_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.nodes[i].name.as_str())
            .collect()
    }

    fn names(&self, refs: &References) -> Vec<&str> {
        refs.depends_on
            .keys()
            .map(|&i| self.nodes[i].name.as_str())
            .collect()
    }
}

/// Everything the extractor learns about a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub graph: DependencyGraph,
    pub tables: Vec<PhysicalTable>,
    pub temporal_literals: Vec<TemporalLiteral>,
}

/// Extract with the default configuration.
pub fn extract(query: &Query) -> Result<Extraction> {
    Extractor::default().extract(query)
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    pub config: ExtractConfig,
    pub catalog: CatalogConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig, catalog: CatalogConfig) -> Self {
        Self { config, catalog }
    }

    pub fn extract(&self, query: &Query) -> Result<Extraction> {
        let ctes = query.ctes();
        let index: HashMap<String, usize> = ctes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.to_lowercase(), i))
            .collect();

        let mut walker = Walker {
            extractor: self,
            index: &index,
            unit: None,
            refs: References::default(),
            tables: Vec::new(),
            literals: Vec::new(),
        };

        let mut nodes = Vec::with_capacity(ctes.len());
        for cte in ctes {
            walker.unit = Some(cte.name.clone());
            walker.refs = References::default();
            walker.query(&cte.query)?;
            nodes.push(CteNode {
                name: cte.name.clone(),
                span: cte.span,
                refs: std::mem::take(&mut walker.refs),
            });
        }

        walker.unit = None;
        walker.refs = References::default();
        walker.body(query)?;
        let root = std::mem::take(&mut walker.refs);

        detect_cycles(&nodes)?;
        if self.config.forward_references == ForwardReferences::Reject {
            reject_forward_references(&nodes)?;
        }
        let order = topological_order(&nodes);

        debug!(
            ctes = nodes.len(),
            tables = walker.tables.len(),
            temporal_literals = walker.literals.len(),
            "extracted dependencies"
        );

        Ok(Extraction {
            graph: DependencyGraph { nodes, root, order },
            tables: walker.tables,
            temporal_literals: walker.literals,
        })
    }

    /// Classify a non-CTE table name as a physical table.
    pub fn classify_table(&self, name: &TableName, span: SourceSpan) -> Result<PhysicalTable> {
        let (catalog, schema, table) = match name.parts.as_slice() {
            [table] => match &self.config.default_schema {
                Some(schema) => (None, schema.clone(), table.clone()),
                None => return Err(ExtractError::unresolved(name.to_string(), span)),
            },
            [schema, table] => (None, schema.clone(), table.clone()),
            [catalog, schema, table] => (Some(catalog.clone()), schema.clone(), table.clone()),
            _ => return Err(ExtractError::unresolved(name.to_string(), span)),
        };

        let catalog = catalog.filter(|c| !self.catalog.is_source_catalog(c));
        let format = self.catalog.format_of(&schema, &table);
        let target_catalog = catalog
            .clone()
            .unwrap_or_else(|| self.catalog.target_catalog(format).to_string());

        Ok(PhysicalTable {
            catalog,
            schema,
            name: table,
            format,
            target_catalog,
            span,
        })
    }

    /// Whether a column name matches the temporal-key heuristic.
    pub fn is_temporal_column(&self, column: &str) -> bool {
        let lower = column.to_lowercase();
        self.config.temporal_tokens.iter().any(|token| {
            let token = token.to_lowercase();
            lower.split('_').any(|part| part == token) || lower.ends_with(&token)
        })
    }
}

struct Walker<'a> {
    extractor: &'a Extractor,
    index: &'a HashMap<String, usize>,
    unit: Option<String>,
    refs: References,
    tables: Vec<PhysicalTable>,
    literals: Vec<TemporalLiteral>,
}

impl Walker<'_> {
    fn query(&mut self, query: &Query) -> Result<()> {
        // Nested WITH is rejected by the parser; only the outer query has CTEs.
        self.body(query)
    }

    fn body(&mut self, query: &Query) -> Result<()> {
        self.set_expr(&query.body)?;
        for order in &query.order_by {
            self.expr(&order.expr)?;
        }
        Ok(())
    }

    fn set_expr(&mut self, body: &SetExpr) -> Result<()> {
        match body {
            SetExpr::Select(s) => self.select(s),
            SetExpr::Nested(q) => self.query(q),
            SetExpr::SetOperation(op) => {
                self.set_expr(&op.left)?;
                self.set_expr(&op.right)
            }
        }
    }

    fn select(&mut self, select: &SelectQuery) -> Result<()> {
        for twj in &select.from {
            self.table_ref(&twj.relation)?;
            for join in &twj.joins {
                self.table_ref(&join.table)?;
                if let Some(JoinCondition::On(expr)) = &join.condition {
                    self.expr(expr)?;
                }
            }
        }
        for item in &select.projections {
            if let SelectItem::Expression { expr, .. } = item {
                self.expr(expr)?;
            }
        }
        if let Some(filter) = &select.filter {
            self.expr(filter)?;
        }
        for expr in &select.group_by {
            self.expr(expr)?;
        }
        if let Some(having) = &select.having {
            self.expr(having)?;
        }
        Ok(())
    }

    fn table_ref(&mut self, table: &TableRef) -> Result<()> {
        match table {
            TableRef::Table { name, span, .. } => {
                if let Some(&idx) = name.bare().and_then(|n| self.index.get(&n.to_lowercase())) {
                    trace!(unit = ?self.unit, cte = %name, "cte reference");
                    self.refs.depends_on.entry(idx).or_insert(*span);
                    return Ok(());
                }
                let table = self.extractor.classify_table(name, *span)?;
                let pos = match self.tables.iter().position(|t| t.same_table(&table)) {
                    Some(pos) => pos,
                    None => {
                        trace!(unit = ?self.unit, table = %name, "physical table");
                        self.tables.push(table);
                        self.tables.len() - 1
                    }
                };
                if !self.refs.tables.contains(&pos) {
                    self.refs.tables.push(pos);
                }
                Ok(())
            }
            TableRef::Subquery { query, .. } => self.query(query),
        }
    }

    fn expr(&mut self, expr: &Expression) -> Result<()> {
        match expr {
            Expression::Column { .. } | Expression::Literal(_) | Expression::Wildcard => Ok(()),
            Expression::BinaryOp { left, op, right } => {
                if op.is_comparison() {
                    self.comparison(left, op.as_str(), right);
                }
                self.expr(left)?;
                self.expr(right)
            }
            Expression::UnaryOp { expr, .. }
            | Expression::Nested(expr)
            | Expression::IsNull { expr, .. }
            | Expression::Cast { expr, .. }
            | Expression::Extract { expr, .. } => self.expr(expr),
            Expression::Interval { value, .. } => self.expr(value),
            Expression::Function(call) => self.exprs(&call.args),
            Expression::WindowFunction { function, window } => {
                self.exprs(&function.args)?;
                self.exprs(&window.partition_by)?;
                for order in &window.order_by {
                    self.expr(&order.expr)?;
                }
                Ok(())
            }
            Expression::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    self.expr(op)?;
                }
                for (when, then) in when_clauses {
                    self.expr(when)?;
                    self.expr(then)?;
                }
                if let Some(e) = else_clause {
                    self.expr(e)?;
                }
                Ok(())
            }
            Expression::Subquery(q) | Expression::Exists { subquery: q, .. } => self.query(q),
            Expression::InList { expr, list, .. } => {
                if let Some(column) = self.temporal_column(expr) {
                    for item in list {
                        self.record(&column, "IN", item);
                    }
                }
                self.expr(expr)?;
                self.exprs(list)
            }
            Expression::InSubquery { expr, subquery, .. } => {
                self.expr(expr)?;
                self.query(subquery)
            }
            Expression::Between {
                expr, low, high, ..
            } => {
                if let Some(column) = self.temporal_column(expr) {
                    self.record(&column, "BETWEEN", low);
                    self.record(&column, "BETWEEN", high);
                }
                self.expr(expr)?;
                self.expr(low)?;
                self.expr(high)
            }
        }
    }

    fn exprs(&mut self, exprs: &[Expression]) -> Result<()> {
        exprs.iter().try_for_each(|e| self.expr(e))
    }

    fn comparison(&mut self, left: &Expression, op: &str, right: &Expression) {
        if let Some(column) = self.temporal_column(left) {
            self.record(&column, op, right);
        } else if let Some(column) = self.temporal_column(right) {
            self.record(&column, op, left);
        }
    }

    fn temporal_column(&self, expr: &Expression) -> Option<String> {
        match expr {
            Expression::Column { name, .. } if self.extractor.is_temporal_column(name) => {
                Some(name.clone())
            }
            Expression::Nested(inner) | Expression::Cast { expr: inner, .. } => {
                self.temporal_column(inner)
            }
            _ => None,
        }
    }

    fn record(&mut self, column: &str, op: &str, value: &Expression) {
        let literal = match value {
            Expression::Literal(lit @ (Literal::Number(_) | Literal::String(_) | Literal::Typed { .. })) => lit,
            _ => return,
        };
        self.literals.push(TemporalLiteral {
            unit: self.unit.clone(),
            column: column.to_string(),
            operator: op.to_string(),
            literal: compile_expr(value),
            date: literal_date(literal),
            span: value.span(),
        });
    }
}

/// Read a literal as a date: `YYYY-MM-DD`, `YYYYMMDD`, or a typed
/// `DATE`/`TIMESTAMP` literal.
pub fn literal_date(lit: &Literal) -> Option<NaiveDate> {
    let text = match lit {
        Literal::Number(n) => n.as_str(),
        Literal::String(s) => s.trim(),
        Literal::Typed { data_type, value } if data_type.name == "DATE" || data_type.name == "TIMESTAMP" => {
            value.trim()
        }
        _ => return None,
    };
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

/// Depth-first search with in-progress marks; the first back edge found
/// (nodes and edges visited in index order) is reported.
fn detect_cycles(nodes: &[CteNode]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        InProgress,
        Done,
    }

    fn visit(
        node: usize,
        nodes: &[CteNode],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Result<()> {
        marks[node] = Mark::InProgress;
        stack.push(node);
        for (&dep, span) in &nodes[node].refs.depends_on {
            match marks[dep] {
                Mark::InProgress => {
                    let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|&n| nodes[n].name.clone()).collect();
                    path.push(nodes[dep].name.clone());
                    return Err(ExtractError::cycle(path, *span));
                }
                Mark::New => visit(dep, nodes, marks, stack)?,
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::New; nodes.len()];
    let mut stack = Vec::new();
    for node in 0..nodes.len() {
        if marks[node] == Mark::New {
            visit(node, nodes, &mut marks, &mut stack)?;
        }
    }
    Ok(())
}

fn reject_forward_references(nodes: &[CteNode]) -> Result<()> {
    for (idx, node) in nodes.iter().enumerate() {
        if let Some((&dep, span)) = node.refs.depends_on.range(idx..).next() {
            return Err(ExtractError::cycle(
                vec![node.name.clone(), nodes[dep].name.clone()],
                *span,
            ));
        }
    }
    Ok(())
}

/// Kahn's algorithm over node indices; among ready nodes the earliest
/// defined goes first. Assumes the graph is acyclic.
fn topological_order(nodes: &[CteNode]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.refs.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (idx, node) in nodes.iter().enumerate() {
        for &dep in node.refs.depends_on.keys() {
            dependents[dep].push(idx);
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in &dependents[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_sql;
    use crate::error::ExtractErrorKind;

    fn extract_sql(sql: &str) -> Result<Extraction> {
        extract(&parse_sql(sql).unwrap())
    }

    fn reordering() -> Extractor {
        Extractor::new(
            ExtractConfig {
                forward_references: ForwardReferences::Reorder,
                ..ExtractConfig::default()
            },
            CatalogConfig::default(),
        )
    }

    #[test]
    fn test_linear_chain() {
        let ex = extract_sql(
            "WITH a AS (SELECT id FROM s.t), b AS (SELECT id FROM a) SELECT * FROM b",
        )
        .unwrap();
        assert_eq!(ex.graph.ordered_names(), vec!["a", "b"]);
        assert_eq!(ex.graph.dependencies_of("b"), Some(vec!["a"]));
        assert_eq!(ex.graph.dependencies_of("A"), Some(vec![]));
        assert_eq!(ex.graph.root_dependencies(), vec!["b"]);
        assert_eq!(ex.tables.len(), 1);
        assert_eq!(ex.graph.nodes[0].refs.tables, vec![0]);
    }

    #[test]
    fn test_references_in_joins_and_subqueries() {
        let ex = extract_sql(
            "WITH a AS (SELECT 1 AS id), b AS (SELECT 1 AS id), c AS (SELECT 1 AS id), \
             d AS (SELECT x.id FROM a x JOIN (SELECT id FROM b) y ON x.id = y.id \
                   WHERE x.id IN (SELECT id FROM c) AND EXISTS (SELECT 1 FROM s.t)) \
             SELECT * FROM d",
        )
        .unwrap();
        assert_eq!(ex.graph.dependencies_of("d"), Some(vec!["a", "b", "c"]));
        assert_eq!(ex.graph.nodes[3].refs.tables.len(), 1);
    }

    #[test]
    fn test_column_references_are_not_dependencies() {
        let ex = extract_sql(
            "WITH a AS (SELECT 1 AS b), b AS (SELECT a.b FROM a) SELECT * FROM b",
        )
        .unwrap();
        assert_eq!(ex.graph.dependencies_of("a"), Some(vec![]));
    }

    #[test]
    fn test_unresolved_bare_name() {
        let err = extract_sql("WITH a AS (SELECT id FROM t) SELECT * FROM a").unwrap_err();
        match err.kind {
            ExtractErrorKind::UnresolvedReference { name } => assert_eq!(name, "t"),
            _ => panic!("Expected UnresolvedReference"),
        }
        assert!(!err.span.is_empty());
    }

    #[test]
    fn test_default_schema_resolves_bare_name() {
        let extractor = Extractor::new(
            ExtractConfig {
                default_schema: Some("default".into()),
                ..ExtractConfig::default()
            },
            CatalogConfig::default(),
        );
        let ex = extractor
            .extract(&parse_sql("SELECT * FROM t").unwrap())
            .unwrap();
        assert_eq!(ex.tables[0].schema, "default");
        assert_eq!(ex.tables[0].qualified_name().to_string(), "spark_catalog.default.t");
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let err = extract_sql("WITH a AS (SELECT * FROM a) SELECT * FROM a").unwrap_err();
        match err.kind {
            ExtractErrorKind::CyclicDependency { cycle_path } => {
                assert_eq!(cycle_path, vec!["a".to_string(), "a".to_string()]);
            }
            _ => panic!("Expected CyclicDependency"),
        }
    }

    #[test]
    fn test_mutual_cycle_path() {
        let err = reordering()
            .extract(
                &parse_sql(
                    "WITH a AS (SELECT * FROM c), b AS (SELECT * FROM a), c AS (SELECT * FROM b) \
                     SELECT * FROM c",
                )
                .unwrap(),
            )
            .unwrap_err();
        match err.kind {
            ExtractErrorKind::CyclicDependency { cycle_path } => {
                assert_eq!(cycle_path, vec!["a", "c", "b", "a"]);
            }
            _ => panic!("Expected CyclicDependency"),
        }
    }

    #[test]
    fn test_forward_reference_rejected_by_default() {
        let err = extract_sql(
            "WITH b AS (SELECT * FROM c), c AS (SELECT 1 AS x) SELECT * FROM b",
        )
        .unwrap_err();
        match err.kind {
            ExtractErrorKind::CyclicDependency { cycle_path } => {
                assert_eq!(cycle_path, vec!["b", "c"]);
            }
            _ => panic!("Expected CyclicDependency"),
        }
    }

    #[test]
    fn test_forward_reference_reordered() {
        let ex = reordering()
            .extract(
                &parse_sql(
                    "WITH c AS (SELECT * FROM a JOIN b ON a.x = b.x), b AS (SELECT * FROM a), \
                     a AS (SELECT 1 AS x) SELECT * FROM c",
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(ex.graph.ordered_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_kahn_ties_follow_definition_order() {
        let ex = extract_sql(
            "WITH z AS (SELECT 1 AS x), y AS (SELECT 1 AS x), w AS (SELECT * FROM z, y) \
             SELECT * FROM w",
        )
        .unwrap();
        assert_eq!(ex.graph.ordered_names(), vec!["z", "y", "w"]);
    }

    #[test]
    fn test_catalog_classification() {
        let mut catalog = CatalogConfig::default();
        catalog
            .tables
            .insert("dwh.dim_tiempo".into(), TableFormat::Iceberg);
        let extractor = Extractor::new(ExtractConfig::default(), catalog);
        let ex = extractor
            .extract(
                &parse_sql(
                    "SELECT * FROM awsdatacatalog.dwh.dim_tiempo d \
                     JOIN stg.saldos s ON d.k = s.k JOIN other.x.y o ON o.k = s.k \
                     JOIN DWH.DIM_TIEMPO d2 ON d2.k = d.k",
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(ex.tables.len(), 3);
        assert_eq!(ex.tables[0].catalog, None);
        assert_eq!(ex.tables[0].format, TableFormat::Iceberg);
        assert_eq!(ex.tables[0].target_catalog, "glue_catalog");
        assert_eq!(ex.tables[1].target_catalog, "spark_catalog");
        assert_eq!(ex.tables[2].catalog.as_deref(), Some("other"));
        assert_eq!(ex.tables[2].target_catalog, "other");
        assert_eq!(ex.graph.root.tables, vec![0, 1, 2]);
    }

    #[test]
    fn test_temporal_literals() {
        let ex = extract_sql(
            "WITH a AS (SELECT * FROM s.t WHERE fecha_corte < 20251107 AND d < 5) \
             SELECT * FROM a WHERE '2025-01-31' <= fec_proceso \
             AND dt BETWEEN DATE '2025-01-01' AND DATE '2025-02-01' \
             AND fecha IN ('2025-03-01', 'x')",
        )
        .unwrap();
        let lits = &ex.temporal_literals;
        assert_eq!(lits.len(), 6);
        assert_eq!(lits[0].unit.as_deref(), Some("a"));
        assert_eq!(lits[0].column, "fecha_corte");
        assert_eq!(lits[0].operator, "<");
        assert_eq!(lits[0].date, NaiveDate::from_ymd_opt(2025, 11, 7));
        assert_eq!(lits[1].unit, None);
        assert_eq!(lits[1].column, "fec_proceso");
        assert_eq!(lits[1].literal, "'2025-01-31'");
        assert_eq!(lits[2].operator, "BETWEEN");
        assert_eq!(lits[2].date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(lits[4].operator, "IN");
        assert_eq!(lits[5].date, None);
    }

    #[test]
    fn test_is_temporal_column() {
        let ex = Extractor::default();
        assert!(ex.is_temporal_column("fecha_corte"));
        assert!(ex.is_temporal_column("FEC_PROCESO"));
        assert!(ex.is_temporal_column("load_date"));
        assert!(ex.is_temporal_column("fechacorte"));
        assert!(!ex.is_temporal_column("id"));
        assert!(!ex.is_temporal_column("d"));
    }

    #[test]
    fn test_literal_date_formats() {
        assert_eq!(
            literal_date(&Literal::Number("20251107".into())),
            NaiveDate::from_ymd_opt(2025, 11, 7)
        );
        assert_eq!(
            literal_date(&Literal::String("2025-11-07".into())),
            NaiveDate::from_ymd_opt(2025, 11, 7)
        );
        assert_eq!(
            literal_date(&Literal::Typed {
                data_type: DataType::new("TIMESTAMP"),
                value: "2025-11-07 10:00:00".into()
            }),
            NaiveDate::from_ymd_opt(2025, 11, 7)
        );
        assert_eq!(literal_date(&Literal::Number("2025".into())), None);
        assert_eq!(literal_date(&Literal::Number("202511071".into())), None);
    }
}

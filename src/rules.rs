//! Dialect rule engine: Athena/Trino constructs → Spark SQL.
//!
//! A [`RuleSet`] rewrites a parsed query in a single post-order traversal.
//! Function calls are matched by (name, arity) against the registered
//! [`FunctionRule`]s; cast targets and typed literals go through the type
//! map; physical table names are qualified with their target catalog. A
//! construct with no matching rule is a [`RewriteError`], never passed
//! through as written.

use std::cell::Cell;
use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::ast::compiler::compile_function;
use crate::ast::*;
use crate::config::Config;
use crate::error::RewriteError;
use crate::extract::Extractor;

type Result<T> = std::result::Result<T, RewriteError>;

/// Number of arguments a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive range.
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exact(k) => n == k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(k) => n >= k,
        }
    }

    fn overlaps(&self, other: &Arity) -> bool {
        let (a_lo, a_hi) = self.bounds();
        let (b_lo, b_hi) = other.bounds();
        a_lo <= b_hi && b_lo <= a_hi
    }

    fn bounds(&self) -> (usize, usize) {
        match *self {
            Arity::Exact(k) => (k, k),
            Arity::Range(lo, hi) => (lo, hi),
            Arity::AtLeast(k) => (k, usize::MAX),
        }
    }
}

/// Rewrite of one source-dialect function shape.
///
/// Rules are pure and independent: a rule sees its call with arguments
/// already rewritten and never depends on another rule having fired.
///
/// # Example
///
/// ```ignore
/// struct Nvl;
///
/// impl FunctionRule for Nvl {
///     fn name(&self) -> &str { "NVL" }
///     fn arity(&self) -> Arity { Arity::Exact(2) }
///     fn rewrite(&self, call: FunctionCall) -> Result<Expression, RewriteError> {
///         Ok(Expression::Function(FunctionCall { name: "COALESCE".into(), ..call }))
///     }
/// }
/// ```
pub trait FunctionRule: Send + Sync {
    /// Upper-cased source function name.
    fn name(&self) -> &str;

    fn arity(&self) -> Arity;

    fn description(&self) -> &str {
        ""
    }

    /// Produce the target-dialect fragment for a matched call.
    fn rewrite(&self, call: FunctionCall) -> Result<Expression>;
}

/// Function that means the same in both dialects.
struct Portable {
    name: &'static str,
    arity: Arity,
}

impl FunctionRule for Portable {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn description(&self) -> &str {
        "portable, passed through"
    }

    fn rewrite(&self, call: FunctionCall) -> Result<Expression> {
        Ok(Expression::Function(call))
    }
}

/// Same arguments, different name.
struct Rename {
    from: &'static str,
    to: &'static str,
    arity: Arity,
}

impl FunctionRule for Rename {
    fn name(&self) -> &str {
        self.from
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn description(&self) -> &str {
        "renamed"
    }

    fn rewrite(&self, call: FunctionCall) -> Result<Expression> {
        Ok(Expression::Function(FunctionCall {
            name: self.to.to_string(),
            ..call
        }))
    }
}

/// Rule with a dedicated rewrite function.
struct Custom {
    name: &'static str,
    arity: Arity,
    description: &'static str,
    apply: fn(FunctionCall) -> Result<Expression>,
}

impl FunctionRule for Custom {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn description(&self) -> &str {
        self.description
    }

    fn rewrite(&self, call: FunctionCall) -> Result<Expression> {
        (self.apply)(call)
    }
}

const PORTABLE: &[(&str, Arity)] = &[
    // Aggregates
    ("COUNT", Arity::AtLeast(1)),
    ("SUM", Arity::Exact(1)),
    ("AVG", Arity::Exact(1)),
    ("MIN", Arity::Exact(1)),
    ("MAX", Arity::Exact(1)),
    ("STDDEV", Arity::Exact(1)),
    ("STDDEV_SAMP", Arity::Exact(1)),
    ("STDDEV_POP", Arity::Exact(1)),
    ("VARIANCE", Arity::Exact(1)),
    ("VAR_SAMP", Arity::Exact(1)),
    ("VAR_POP", Arity::Exact(1)),
    ("COUNT_IF", Arity::Exact(1)),
    ("BOOL_AND", Arity::Exact(1)),
    ("BOOL_OR", Arity::Exact(1)),
    // Window
    ("ROW_NUMBER", Arity::Exact(0)),
    ("RANK", Arity::Exact(0)),
    ("DENSE_RANK", Arity::Exact(0)),
    ("PERCENT_RANK", Arity::Exact(0)),
    ("CUME_DIST", Arity::Exact(0)),
    ("NTILE", Arity::Exact(1)),
    ("LAG", Arity::Range(1, 3)),
    ("LEAD", Arity::Range(1, 3)),
    ("FIRST_VALUE", Arity::Exact(1)),
    ("LAST_VALUE", Arity::Exact(1)),
    ("NTH_VALUE", Arity::Exact(2)),
    // Conditional
    ("COALESCE", Arity::AtLeast(1)),
    ("NULLIF", Arity::Exact(2)),
    ("GREATEST", Arity::AtLeast(1)),
    ("LEAST", Arity::AtLeast(1)),
    // Math
    ("ABS", Arity::Exact(1)),
    ("ROUND", Arity::Range(1, 2)),
    ("CEIL", Arity::Exact(1)),
    ("CEILING", Arity::Exact(1)),
    ("FLOOR", Arity::Exact(1)),
    ("POWER", Arity::Exact(2)),
    ("SQRT", Arity::Exact(1)),
    ("MOD", Arity::Exact(2)),
    ("LN", Arity::Exact(1)),
    ("EXP", Arity::Exact(1)),
    ("SIGN", Arity::Exact(1)),
    // String
    ("CONCAT", Arity::AtLeast(1)),
    ("LENGTH", Arity::Exact(1)),
    ("LOWER", Arity::Exact(1)),
    ("UPPER", Arity::Exact(1)),
    ("TRIM", Arity::Exact(1)),
    ("LTRIM", Arity::Exact(1)),
    ("RTRIM", Arity::Exact(1)),
    ("SUBSTR", Arity::Range(2, 3)),
    ("REPLACE", Arity::Range(2, 3)),
    ("LPAD", Arity::Exact(3)),
    ("RPAD", Arity::Exact(3)),
    ("REVERSE", Arity::Exact(1)),
    ("INSTR", Arity::Exact(2)),
    ("CHR", Arity::Exact(1)),
    // Date parts
    ("YEAR", Arity::Exact(1)),
    ("QUARTER", Arity::Exact(1)),
    ("MONTH", Arity::Exact(1)),
    ("DAY", Arity::Exact(1)),
    ("HOUR", Arity::Exact(1)),
    ("MINUTE", Arity::Exact(1)),
    ("SECOND", Arity::Exact(1)),
    ("CURRENT_DATE", Arity::Exact(0)),
    ("CURRENT_TIMESTAMP", Arity::Exact(0)),
];

const RENAMES: &[(&str, &str, Arity)] = &[
    ("STRPOS", "INSTR", Arity::Exact(2)),
    ("APPROX_DISTINCT", "APPROX_COUNT_DISTINCT", Arity::Range(1, 2)),
    ("APPROX_PERCENTILE", "PERCENTILE_APPROX", Arity::Exact(2)),
    ("ARBITRARY", "FIRST", Arity::Exact(1)),
    ("FROM_ISO8601_DATE", "TO_DATE", Arity::Exact(1)),
    ("DAY_OF_MONTH", "DAYOFMONTH", Arity::Exact(1)),
    ("DAY_OF_YEAR", "DAYOFYEAR", Arity::Exact(1)),
    ("DOY", "DAYOFYEAR", Arity::Exact(1)),
    ("WEEK", "WEEKOFYEAR", Arity::Exact(1)),
    ("WEEK_OF_YEAR", "WEEKOFYEAR", Arity::Exact(1)),
    ("LAST_DAY_OF_MONTH", "LAST_DAY", Arity::Exact(1)),
];

fn custom_rules() -> Vec<Custom> {
    vec![
        Custom {
            name: "DATE_ADD",
            arity: Arity::Exact(3),
            description: "date_add(unit, n, d) → d + make_interval(...)",
            apply: date_add,
        },
        Custom {
            name: "DATE_DIFF",
            arity: Arity::Exact(3),
            description: "date_diff(unit, a, b) → timestampdiff(UNIT, a, b)",
            apply: date_diff,
        },
        Custom {
            name: "DATE_TRUNC",
            arity: Arity::Exact(2),
            description: "date_trunc(unit, d) → trunc / date_trunc",
            apply: date_trunc,
        },
        Custom {
            name: "DATE_FORMAT",
            arity: Arity::Exact(2),
            description: "MySQL-style format string → Spark datetime pattern",
            apply: date_format,
        },
        Custom {
            name: "DATE_PARSE",
            arity: Arity::Exact(2),
            description: "date_parse(s, fmt) → to_timestamp(s, pattern)",
            apply: date_parse,
        },
        Custom {
            name: "DAY_OF_WEEK",
            arity: Arity::Exact(1),
            description: "ISO day of week",
            apply: day_of_week,
        },
        Custom {
            name: "DOW",
            arity: Arity::Exact(1),
            description: "ISO day of week",
            apply: day_of_week,
        },
        Custom {
            name: "IF",
            arity: Arity::Range(2, 3),
            description: "two-argument IF gets an explicit NULL branch",
            apply: if_expr,
        },
        Custom {
            name: "NOW",
            arity: Arity::Exact(0),
            description: "now() → current_timestamp()",
            apply: |_| Ok(func("CURRENT_TIMESTAMP", vec![])),
        },
        Custom {
            name: "REGEXP_LIKE",
            arity: Arity::Exact(2),
            description: "regexp_like(s, p) → s RLIKE p",
            apply: regexp_like,
        },
        Custom {
            name: "REGEXP_REPLACE",
            arity: Arity::Range(2, 3),
            description: "two-argument form removes matches",
            apply: regexp_replace,
        },
        Custom {
            name: "REGEXP_EXTRACT",
            arity: Arity::Range(2, 3),
            description: "two-argument form returns the whole match",
            apply: regexp_extract,
        },
        Custom {
            name: "DATE",
            arity: Arity::Exact(1),
            description: "date(x) → CAST(x AS DATE)",
            apply: date_cast,
        },
    ]
}

/// Registered rules plus the catalog used to qualify physical tables.
pub struct RuleSet {
    functions: Vec<Box<dyn FunctionRule>>,
    /// (folded key, replacement)
    literal_aliases: Vec<(String, String)>,
    tables: Extractor,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::athena_to_spark(&Config::default())
    }
}

impl RuleSet {
    /// A rule set with no function rules; every call is rejected.
    pub fn new(config: &Config) -> Self {
        Self {
            functions: Vec::new(),
            literal_aliases: config
                .rules
                .literal_aliases
                .iter()
                .filter(|(k, _)| {
                    let keep = !k.trim().is_empty();
                    if !keep {
                        warn!("ignoring literal alias with an empty key");
                    }
                    keep
                })
                .map(|(k, v)| (fold(k), v.clone()))
                .collect(),
            tables: Extractor::new(config.extract.clone(), config.catalog.clone()),
        }
    }

    /// The Athena/Trino → Spark rule table.
    pub fn athena_to_spark(config: &Config) -> Self {
        let mut rules = Self::new(config);
        for &(name, arity) in PORTABLE {
            rules.add_function_rule(Box::new(Portable { name, arity }));
        }
        for &(from, to, arity) in RENAMES {
            rules.add_function_rule(Box::new(Rename { from, to, arity }));
        }
        for rule in custom_rules() {
            rules.add_function_rule(Box::new(rule));
        }
        rules
    }

    pub fn add_function_rule(&mut self, rule: Box<dyn FunctionRule>) {
        self.functions.push(rule);
    }

    /// Names of registered function rules, in registration order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.functions.iter().map(|r| r.name()).collect()
    }

    /// Rules matching a call shape. A well-formed table yields at most one.
    pub fn matching(&self, name: &str, arity: usize) -> Vec<&dyn FunctionRule> {
        self.functions
            .iter()
            .filter(|r| r.name() == name && r.arity().accepts(arity))
            .map(|r| r.as_ref())
            .collect()
    }

    /// Pairs of registered rules whose (name, arity) shapes overlap.
    pub fn conflicts(&self) -> Vec<(&str, Arity, Arity)> {
        let mut out = Vec::new();
        for (i, a) in self.functions.iter().enumerate() {
            for b in &self.functions[i + 1..] {
                if a.name() == b.name() && a.arity().overlaps(&b.arity()) {
                    out.push((a.name(), a.arity(), b.arity()));
                }
            }
        }
        out
    }

    /// Rewrite a whole query, children before parents.
    pub fn rewrite(&self, query: Query) -> Result<Query> {
        let rewriter = Rewriter {
            rules: self,
            ctes: query.ctes().iter().map(|c| c.name.to_lowercase()).collect(),
            applied: Cell::new(0),
        };
        let query = rewriter.query(query)?;
        debug!(applied = rewriter.applied.get(), "rewrote query");
        Ok(query)
    }

    fn rewrite_call(&self, call: FunctionCall) -> Result<Expression> {
        match self.matching(&call.name, call.arity()).first() {
            Some(rule) => {
                trace!(rule = rule.name(), arity = call.arity(), "applying rule");
                rule.rewrite(call)
            }
            None => {
                let detail = if self.functions.iter().any(|r| r.name() == call.name) {
                    format!("function {} does not take {} argument(s)", call.name, call.arity())
                } else {
                    format!("function {} has no Spark equivalent in the rule table", call.name)
                };
                Err(no_rule(&call, detail))
            }
        }
    }

    fn alias_for(&self, value: &str) -> Option<&str> {
        let key = fold(value);
        self.literal_aliases
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct Rewriter<'a> {
    rules: &'a RuleSet,
    ctes: HashSet<String>,
    applied: Cell<usize>,
}

impl Rewriter<'_> {
    fn query(&self, query: Query) -> Result<Query> {
        let with = match query.with {
            Some(w) => Some(WithClause {
                ctes: w
                    .ctes
                    .into_iter()
                    .map(|c| {
                        Ok(CTE {
                            query: self.query(c.query)?,
                            ..c
                        })
                    })
                    .collect::<Result<_>>()?,
                span: w.span,
            }),
            None => None,
        };
        Ok(Query {
            with,
            body: self.set_expr(query.body)?,
            order_by: self.order_by(query.order_by)?,
            limit: query.limit.map(|e| self.expr(e)).transpose()?,
            offset: query.offset.map(|e| self.expr(e)).transpose()?,
            span: query.span,
        })
    }

    fn set_expr(&self, body: SetExpr) -> Result<SetExpr> {
        Ok(match body {
            SetExpr::Select(s) => SetExpr::Select(Box::new(self.select(*s)?)),
            SetExpr::Nested(q) => SetExpr::Nested(Box::new(self.query(*q)?)),
            SetExpr::SetOperation(op) => {
                let op = *op;
                SetExpr::SetOperation(Box::new(SetOperation {
                    left: self.set_expr(op.left)?,
                    right: self.set_expr(op.right)?,
                    ..op
                }))
            }
        })
    }

    fn select(&self, select: SelectQuery) -> Result<SelectQuery> {
        Ok(SelectQuery {
            distinct: select.distinct,
            projections: select
                .projections
                .into_iter()
                .map(|item| match item {
                    SelectItem::Expression { expr, alias } => Ok(SelectItem::Expression {
                        expr: self.expr(expr)?,
                        alias,
                    }),
                    other => Ok(other),
                })
                .collect::<Result<_>>()?,
            from: select
                .from
                .into_iter()
                .map(|twj| self.table_with_joins(twj))
                .collect::<Result<_>>()?,
            filter: select.filter.map(|e| self.expr(e)).transpose()?,
            group_by: self.exprs(select.group_by)?,
            having: select.having.map(|e| self.expr(e)).transpose()?,
            span: select.span,
        })
    }

    fn table_with_joins(&self, twj: TableWithJoins) -> Result<TableWithJoins> {
        Ok(TableWithJoins {
            relation: self.table_ref(twj.relation)?,
            joins: twj
                .joins
                .into_iter()
                .map(|join| {
                    Ok(Join {
                        join_type: join.join_type,
                        table: self.table_ref(join.table)?,
                        condition: match join.condition {
                            Some(JoinCondition::On(e)) => Some(JoinCondition::On(self.expr(e)?)),
                            other => other,
                        },
                    })
                })
                .collect::<Result<_>>()?,
        })
    }

    fn table_ref(&self, table: TableRef) -> Result<TableRef> {
        match table {
            TableRef::Table { name, alias, span } => {
                let is_cte = name
                    .bare()
                    .is_some_and(|n| self.ctes.contains(&n.to_lowercase()));
                if is_cte {
                    return Ok(TableRef::Table { name, alias, span });
                }
                // Names the extractor cannot classify are left as written.
                let name = match self.rules.tables.classify_table(&name, span) {
                    Ok(table) => table.qualified_name(),
                    Err(_) => name,
                };
                Ok(TableRef::Table { name, alias, span })
            }
            TableRef::Subquery { query, alias, span } => Ok(TableRef::Subquery {
                query: Box::new(self.query(*query)?),
                alias,
                span,
            }),
        }
    }

    fn exprs(&self, exprs: Vec<Expression>) -> Result<Vec<Expression>> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&self, expr: Box<Expression>) -> Result<Box<Expression>> {
        Ok(Box::new(self.expr(*expr)?))
    }

    fn order_by(&self, order_by: Vec<OrderByExpr>) -> Result<Vec<OrderByExpr>> {
        order_by
            .into_iter()
            .map(|o| {
                Ok(OrderByExpr {
                    expr: self.expr(o.expr)?,
                    asc: o.asc,
                    // Trino sorts NULLs last in both directions; Spark puts them
                    // first for ASC.
                    nulls_first: o.nulls_first.or(Some(false)),
                })
            })
            .collect()
    }

    fn call(&self, call: FunctionCall) -> Result<Expression> {
        let call = FunctionCall {
            args: self.exprs(call.args)?,
            ..call
        };
        self.applied.set(self.applied.get() + 1);
        self.rules.rewrite_call(call)
    }

    fn expr(&self, expr: Expression) -> Result<Expression> {
        Ok(match expr {
            Expression::Column { .. } | Expression::Wildcard => expr,
            Expression::Literal(lit) => Expression::Literal(self.literal(lit)?),
            Expression::BinaryOp { left, op, right } => {
                let left = self.boxed(left)?;
                let right = self.boxed(right)?;
                // Integer / integer truncates in Trino; Spark's `/` is always fractional.
                let op = if op == BinaryOperator::Divide && is_integral(&left) && is_integral(&right)
                {
                    BinaryOperator::IntDivide
                } else {
                    op
                };
                Expression::BinaryOp { left, op, right }
            }
            Expression::UnaryOp { op, expr } => Expression::UnaryOp {
                op,
                expr: self.boxed(expr)?,
            },
            Expression::Function(call) => self.call(call)?,
            Expression::WindowFunction { function, window } => {
                let window = WindowSpec {
                    partition_by: self.exprs(window.partition_by)?,
                    order_by: self.order_by(window.order_by)?,
                    frame: window.frame,
                };
                let original = function.clone();
                match self.call(function)? {
                    Expression::Function(function) => {
                        Expression::WindowFunction { function, window }
                    }
                    _ => {
                        return Err(no_rule(
                            &original,
                            format!("function {} has no Spark window form", original.name),
                        ))
                    }
                }
            }
            Expression::Case {
                operand,
                when_clauses,
                else_clause,
            } => Expression::Case {
                operand: operand.map(|e| self.boxed(e)).transpose()?,
                when_clauses: when_clauses
                    .into_iter()
                    .map(|(w, t)| Ok((self.expr(w)?, self.expr(t)?)))
                    .collect::<Result<_>>()?,
                else_clause: else_clause.map(|e| self.boxed(e)).transpose()?,
            },
            Expression::Cast {
                expr,
                data_type,
                safe,
                span,
            } => {
                let expr = self.boxed(expr)?;
                let data_type = spark_type(&data_type).ok_or_else(|| {
                    RewriteError::no_rule(
                        data_type.name.clone(),
                        span,
                        data_type.to_string(),
                        format!("type {} has no Spark equivalent", data_type),
                    )
                })?;
                Expression::Cast {
                    expr,
                    data_type,
                    safe,
                    span,
                }
            }
            Expression::Extract { field, expr, span } => {
                let expr = self.expr(*expr)?;
                extract_field(&field, expr, span)?
            }
            Expression::Interval { value, unit } => Expression::Interval {
                value: self.boxed(value)?,
                unit,
            },
            Expression::Subquery(q) => Expression::Subquery(Box::new(self.query(*q)?)),
            Expression::Exists { subquery, negated } => Expression::Exists {
                subquery: Box::new(self.query(*subquery)?),
                negated,
            },
            Expression::InList {
                expr,
                list,
                negated,
            } => Expression::InList {
                expr: self.boxed(expr)?,
                list: self.exprs(list)?,
                negated,
            },
            Expression::InSubquery {
                expr,
                subquery,
                negated,
            } => Expression::InSubquery {
                expr: self.boxed(expr)?,
                subquery: Box::new(self.query(*subquery)?),
                negated,
            },
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => Expression::Between {
                expr: self.boxed(expr)?,
                low: self.boxed(low)?,
                high: self.boxed(high)?,
                negated,
            },
            Expression::IsNull { expr, negated } => Expression::IsNull {
                expr: self.boxed(expr)?,
                negated,
            },
            Expression::Nested(inner) => Expression::Nested(self.boxed(inner)?),
        })
    }

    fn literal(&self, lit: Literal) -> Result<Literal> {
        match lit {
            Literal::String(s) => match self.rules.alias_for(&s) {
                Some(canonical) => {
                    trace!(from = %s, to = canonical, "literal alias");
                    Ok(Literal::String(canonical.to_string()))
                }
                None => Ok(Literal::String(s)),
            },
            Literal::Typed { data_type, value } => match data_type.name.as_str() {
                "DATE" | "TIMESTAMP" => Ok(Literal::Typed { data_type, value }),
                _ => Err(RewriteError::no_rule(
                    data_type.name.clone(),
                    SourceSpan::empty(),
                    compile_expr(&Expression::Literal(Literal::Typed {
                        data_type: data_type.clone(),
                        value,
                    })),
                    format!("{} literals have no Spark equivalent", data_type.name),
                )),
            },
            other => Ok(other),
        }
    }
}

/// Spark equivalent of a source type name.
pub fn spark_type(data_type: &DataType) -> Option<DataType> {
    let mapped = match data_type.name.as_str() {
        "VARCHAR" | "CHAR" | "STRING" => DataType::new("STRING"),
        "INTEGER" | "INT" => DataType::new("INT"),
        "REAL" | "FLOAT" => DataType::new("FLOAT"),
        "DOUBLE" | "DOUBLE PRECISION" => DataType::new("DOUBLE"),
        // Trino's bare DECIMAL is decimal(38,0); Spark's is decimal(10,0).
        "DECIMAL" | "NUMERIC" if data_type.args.is_empty() => {
            DataType::with_args("DECIMAL", vec!["38".to_string(), "0".to_string()])
        }
        "DECIMAL" | "NUMERIC" => DataType::with_args("DECIMAL", data_type.args.clone()),
        "BIGINT" | "SMALLINT" | "TINYINT" | "DATE" | "TIMESTAMP" | "BOOLEAN" => {
            DataType::new(data_type.name.clone())
        }
        _ => return None,
    };
    Some(mapped)
}

/// Whether an already-rewritten expression always has an integral type.
fn is_integral(expr: &Expression) -> bool {
    match expr {
        Expression::Literal(Literal::Number(n)) => {
            let digits = n.trim_start_matches(['-', '+']);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        Expression::Cast { data_type, .. } => {
            matches!(data_type.name.as_str(), "INT" | "BIGINT" | "SMALLINT" | "TINYINT")
        }
        Expression::Function(call) => call.name == "COUNT",
        Expression::WindowFunction { function, .. } => matches!(
            function.name.as_str(),
            "COUNT" | "ROW_NUMBER" | "RANK" | "DENSE_RANK" | "NTILE"
        ),
        Expression::UnaryOp {
            op: UnaryOperator::Minus | UnaryOperator::Plus,
            expr,
        } => is_integral(expr),
        Expression::BinaryOp {
            left,
            op:
                BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Modulo
                | BinaryOperator::IntDivide,
            right,
        } => is_integral(left) && is_integral(right),
        Expression::Nested(inner) => is_integral(inner),
        _ => false,
    }
}

fn extract_field(field: &str, expr: Expression, span: SourceSpan) -> Result<Expression> {
    let field = match field {
        "YEAR" | "QUARTER" | "MONTH" | "WEEK" | "DAY" | "HOUR" | "MINUTE" | "DOY" => field,
        "DAY_OF_YEAR" => "DOY",
        "DOW" | "DAY_OF_WEEK" => "DAYOFWEEK_ISO",
        // Spark's EXTRACT(SECOND) keeps the fraction.
        "SECOND" => return Ok(func("SECOND", vec![expr])),
        other => {
            return Err(RewriteError::no_rule(
                other,
                span,
                format!("EXTRACT({} FROM {})", other, compile_expr(&expr)),
                format!("EXTRACT field {} has no Spark equivalent", other),
            ))
        }
    };
    Ok(Expression::Extract {
        field: field.to_string(),
        expr: Box::new(expr),
        span,
    })
}

fn no_rule(call: &FunctionCall, detail: impl Into<String>) -> RewriteError {
    RewriteError::no_rule(
        call.name.clone(),
        call.span,
        compile_function(call),
        detail,
    )
}

fn func(name: &str, args: Vec<Expression>) -> Expression {
    Expression::Function(FunctionCall::new(name, args))
}

fn cast(expr: Expression, data_type: DataType) -> Expression {
    Expression::Cast {
        expr: Box::new(expr),
        data_type,
        safe: false,
        span: SourceSpan::empty(),
    }
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Move the arguments out of a call whose arity the rule table guarantees.
fn take_args<const N: usize>(call: &mut FunctionCall) -> Result<[Expression; N]> {
    let args = std::mem::take(&mut call.args);
    match <[Expression; N]>::try_from(args) {
        Ok(args) => Ok(args),
        Err(args) => {
            call.args = args;
            Err(no_rule(
                call,
                format!("{} expects {} argument(s)", call.name, N),
            ))
        }
    }
}

/// `n * factor`, folded when `n` is an integer literal.
fn scale(n: Expression, factor: i64) -> Expression {
    if factor == 1 {
        return n;
    }
    if let Expression::Literal(Literal::Number(text)) = &n {
        if let Some(v) = text.parse::<i64>().ok().and_then(|v| v.checked_mul(factor)) {
            return Expression::number(v.to_string());
        }
    }
    binary(
        n.parenthesized(),
        BinaryOperator::Multiply,
        Expression::number(factor.to_string()),
    )
}

/// Lower-cased unit name from a string-literal argument, checked against
/// the units the rule handles.
fn unit_arg(call: &FunctionCall, idx: usize, known: &[&str]) -> Result<String> {
    let unit = match call.args.get(idx) {
        Some(Expression::Literal(Literal::String(unit))) => unit.to_lowercase(),
        _ => {
            return Err(no_rule(
                call,
                format!("{} needs a string-literal unit", call.name),
            ))
        }
    };
    if known.contains(&unit.as_str()) {
        Ok(unit)
    } else {
        Err(no_rule(
            call,
            format!("{} with unit '{}' has no Spark equivalent", call.name, unit),
        ))
    }
}

const DATE_UNITS: &[&str] = &[
    "day", "week", "month", "quarter", "year", "hour", "minute", "second",
];

fn date_add(mut call: FunctionCall) -> Result<Expression> {
    let unit = unit_arg(&call, 0, DATE_UNITS)?;
    let [_, n, date] = take_args::<3>(&mut call)?;
    // make_interval(years, months, weeks, days, hours, mins, secs). Adding an
    // interval keeps DATE for dates and TIMESTAMP for timestamps.
    let (slot, n) = match unit.as_str() {
        "year" => (0, n),
        "quarter" => (1, scale(n, 3)),
        "month" => (1, n),
        "week" => (2, n),
        "day" => (3, n),
        "hour" => (4, n),
        "minute" => (5, n),
        _ => (6, n),
    };
    let mut interval_args: Vec<Expression> = (0..7).map(|_| Expression::number("0")).collect();
    interval_args[slot] = n;
    Ok(binary(date, BinaryOperator::Plus, func("MAKE_INTERVAL", interval_args)))
}

/// `TIMESTAMPDIFF` counts whole units elapsed, like Trino's `date_diff`.
fn date_diff(mut call: FunctionCall) -> Result<Expression> {
    let unit = unit_arg(&call, 0, DATE_UNITS)?;
    let [_, start, end] = take_args::<3>(&mut call)?;
    Ok(func(
        "TIMESTAMPDIFF",
        vec![Expression::column(unit.to_uppercase()), start, end],
    ))
}

fn date_trunc(mut call: FunctionCall) -> Result<Expression> {
    let unit = unit_arg(&call, 0, DATE_UNITS)?;
    let [_, date] = take_args::<2>(&mut call)?;
    Ok(match unit.as_str() {
        "year" | "quarter" | "month" | "week" => {
            func("TRUNC", vec![date, Expression::string(unit)])
        }
        _ => func("DATE_TRUNC", vec![Expression::string(unit), date]),
    })
}

/// Spark pattern for the format argument; `None` when the argument has no
/// `%` specifiers and is already a Spark pattern.
fn format_arg(call: &FunctionCall) -> Result<Option<String>> {
    match call.args.get(1) {
        Some(Expression::Literal(Literal::String(fmt))) if !fmt.contains('%') => Ok(None),
        Some(Expression::Literal(Literal::String(fmt))) => {
            translate_format(fmt).map(Some).map_err(|spec| {
                no_rule(
                    call,
                    format!("format specifier %{} has no Spark equivalent", spec),
                )
            })
        }
        _ => Err(no_rule(
            call,
            format!("{} needs a string-literal format", call.name),
        )),
    }
}

fn date_format(mut call: FunctionCall) -> Result<Expression> {
    if let Some(pattern) = format_arg(&call)? {
        call.args[1] = Expression::string(pattern);
    }
    Ok(Expression::Function(call))
}

fn date_parse(mut call: FunctionCall) -> Result<Expression> {
    let pattern = format_arg(&call)?;
    let [value, format] = take_args::<2>(&mut call)?;
    let format = match (pattern, format) {
        (Some(pattern), _) => Expression::string(pattern),
        (None, Expression::Literal(Literal::String(fmt))) => {
            Expression::string(quote_pattern_literal(&fmt))
        }
        (None, other) => other,
    };
    Ok(func("TO_TIMESTAMP", vec![value, format]))
}

/// Translate a MySQL-style (`%Y-%m-%d`) format string into a Spark datetime
/// pattern. Returns the offending specifier character on failure.
pub fn translate_format(fmt: &str) -> std::result::Result<String, char> {
    let mut out = String::new();
    let mut literal = String::new();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        let Some(spec) = chars.next() else {
            return Err('%');
        };
        let pattern = match spec {
            'Y' => "yyyy",
            'y' => "yy",
            'm' => "MM",
            'c' => "M",
            'd' => "dd",
            'e' => "d",
            'H' => "HH",
            'k' => "H",
            'h' | 'I' => "hh",
            'l' => "h",
            'i' => "mm",
            's' | 'S' => "ss",
            'f' => "SSSSSS",
            'p' => "a",
            'M' => "MMMM",
            'b' => "MMM",
            'W' => "EEEE",
            'a' => "EEE",
            'j' => "DDD",
            'T' => "HH:mm:ss",
            'r' => "hh:mm:ss a",
            '%' => {
                literal.push('%');
                continue;
            }
            other => return Err(other),
        };
        out.push_str(&quote_pattern_literal(&literal));
        literal.clear();
        out.push_str(pattern);
    }
    out.push_str(&quote_pattern_literal(&literal));
    Ok(out)
}

/// Quote pattern letters so Spark reads them as literal text.
fn quote_pattern_literal(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    if text.chars().any(|c| c.is_ascii_alphabetic() || c == '\'') {
        format!("'{}'", text.replace('\'', "''"))
    } else {
        text.to_string()
    }
}

fn day_of_week(mut call: FunctionCall) -> Result<Expression> {
    let span = call.span;
    let [date] = take_args::<1>(&mut call)?;
    Ok(Expression::Extract {
        field: "DAYOFWEEK_ISO".to_string(),
        expr: Box::new(date),
        span,
    })
}

fn date_cast(mut call: FunctionCall) -> Result<Expression> {
    let [value] = take_args::<1>(&mut call)?;
    Ok(cast(value, DataType::new("DATE")))
}

fn if_expr(mut call: FunctionCall) -> Result<Expression> {
    if call.args.len() == 2 {
        call.args.push(Expression::Literal(Literal::Null));
    }
    Ok(Expression::Function(call))
}

fn regexp_like(mut call: FunctionCall) -> Result<Expression> {
    let [value, pattern] = take_args::<2>(&mut call)?;
    Ok(binary(value, BinaryOperator::RLike, pattern))
}

fn regexp_replace(mut call: FunctionCall) -> Result<Expression> {
    if call.args.len() == 2 {
        call.args.push(Expression::string(""));
    }
    Ok(Expression::Function(call))
}

fn regexp_extract(mut call: FunctionCall) -> Result<Expression> {
    if call.args.len() == 2 {
        call.args.push(Expression::number("0"));
    }
    Ok(Expression::Function(call))
}

/// Lower-case and strip Latin accents, for alias lookups.
fn fold(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

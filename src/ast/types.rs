//! Query AST types for the Athena → Spark pipeline.
//!
//! The tree covers exactly the dialect subset the pipeline accepts: a single
//! `SELECT` statement with an optional leading `WITH` clause, set operations,
//! joins, window functions, `CASE`, casts and scalar subqueries. Every node
//! owns its children; the tree is never cyclic. Nodes that rules and error
//! messages need to point at carry the [`SourceSpan`] they were parsed from.

use std::fmt;

use serde::Serialize;

/// A 1-based line/column position in the SQL source. Line 0 means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    pub const fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }
}

/// Source range of an AST node, as reported by the SQL tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceSpan {
    pub start: Position,
    pub end: Position,
}

impl SourceSpan {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A span that points nowhere (synthesized nodes).
    pub const fn empty() -> Self {
        Self {
            start: Position::new(0, 0),
            end: Position::new(0, 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.line == 0
    }

    /// Smallest span covering both `self` and `other`, ignoring empty spans.
    pub fn union(self, other: SourceSpan) -> SourceSpan {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => other,
            (_, true) => self,
            _ => SourceSpan {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            },
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<unknown>");
        }
        if self.end.line == 0 || self.end == self.start {
            write!(f, "{}:{}", self.start.line, self.start.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// A complete query: optional `WITH`, a body, and trailing modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub with: Option<WithClause>,
    pub body: SetExpr,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub span: SourceSpan,
}

impl Query {
    /// Wrap a single SELECT into a query without modifiers.
    pub fn from_select(select: SelectQuery) -> Self {
        let span = select.span;
        Self {
            with: None,
            body: SetExpr::Select(Box::new(select)),
            order_by: vec![],
            limit: None,
            offset: None,
            span,
        }
    }

    /// CTE definitions of this query, in source order.
    pub fn ctes(&self) -> &[CTE] {
        self.with.as_ref().map(|w| w.ctes.as_slice()).unwrap_or(&[])
    }
}

/// `WITH name AS (...), ...`
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub ctes: Vec<CTE>,
    pub span: SourceSpan,
}

/// Common Table Expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CTE {
    pub name: String,
    /// Optional column list: `name (a, b) AS (...)`.
    pub columns: Vec<String>,
    pub query: Query,
    pub span: SourceSpan,
}

/// Query body: a SELECT, a set operation, or a parenthesized query.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Select(Box<SelectQuery>),
    SetOperation(Box<SetOperation>),
    /// `( query )`, e.g. one parenthesized branch of a UNION chain.
    Nested(Box<Query>),
}

/// Set operations (UNION, INTERSECT, EXCEPT).
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub op: SetOperator,
    pub all: bool,
    pub left: SetExpr,
    pub right: SetExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// A SELECT block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projections: Vec<SelectItem>,
    pub from: Vec<TableWithJoins>,
    pub filter: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub span: SourceSpan,
}

/// A single item in the SELECT projection list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `table.*`
    QualifiedWildcard(String),
    /// An expression, optionally aliased: `expr AS alias`.
    Expression {
        expr: Expression,
        alias: Option<String>,
    },
}

/// One comma-separated FROM entry and the joins chained onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    pub relation: TableRef,
    pub joins: Vec<Join>,
}

/// Table reference in table position (FROM / JOIN).
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// Named relation: a CTE (`a`) or a physical table (`schema.table`,
    /// `catalog.schema.table`).
    Table {
        name: TableName,
        alias: Option<String>,
        span: SourceSpan,
    },
    /// Derived table: `(SELECT ...) AS alias`
    Subquery {
        query: Box<Query>,
        alias: Option<String>,
        span: SourceSpan,
    },
}

/// Dotted relation name, one entry per part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub parts: Vec<String>,
}

impl TableName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// The single identifier of an unqualified name.
    pub fn bare(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [name] => Some(name),
            _ => None,
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// Last part: the table (or CTE) name itself.
    pub fn table(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// JOIN clause representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub condition: Option<JoinCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expression),
    Using(Vec<String>),
}

/// Scalar, aggregate or window function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Upper-cased function name.
    pub name: String,
    pub args: Vec<Expression>,
    pub distinct: bool,
    /// False for the bare keyword form, e.g. `CURRENT_DATE`.
    pub parens: bool,
    pub span: SourceSpan,
}

impl FunctionCall {
    /// A synthesized call with parentheses and no source position.
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
            distinct: false,
            parens: true,
            span: SourceSpan::empty(),
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// Type name as written in a cast or typed literal, e.g. `DECIMAL(10,2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    /// Upper-cased base name (`VARCHAR`, `TIMESTAMP WITH TIME ZONE`, ...).
    pub name: String,
    pub args: Vec<String>,
}

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: vec![],
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.args.join(","))
        }
    }
}

/// Core expression type. Recursive to support arbitrary nesting.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Column reference: `table.column` or just `column`.
    Column { table: Option<String>, name: String },
    /// Literal value.
    Literal(Literal),
    /// Binary operation: `left op right`.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Unary operation: `op expr` (e.g., NOT, -).
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// Function call: `name(args)`.
    Function(FunctionCall),
    /// Window function: `fn(...) OVER (...)`.
    WindowFunction {
        function: FunctionCall,
        window: WindowSpec,
    },
    /// CASE expression.
    Case {
        operand: Option<Box<Expression>>,
        when_clauses: Vec<(Expression, Expression)>,
        else_clause: Option<Box<Expression>>,
    },
    /// `CAST(expr AS type)`, or `TRY_CAST` when `safe` is set.
    Cast {
        expr: Box<Expression>,
        data_type: DataType,
        safe: bool,
        span: SourceSpan,
    },
    /// `EXTRACT(field FROM expr)`.
    Extract {
        field: String,
        expr: Box<Expression>,
        span: SourceSpan,
    },
    /// `INTERVAL '1' DAY`.
    Interval {
        value: Box<Expression>,
        unit: Option<String>,
    },
    /// Scalar subquery expression: `(SELECT ...)`.
    Subquery(Box<Query>),
    /// `[NOT] EXISTS (SELECT ...)`.
    Exists { subquery: Box<Query>, negated: bool },
    /// expr IN (values).
    InList {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// expr IN (SELECT ...).
    InSubquery {
        expr: Box<Expression>,
        subquery: Box<Query>,
        negated: bool,
    },
    /// expr BETWEEN low AND high.
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    /// expr IS NULL / IS NOT NULL.
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
    /// Wildcard `*` (used in COUNT(*)).
    Wildcard,
    /// Nested expression (parenthesized).
    Nested(Box<Expression>),
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column {
            table: None,
            name: name.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn number(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::Number(value.into()))
    }

    /// Wrap in parentheses unless the expression is already atomic.
    pub fn parenthesized(self) -> Self {
        match self {
            Expression::BinaryOp { .. } | Expression::UnaryOp { .. } => {
                Expression::Nested(Box::new(self))
            }
            other => other,
        }
    }

    /// Source position of the node, when it carries one.
    pub fn span(&self) -> SourceSpan {
        match self {
            Expression::Function(call) => call.span,
            Expression::WindowFunction { function, .. } => function.span,
            Expression::Cast { span, .. } | Expression::Extract { span, .. } => *span,
            Expression::Subquery(q) => q.span,
            Expression::Exists { subquery, .. } => subquery.span,
            Expression::BinaryOp { left, right, .. } => left.span().union(right.span()),
            Expression::UnaryOp { expr, .. }
            | Expression::Nested(expr)
            | Expression::IsNull { expr, .. } => expr.span(),
            Expression::InList { expr, .. }
            | Expression::InSubquery { expr, .. }
            | Expression::Between { expr, .. } => expr.span(),
            _ => SourceSpan::empty(),
        }
    }
}

/// Literal values in SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Numeric literal, kept verbatim so re-emission preserves formatting.
    Number(String),
    String(String),
    /// Typed string literal: `DATE '2025-11-07'`.
    Typed { data_type: DataType, value: String },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    /// Integral division (`DIV`), truncating toward zero.
    IntDivide,
    Modulo,
    // String
    Like,
    NotLike,
    RLike,
    Concat,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::Like
            | BinaryOperator::NotLike
            | BinaryOperator::RLike => 4,
            BinaryOperator::Concat => 5,
            BinaryOperator::Plus | BinaryOperator::Minus => 6,
            BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::IntDivide
            | BinaryOperator::Modulo => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::IntDivide => "DIV",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::NotLike => "NOT LIKE",
            BinaryOperator::RLike => "RLIKE",
            BinaryOperator::Concat => "||",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

/// Window specification for window functions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<Expression>,
    pub order_by: Vec<OrderByExpr>,
    pub frame: Option<WindowFrame>,
}

/// Window frame specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub mode: WindowFrameMode,
    pub start: WindowFrameBound,
    pub end: Option<WindowFrameBound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFrameMode {
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFrameBound {
    CurrentRow,
    Preceding(Option<u64>),
    Following(Option<u64>),
}

/// ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expression,
    pub asc: Option<bool>,
    pub nulls_first: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_select_query() {
        let q = SelectQuery::default();
        assert!(!q.distinct);
        assert!(q.projections.is_empty());
        assert!(q.from.is_empty());
        assert!(q.filter.is_none());
        assert!(q.span.is_empty());
    }

    #[test]
    fn test_span_union_ignores_empty() {
        let a = SourceSpan::new(Position::new(1, 5), Position::new(1, 9));
        let b = SourceSpan::new(Position::new(2, 1), Position::new(2, 4));
        assert_eq!(a.union(SourceSpan::empty()), a);
        assert_eq!(SourceSpan::empty().union(b), b);
        let both = a.union(b);
        assert_eq!(both.start, Position::new(1, 5));
        assert_eq!(both.end, Position::new(2, 4));
    }

    #[test]
    fn test_span_display() {
        let span = SourceSpan::new(Position::new(3, 7), Position::new(3, 12));
        assert_eq!(span.to_string(), "3:7-3:12");
        assert_eq!(SourceSpan::empty().to_string(), "<unknown>");
    }

    #[test]
    fn test_table_name_parts() {
        let bare = TableName::new(["cte_a"]);
        assert_eq!(bare.bare(), Some("cte_a"));
        assert!(!bare.is_qualified());

        let qualified = TableName::new(["stg_cap", "stg_segmentacion_saldos_trad"]);
        assert!(qualified.bare().is_none());
        assert!(qualified.is_qualified());
        assert_eq!(qualified.table(), "stg_segmentacion_saldos_trad");
        assert_eq!(qualified.to_string(), "stg_cap.stg_segmentacion_saldos_trad");
    }

    #[test]
    fn test_data_type_display() {
        assert_eq!(DataType::new("VARCHAR").to_string(), "VARCHAR");
        assert_eq!(
            DataType::with_args("DECIMAL", vec!["18".into(), "2".into()]).to_string(),
            "DECIMAL(18,2)"
        );
    }

    #[test]
    fn test_parenthesized_only_wraps_operators() {
        let col = Expression::column("n");
        assert_eq!(col.clone().parenthesized(), col);

        let sum = Expression::BinaryOp {
            left: Box::new(Expression::column("n")),
            op: BinaryOperator::Plus,
            right: Box::new(Expression::number("1")),
        };
        assert!(matches!(sum.parenthesized(), Expression::Nested(_)));
    }

    #[test]
    fn test_operator_precedence_order() {
        assert!(BinaryOperator::And.precedence() > BinaryOperator::Or.precedence());
        assert!(BinaryOperator::Lt.precedence() > BinaryOperator::And.precedence());
        assert!(BinaryOperator::Multiply.precedence() > BinaryOperator::Plus.precedence());
    }

    #[test]
    fn test_query_ctes_empty_without_with() {
        let q = Query::from_select(SelectQuery::default());
        assert!(q.ctes().is_empty());
    }
}

/// AST → Spark SQL compiler.
///
/// Renders our internal AST as Spark SQL text. Output is a pure function of
/// the tree: identifiers are quoted only when Spark requires it, string
/// literals use Spark's backslash escaping, and operator nesting gets
/// parentheses wherever re-parsing would otherwise change the grouping.
use super::types::*;

const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "BETWEEN", "BY", "CASE", "CROSS", "DISTINCT", "ELSE", "END", "EXCEPT",
    "FALSE", "FROM", "FULL", "GROUP", "HAVING", "IN", "INNER", "INTERSECT", "IS", "JOIN", "LEFT",
    "LIKE", "LIMIT", "NOT", "NULL", "ON", "OR", "ORDER", "OUTER", "RIGHT", "SELECT", "TABLE",
    "THEN", "TRUE", "UNION", "USING", "WHEN", "WHERE", "WITH",
];

/// Compile a full query (including any WITH clause) into Spark SQL.
pub fn compile(query: &Query) -> String {
    let mut sql = String::new();
    if let Some(with) = &query.with {
        let ctes: Vec<String> = with
            .ctes
            .iter()
            .map(|c| {
                let cols = if c.columns.is_empty() {
                    String::new()
                } else {
                    format!("({})", quote_list(&c.columns))
                };
                format!("{}{} AS ({})", quote_ident(&c.name), cols, compile(&c.query))
            })
            .collect();
        sql.push_str(&format!("WITH {} ", ctes.join(", ")));
    }
    sql.push_str(&compile_query_body(query));
    sql
}

/// Compile a query without its WITH clause: the body plus ORDER BY / LIMIT.
pub fn compile_query_body(query: &Query) -> String {
    let mut parts = vec![compile_set_expr(&query.body)];

    if !query.order_by.is_empty() {
        let orders: Vec<String> = query.order_by.iter().map(compile_order_by).collect();
        parts.push(format!("ORDER BY {}", orders.join(", ")));
    }
    if let Some(limit) = &query.limit {
        parts.push(format!("LIMIT {}", compile_expr(limit)));
    }
    if let Some(offset) = &query.offset {
        parts.push(format!("OFFSET {}", compile_expr(offset)));
    }

    parts.join(" ")
}

/// Standalone body of a CTE unit. A column list becomes a derived-table
/// alias so the unit exposes the same column names.
pub fn compile_cte_body(cte: &CTE) -> String {
    let body = compile(&cte.query);
    if cte.columns.is_empty() {
        body
    } else {
        format!(
            "SELECT * FROM ({}) AS {}({})",
            body,
            quote_ident(&cte.name),
            quote_list(&cte.columns)
        )
    }
}

pub(crate) fn compile_set_expr(body: &SetExpr) -> String {
    match body {
        SetExpr::Select(s) => compile_select(s),
        SetExpr::Nested(q) => format!("({})", compile(q)),
        SetExpr::SetOperation(op) => format!(
            "{} {} {}",
            compile_set_expr(&op.left),
            set_operator(op),
            compile_set_expr(&op.right)
        ),
    }
}

pub(crate) fn set_operator(op: &SetOperation) -> String {
    let name = match op.op {
        SetOperator::Union => "UNION",
        SetOperator::Intersect => "INTERSECT",
        SetOperator::Except => "EXCEPT",
    };
    if op.all {
        format!("{} ALL", name)
    } else {
        name.to_string()
    }
}

fn compile_select(select: &SelectQuery) -> String {
    let mut parts = Vec::new();

    let mut select_clause = String::from("SELECT ");
    if select.distinct {
        select_clause.push_str("DISTINCT ");
    }
    if select.projections.is_empty() {
        select_clause.push('*');
    } else {
        let items: Vec<String> = select.projections.iter().map(compile_select_item).collect();
        select_clause.push_str(&items.join(", "));
    }
    parts.push(select_clause);

    if !select.from.is_empty() {
        let tables: Vec<String> = select.from.iter().map(compile_table_with_joins).collect();
        parts.push(format!("FROM {}", tables.join(", ")));
    }
    if let Some(filter) = &select.filter {
        parts.push(format!("WHERE {}", compile_expr(filter)));
    }
    if !select.group_by.is_empty() {
        let groups: Vec<String> = select.group_by.iter().map(compile_expr).collect();
        parts.push(format!("GROUP BY {}", groups.join(", ")));
    }
    if let Some(having) = &select.having {
        parts.push(format!("HAVING {}", compile_expr(having)));
    }

    parts.join(" ")
}

pub(crate) fn compile_select_item(item: &SelectItem) -> String {
    match item {
        SelectItem::Wildcard => "*".to_string(),
        SelectItem::QualifiedWildcard(table) => format!("{}.*", quote_ident(table)),
        SelectItem::Expression { expr, alias } => {
            let expr_str = compile_expr(expr);
            match alias {
                Some(a) => format!("{} AS {}", expr_str, quote_ident(a)),
                None => expr_str,
            }
        }
    }
}

pub(crate) fn compile_table_with_joins(twj: &TableWithJoins) -> String {
    let mut s = compile_table_ref(&twj.relation);
    for join in &twj.joins {
        s.push(' ');
        s.push_str(&compile_join(join));
    }
    s
}

pub(crate) fn compile_table_ref(table: &TableRef) -> String {
    match table {
        TableRef::Table { name, alias, .. } => {
            let mut s = compile_table_name(name);
            if let Some(a) = alias {
                s.push_str(&format!(" AS {}", quote_ident(a)));
            }
            s
        }
        TableRef::Subquery { query, alias, .. } => match alias {
            Some(a) => format!("({}) AS {}", compile(query), quote_ident(a)),
            None => format!("({})", compile(query)),
        },
    }
}

pub fn compile_table_name(name: &TableName) -> String {
    name.parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join(".")
}

pub(crate) fn join_keyword(join_type: JoinType) -> &'static str {
    match join_type {
        JoinType::Inner => "JOIN",
        JoinType::Left => "LEFT JOIN",
        JoinType::Right => "RIGHT JOIN",
        JoinType::Full => "FULL JOIN",
        JoinType::Cross => "CROSS JOIN",
    }
}

fn compile_join(join: &Join) -> String {
    let condition_str = match &join.condition {
        Some(JoinCondition::On(expr)) => format!(" ON {}", compile_expr(expr)),
        Some(JoinCondition::Using(cols)) => format!(" USING ({})", quote_list(cols)),
        None => String::new(),
    };

    format!(
        "{} {}{}",
        join_keyword(join.join_type),
        compile_table_ref(&join.table),
        condition_str
    )
}

/// Compile a single expression into Spark SQL.
pub fn compile_expr(expr: &Expression) -> String {
    match expr {
        Expression::Column { table, name } => match table {
            Some(t) => format!("{}.{}", quote_ident(t), quote_ident(name)),
            None => quote_ident(name),
        },
        Expression::Literal(lit) => compile_literal(lit),
        Expression::BinaryOp { left, op, right } => format!(
            "{} {} {}",
            operand(left, op, false),
            op.as_str(),
            operand(right, op, true)
        ),
        Expression::UnaryOp { op, expr } => {
            let inner = match expr.as_ref() {
                Expression::BinaryOp { .. } => format!("({})", compile_expr(expr)),
                // `--` and `++` would start a line comment or read as one token.
                Expression::UnaryOp {
                    op: UnaryOperator::Minus | UnaryOperator::Plus,
                    ..
                } if *op != UnaryOperator::Not => format!("({})", compile_expr(expr)),
                Expression::Literal(Literal::Number(n))
                    if *op != UnaryOperator::Not && (n.starts_with('-') || n.starts_with('+')) =>
                {
                    format!("({})", n)
                }
                other => compile_expr(other),
            };
            match op {
                UnaryOperator::Not => format!("NOT {}", inner),
                UnaryOperator::Minus => format!("-{}", inner),
                UnaryOperator::Plus => format!("+{}", inner),
            }
        }
        Expression::Function(call) => compile_function(call),
        Expression::WindowFunction { function, window } => format!(
            "{} OVER ({})",
            compile_function(function),
            compile_window_spec(window)
        ),
        Expression::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let mut s = String::from("CASE");
            if let Some(op) = operand {
                s.push_str(&format!(" {}", compile_expr(op)));
            }
            for (when, then) in when_clauses {
                s.push_str(&format!(
                    " WHEN {} THEN {}",
                    compile_expr(when),
                    compile_expr(then)
                ));
            }
            if let Some(else_expr) = else_clause {
                s.push_str(&format!(" ELSE {}", compile_expr(else_expr)));
            }
            s.push_str(" END");
            s
        }
        Expression::Cast {
            expr,
            data_type,
            safe,
            ..
        } => {
            let func = if *safe { "TRY_CAST" } else { "CAST" };
            format!("{}({} AS {})", func, compile_expr(expr), data_type)
        }
        Expression::Extract { field, expr, .. } => {
            format!("EXTRACT({} FROM {})", field, compile_expr(expr))
        }
        Expression::Interval { value, unit } => match unit {
            Some(u) => format!("INTERVAL {} {}", compile_expr(value), u),
            None => format!("INTERVAL {}", compile_expr(value)),
        },
        Expression::Subquery(q) => format!("({})", compile(q)),
        Expression::Exists { subquery, negated } => {
            let not_str = if *negated { "NOT " } else { "" };
            format!("{}EXISTS ({})", not_str, compile(subquery))
        }
        Expression::InList {
            expr,
            list,
            negated,
        } => {
            let not_str = if *negated { "NOT " } else { "" };
            let items: Vec<String> = list.iter().map(compile_expr).collect();
            format!(
                "{} {}IN ({})",
                predicate_operand(expr),
                not_str,
                items.join(", ")
            )
        }
        Expression::InSubquery {
            expr,
            subquery,
            negated,
        } => {
            let not_str = if *negated { "NOT " } else { "" };
            format!(
                "{} {}IN ({})",
                predicate_operand(expr),
                not_str,
                compile(subquery)
            )
        }
        Expression::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let not_str = if *negated { "NOT " } else { "" };
            format!(
                "{} {}BETWEEN {} AND {}",
                predicate_operand(expr),
                not_str,
                predicate_operand(low),
                predicate_operand(high)
            )
        }
        Expression::IsNull { expr, negated } => {
            let not_str = if *negated { "NOT " } else { "" };
            format!("{} IS {}NULL", predicate_operand(expr), not_str)
        }
        Expression::Wildcard => "*".to_string(),
        Expression::Nested(expr) => format!("({})", compile_expr(expr)),
    }
}

/// Render a binary-operator child, parenthesizing when its own operator
/// binds looser than the parent (or equally, on the right of a
/// non-associative operator).
fn operand(child: &Expression, parent: &BinaryOperator, right_side: bool) -> String {
    match child {
        Expression::BinaryOp { op, .. } => {
            let needs_parens = op.precedence() < parent.precedence()
                || (right_side
                    && op.precedence() == parent.precedence()
                    && !is_associative(parent));
            if needs_parens {
                format!("({})", compile_expr(child))
            } else {
                compile_expr(child)
            }
        }
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } if parent.precedence() > BinaryOperator::And.precedence() => {
            format!("({})", compile_expr(child))
        }
        Expression::Between { .. } | Expression::IsNull { .. } | Expression::InList { .. }
            if parent.precedence() > BinaryOperator::And.precedence() =>
        {
            format!("({})", compile_expr(child))
        }
        _ => compile_expr(child),
    }
}

fn is_associative(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::And
            | BinaryOperator::Or
            | BinaryOperator::Plus
            | BinaryOperator::Multiply
            | BinaryOperator::Concat
    )
}

/// Operand of IN / BETWEEN / IS NULL: boolean connectives must be grouped.
fn predicate_operand(expr: &Expression) -> String {
    match expr {
        Expression::BinaryOp { op, .. } if op.precedence() <= BinaryOperator::Lt.precedence() => {
            format!("({})", compile_expr(expr))
        }
        _ => compile_expr(expr),
    }
}

pub fn compile_function(call: &FunctionCall) -> String {
    if !call.parens {
        return call.name.clone();
    }
    let distinct_str = if call.distinct { "DISTINCT " } else { "" };
    let args_str: Vec<String> = call.args.iter().map(compile_expr).collect();
    format!("{}({}{})", call.name, distinct_str, args_str.join(", "))
}

pub fn compile_literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "NULL".to_string(),
        Literal::Boolean(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Literal::Number(n) => n.clone(),
        Literal::String(s) => quote_string(s),
        Literal::Typed { data_type, value } => format!("{} {}", data_type, quote_string(value)),
    }
}

/// Spark string literal: backslash escapes, no doubled quotes.
pub fn quote_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Quote an identifier with backticks unless it is a plain, non-reserved name.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain && !RESERVED.contains(&name.to_ascii_uppercase().as_str()) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

pub(crate) fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn compile_window_spec(spec: &WindowSpec) -> String {
    let mut parts = Vec::new();

    if !spec.partition_by.is_empty() {
        let cols: Vec<String> = spec.partition_by.iter().map(compile_expr).collect();
        parts.push(format!("PARTITION BY {}", cols.join(", ")));
    }
    if !spec.order_by.is_empty() {
        let orders: Vec<String> = spec.order_by.iter().map(compile_order_by).collect();
        parts.push(format!("ORDER BY {}", orders.join(", ")));
    }
    if let Some(frame) = &spec.frame {
        parts.push(compile_window_frame(frame));
    }

    parts.join(" ")
}

fn compile_window_frame(frame: &WindowFrame) -> String {
    let mode = match frame.mode {
        WindowFrameMode::Rows => "ROWS",
        WindowFrameMode::Range => "RANGE",
    };

    let start = compile_window_frame_bound(&frame.start);

    match &frame.end {
        Some(end) => format!(
            "{} BETWEEN {} AND {}",
            mode,
            start,
            compile_window_frame_bound(end)
        ),
        None => format!("{} {}", mode, start),
    }
}

fn compile_window_frame_bound(bound: &WindowFrameBound) -> String {
    match bound {
        WindowFrameBound::CurrentRow => "CURRENT ROW".to_string(),
        WindowFrameBound::Preceding(None) => "UNBOUNDED PRECEDING".to_string(),
        WindowFrameBound::Preceding(Some(n)) => format!("{} PRECEDING", n),
        WindowFrameBound::Following(None) => "UNBOUNDED FOLLOWING".to_string(),
        WindowFrameBound::Following(Some(n)) => format!("{} FOLLOWING", n),
    }
}

pub(crate) fn compile_order_by(order: &OrderByExpr) -> String {
    let mut s = compile_expr(&order.expr);
    match order.asc {
        Some(true) => s.push_str(" ASC"),
        Some(false) => s.push_str(" DESC"),
        None => {}
    }
    match order.nulls_first {
        Some(true) => s.push_str(" NULLS FIRST"),
        Some(false) => s.push_str(" NULLS LAST"),
        None => {}
    }
    s
}

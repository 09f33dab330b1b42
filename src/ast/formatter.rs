/// Spark SQL pretty-printer.
///
/// Renders a Query AST as indented, multi-line Spark SQL: one clause per line
/// and one projection per line. Expressions stay on one line and come from the
/// compiler, so formatted and compact output differ only in whitespace.
use super::compiler::{
    compile_expr, compile_order_by, compile_select_item, compile_table_name, join_keyword,
    quote_ident, quote_list, set_operator,
};
use super::types::*;

const INDENT: &str = "    ";

/// Format a query (including any WITH clause) as pretty-printed Spark SQL.
pub fn format_sql(query: &Query) -> String {
    format_query(query, 0)
}

/// Format a query without its WITH clause.
pub fn format_query_body(query: &Query) -> String {
    format_body(query, 0)
}

/// Pretty-printed body of a CTE unit; see [`super::compiler::compile_cte_body`].
pub fn format_cte_body(cte: &CTE) -> String {
    let body = format_query(&cte.query, 0);
    if cte.columns.is_empty() {
        body
    } else {
        format!(
            "SELECT *\nFROM (\n{}\n) AS {}({})",
            indent_block(&body, 1),
            quote_ident(&cte.name),
            quote_list(&cte.columns)
        )
    }
}

fn indent(level: usize) -> String {
    INDENT.repeat(level)
}

fn indent_block(text: &str, level: usize) -> String {
    let prefix = indent(level);
    text.lines()
        .map(|l| format!("{}{}", prefix, l))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_query(query: &Query, depth: usize) -> String {
    let prefix = indent(depth);
    let mut parts: Vec<String> = Vec::new();

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
                format!(
                    "{}{} AS (\n{}\n{})",
                    quote_ident(&c.name),
                    cols,
                    format_query(&c.query, depth + 1),
                    prefix
                )
            })
            .collect();
        parts.push(format!("{}WITH {}", prefix, ctes.join(",\n")));
    }

    parts.push(format_body(query, depth));
    parts.join("\n")
}

fn format_body(query: &Query, depth: usize) -> String {
    let prefix = indent(depth);
    let mut parts = vec![format_set_expr(&query.body, depth)];

    if !query.order_by.is_empty() {
        let orders: Vec<String> = query.order_by.iter().map(compile_order_by).collect();
        parts.push(format!("{}ORDER BY {}", prefix, orders.join(", ")));
    }
    if let Some(limit) = &query.limit {
        parts.push(format!("{}LIMIT {}", prefix, compile_expr(limit)));
    }
    if let Some(offset) = &query.offset {
        parts.push(format!("{}OFFSET {}", prefix, compile_expr(offset)));
    }

    parts.join("\n")
}

fn format_set_expr(body: &SetExpr, depth: usize) -> String {
    let prefix = indent(depth);
    match body {
        SetExpr::Select(s) => format_select(s, depth),
        SetExpr::Nested(q) => format!("{}(\n{}\n{})", prefix, format_query(q, depth + 1), prefix),
        SetExpr::SetOperation(op) => format!(
            "{}\n{}{}\n{}",
            format_set_expr(&op.left, depth),
            prefix,
            set_operator(op),
            format_set_expr(&op.right, depth)
        ),
    }
}

fn format_select(select: &SelectQuery, depth: usize) -> String {
    let prefix = indent(depth);
    let mut parts: Vec<String> = Vec::new();

    let mut select_clause = format!("{}SELECT", prefix);
    if select.distinct {
        select_clause.push_str(" DISTINCT");
    }
    if select.projections.is_empty() {
        select_clause.push_str(" *");
    } else if select.projections.len() == 1 {
        select_clause.push_str(&format!(" {}", compile_select_item(&select.projections[0])));
    } else {
        let last = select.projections.len() - 1;
        for (i, item) in select.projections.iter().enumerate() {
            let comma = if i < last { "," } else { "" };
            select_clause.push_str(&format!(
                "\n{}{}{}{}",
                prefix,
                INDENT,
                compile_select_item(item),
                comma
            ));
        }
    }
    parts.push(select_clause);

    if !select.from.is_empty() {
        let last = select.from.len() - 1;
        for (i, twj) in select.from.iter().enumerate() {
            let keyword = if i == 0 { "FROM " } else { INDENT };
            let comma = if i < last { "," } else { "" };
            parts.push(format!(
                "{}{}{}{}",
                prefix,
                keyword,
                format_table_ref(&twj.relation, depth),
                comma
            ));
            for join in &twj.joins {
                parts.push(format_join(join, depth));
            }
        }
    }

    if let Some(filter) = &select.filter {
        parts.push(format!("{}WHERE {}", prefix, compile_expr(filter)));
    }
    if !select.group_by.is_empty() {
        let groups: Vec<String> = select.group_by.iter().map(compile_expr).collect();
        parts.push(format!("{}GROUP BY {}", prefix, groups.join(", ")));
    }
    if let Some(having) = &select.having {
        parts.push(format!("{}HAVING {}", prefix, compile_expr(having)));
    }

    parts.join("\n")
}

fn format_table_ref(table: &TableRef, depth: usize) -> String {
    match table {
        TableRef::Table { name, alias, .. } => {
            let mut s = compile_table_name(name);
            if let Some(a) = alias {
                s.push_str(&format!(" AS {}", quote_ident(a)));
            }
            s
        }
        TableRef::Subquery { query, alias, .. } => {
            let mut s = format!("(\n{}\n{})", format_query(query, depth + 1), indent(depth));
            if let Some(a) = alias {
                s.push_str(&format!(" AS {}", quote_ident(a)));
            }
            s
        }
    }
}

fn format_join(join: &Join, depth: usize) -> String {
    let prefix = indent(depth);
    let mut s = format!(
        "{}{} {}",
        prefix,
        join_keyword(join.join_type),
        format_table_ref(&join.table, depth)
    );
    match &join.condition {
        Some(JoinCondition::On(expr)) => {
            s.push_str(&format!("\n{}{}ON {}", prefix, INDENT, compile_expr(expr)));
        }
        Some(JoinCondition::Using(cols)) => {
            s.push_str(&format!(" USING ({})", quote_list(cols)));
        }
        None => {}
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::compiler::compile;
    use crate::ast::parser::parse_sql;

    fn format_roundtrip(sql: &str) -> String {
        let query = parse_sql(sql).expect("Failed to parse");
        format_sql(&query)
    }

    #[test]
    fn test_format_simple_select() {
        let result = format_roundtrip("SELECT * FROM s.users");
        assert_eq!(result, "SELECT *\nFROM s.users");
    }

    #[test]
    fn test_format_multicolumn_select() {
        let result = format_roundtrip("SELECT id, name, email FROM s.users");
        assert!(result.contains("    id,\n"));
        assert!(result.contains("    name,\n"));
        assert!(result.contains("    email\n"));
    }

    #[test]
    fn test_format_join() {
        let result =
            format_roundtrip("SELECT * FROM s.users u JOIN s.orders o ON u.id = o.user_id");
        assert!(result.contains("\nJOIN s.orders AS o\n    ON u.id = o.user_id"));
    }

    #[test]
    fn test_format_cte() {
        let result = format_roundtrip(
            "WITH active AS (SELECT * FROM s.users WHERE active = TRUE) SELECT * FROM active",
        );
        assert!(result.starts_with("WITH active AS (\n    SELECT *\n    FROM s.users"));
    }

    #[test]
    fn test_format_union() {
        let result = format_roundtrip("SELECT id FROM s.users UNION ALL SELECT id FROM s.admins");
        assert!(result.contains("\nUNION ALL\n"));
    }

    #[test]
    fn test_format_query_body_skips_with() {
        let q = parse_sql("WITH a AS (SELECT 1 AS x) SELECT x FROM a ORDER BY x").unwrap();
        assert_eq!(format_query_body(&q), "SELECT x\nFROM a\nORDER BY x");
    }

    #[test]
    fn test_format_cte_body_with_columns() {
        let q = parse_sql("WITH a (x) AS (SELECT 1) SELECT * FROM a").unwrap();
        assert_eq!(
            format_cte_body(&q.ctes()[0]),
            "SELECT *\nFROM (\n    SELECT 1\n) AS a(x)"
        );
    }

    #[test]
    fn test_format_is_equivalent_to_compact_output() {
        let test_cases = vec![
            "SELECT * FROM s.users",
            "SELECT id, name FROM s.users WHERE age > 18 ORDER BY name LIMIT 10",
            "SELECT k, COUNT(*) FROM s.t GROUP BY k HAVING COUNT(*) > 1",
            "SELECT a FROM s.t1 UNION ALL (SELECT a FROM s.t2)",
            "SELECT * FROM (SELECT a FROM s.t) sub LEFT JOIN (SELECT a FROM s.u) v ON sub.a = v.a",
            "WITH a AS (SELECT id FROM s.t), b AS (SELECT id FROM a) SELECT * FROM b",
        ];

        for sql in test_cases {
            let original = parse_sql(sql).unwrap();
            let formatted = format_sql(&original);
            let reparsed = parse_sql(&formatted).unwrap_or_else(|e| {
                panic!("Formatted SQL not reparseable: {} -> {} -> {}", sql, formatted, e)
            });
            assert_eq!(compile(&reparsed), compile(&original), "{}", formatted);
        }
    }
}

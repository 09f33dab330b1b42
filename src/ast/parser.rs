/// Athena SQL → AST parser.
///
/// Uses `sqlparser` as the tokenizing/parsing frontend and converts its tree
/// into our own AST, keeping source spans for the nodes that later stages
/// point errors at. Anything outside the accepted subset is rejected with an
/// `UnsupportedSyntax` error; no construct is dropped or stringified.
use sqlparser::ast as sp;
use sqlparser::ast::Spanned;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser as SqlParser, ParserError};
use sqlparser::tokenizer::Span;
use tracing::debug;

use super::types::*;
use crate::error::{snippet, ParseError};

type Result<T> = std::result::Result<T, ParseError>;

/// Output of [`parse`]: the query and the span of every program unit
/// (each CTE definition in order, then the outer statement body).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub query: Query,
    pub spans: Vec<SourceSpan>,
}

/// Parse a single SQL statement into our AST plus its unit spans.
pub fn parse(sql: &str) -> Result<ParsedQuery> {
    let query = parse_sql(sql)?;
    let mut spans: Vec<SourceSpan> = query.ctes().iter().map(|cte| cte.span).collect();
    spans.push(body_span(&query.body));
    Ok(ParsedQuery { query, spans })
}

/// Parse a single SQL statement into our AST.
pub fn parse_sql(sql: &str) -> Result<Query> {
    let converter = Converter { source: sql };
    let dialect = GenericDialect {};
    let mut statements =
        SqlParser::parse_sql(&dialect, sql).map_err(|e| converter.parser_error(e))?;

    if statements.len() > 1 {
        let extra = &statements[1];
        return Err(converter.unsupported(
            extra.span(),
            extra,
            format!("expected 1 statement, found {}", statements.len()),
        ));
    }
    let Some(statement) = statements.pop() else {
        return Err(ParseError::unsupported(
            SourceSpan::empty(),
            "",
            "expected 1 statement, found 0",
        ));
    };

    let query = match statement {
        sp::Statement::Query(q) => converter.convert_query(*q, false)?,
        other => {
            return Err(converter.unsupported(
                other.span(),
                &other,
                "only SELECT statements are supported",
            ))
        }
    };
    debug!(ctes = query.ctes().len(), "parsed statement");
    Ok(query)
}

fn body_span(body: &SetExpr) -> SourceSpan {
    match body {
        SetExpr::Select(s) => s.span,
        SetExpr::SetOperation(op) => body_span(&op.left).union(body_span(&op.right)),
        SetExpr::Nested(q) => q.span,
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(
            Position::new(span.start.line, span.start.column),
            Position::new(span.end.line, span.end.column),
        )
    }
}

fn to_span(span: Span) -> SourceSpan {
    span.into()
}

/// Pull `Line: X, Column: Y` out of a sqlparser error message.
fn error_location(message: &str) -> Option<Position> {
    let rest = &message[message.find("Line: ")? + "Line: ".len()..];
    let (line, rest) = rest.split_once(',')?;
    let column = rest.trim_start().strip_prefix("Column: ")?;
    let column: String = column.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some(Position::new(line.trim().parse().ok()?, column.parse().ok()?))
}

/// Split a rendered sqlparser type (`DECIMAL(10,2)`) into name and arguments.
fn convert_data_type(data_type: &sp::DataType) -> DataType {
    let text = data_type.to_string();
    match (text.find('('), text.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            let mut name = text[..open].trim().to_string();
            let suffix = text[close + 1..].trim();
            if !suffix.is_empty() {
                name = format!("{} {}", name, suffix);
            }
            let args = text[open + 1..close]
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            DataType::with_args(name.to_uppercase(), args)
        }
        _ => DataType::new(text.trim().to_uppercase()),
    }
}

struct Converter<'a> {
    source: &'a str,
}

impl<'a> Converter<'a> {
    fn unsupported(
        &self,
        span: impl Into<SourceSpan>,
        node: &dyn std::fmt::Display,
        message: impl Into<String>,
    ) -> ParseError {
        let span = span.into();
        let mut text = snippet(self.source, span);
        if text.is_empty() {
            text = node.to_string();
        }
        ParseError::unsupported(span, text, message)
    }

    fn parser_error(&self, err: ParserError) -> ParseError {
        let message = err.to_string();
        let message = message
            .split(" at Line:")
            .next()
            .unwrap_or_default()
            .trim_start_matches("sql parser error: ")
            .to_string();
        let span = error_location(&err.to_string())
            .map(|pos| self.token_span(pos))
            .unwrap_or_else(SourceSpan::empty);
        ParseError::unsupported(span, snippet(self.source, span), message)
    }

    /// Span of the whitespace-delimited token starting at `pos`.
    fn token_span(&self, pos: Position) -> SourceSpan {
        let len = self
            .source
            .lines()
            .nth((pos.line as usize).saturating_sub(1))
            .map(|line| {
                line.chars()
                    .skip((pos.column as usize).saturating_sub(1))
                    .take_while(|c| !c.is_whitespace())
                    .count()
            })
            .unwrap_or(0);
        SourceSpan::new(pos, Position::new(pos.line, pos.column + len.max(1) as u64))
    }

    /// Extend a call's span through its closing parenthesis. sqlparser's
    /// function spans stop at the last argument.
    fn call_span(&self, span: SourceSpan) -> SourceSpan {
        if span.is_empty() {
            return span;
        }
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let start_line = span.start.line as usize;
        for (line_idx, line) in self.source.lines().enumerate().skip(start_line - 1) {
            let line_no = line_idx as u64 + 1;
            let skip = if line_no == span.start.line {
                (span.start.column as usize).saturating_sub(1)
            } else {
                0
            };
            for (col_idx, ch) in line.chars().enumerate().skip(skip) {
                match (quote, ch) {
                    (Some(q), c) if c == q => quote = None,
                    (Some(_), _) => {}
                    (None, '\'') | (None, '"') | (None, '`') => quote = Some(ch),
                    (None, '(') => depth += 1,
                    (None, ')') => {
                        if depth <= 1 {
                            let end = Position::new(line_no, col_idx as u64 + 2);
                            return SourceSpan::new(span.start, end.max(span.end));
                        }
                        depth -= 1;
                    }
                    _ => {}
                }
            }
        }
        span
    }

    fn convert_query(&self, query: sp::Query, nested: bool) -> Result<Query> {
        let span = to_span(query.span());
        let sp::Query {
            with,
            body,
            order_by,
            limit,
            offset,
            fetch,
            limit_by,
            locks,
            ..
        } = query;

        if let Some(fetch) = fetch {
            return Err(self.unsupported(span, &fetch, "FETCH is not supported"));
        }
        if let Some(expr) = limit_by.first() {
            return Err(self.unsupported(expr.span(), expr, "LIMIT BY is not supported"));
        }
        if let Some(lock) = locks.first() {
            return Err(self.unsupported(span, lock, "locking clauses are not supported"));
        }

        let with = match with {
            Some(with) if nested => {
                return Err(self.unsupported(
                    with.span(),
                    &with,
                    "WITH is only supported at the start of the statement",
                ))
            }
            Some(with) if with.recursive => {
                return Err(self.unsupported(with.span(), &with, "WITH RECURSIVE is not supported"))
            }
            Some(with) => Some(self.convert_with(with)?),
            None => None,
        };

        let body = self.convert_set_expr(*body)?;

        let order_by = order_by
            .map(|ob| ob.exprs)
            .unwrap_or_default()
            .into_iter()
            .map(|o| self.convert_order_by(o))
            .collect::<Result<Vec<_>>>()?;
        let limit = limit.map(|l| self.convert_expr(l)).transpose()?;
        let offset = offset.map(|o| self.convert_expr(o.value)).transpose()?;

        Ok(Query {
            with,
            body,
            order_by,
            limit,
            offset,
            span,
        })
    }

    fn convert_with(&self, with: sp::With) -> Result<WithClause> {
        let span = to_span(with.span());
        let mut ctes: Vec<CTE> = Vec::with_capacity(with.cte_tables.len());
        for cte in with.cte_tables {
            let name_span = cte.alias.name.span;
            let converted = self.convert_cte(cte)?;
            if ctes
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&converted.name))
            {
                return Err(self.unsupported(
                    name_span,
                    &converted.name,
                    format!("CTE '{}' is defined more than once", converted.name),
                ));
            }
            ctes.push(converted);
        }
        Ok(WithClause { ctes, span })
    }

    fn convert_cte(&self, cte: sp::Cte) -> Result<CTE> {
        let span = to_span(cte.span());
        let columns = cte
            .alias
            .columns
            .iter()
            .map(|c| c.name.value.clone())
            .collect();
        Ok(CTE {
            name: cte.alias.name.value.clone(),
            columns,
            query: self.convert_query(*cte.query, true)?,
            span,
        })
    }

    fn convert_set_expr(&self, expr: sp::SetExpr) -> Result<SetExpr> {
        match expr {
            sp::SetExpr::Select(select) => {
                Ok(SetExpr::Select(Box::new(self.convert_select(*select)?)))
            }
            sp::SetExpr::Query(query) => {
                Ok(SetExpr::Nested(Box::new(self.convert_query(*query, true)?)))
            }
            sp::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => {
                let span = left.span().union(&right.span());
                let all = match set_quantifier {
                    sp::SetQuantifier::All => true,
                    sp::SetQuantifier::Distinct | sp::SetQuantifier::None => false,
                    other => {
                        return Err(self.unsupported(
                            span,
                            &other,
                            "set quantifier is not supported",
                        ))
                    }
                };
                let op = match op {
                    sp::SetOperator::Union => SetOperator::Union,
                    sp::SetOperator::Intersect => SetOperator::Intersect,
                    sp::SetOperator::Except => SetOperator::Except,
                    #[allow(unreachable_patterns)]
                    other => {
                        return Err(self.unsupported(span, &other, "set operator is not supported"))
                    }
                };
                Ok(SetExpr::SetOperation(Box::new(SetOperation {
                    op,
                    all,
                    left: self.convert_set_expr(*left)?,
                    right: self.convert_set_expr(*right)?,
                })))
            }
            other => Err(self.unsupported(
                other.span(),
                &other,
                "only SELECT and set operations are supported as a query body",
            )),
        }
    }

    fn convert_select(&self, select: sp::Select) -> Result<SelectQuery> {
        let span = to_span(select.span());
        let raw_span = select.span();

        let distinct = match &select.distinct {
            None => false,
            Some(sp::Distinct::Distinct) => true,
            Some(other) => {
                return Err(self.unsupported(raw_span, other, "DISTINCT ON is not supported"))
            }
        };
        if let Some(top) = &select.top {
            return Err(self.unsupported(raw_span, top, "TOP is not supported"));
        }
        if let Some(into) = &select.into {
            return Err(self.unsupported(raw_span, into, "SELECT INTO is not supported"));
        }
        if let Some(view) = select.lateral_views.first() {
            return Err(self.unsupported(raw_span, view, "LATERAL VIEW is not supported"));
        }
        if let Some(expr) = &select.prewhere {
            return Err(self.unsupported(expr.span(), expr, "PREWHERE is not supported"));
        }
        if let Some(window) = select.named_window.first() {
            return Err(self.unsupported(raw_span, window, "named WINDOW clauses are not supported"));
        }
        if let Some(expr) = &select.qualify {
            return Err(self.unsupported(expr.span(), expr, "QUALIFY is not supported"));
        }
        if let Some(connect_by) = &select.connect_by {
            return Err(self.unsupported(raw_span, connect_by, "CONNECT BY is not supported"));
        }
        if !select.cluster_by.is_empty()
            || !select.distribute_by.is_empty()
            || !select.sort_by.is_empty()
        {
            return Err(self.unsupported(
                raw_span,
                &select,
                "CLUSTER/DISTRIBUTE/SORT BY are not supported",
            ));
        }

        let group_by = match select.group_by {
            sp::GroupByExpr::Expressions(exprs, modifiers) => {
                if !modifiers.is_empty() {
                    return Err(self.unsupported(
                        raw_span,
                        &modifiers[0],
                        "GROUP BY modifiers are not supported",
                    ));
                }
                exprs
                    .into_iter()
                    .map(|e| self.convert_expr(e))
                    .collect::<Result<Vec<_>>>()?
            }
            other => {
                return Err(self.unsupported(raw_span, &other, "GROUP BY ALL is not supported"))
            }
        };

        let projections = select
            .projection
            .into_iter()
            .map(|item| self.convert_select_item(item))
            .collect::<Result<Vec<_>>>()?;

        let from = select
            .from
            .into_iter()
            .map(|twj| self.convert_table_with_joins(twj))
            .collect::<Result<Vec<_>>>()?;

        let filter = select.selection.map(|e| self.convert_expr(e)).transpose()?;
        let having = select.having.map(|e| self.convert_expr(e)).transpose()?;

        Ok(SelectQuery {
            distinct,
            projections,
            from,
            filter,
            group_by,
            having,
            span,
        })
    }

    fn convert_table_with_joins(&self, twj: sp::TableWithJoins) -> Result<TableWithJoins> {
        let relation = self.convert_table_factor(twj.relation)?;
        let joins = twj
            .joins
            .into_iter()
            .map(|j| self.convert_join(j))
            .collect::<Result<Vec<_>>>()?;
        Ok(TableWithJoins { relation, joins })
    }

    fn convert_alias(&self, alias: Option<sp::TableAlias>) -> Result<Option<String>> {
        match alias {
            Some(alias) if !alias.columns.is_empty() => Err(self.unsupported(
                alias.name.span,
                &alias,
                "table alias column lists are not supported",
            )),
            Some(alias) => Ok(Some(alias.name.value)),
            None => Ok(None),
        }
    }

    fn convert_table_factor(&self, tf: sp::TableFactor) -> Result<TableRef> {
        let raw_span = tf.span();
        match tf {
            sp::TableFactor::Table {
                name, alias, args, ..
            } => {
                if let Some(args) = args {
                    return Err(self.unsupported(
                        raw_span,
                        &name,
                        format!("table function '{}' is not supported ({} args)", name, args.args.len()),
                    ));
                }
                Ok(TableRef::Table {
                    name: TableName::new(name.0.into_iter().map(|p| p.value)),
                    alias: self.convert_alias(alias)?,
                    span: to_span(raw_span),
                })
            }
            sp::TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                if lateral {
                    return Err(self.unsupported(
                        raw_span,
                        &subquery,
                        "LATERAL derived tables are not supported",
                    ));
                }
                Ok(TableRef::Subquery {
                    query: Box::new(self.convert_query(*subquery, true)?),
                    alias: self.convert_alias(alias)?,
                    span: to_span(raw_span),
                })
            }
            other => Err(self.unsupported(
                raw_span,
                &other,
                "only named tables and derived tables are supported in FROM",
            )),
        }
    }

    fn convert_join(&self, join: sp::Join) -> Result<Join> {
        let raw_span = join.span();
        let (join_type, constraint) = match join.join_operator {
            sp::JoinOperator::Inner(c) => (JoinType::Inner, Some(c)),
            sp::JoinOperator::LeftOuter(c) => (JoinType::Left, Some(c)),
            sp::JoinOperator::RightOuter(c) => (JoinType::Right, Some(c)),
            sp::JoinOperator::FullOuter(c) => (JoinType::Full, Some(c)),
            sp::JoinOperator::CrossJoin => (JoinType::Cross, None),
            other => {
                return Err(self.unsupported(
                    raw_span,
                    &format!("{:?}", other),
                    "join type is not supported",
                ))
            }
        };

        let condition = match constraint {
            Some(sp::JoinConstraint::On(expr)) => Some(JoinCondition::On(self.convert_expr(expr)?)),
            Some(sp::JoinConstraint::Using(cols)) => Some(JoinCondition::Using(
                cols.into_iter().map(|c| c.value).collect(),
            )),
            Some(sp::JoinConstraint::Natural) => {
                return Err(self.unsupported(raw_span, &join.relation, "NATURAL JOIN is not supported"))
            }
            Some(sp::JoinConstraint::None) | None => None,
        };

        Ok(Join {
            join_type,
            table: self.convert_table_factor(join.relation)?,
            condition,
        })
    }

    fn convert_select_item(&self, item: sp::SelectItem) -> Result<SelectItem> {
        let raw_span = item.span();
        match item {
            sp::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expression {
                expr: self.convert_expr(expr)?,
                alias: None,
            }),
            sp::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expression {
                expr: self.convert_expr(expr)?,
                alias: Some(alias.value),
            }),
            sp::SelectItem::Wildcard(options) => {
                self.check_wildcard_options(raw_span, &options)?;
                Ok(SelectItem::Wildcard)
            }
            sp::SelectItem::QualifiedWildcard(name, options) => {
                self.check_wildcard_options(raw_span, &options)?;
                Ok(SelectItem::QualifiedWildcard(name.to_string()))
            }
        }
    }

    /// `* EXCLUDE (...)`, `* REPLACE (...)` and friends change the column set.
    fn check_wildcard_options(
        &self,
        raw_span: Span,
        options: &sp::WildcardAdditionalOptions,
    ) -> Result<()> {
        let has_options = options.opt_ilike.is_some()
            || options.opt_exclude.is_some()
            || options.opt_except.is_some()
            || options.opt_replace.is_some()
            || options.opt_rename.is_some();
        if has_options {
            return Err(self.unsupported(
                raw_span,
                options,
                format!("wildcard modifier '{}' is not supported", options.to_string().trim()),
            ));
        }
        Ok(())
    }

    fn convert_exprs(&self, exprs: Vec<sp::Expr>) -> Result<Vec<Expression>> {
        exprs.into_iter().map(|e| self.convert_expr(e)).collect()
    }

    fn boxed(&self, expr: sp::Expr) -> Result<Box<Expression>> {
        Ok(Box::new(self.convert_expr(expr)?))
    }

    fn convert_expr(&self, expr: sp::Expr) -> Result<Expression> {
        match expr {
            sp::Expr::Identifier(ident) => Ok(Expression::Column {
                table: None,
                name: ident.value,
            }),
            sp::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                [table, name] => Ok(Expression::Column {
                    table: Some(table.value.clone()),
                    name: name.value.clone(),
                }),
                _ => {
                    let expr = sp::Expr::CompoundIdentifier(parts);
                    Err(self.unsupported(
                        expr.span(),
                        &expr,
                        "column references may have at most one qualifier",
                    ))
                }
            },
            sp::Expr::Value(val) => self.convert_value(val),
            sp::Expr::TypedString { data_type, value } => {
                Ok(Expression::Literal(Literal::Typed {
                    data_type: convert_data_type(&data_type),
                    value,
                }))
            }
            sp::Expr::BinaryOp { left, op, right } => {
                let op = match convert_binary_op(&op) {
                    Some(op) => op,
                    None => {
                        let span = left.span().union(&right.span());
                        return Err(self.unsupported(
                            span,
                            &op,
                            format!("operator '{}' is not supported", op),
                        ));
                    }
                };
                Ok(Expression::BinaryOp {
                    left: self.boxed(*left)?,
                    op,
                    right: self.boxed(*right)?,
                })
            }
            sp::Expr::UnaryOp { op, expr } => {
                let op = match op {
                    sp::UnaryOperator::Not => UnaryOperator::Not,
                    sp::UnaryOperator::Minus => UnaryOperator::Minus,
                    sp::UnaryOperator::Plus => UnaryOperator::Plus,
                    other => {
                        return Err(self.unsupported(
                            expr.span(),
                            &other,
                            format!("operator '{}' is not supported", other),
                        ))
                    }
                };
                Ok(Expression::UnaryOp {
                    op,
                    expr: self.boxed(*expr)?,
                })
            }
            sp::Expr::Function(func) => self.convert_function(func),
            sp::Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let when_clauses = conditions
                    .into_iter()
                    .zip(results)
                    .map(|(c, r)| Ok((self.convert_expr(c)?, self.convert_expr(r)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expression::Case {
                    operand: operand.map(|o| self.boxed(*o)).transpose()?,
                    when_clauses,
                    else_clause: else_result.map(|e| self.boxed(*e)).transpose()?,
                })
            }
            sp::Expr::Cast {
                kind,
                expr,
                data_type,
                format,
            } => {
                let span = expr.span();
                if let Some(format) = format {
                    return Err(self.unsupported(span, &format, "CAST ... FORMAT is not supported"));
                }
                let safe = matches!(kind, sp::CastKind::TryCast | sp::CastKind::SafeCast);
                Ok(Expression::Cast {
                    expr: self.boxed(*expr)?,
                    data_type: convert_data_type(&data_type),
                    safe,
                    span: to_span(span),
                })
            }
            sp::Expr::Extract { field, expr, .. } => {
                let span = to_span(expr.span());
                Ok(Expression::Extract {
                    field: field.to_string().to_uppercase(),
                    expr: self.boxed(*expr)?,
                    span,
                })
            }
            sp::Expr::Interval(interval) => {
                if interval.last_field.is_some()
                    || interval.leading_precision.is_some()
                    || interval.fractional_seconds_precision.is_some()
                {
                    return Err(self.unsupported(
                        interval.value.span(),
                        &interval,
                        "only single-unit INTERVAL literals are supported",
                    ));
                }
                Ok(Expression::Interval {
                    value: self.boxed(*interval.value)?,
                    unit: interval.leading_field.map(|f| f.to_string().to_uppercase()),
                })
            }
            sp::Expr::Substring {
                expr,
                substring_from: Some(from),
                substring_for,
                ..
            } => {
                let span = self.call_span(to_span(expr.span()));
                let mut args = vec![self.convert_expr(*expr)?, self.convert_expr(*from)?];
                if let Some(len) = substring_for {
                    args.push(self.convert_expr(*len)?);
                }
                Ok(Expression::Function(FunctionCall {
                    span,
                    ..FunctionCall::new("SUBSTR", args)
                }))
            }
            sp::Expr::Trim {
                expr,
                trim_where: None,
                trim_what: None,
                trim_characters: None,
            } => {
                let span = to_span(expr.span());
                Ok(Expression::Function(FunctionCall {
                    span,
                    ..FunctionCall::new("TRIM", vec![self.convert_expr(*expr)?])
                }))
            }
            sp::Expr::Ceil {
                expr,
                field: sp::CeilFloorKind::DateTimeField(sp::DateTimeField::NoDateTime),
            } => {
                let span = to_span(expr.span());
                Ok(Expression::Function(FunctionCall {
                    span,
                    ..FunctionCall::new("CEIL", vec![self.convert_expr(*expr)?])
                }))
            }
            sp::Expr::Floor {
                expr,
                field: sp::CeilFloorKind::DateTimeField(sp::DateTimeField::NoDateTime),
            } => {
                let span = to_span(expr.span());
                Ok(Expression::Function(FunctionCall {
                    span,
                    ..FunctionCall::new("FLOOR", vec![self.convert_expr(*expr)?])
                }))
            }
            sp::Expr::Position { expr, r#in } => {
                let span = to_span(expr.span());
                let needle = self.convert_expr(*expr)?;
                let haystack = self.convert_expr(*r#in)?;
                Ok(Expression::Function(FunctionCall {
                    span,
                    ..FunctionCall::new("INSTR", vec![haystack, needle])
                }))
            }
            sp::Expr::Subquery(q) => Ok(Expression::Subquery(Box::new(
                self.convert_query(*q, true)?,
            ))),
            sp::Expr::Exists { subquery, negated } => Ok(Expression::Exists {
                subquery: Box::new(self.convert_query(*subquery, true)?),
                negated,
            }),
            sp::Expr::InList {
                expr,
                list,
                negated,
            } => Ok(Expression::InList {
                expr: self.boxed(*expr)?,
                list: self.convert_exprs(list)?,
                negated,
            }),
            sp::Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Ok(Expression::InSubquery {
                expr: self.boxed(*expr)?,
                subquery: Box::new(self.convert_query(*subquery, true)?),
                negated,
            }),
            sp::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Ok(Expression::Between {
                expr: self.boxed(*expr)?,
                low: self.boxed(*low)?,
                high: self.boxed(*high)?,
                negated,
            }),
            sp::Expr::IsNull(expr) => Ok(Expression::IsNull {
                expr: self.boxed(*expr)?,
                negated: false,
            }),
            sp::Expr::IsNotNull(expr) => Ok(Expression::IsNull {
                expr: self.boxed(*expr)?,
                negated: true,
            }),
            sp::Expr::Nested(expr) => Ok(Expression::Nested(self.boxed(*expr)?)),
            sp::Expr::Like {
                negated,
                expr,
                pattern,
                escape_char: None,
                ..
            } => {
                let op = if negated {
                    BinaryOperator::NotLike
                } else {
                    BinaryOperator::Like
                };
                Ok(Expression::BinaryOp {
                    left: self.boxed(*expr)?,
                    op,
                    right: self.boxed(*pattern)?,
                })
            }
            sp::Expr::RLike {
                negated: false,
                expr,
                pattern,
                ..
            } => Ok(Expression::BinaryOp {
                left: self.boxed(*expr)?,
                op: BinaryOperator::RLike,
                right: self.boxed(*pattern)?,
            }),
            other => Err(self.unsupported(
                other.span(),
                &other,
                "expression is not supported",
            )),
        }
    }

    fn convert_value(&self, val: sp::Value) -> Result<Expression> {
        match val {
            sp::Value::Null => Ok(Expression::Literal(Literal::Null)),
            sp::Value::Boolean(b) => Ok(Expression::Literal(Literal::Boolean(b))),
            sp::Value::Number(n, _) => Ok(Expression::Literal(Literal::Number(n))),
            sp::Value::SingleQuotedString(s) => Ok(Expression::Literal(Literal::String(s))),
            other => Err(self.unsupported(Span::empty(), &other, "literal is not supported")),
        }
    }

    fn convert_function(&self, func: sp::Function) -> Result<Expression> {
        let raw_span = func.span();
        let span = to_span(raw_span);
        let sp::Function {
            name,
            parameters,
            args,
            filter,
            null_treatment,
            over,
            within_group,
            ..
        } = func;
        let func_name = name.to_string().to_uppercase();

        if !matches!(parameters, sp::FunctionArguments::None) {
            return Err(self.unsupported(raw_span, &name, "parametric functions are not supported"));
        }
        if let Some(filter) = filter {
            return Err(self.unsupported(filter.span(), &filter, "FILTER is not supported"));
        }
        if let Some(nt) = null_treatment {
            return Err(self.unsupported(raw_span, &nt, "IGNORE/RESPECT NULLS is not supported"));
        }
        if !within_group.is_empty() {
            return Err(self.unsupported(raw_span, &name, "WITHIN GROUP is not supported"));
        }

        let (args, distinct, parens) = match args {
            sp::FunctionArguments::List(arg_list) => {
                if let Some(clause) = arg_list.clauses.first() {
                    return Err(self.unsupported(
                        raw_span,
                        clause,
                        format!("argument clause in {} is not supported", func_name),
                    ));
                }
                let distinct = matches!(
                    arg_list.duplicate_treatment,
                    Some(sp::DuplicateTreatment::Distinct)
                );
                let args = arg_list
                    .args
                    .into_iter()
                    .map(|a| match a {
                        sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e)) => {
                            self.convert_expr(e)
                        }
                        sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => {
                            Ok(Expression::Wildcard)
                        }
                        other => Err(self.unsupported(
                            raw_span,
                            &other,
                            "only positional function arguments are supported",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                (args, distinct, true)
            }
            sp::FunctionArguments::None => (vec![], false, false),
            sp::FunctionArguments::Subquery(q) => {
                return Err(self.unsupported(
                    raw_span,
                    &q,
                    "subquery function arguments are not supported",
                ))
            }
        };

        let call = FunctionCall {
            name: func_name,
            args,
            distinct,
            parens,
            span: if parens { self.call_span(span) } else { span },
        };

        match over {
            None => Ok(Expression::Function(call)),
            Some(sp::WindowType::WindowSpec(spec)) => Ok(Expression::WindowFunction {
                function: call,
                window: self.convert_window_spec(spec, raw_span)?,
            }),
            Some(other) => Err(self.unsupported(
                raw_span,
                &other,
                "named windows are not supported",
            )),
        }
    }

    fn convert_window_spec(&self, spec: sp::WindowSpec, span: Span) -> Result<WindowSpec> {
        if let Some(name) = &spec.window_name {
            return Err(self.unsupported(name.span, name, "named windows are not supported"));
        }
        let partition_by = self.convert_exprs(spec.partition_by)?;
        let order_by = spec
            .order_by
            .into_iter()
            .map(|o| self.convert_order_by(o))
            .collect::<Result<Vec<_>>>()?;
        let frame = spec
            .window_frame
            .map(|f| self.convert_window_frame(f, span))
            .transpose()?;

        Ok(WindowSpec {
            partition_by,
            order_by,
            frame,
        })
    }

    fn convert_window_frame(&self, frame: sp::WindowFrame, span: Span) -> Result<WindowFrame> {
        let mode = match frame.units {
            sp::WindowFrameUnits::Rows => WindowFrameMode::Rows,
            sp::WindowFrameUnits::Range => WindowFrameMode::Range,
            other => {
                return Err(self.unsupported(span, &other, "GROUPS frames are not supported"))
            }
        };
        let start = self.convert_window_frame_bound(frame.start_bound, span)?;
        let end = frame
            .end_bound
            .map(|b| self.convert_window_frame_bound(b, span))
            .transpose()?;
        Ok(WindowFrame { mode, start, end })
    }

    fn frame_offset(&self, expr: Option<Box<sp::Expr>>, span: Span) -> Result<Option<u64>> {
        match expr.map(|e| *e) {
            None => Ok(None),
            Some(sp::Expr::Value(sp::Value::Number(n, _))) => match n.parse::<u64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(self.unsupported(span, &n, "frame offset must be a non-negative integer")),
            },
            Some(other) => Err(self.unsupported(
                other.span(),
                &other,
                "frame offset must be a non-negative integer",
            )),
        }
    }

    fn convert_window_frame_bound(
        &self,
        bound: sp::WindowFrameBound,
        span: Span,
    ) -> Result<WindowFrameBound> {
        match bound {
            sp::WindowFrameBound::CurrentRow => Ok(WindowFrameBound::CurrentRow),
            sp::WindowFrameBound::Preceding(e) => {
                Ok(WindowFrameBound::Preceding(self.frame_offset(e, span)?))
            }
            sp::WindowFrameBound::Following(e) => {
                Ok(WindowFrameBound::Following(self.frame_offset(e, span)?))
            }
        }
    }

    fn convert_order_by(&self, order: sp::OrderByExpr) -> Result<OrderByExpr> {
        Ok(OrderByExpr {
            expr: self.convert_expr(order.expr)?,
            asc: order.asc,
            nulls_first: order.nulls_first,
        })
    }
}

fn convert_binary_op(op: &sp::BinaryOperator) -> Option<BinaryOperator> {
    Some(match op {
        sp::BinaryOperator::Eq => BinaryOperator::Eq,
        sp::BinaryOperator::NotEq => BinaryOperator::NotEq,
        sp::BinaryOperator::Lt => BinaryOperator::Lt,
        sp::BinaryOperator::LtEq => BinaryOperator::LtEq,
        sp::BinaryOperator::Gt => BinaryOperator::Gt,
        sp::BinaryOperator::GtEq => BinaryOperator::GtEq,
        sp::BinaryOperator::And => BinaryOperator::And,
        sp::BinaryOperator::Or => BinaryOperator::Or,
        sp::BinaryOperator::Plus => BinaryOperator::Plus,
        sp::BinaryOperator::Minus => BinaryOperator::Minus,
        sp::BinaryOperator::Multiply => BinaryOperator::Multiply,
        sp::BinaryOperator::Divide => BinaryOperator::Divide,
        sp::BinaryOperator::Modulo => BinaryOperator::Modulo,
        sp::BinaryOperator::MyIntegerDivide => BinaryOperator::IntDivide,
        sp::BinaryOperator::StringConcat => BinaryOperator::Concat,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    fn select_of(q: &Query) -> &SelectQuery {
        match &q.body {
            SetExpr::Select(s) => s,
            _ => panic!("Expected Select body"),
        }
    }

    fn first_projection(q: &Query) -> &Expression {
        match &select_of(q).projections[0] {
            SelectItem::Expression { expr, .. } => expr,
            _ => panic!("Expected expression projection"),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let q = parse_sql("SELECT id, name FROM stg.users WHERE id = 1").unwrap();
        let s = select_of(&q);
        assert_eq!(s.projections.len(), 2);
        assert!(s.filter.is_some());
        match &s.from[0].relation {
            TableRef::Table { name, .. } => {
                assert_eq!(name.parts, vec!["stg".to_string(), "users".to_string()]);
            }
            _ => panic!("Expected table reference"),
        }
    }

    #[test]
    fn test_parse_ctes_and_unit_spans() {
        let sql = "WITH a AS (SELECT id FROM s.t),\nb AS (SELECT id FROM a)\nSELECT * FROM b";
        let parsed = parse(sql).unwrap();
        let ctes = parsed.query.ctes();
        assert_eq!(ctes.len(), 2);
        assert_eq!(ctes[0].name, "a");
        assert_eq!(ctes[1].name, "b");
        assert_eq!(parsed.spans.len(), 3);
        assert_eq!(parsed.spans[1].start.line, 2);
        assert_eq!(parsed.spans[2].start.line, 3);
    }

    #[test]
    fn test_parse_union_chain_with_parenthesized_branch() {
        let q = parse_sql(
            "SELECT a FROM s.t1 UNION ALL (SELECT a FROM s.t2) UNION SELECT a FROM s.t3",
        )
        .unwrap();
        match &q.body {
            SetExpr::SetOperation(op) => {
                assert_eq!(op.op, SetOperator::Union);
                assert!(!op.all);
                match &op.left {
                    SetExpr::SetOperation(inner) => {
                        assert!(inner.all);
                        assert!(matches!(inner.right, SetExpr::Nested(_)));
                    }
                    _ => panic!("Expected nested set operation"),
                }
            }
            _ => panic!("Expected set operation"),
        }
    }

    #[test]
    fn test_parse_join_chain() {
        let q = parse_sql(
            "SELECT x.id FROM s.x x INNER JOIN s.y y ON x.id = y.id LEFT JOIN s.z z ON y.id = z.id",
        )
        .unwrap();
        let joins = &select_of(&q).from[0].joins;
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[0].join_type, JoinType::Inner);
        assert_eq!(joins[1].join_type, JoinType::Left);
        assert!(matches!(joins[1].condition, Some(JoinCondition::On(_))));
    }

    #[test]
    fn test_parse_window_function() {
        let q = parse_sql(
            "SELECT ROW_NUMBER() OVER (PARTITION BY cuenta ORDER BY fecha DESC) AS rn FROM s.t",
        )
        .unwrap();
        match first_projection(&q) {
            Expression::WindowFunction { function, window } => {
                assert_eq!(function.name, "ROW_NUMBER");
                assert_eq!(window.partition_by.len(), 1);
                assert_eq!(window.order_by[0].asc, Some(false));
            }
            _ => panic!("Expected window function"),
        }
    }

    #[test]
    fn test_parse_case_and_cast() {
        let q = parse_sql(
            "SELECT CASE WHEN a > 1 THEN CAST(a AS VARCHAR) ELSE 'x' END FROM s.t",
        )
        .unwrap();
        match first_projection(&q) {
            Expression::Case { when_clauses, else_clause, .. } => {
                assert_eq!(when_clauses.len(), 1);
                assert!(else_clause.is_some());
                match &when_clauses[0].1 {
                    Expression::Cast { data_type, safe, .. } => {
                        assert_eq!(data_type.name, "VARCHAR");
                        assert!(!safe);
                    }
                    _ => panic!("Expected cast"),
                }
            }
            _ => panic!("Expected CASE"),
        }
    }

    #[test]
    fn test_parse_scalar_subquery_predicate() {
        let q = parse_sql(
            "SELECT * FROM s.t WHERE fecha < (SELECT MAX(fecha) FROM s.u LIMIT 1)",
        )
        .unwrap();
        match select_of(&q).filter.as_ref() {
            Some(Expression::BinaryOp { right, op, .. }) => {
                assert_eq!(*op, BinaryOperator::Lt);
                match right.as_ref() {
                    Expression::Subquery(sub) => assert!(sub.limit.is_some()),
                    _ => panic!("Expected scalar subquery"),
                }
            }
            _ => panic!("Expected comparison"),
        }
    }

    #[test]
    fn test_parse_non_ascii_literal() {
        let q = parse_sql("SELECT * FROM s.t WHERE dia = 'miércoles'").unwrap();
        match select_of(&q).filter.as_ref() {
            Some(Expression::BinaryOp { right, .. }) => {
                assert_eq!(**right, Expression::string("miércoles"));
            }
            _ => panic!("Expected comparison"),
        }
    }

    #[test]
    fn test_parse_typed_date_literal() {
        let q = parse_sql("SELECT DATE '2025-11-07' FROM s.t").unwrap();
        match first_projection(&q) {
            Expression::Literal(Literal::Typed { data_type, value }) => {
                assert_eq!(data_type.name, "DATE");
                assert_eq!(value, "2025-11-07");
            }
            _ => panic!("Expected typed literal"),
        }
    }

    #[test]
    fn test_parse_keyword_function_without_parens() {
        let q = parse_sql("SELECT CURRENT_DATE FROM s.t").unwrap();
        match first_projection(&q) {
            Expression::Function(call) => {
                assert_eq!(call.name, "CURRENT_DATE");
                assert!(!call.parens);
            }
            _ => panic!("Expected function"),
        }
    }

    #[test]
    fn test_function_span_covers_call() {
        let sql = "SELECT foo(x, bar(y)) FROM s.t";
        let q = parse_sql(sql).unwrap();
        match first_projection(&q) {
            Expression::Function(call) => {
                assert_eq!(call.span.start, Position::new(1, 8));
                assert_eq!(snippet(sql, call.span), "foo(x, bar(y))");
            }
            _ => panic!("Expected function"),
        }
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let q = parse_sql("SELECT * FROM s.t WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        match select_of(&q).filter.as_ref() {
            Some(Expression::BinaryOp { op, right, .. }) => {
                assert_eq!(*op, BinaryOperator::Or);
                assert!(matches!(
                    right.as_ref(),
                    Expression::BinaryOp { op: BinaryOperator::And, .. }
                ));
            }
            _ => panic!("Expected OR at the top"),
        }
    }

    #[test]
    fn test_data_type_split() {
        let dt = convert_data_type(&sp::DataType::Varchar(None));
        assert_eq!(dt, DataType::new("VARCHAR"));
    }

    #[test]
    fn test_reject_recursive_cte() {
        let err = parse_sql(
            "WITH RECURSIVE n AS (SELECT 1 AS x UNION ALL SELECT x + 1 FROM n) SELECT * FROM n",
        )
        .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnsupportedSyntax);
        assert!(err.message.contains("RECURSIVE"));
    }

    #[test]
    fn test_reject_multiple_statements() {
        let err = parse_sql("SELECT 1; SELECT 2").unwrap_err();
        assert!(err.message.contains("expected 1 statement"));
    }

    #[test]
    fn test_reject_dml() {
        let err = parse_sql("DELETE FROM s.t WHERE id = 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnsupportedSyntax);
    }

    #[test]
    fn test_reject_nested_with() {
        let err = parse_sql(
            "SELECT * FROM (WITH a AS (SELECT 1 AS x) SELECT x FROM a) sub",
        )
        .unwrap_err();
        assert!(err.message.contains("WITH"));
    }

    #[test]
    fn test_reject_duplicate_cte_names() {
        let err = parse_sql(
            "WITH a AS (SELECT 1 AS x), A AS (SELECT 2 AS x) SELECT * FROM a",
        )
        .unwrap_err();
        assert!(err.message.contains("more than once"));
    }

    #[test]
    fn test_reject_wildcard_modifiers() {
        for sql in [
            "SELECT * EXCLUDE (a) FROM s.t",
            "SELECT t.* EXCLUDE (a, b) FROM s.t",
        ] {
            let err = parse_sql(sql).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::UnsupportedSyntax, "{}", sql);
            assert!(err.message.contains("EXCLUDE"), "{}", err.message);
        }
        let q = parse_sql("SELECT *, t.* FROM s.t").unwrap();
        match &q.body {
            SetExpr::Select(s) => assert_eq!(
                s.projections,
                vec![SelectItem::Wildcard, SelectItem::QualifiedWildcard("t".to_string())]
            ),
            _ => panic!("Expected Select body"),
        }
    }

    #[test]
    fn test_reject_natural_join() {
        let err = parse_sql("SELECT * FROM s.a NATURAL JOIN s.b").unwrap_err();
        assert!(err.message.contains("NATURAL"));
    }

    #[test]
    fn test_syntax_error_reports_location() {
        let err = parse_sql("SELECT (a FROM s.t").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnsupportedSyntax);
        assert_eq!(err.span.start.line, 1);
        assert!(!err.message.contains("Line:"));
    }

    #[test]
    fn test_error_location_parsing() {
        let pos = error_location("Expected: ), found: FROM at Line: 3, Column: 12").unwrap();
        assert_eq!(pos, Position::new(3, 12));
        assert!(error_location("no location here").is_none());
    }
}

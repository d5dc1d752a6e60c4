use super::ast::{
    CteAst, DeleteAst, ExprAst, InsertAst, InsertSourceAst, JoinAst, JoinConstraintAst,
    JoinKindAst, OrderByExprAst, QueryAst, SelectAst, SelectItemAst, StatementAst, TableRefAst,
    UpdateAst,
};
use super::errors::QueryAstError;
use crate::models::{SetOpKind, Value};
use sqlparser::ast as sq;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Parses exactly one statement into the crate's own tree.
pub fn parse_sql(sql: &str) -> Result<StatementAst, QueryAstError> {
    let dialect = GenericDialect {};
    let mut statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| QueryAstError::Parse(e.to_string()))?;
    if statements.len() != 1 {
        return Err(QueryAstError::shape(format!(
            "expected one statement, found {}",
            statements.len()
        )));
    }
    let statement = statements.remove(0);
    log::debug!("parsed statement: {}", statement);
    match &statement {
        sq::Statement::Query(q) => Ok(StatementAst::Query(convert_query(q)?)),
        sq::Statement::Insert(insert) => convert_insert(insert),
        sq::Statement::Update { table, assignments, selection, .. } => {
            convert_update(table, assignments, selection.as_ref())
        }
        sq::Statement::Delete(delete) => convert_delete(delete),
        other => Err(QueryAstError::shape(format!(
            "statement kind not visualized: {}",
            first_keyword(&other.to_string())
        ))),
    }
}

fn first_keyword(sql: &str) -> String {
    sql.split_whitespace().next().unwrap_or_default().to_ascii_uppercase()
}

fn convert_query(q: &sq::Query) -> Result<QueryAst, QueryAstError> {
    let mut query = convert_set_expr(&q.body)?;

    if let Some(with) = &q.with {
        let mut ctes = Vec::with_capacity(with.cte_tables.len());
        for cte in &with.cte_tables {
            ctes.push(CteAst {
                name: cte.alias.name.value.clone(),
                query: convert_query(&cte.query)?,
            });
        }
        // a parenthesized body may have brought its own WITH list
        ctes.append(&mut query.ctes);
        query.ctes = ctes;
    }

    // Query-level ORDER BY / LIMIT land on the leftmost SELECT.
    if let Some(order_by) = &q.order_by {
        query.body.order_by = order_by
            .exprs
            .iter()
            .map(|o| OrderByExprAst {
                expr: convert_expr(&o.expr),
                asc: o.asc.unwrap_or(true),
            })
            .collect();
    }
    if let Some(limit) = &q.limit {
        query.body.limit = Some(literal_u64(limit, "LIMIT")?);
    }
    Ok(query)
}

fn literal_u64(e: &sq::Expr, clause: &str) -> Result<u64, QueryAstError> {
    match e {
        sq::Expr::Value(sq::Value::Number(n, _)) => n.parse().map_err(|_| {
            QueryAstError::shape(format!(
                "{} must be a non-negative integer, got {}",
                clause, n
            ))
        }),
        other => Err(QueryAstError::shape(format!(
            "{} must be a literal, got {}",
            clause, other
        ))),
    }
}

fn convert_set_expr(body: &sq::SetExpr) -> Result<QueryAst, QueryAstError> {
    match body {
        sq::SetExpr::Select(sel) => Ok(QueryAst::simple(convert_select(sel)?)),
        sq::SetExpr::Query(inner) => convert_query(inner),
        sq::SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
        } => {
            let kind = match op {
                sq::SetOperator::Union => SetOpKind::Union,
                sq::SetOperator::Intersect => SetOpKind::Intersect,
                sq::SetOperator::Except => SetOpKind::Except,
            };
            let all = matches!(
                set_quantifier,
                sq::SetQuantifier::All | sq::SetQuantifier::AllByName
            );
            let mut left = convert_set_expr(left)?;
            let right = convert_set_expr(right)?;
            left.append_set_op(kind, all, right);
            Ok(left)
        }
        sq::SetExpr::Values(_) => Err(QueryAstError::shape(
            "a bare VALUES list has no FROM clause",
        )),
        other => Err(QueryAstError::shape(format!("unsupported query body: {}", other))),
    }
}

fn convert_select(sel: &sq::Select) -> Result<SelectAst, QueryAstError> {
    let mut out = SelectAst::default();

    if let Some(first) = sel.from.first() {
        out.from = Some(convert_table_factor(&first.relation)?);
        for join in &first.joins {
            out.joins.push(convert_join(join)?);
        }
        // `FROM a, b` is an implicit cross join
        for extra in sel.from.iter().skip(1) {
            out.joins.push(JoinAst {
                kind: JoinKindAst::Cross,
                relation: convert_table_factor(&extra.relation)?,
                constraint: JoinConstraintAst::None,
            });
            for join in &extra.joins {
                out.joins.push(convert_join(join)?);
            }
        }
    }

    for item in &sel.projection {
        out.projection.push(match item {
            sq::SelectItem::Wildcard(_) => SelectItemAst::Wildcard,
            sq::SelectItem::QualifiedWildcard(name, _) => {
                SelectItemAst::QualifiedWildcard(object_name(name))
            }
            sq::SelectItem::UnnamedExpr(e) => SelectItemAst::Expr {
                expr: convert_expr(e),
                alias: None,
            },
            sq::SelectItem::ExprWithAlias { expr, alias } => SelectItemAst::Expr {
                expr: convert_expr(expr),
                alias: Some(alias.value.clone()),
            },
        });
    }

    out.selection = sel.selection.as_ref().map(convert_expr);
    if let sq::GroupByExpr::Expressions(exprs, _) = &sel.group_by {
        out.group_by = exprs.iter().map(convert_expr).collect();
    } else {
        return Err(QueryAstError::shape("GROUP BY ALL is not supported"));
    }
    out.having = sel.having.as_ref().map(convert_expr);
    Ok(out)
}

fn object_name(name: &sq::ObjectName) -> String {
    name.0.iter().map(|i| i.value.clone()).collect::<Vec<_>>().join(".")
}

fn convert_table_factor(factor: &sq::TableFactor) -> Result<TableRefAst, QueryAstError> {
    match factor {
        sq::TableFactor::Table { name, alias, .. } => Ok(TableRefAst::Named {
            name: object_name(name),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        sq::TableFactor::Derived { subquery, alias, .. } => Ok(TableRefAst::Derived {
            query: Box::new(convert_query(subquery)?),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        other => Err(QueryAstError::shape(format!("unsupported table reference: {}", other))),
    }
}

fn convert_join(join: &sq::Join) -> Result<JoinAst, QueryAstError> {
    let (kind, constraint) = match &join.join_operator {
        sq::JoinOperator::Inner(c) => (JoinKindAst::Inner, c),
        sq::JoinOperator::LeftOuter(c) => (JoinKindAst::LeftOuter, c),
        sq::JoinOperator::RightOuter(c) => (JoinKindAst::RightOuter, c),
        sq::JoinOperator::FullOuter(c) => (JoinKindAst::FullOuter, c),
        sq::JoinOperator::CrossJoin => {
            return Ok(JoinAst {
                kind: JoinKindAst::Cross,
                relation: convert_table_factor(&join.relation)?,
                constraint: JoinConstraintAst::None,
            });
        }
        sq::JoinOperator::LeftSemi(c) => (JoinKindAst::Other("LEFT SEMI".into()), c),
        sq::JoinOperator::RightSemi(c) => (JoinKindAst::Other("RIGHT SEMI".into()), c),
        sq::JoinOperator::LeftAnti(c) => (JoinKindAst::Other("LEFT ANTI".into()), c),
        sq::JoinOperator::RightAnti(c) => (JoinKindAst::Other("RIGHT ANTI".into()), c),
        other => {
            return Err(QueryAstError::shape(format!(
                "unsupported join operator: {:?}",
                other
            )));
        }
    };
    let constraint = match constraint {
        sq::JoinConstraint::On(e) => JoinConstraintAst::On(convert_expr(e)),
        sq::JoinConstraint::Using(cols) => {
            JoinConstraintAst::Using(cols.iter().map(|c| c.value.clone()).collect())
        }
        sq::JoinConstraint::Natural => JoinConstraintAst::Natural,
        sq::JoinConstraint::None => JoinConstraintAst::None,
    };
    Ok(JoinAst {
        kind,
        relation: convert_table_factor(&join.relation)?,
        constraint,
    })
}

fn convert_expr(e: &sq::Expr) -> ExprAst {
    match e {
        sq::Expr::Identifier(id) => ExprAst::Column {
            table: None,
            name: id.value.clone(),
        },
        sq::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [column] => ExprAst::Column {
                table: None,
                name: column.value.clone(),
            },
            [.., table, column] => ExprAst::Column {
                table: Some(table.value.clone()),
                name: column.value.clone(),
            },
            [] => ExprAst::Raw(e.to_string()),
        },
        sq::Expr::Value(v) => convert_value(v)
            .map(ExprAst::Literal)
            .unwrap_or_else(|| ExprAst::Raw(e.to_string())),
        sq::Expr::BinaryOp { left, op, right } => ExprAst::BinaryOp {
            left: Box::new(convert_expr(left)),
            op: op.to_string(),
            right: Box::new(convert_expr(right)),
        },
        sq::Expr::UnaryOp {
            op: sq::UnaryOperator::Not,
            expr,
        } => ExprAst::Not(Box::new(convert_expr(expr))),
        sq::Expr::UnaryOp {
            op: sq::UnaryOperator::Minus,
            expr,
        } => match convert_expr(expr) {
            ExprAst::Literal(Value::Number(n)) => ExprAst::Literal(Value::Number(-n)),
            _ => ExprAst::Raw(e.to_string()),
        },
        sq::Expr::Nested(inner) => ExprAst::Nested(Box::new(convert_expr(inner))),
        sq::Expr::Function(func) => {
            convert_function(func).unwrap_or_else(|| ExprAst::Raw(e.to_string()))
        }
        _ => ExprAst::Raw(e.to_string()),
    }
}

fn convert_value(v: &sq::Value) -> Option<Value> {
    match v {
        sq::Value::Number(n, _) => n.parse::<f64>().ok().map(Value::Number),
        sq::Value::SingleQuotedString(s) | sq::Value::DoubleQuotedString(s) => {
            Some(Value::Text(s.clone()))
        }
        sq::Value::Null => Some(Value::Null),
        _ => None,
    }
}

fn convert_function(func: &sq::Function) -> Option<ExprAst> {
    if func.over.is_some() || func.filter.is_some() {
        return None;
    }
    let mut args = Vec::new();
    let mut distinct = false;
    match &func.args {
        sq::FunctionArguments::None => {}
        sq::FunctionArguments::List(list) => {
            distinct = matches!(list.duplicate_treatment, Some(sq::DuplicateTreatment::Distinct));
            for arg in &list.args {
                match arg {
                    sq::FunctionArg::Unnamed(sq::FunctionArgExpr::Expr(ex)) => {
                        args.push(convert_expr(ex))
                    }
                    sq::FunctionArg::Unnamed(sq::FunctionArgExpr::Wildcard) => {
                        args.push(ExprAst::Star)
                    }
                    _ => return None,
                }
            }
        }
        sq::FunctionArguments::Subquery(_) => return None,
    }
    Some(ExprAst::FuncCall {
        name: object_name(&func.name),
        args,
        distinct,
    })
}

fn convert_insert(insert: &sq::Insert) -> Result<StatementAst, QueryAstError> {
    let source = insert
        .source
        .as_ref()
        .ok_or_else(|| QueryAstError::shape("INSERT without VALUES or SELECT"))?;
    let source = match source.body.as_ref() {
        sq::SetExpr::Values(values) => InsertSourceAst::Values(
            values.rows.iter().map(|row| row.iter().map(convert_expr).collect()).collect(),
        ),
        _ => InsertSourceAst::Query(Box::new(convert_query(source)?)),
    };
    Ok(StatementAst::Insert(InsertAst {
        table: object_name(&insert.table_name),
        columns: insert.columns.iter().map(|c| c.value.clone()).collect(),
        source,
    }))
}

fn single_table(table: &sq::TableWithJoins, verb: &str) -> Result<String, QueryAstError> {
    if !table.joins.is_empty() {
        return Err(QueryAstError::shape(format!(
            "{} across joined tables is not supported",
            verb
        )));
    }
    match &table.relation {
        sq::TableFactor::Table { name, .. } => Ok(object_name(name)),
        other => Err(QueryAstError::shape(format!(
            "{} target must be a table, got {}",
            verb, other
        ))),
    }
}

fn convert_update(
    table: &sq::TableWithJoins,
    assignments: &[sq::Assignment],
    selection: Option<&sq::Expr>,
) -> Result<StatementAst, QueryAstError> {
    let table = single_table(table, "UPDATE")?;
    let mut out = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let column = match &assignment.target {
            sq::AssignmentTarget::ColumnName(name) => name
                .0
                .last()
                .map(|i| i.value.clone())
                .ok_or_else(|| QueryAstError::shape("empty assignment target"))?,
            sq::AssignmentTarget::Tuple(_) => {
                return Err(QueryAstError::shape("tuple assignments are not supported"));
            }
        };
        out.push((column, convert_expr(&assignment.value)));
    }
    Ok(StatementAst::Update(UpdateAst {
        table,
        assignments: out,
        selection: selection.map(convert_expr),
    }))
}

fn convert_delete(delete: &sq::Delete) -> Result<StatementAst, QueryAstError> {
    let tables = match &delete.from {
        sq::FromTable::WithFromKeyword(t) | sq::FromTable::WithoutKeyword(t) => t,
    };
    let target = match tables.as_slice() {
        [only] => single_table(only, "DELETE")?,
        _ => return Err(QueryAstError::shape("DELETE must name exactly one table")),
    };
    Ok(StatementAst::Delete(DeleteAst {
        table: target,
        selection: delete.selection.as_ref().map(convert_expr),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sql: &str) -> QueryAst {
        match parse_sql(sql).expect("ok") {
            StatementAst::Query(q) => q,
            other => panic!("expected query, got {:?}", other),
        }
    }

    #[test]
    fn select_with_join_and_clauses() {
        let q = query(
            "SELECT s.name, COUNT(*) AS n FROM Students s \
             LEFT JOIN Enrollments e ON s.id = e.student_id \
             WHERE s.cohort > 2022 GROUP BY s.name HAVING COUNT(*) > 0 ORDER BY n DESC LIMIT 5",
        );
        assert_eq!(
            q.body.from,
            Some(TableRefAst::Named {
                name: "Students".into(),
                alias: Some("s".into())
            })
        );
        assert_eq!(q.body.joins.len(), 1);
        assert_eq!(q.body.joins[0].kind, JoinKindAst::LeftOuter);
        assert!(matches!(q.body.joins[0].constraint, JoinConstraintAst::On(_)));
        assert_eq!(q.body.group_by.len(), 1);
        assert!(q.body.having.is_some());
        assert_eq!(q.body.order_by.len(), 1);
        assert!(!q.body.order_by[0].asc);
        assert_eq!(q.body.limit, Some(5));
        match &q.body.projection[1] {
            SelectItemAst::Expr { expr: ExprAst::FuncCall { name, args, .. }, alias } => {
                assert_eq!(name, "COUNT");
                assert_eq!(args, &vec![ExprAst::Star]);
                assert_eq!(alias.as_deref(), Some("n"));
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn mutation_kinds_are_detected() {
        assert!(matches!(
            parse_sql("INSERT INTO Students (id, name) VALUES (4, 'Edsger')").expect("ok"),
            StatementAst::Insert(InsertAst { source: InsertSourceAst::Values(_), .. })
        ));
        assert!(matches!(
            parse_sql("UPDATE Students SET cohort = 2025 WHERE id = 1").expect("ok"),
            StatementAst::Update(UpdateAst { selection: Some(_), .. })
        ));
        assert!(matches!(
            parse_sql("DELETE FROM Students").expect("ok"),
            StatementAst::Delete(DeleteAst { selection: None, .. })
        ));
    }

    #[test]
    fn insert_select_keeps_query_source() {
        match parse_sql("INSERT INTO Students SELECT * FROM Students").expect("ok") {
            StatementAst::Insert(insert) => {
                assert!(matches!(insert.source, InsertSourceAst::Query(_)))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ctes_and_set_operations() {
        let q = query(
            "WITH a AS (SELECT id FROM Students) \
             SELECT id FROM a UNION SELECT student_id FROM Enrollments",
        );
        assert_eq!(q.ctes.len(), 1);
        assert_eq!(q.ctes[0].name, "a");
        let set = q.set_op.expect("set op");
        assert_eq!(set.op, SetOpKind::Union);
        assert!(!set.all);
    }

    #[test]
    fn negative_literals_fold() {
        let q = query("SELECT id FROM Students WHERE id > -1");
        match q.body.selection {
            Some(ExprAst::BinaryOp { right, .. }) => {
                assert_eq!(*right, ExprAst::Literal(Value::Number(-1.0)))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_sql_is_parse_error() {
        assert!(matches!(parse_sql("SELEC id FROM"), Err(QueryAstError::Parse(_))));
        assert!(matches!(parse_sql("SELECT 1; SELECT 2"), Err(QueryAstError::ParseShape(_))));
        assert!(matches!(parse_sql("CREATE TABLE t (id INT)"), Err(QueryAstError::ParseShape(_))));
    }
}

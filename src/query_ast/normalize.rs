//! Typed AST -> normalized logical statement.
//!
//! The normalizer resolves which FROM/JOIN names refer to CTEs (a name scope is
//! carried through recursion), rebinds select aliases used by ORDER BY and
//! HAVING, and records a note whenever it has to simplify a construct.
//!
//! In a SELECT, a condition, select item or sort key the evaluator cannot model
//! is dropped with a note, and the rest of the query is still visualized.
//! Mutations are strict: the same constructs become [`QueryAstError::ParseShape`],
//! since a dropped WHERE would change which rows a preview touches.

use super::ast::{
    ExprAst, InsertSourceAst, JoinAst, JoinConstraintAst, JoinKindAst, OrderByExprAst, QueryAst,
    SelectAst, SelectItemAst, StatementAst, TableRefAst,
};
use super::errors::QueryAstError;
use super::logical::{
    AggregateRef, ColumnRef, CteDefinition, DeleteStatement, FilterClause, FilterOperand,
    InsertSource, InsertStatement, JoinClause, JoinCondition, NormalizedQuery, NormalizedStatement,
    OrderByClause, Predicate, SelectItem, SetOperation, TableSource, UpdateStatement,
};
use crate::models::{AggregateFn, CompareOp, JoinType, SortDirection, Value};

/// Default relation name for an unaliased FROM subquery.
pub const DEFAULT_SUBQUERY_NAME: &str = "Subquery";

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub statement: NormalizedStatement,
    /// Simplifications applied while normalizing, surfaced as coverage notes.
    pub notes: Vec<String>,
}

pub fn normalize_statement(ast: &StatementAst) -> Result<Normalized, QueryAstError> {
    let mut normalizer = Normalizer {
        strict: !matches!(ast, StatementAst::Query(_)),
        ..Default::default()
    };
    let statement = match ast {
        StatementAst::Query(q) => NormalizedStatement::Query(normalizer.query(q)?),
        StatementAst::Insert(insert) => {
            let source = match &insert.source {
                InsertSourceAst::Values(rows) => InsertSource::Values(
                    rows.iter()
                        .map(|row| row.iter().map(literal).collect::<Result<Vec<_>, _>>())
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                InsertSourceAst::Query(q) => InsertSource::Query(Box::new(normalizer.query(q)?)),
            };
            NormalizedStatement::Insert(InsertStatement {
                table: insert.table.clone(),
                columns: insert.columns.clone(),
                source,
            })
        }
        StatementAst::Update(update) => {
            let assignments = update
                .assignments
                .iter()
                .map(|(column, expr)| Ok((column.clone(), literal(expr)?)))
                .collect::<Result<Vec<_>, QueryAstError>>()?;
            let selection = match &update.selection {
                Some(e) => normalizer.predicate("WHERE", e, false)?,
                None => None,
            };
            NormalizedStatement::Update(UpdateStatement {
                table: update.table.clone(),
                assignments,
                selection,
            })
        }
        StatementAst::Delete(delete) => {
            let selection = match &delete.selection {
                Some(e) => normalizer.predicate("WHERE", e, false)?,
                None => None,
            };
            NormalizedStatement::Delete(DeleteStatement {
                table: delete.table.clone(),
                selection,
            })
        }
    };
    log::debug!("normalized statement with {} note(s)", normalizer.notes.len());
    Ok(Normalized {
        statement,
        notes: normalizer.notes,
    })
}

fn literal(expr: &ExprAst) -> Result<Value, QueryAstError> {
    match expr.unnested() {
        ExprAst::Literal(v) => Ok(v.clone()),
        other => Err(QueryAstError::shape(format!(
            "only literal values can be written, got `{}`",
            other
        ))),
    }
}

fn column_ref(table: &Option<String>, name: &str) -> ColumnRef {
    ColumnRef {
        column: name.to_string(),
        table: table.clone(),
    }
}

#[derive(Default)]
struct Normalizer {
    // CTE names visible at the current nesting level
    scope: Vec<String>,
    notes: Vec<String>,
    strict: bool,
}

impl Normalizer {
    fn note(&mut self, note: String) {
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    /// Notes a construct that is left out, or fails in strict mode.
    fn skip(&mut self, message: String) -> Result<(), QueryAstError> {
        if self.strict {
            return Err(QueryAstError::shape(message));
        }
        log::debug!("skipped: {}", message);
        self.note(message);
        Ok(())
    }

    fn drop_condition(
        &mut self,
        clause: &str,
        expr: &ExprAst,
    ) -> Result<Option<Predicate>, QueryAstError> {
        self.skip(format!(
            "{}: `{}` cannot be evaluated and is not applied",
            clause, expr
        ))?;
        Ok(None)
    }

    fn in_scope(&self, name: &str) -> bool {
        self.scope.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn query(&mut self, q: &QueryAst) -> Result<NormalizedQuery, QueryAstError> {
        let mark = self.scope.len();
        let mut ctes = Vec::with_capacity(q.ctes.len());
        for cte in &q.ctes {
            let query = self.query(&cte.query)?;
            self.scope.push(cte.name.clone());
            ctes.push(CteDefinition {
                name: cte.name.clone(),
                query,
            });
        }

        let mut normalized = self.select(&q.body)?;
        normalized.ctes = ctes;

        if let Some(set) = &q.set_op {
            if set.all {
                let kw = set.op.keyword();
                self.note(format!(
                    "{} ALL: evaluated as {}, duplicate rows are removed",
                    kw, kw
                ));
            }
            normalized.set_operation = Some(SetOperation {
                kind: set.op,
                right: Box::new(self.query(&set.right)?),
            });
        }

        self.scope.truncate(mark);
        Ok(normalized)
    }

    fn select(&mut self, sel: &SelectAst) -> Result<NormalizedQuery, QueryAstError> {
        let from = sel.from.as_ref().ok_or_else(|| {
            QueryAstError::shape("a FROM clause is required to visualize a SELECT")
        })?;
        let mut query = NormalizedQuery::from_source(self.source(from)?);

        if sel.projection.is_empty() {
            return Err(QueryAstError::shape("empty SELECT list"));
        }
        let mut select = Vec::with_capacity(sel.projection.len());
        for item in &sel.projection {
            if let Some(item) = self.select_item(item)? {
                select.push(item);
            }
        }
        if select.is_empty() {
            self.note(
                "SELECT: no item can be computed, every source column is shown instead".to_string(),
            );
            select.push(SelectItem::Wildcard { table: None });
        }
        query.select = select;

        for join in &sel.joins {
            let clause = self.join(join)?;
            query.joins.push(clause);
        }

        if let Some(selection) = &sel.selection {
            query.where_clause = self.predicate("WHERE", selection, false)?;
        }

        for expr in &sel.group_by {
            let column = match expr.unnested() {
                ExprAst::Column { table, name } => {
                    rebind_column(column_ref(table, name), &query.select)
                }
                other => {
                    return Err(QueryAstError::shape(format!(
                        "GROUP BY supports columns only, got `{}`",
                        other
                    )));
                }
            };
            query.group_by.push(column);
        }

        if let Some(having) = &sel.having {
            query.having = self
                .predicate("HAVING", having, true)?
                .map(|predicate| rebind_having(predicate, &query.select));
        }

        if let Some((first, rest)) = sel.order_by.split_first() {
            if !rest.is_empty() {
                let ignored: Vec<String> = rest.iter().map(|o| o.expr.to_string()).collect();
                self.note(format!(
                    "ORDER BY: only the first sort key ({}) is applied, {} is ignored",
                    first.expr,
                    ignored.join(", ")
                ));
            }
            query.order_by = self.order_by(first, &query.select)?;
        }

        query.limit = sel.limit;
        Ok(query)
    }

    fn source(&mut self, table: &TableRefAst) -> Result<TableSource, QueryAstError> {
        match table {
            TableRefAst::Named { name, alias } if self.in_scope(name) => Ok(TableSource::Cte {
                name: name.clone(),
                alias: alias.clone(),
            }),
            TableRefAst::Named { name, alias } => Ok(TableSource::Table {
                name: name.clone(),
                alias: alias.clone(),
            }),
            TableRefAst::Derived { query, alias } => Ok(TableSource::Subquery {
                name: alias
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SUBQUERY_NAME.to_string()),
                query: Box::new(self.query(query)?),
            }),
        }
    }

    fn join(&mut self, join: &JoinAst) -> Result<JoinClause, QueryAstError> {
        let source = self.source(&join.relation)?;
        let mut join_type = match &join.kind {
            JoinKindAst::Inner => JoinType::Inner,
            JoinKindAst::LeftOuter => JoinType::Left,
            JoinKindAst::RightOuter => JoinType::Right,
            JoinKindAst::FullOuter => JoinType::Full,
            JoinKindAst::Cross => JoinType::Cross,
            JoinKindAst::Other(spelling) => {
                self.note(format!("{} JOIN: shown as an INNER JOIN", spelling));
                JoinType::Inner
            }
        };
        if join_type == JoinType::Cross {
            return Ok(JoinClause {
                join_type,
                source,
                on: None,
            });
        }

        let on = match &join.constraint {
            JoinConstraintAst::On(expr) => Some(self.join_condition(expr)?),
            JoinConstraintAst::Using(columns) => {
                let (first, rest) = columns
                    .split_first()
                    .ok_or_else(|| QueryAstError::shape("USING needs at least one column"))?;
                if !rest.is_empty() {
                    self.note(format!(
                        "USING: only {} is matched, {} is ignored",
                        first,
                        rest.join(", ")
                    ));
                }
                Some(JoinCondition {
                    left: ColumnRef::bare(first.clone()),
                    right: ColumnRef::qualified(source.qualifier(), first.clone()),
                })
            }
            JoinConstraintAst::Natural => {
                return Err(QueryAstError::shape(
                    "NATURAL JOIN is not supported, name the join column with ON or USING",
                ));
            }
            JoinConstraintAst::None => {
                self.note(format!(
                    "JOIN {} without ON: treated as a CROSS JOIN",
                    source.display_name()
                ));
                join_type = JoinType::Cross;
                None
            }
        };
        Ok(JoinClause {
            join_type,
            source,
            on,
        })
    }

    fn join_condition(&mut self, expr: &ExprAst) -> Result<JoinCondition, QueryAstError> {
        let mut conjuncts = Vec::new();
        flatten_and(expr, &mut conjuncts);
        let first = conjuncts[0];
        let condition = match first.unnested() {
            ExprAst::BinaryOp { left, op, right } if op == "=" => {
                match (left.unnested(), right.unnested()) {
                    (
                        ExprAst::Column { table: lt, name: ln },
                        ExprAst::Column { table: rt, name: rn },
                    ) => JoinCondition {
                        left: column_ref(lt, ln),
                        right: column_ref(rt, rn),
                    },
                    _ => return Err(non_equi_join(first)),
                }
            }
            _ => return Err(non_equi_join(first)),
        };
        if conjuncts.len() > 1 {
            let ignored: Vec<String> = conjuncts[1..].iter().map(|c| c.to_string()).collect();
            self.note(format!(
                "ON: only {} drives the join, {} is not applied",
                condition,
                ignored.join(" AND ")
            ));
        }
        Ok(condition)
    }

    /// `None` when the item is left out of the result.
    fn select_item(&mut self, item: &SelectItemAst) -> Result<Option<SelectItem>, QueryAstError> {
        let item = match item {
            SelectItemAst::Wildcard => SelectItem::Wildcard { table: None },
            SelectItemAst::QualifiedWildcard(table) => SelectItem::Wildcard {
                table: Some(table.clone()),
            },
            SelectItemAst::Expr { expr, alias } => match expr.unnested() {
                ExprAst::Column { table, name } => SelectItem::Column {
                    column: column_ref(table, name),
                    alias: alias.clone(),
                },
                ExprAst::FuncCall {
                    name,
                    args,
                    distinct,
                } if AggregateFn::from_name(name).is_some() => {
                    let mut agg = self.aggregate(name, args, *distinct)?;
                    agg.alias = alias.clone();
                    SelectItem::Aggregate(agg)
                }
                other => {
                    self.skip(format!(
                        "SELECT: `{}` is not computed and is left out of the result",
                        other
                    ))?;
                    return Ok(None);
                }
            },
        };
        Ok(Some(item))
    }

    fn aggregate(
        &mut self,
        name: &str,
        args: &[ExprAst],
        distinct: bool,
    ) -> Result<AggregateRef, QueryAstError> {
        let func = AggregateFn::from_name(name)
            .ok_or_else(|| QueryAstError::shape(format!("function {} is not supported", name)))?;
        let (column, table) = match args {
            [ExprAst::Star] if func == AggregateFn::Count => ("*".to_string(), None),
            [ExprAst::Star] => {
                return Err(QueryAstError::shape(format!(
                    "{}(*) is only valid for COUNT",
                    func.name()
                )));
            }
            [arg] => match arg.unnested() {
                ExprAst::Column { table, name } => (name.clone(), table.clone()),
                other => {
                    return Err(QueryAstError::shape(format!(
                        "{} needs a column argument, got `{}`",
                        func.name(),
                        other
                    )));
                }
            },
            _ => {
                return Err(QueryAstError::shape(format!(
                    "{} takes exactly one argument",
                    func.name()
                )));
            }
        };
        if distinct {
            self.note(format!(
                "{}(DISTINCT ...): duplicates are not removed before aggregating",
                func.name()
            ));
        }
        Ok(AggregateRef {
            func,
            column,
            table,
            alias: None,
        })
    }

    /// `None` when the condition cannot be modelled and every row passes.
    fn predicate(
        &mut self,
        clause: &str,
        expr: &ExprAst,
        allow_aggregates: bool,
    ) -> Result<Option<Predicate>, QueryAstError> {
        match expr.unnested() {
            ExprAst::BinaryOp { left, op, right } if op.eq_ignore_ascii_case("AND") => {
                let left = self.predicate(clause, left, allow_aggregates)?;
                let right = self.predicate(clause, right, allow_aggregates)?;
                Ok(match (left, right) {
                    (Some(a), Some(b)) => Some(Predicate::And(Box::new(a), Box::new(b))),
                    (kept, None) | (None, kept) => kept,
                })
            }
            ExprAst::BinaryOp { left, op, right } if op.eq_ignore_ascii_case("OR") => {
                let left = self.predicate(clause, left, allow_aggregates)?;
                let right = self.predicate(clause, right, allow_aggregates)?;
                // one opaque side lets every row through the OR
                Ok(match (left, right) {
                    (Some(a), Some(b)) => Some(Predicate::Or(Box::new(a), Box::new(b))),
                    _ => None,
                })
            }
            ExprAst::Not(inner) => Ok(self
                .predicate(clause, inner, allow_aggregates)?
                .map(|p| Predicate::Not(Box::new(p)))),
            ExprAst::BinaryOp { left, op, right } => {
                let Some(op) = CompareOp::from_symbol(op) else {
                    return self.drop_condition(clause, expr);
                };
                let (operand, value, op) = match (left.unnested(), right.unnested()) {
                    (ExprAst::Literal(_), ExprAst::Literal(_)) => {
                        return self.drop_condition(clause, expr);
                    }
                    (ExprAst::Literal(v), other) => (other, v.clone(), op.flipped()),
                    (other, ExprAst::Literal(v)) => (other, v.clone(), op),
                    _ => return self.drop_condition(clause, expr),
                };
                let left = match operand {
                    ExprAst::Column { table, name } => {
                        FilterOperand::Column(column_ref(table, name))
                    }
                    ExprAst::FuncCall { name, .. } if AggregateFn::from_name(name).is_none() => {
                        return self.drop_condition(clause, expr);
                    }
                    ExprAst::FuncCall {
                        name,
                        args,
                        distinct,
                    } if allow_aggregates => {
                        FilterOperand::Aggregate(self.aggregate(name, args, *distinct)?)
                    }
                    ExprAst::FuncCall { .. } => {
                        return Err(QueryAstError::shape(format!(
                            "aggregates are not allowed in WHERE: `{}`",
                            expr
                        )));
                    }
                    _ => return self.drop_condition(clause, expr),
                };
                Ok(Some(Predicate::Compare(FilterClause { left, op, value })))
            }
            other => self.drop_condition(clause, other),
        }
    }

    /// `None` when the sort key cannot be modelled and rows keep their order.
    fn order_by(
        &mut self,
        item: &OrderByExprAst,
        select: &[SelectItem],
    ) -> Result<Option<OrderByClause>, QueryAstError> {
        let direction = if item.asc {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        let column = match item.expr.unnested() {
            ExprAst::Column { table, name } => rebind_column(column_ref(table, name), select),
            ExprAst::Literal(Value::Number(n)) => {
                let position = *n as usize;
                match select.get(position.wrapping_sub(1)) {
                    Some(SelectItem::Column { column, .. }) if n.fract() == 0.0 => column.clone(),
                    Some(SelectItem::Aggregate(agg)) if n.fract() == 0.0 => {
                        ColumnRef::bare(agg.output_label())
                    }
                    _ => {
                        return Err(QueryAstError::shape(format!(
                            "ORDER BY position {} does not name a select column",
                            n
                        )));
                    }
                }
            }
            ExprAst::FuncCall {
                name,
                args,
                distinct,
            } if AggregateFn::from_name(name).is_some() => {
                let agg = self.aggregate(name, args, *distinct)?;
                let selected = select.iter().find_map(|s| match s {
                    SelectItem::Aggregate(a) if a.same_computation(&agg) => Some(a),
                    _ => None,
                });
                match selected {
                    Some(a) => ColumnRef::bare(a.output_label()),
                    None => {
                        return Err(QueryAstError::shape(format!(
                            "ORDER BY {} must also appear in the SELECT list",
                            agg.default_label()
                        )));
                    }
                }
            }
            other => {
                self.skip(format!(
                    "ORDER BY: `{}` cannot be evaluated, rows are not sorted",
                    other
                ))?;
                return Ok(None);
            }
        };
        Ok(Some(OrderByClause { column, direction }))
    }
}

fn flatten_and<'a>(expr: &'a ExprAst, out: &mut Vec<&'a ExprAst>) {
    match expr.unnested() {
        ExprAst::BinaryOp { left, op, right } if op.eq_ignore_ascii_case("AND") => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        other => out.push(other),
    }
}

fn non_equi_join(expr: &ExprAst) -> QueryAstError {
    QueryAstError::shape(format!(
        "join condition must be an equality between two columns, got `{}`",
        expr
    ))
}

fn alias_target<'a>(name: &str, select: &'a [SelectItem]) -> Option<&'a SelectItem> {
    select.iter().find(|item| match item {
        SelectItem::Column { alias: Some(a), .. } => a.eq_ignore_ascii_case(name),
        SelectItem::Aggregate(agg) => agg
            .alias
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(name)),
        _ => false,
    })
}

/// A bare reference to a select alias binds to the aliased output.
fn rebind_column(column: ColumnRef, select: &[SelectItem]) -> ColumnRef {
    if column.table.is_some() {
        return column;
    }
    match alias_target(&column.column, select) {
        Some(SelectItem::Column { column: target, .. }) => target.clone(),
        Some(SelectItem::Aggregate(agg)) => ColumnRef::bare(agg.output_label()),
        _ => column,
    }
}

fn rebind_having(predicate: Predicate, select: &[SelectItem]) -> Predicate {
    match predicate {
        Predicate::Compare(clause) => {
            let left = match clause.left {
                FilterOperand::Column(c) if c.table.is_none() => {
                    match alias_target(&c.column, select) {
                        Some(SelectItem::Aggregate(agg)) => FilterOperand::Aggregate(agg.clone()),
                        Some(SelectItem::Column { column, .. }) => {
                            FilterOperand::Column(column.clone())
                        }
                        _ => FilterOperand::Column(c),
                    }
                }
                FilterOperand::Aggregate(agg) => {
                    let selected = select.iter().find_map(|s| match s {
                        SelectItem::Aggregate(a) if a.same_computation(&agg) => Some(a.clone()),
                        _ => None,
                    });
                    FilterOperand::Aggregate(selected.unwrap_or(agg))
                }
                other => other,
            };
            Predicate::Compare(FilterClause { left, ..clause })
        }
        Predicate::And(a, b) => Predicate::And(
            Box::new(rebind_having(*a, select)),
            Box::new(rebind_having(*b, select)),
        ),
        Predicate::Or(a, b) => Predicate::Or(
            Box::new(rebind_having(*a, select)),
            Box::new(rebind_having(*b, select)),
        ),
        Predicate::Not(p) => Predicate::Not(Box::new(rebind_having(*p, select))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ast::parser::parse_sql;

    fn normalize(sql: &str) -> Normalized {
        normalize_statement(&parse_sql(sql).expect("parse")).expect("normalize")
    }

    fn normalize_err(sql: &str) -> QueryAstError {
        normalize_statement(&parse_sql(sql).expect("parse")).unwrap_err()
    }

    fn query(sql: &str) -> NormalizedQuery {
        match normalize(sql).statement {
            NormalizedStatement::Query(q) => q,
            other => panic!("expected query, got {:?}", other),
        }
    }

    #[test]
    fn missing_from_is_shape_error() {
        assert!(matches!(normalize_err("SELECT 1"), QueryAstError::ParseShape(_)));
    }

    #[test]
    fn cte_names_resolve_to_cte_sources() {
        let q = query(
            "WITH recent AS (SELECT * FROM Students) \
             SELECT * FROM recent JOIN Grades ON recent.id = Grades.student_id",
        );
        assert_eq!(q.ctes.len(), 1);
        assert_eq!(
            q.from,
            TableSource::Cte {
                name: "recent".into(),
                alias: None
            }
        );
        assert!(matches!(q.joins[0].source, TableSource::Table { .. }));
    }

    #[test]
    fn derived_table_defaults_its_name() {
        let q = query("SELECT * FROM (SELECT id FROM Students)");
        match q.from {
            TableSource::Subquery { name, .. } => assert_eq!(name, DEFAULT_SUBQUERY_NAME),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn literal_first_comparison_is_flipped() {
        let q = query("SELECT * FROM Students WHERE 2023 < cohort");
        match q.where_clause {
            Some(Predicate::Compare(c)) => {
                assert_eq!(c.op, CompareOp::Gt);
                assert_eq!(c.value, Value::from(2023));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn compound_where_builds_tree() {
        let q = query(
            "SELECT * FROM Students WHERE cohort = 2023 AND NOT (name = 'Ada' OR id > 2)",
        );
        let p = q.where_clause.expect("where");
        assert!(matches!(p, Predicate::And(_, _)));
        assert_eq!(p.clauses().len(), 3);
    }

    #[test]
    fn extra_join_conditions_become_notes() {
        let n = normalize(
            "SELECT * FROM Grades g JOIN Enrollments e \
             ON g.student_id = e.student_id AND g.course = e.course",
        );
        assert_eq!(n.notes.len(), 1);
        assert!(n.notes[0].contains("g.student_id = e.student_id"));
    }

    #[test]
    fn non_equality_join_is_rejected() {
        let err = normalize_err("SELECT * FROM Students s JOIN Grades g ON s.id > g.student_id");
        assert!(matches!(err, QueryAstError::ParseShape(_)));
    }

    #[test]
    fn using_maps_to_equality() {
        let q = query("SELECT * FROM Grades JOIN Enrollments USING (student_id)");
        let on = q.joins[0].on.as_ref().expect("on");
        assert_eq!(on.left, ColumnRef::bare("student_id"));
        assert_eq!(on.right, ColumnRef::qualified("Enrollments", "student_id"));
    }

    #[test]
    fn having_and_order_by_reuse_select_alias() {
        let q = query(
            "SELECT cohort, COUNT(*) AS total FROM Students GROUP BY cohort \
             HAVING COUNT(*) > 1 ORDER BY total DESC",
        );
        match q.having {
            Some(Predicate::Compare(FilterClause {
                left: FilterOperand::Aggregate(agg),
                ..
            })) => {
                assert_eq!(agg.output_label(), "total");
            }
            other => panic!("unexpected {:?}", other),
        }
        let order = q.order_by.expect("order");
        assert_eq!(order.column, ColumnRef::bare("total"));
        assert_eq!(order.direction, SortDirection::Desc);
    }

    #[test]
    fn extra_order_keys_are_noted() {
        let n = normalize("SELECT * FROM Students ORDER BY cohort, name");
        assert!(n.notes.iter().any(|note| note.starts_with("ORDER BY")));
    }

    #[test]
    fn union_all_is_noted_and_nested() {
        let n = normalize("SELECT id FROM Students UNION ALL SELECT student_id FROM Grades");
        assert!(n.notes.iter().any(|note| note.contains("UNION ALL")));
        match n.statement {
            NormalizedStatement::Query(q) => assert!(q.set_operation.is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unmodelled_select_items_are_left_out() {
        let n = normalize("SELECT name, COALESCE(cohort, 0) AS c, id + 1 FROM Students");
        match n.statement {
            NormalizedStatement::Query(q) => assert_eq!(q.select.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(n.notes.len(), 2);
        assert!(n.notes[0].contains("COALESCE(cohort, 0)"));

        let q = query("SELECT id + 1 FROM Students");
        assert!(q.is_select_star());
    }

    #[test]
    fn unmodelled_conditions_are_dropped() {
        let n = normalize("SELECT * FROM Students WHERE name LIKE 'A%' AND cohort = 2023");
        assert!(
            n.notes
                .iter()
                .any(|note| note.starts_with("WHERE") && note.contains("LIKE"))
        );
        match n.statement {
            NormalizedStatement::Query(q) => match q.where_clause {
                Some(Predicate::Compare(c)) => assert_eq!(c.value, Value::from(2023)),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }

        let q = query("SELECT * FROM Students WHERE cohort = 2023 OR id IN (1, 2)");
        assert_eq!(q.where_clause, None);
        let q = query("SELECT * FROM Students WHERE NOT cohort IS NULL");
        assert_eq!(q.where_clause, None);
        let q = query("SELECT * FROM Students ORDER BY CASE WHEN id > 1 THEN 0 ELSE 1 END");
        assert_eq!(q.order_by, None);
    }

    #[test]
    fn mutations_reject_unmodelled_conditions() {
        let err = normalize_err("DELETE FROM Students WHERE name LIKE 'A%'");
        assert!(matches!(err, QueryAstError::ParseShape(_)));
    }

    #[test]
    fn insert_values_must_be_literals() {
        let n = normalize("INSERT INTO Students (id, name) VALUES (4, 'Edsger')");
        match n.statement {
            NormalizedStatement::Insert(insert) => match insert.source {
                InsertSource::Values(rows) => {
                    assert_eq!(rows, vec![vec![Value::from(4), Value::from("Edsger")]])
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        let err = normalize_err("INSERT INTO Students (id) VALUES (id)");
        assert!(matches!(err, QueryAstError::ParseShape(_)));
    }
}

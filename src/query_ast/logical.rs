//! Normalized logical query tree consumed by the executor.

use std::fmt;

use crate::models::{AggregateFn, CompareOp, JoinType, SetOpKind, SortDirection, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub column: String,
    pub table: Option<String>,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self { column: column.into(), table: None }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { column: column.into(), table: Some(table.into()) }
    }

    /// `table.column` when qualified, else the bare name.
    pub fn label(&self) -> String {
        match &self.table {
            Some(t) => format!("{}.{}", t, self.column),
            None => self.column.clone(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRef {
    pub func: AggregateFn,
    /// `*` only for COUNT.
    pub column: String,
    pub table: Option<String>,
    pub alias: Option<String>,
}

impl AggregateRef {
    pub fn is_star(&self) -> bool {
        self.column == "*"
    }

    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef { column: self.column.clone(), table: self.table.clone() }
    }

    /// `FN(column-label)`, the default output label.
    pub fn default_label(&self) -> String {
        format!("{}({})", self.func.name(), self.column_ref().label())
    }

    /// Output column name: alias when given.
    pub fn output_label(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.default_label())
    }

    /// Same function over the same column, alias ignored.
    pub fn same_computation(&self, other: &AggregateRef) -> bool {
        self.func == other.func
            && self.column.eq_ignore_ascii_case(&other.column)
            && match (&self.table, &other.table) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => true,
            }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*` or `table.*`.
    Wildcard { table: Option<String> },
    Column { column: ColumnRef, alias: Option<String> },
    Aggregate(AggregateRef),
}

impl SelectItem {
    pub fn output_label(&self) -> Option<String> {
        match self {
            SelectItem::Wildcard { .. } => None,
            SelectItem::Column { column, alias } => {
                Some(alias.clone().unwrap_or_else(|| column.label()))
            }
            SelectItem::Aggregate(agg) => Some(agg.output_label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub source: TableSource,
    /// Absent only for CROSS.
    pub on: Option<JoinCondition>,
}

impl JoinClause {
    pub fn table(&self) -> &str {
        self.source.display_name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
    Column(ColumnRef),
    Aggregate(AggregateRef),
}

impl fmt::Display for FilterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperand::Column(c) => write!(f, "{}", c),
            FilterOperand::Aggregate(a) => write!(f, "{}", a.output_label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub left: FilterOperand,
    pub op: CompareOp,
    pub value: Value,
}

/// Boolean predicate for WHERE and HAVING.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(FilterClause),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Every comparison leaf, left to right.
    pub fn clauses(&self) -> Vec<&FilterClause> {
        let mut out = Vec::new();
        self.collect_clauses(&mut out);
        out
    }

    fn collect_clauses<'a>(&'a self, out: &mut Vec<&'a FilterClause>) {
        match self {
            Predicate::Compare(c) => out.push(c),
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_clauses(out);
                b.collect_clauses(out);
            }
            Predicate::Not(p) => p.collect_clauses(out),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare(c) => {
                let value = match &c.value {
                    Value::Text(s) => format!("'{}'", s),
                    other => other.to_string(),
                };
                write!(f, "{} {} {}", c.left, c.op.symbol(), value)
            }
            Predicate::And(a, b) => write!(f, "({} AND {})", a, b),
            Predicate::Or(a, b) => write!(f, "({} OR {})", a, b),
            Predicate::Not(p) => write!(f, "NOT {}", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table { name: String, alias: Option<String> },
    Cte { name: String, alias: Option<String> },
    Subquery { name: String, query: Box<NormalizedQuery> },
}

impl TableSource {
    /// Name columns are qualified with: alias if present.
    pub fn qualifier(&self) -> &str {
        match self {
            TableSource::Table { name, alias } | TableSource::Cte { name, alias } => {
                alias.as_deref().unwrap_or(name)
            }
            TableSource::Subquery { name, .. } => name,
        }
    }

    /// Relation name as written in FROM / JOIN.
    pub fn display_name(&self) -> &str {
        match self {
            TableSource::Table { name, .. }
            | TableSource::Cte { name, .. }
            | TableSource::Subquery { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub kind: SetOpKind,
    pub right: Box<NormalizedQuery>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteDefinition {
    pub name: String,
    pub query: NormalizedQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub ctes: Vec<CteDefinition>,
    pub select: Vec<SelectItem>,
    pub from: TableSource,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<ColumnRef>,
    pub having: Option<Predicate>,
    pub order_by: Option<OrderByClause>,
    pub limit: Option<u64>,
    pub set_operation: Option<SetOperation>,
}

impl NormalizedQuery {
    pub fn from_source(from: TableSource) -> Self {
        Self {
            ctes: Vec::new(),
            select: vec![SelectItem::Wildcard { table: None }],
            from,
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: None,
            limit: None,
            set_operation: None,
        }
    }

    pub fn aggregates(&self) -> Vec<&AggregateRef> {
        self.select
            .iter()
            .filter_map(|item| match item {
                SelectItem::Aggregate(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// GROUP BY present or any aggregate selected.
    pub fn needs_aggregation(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates().is_empty()
    }

    pub fn is_select_star(&self) -> bool {
        matches!(self.select.as_slice(), [SelectItem::Wildcard { table: None }])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Value>>),
    Query(Box<NormalizedQuery>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// Empty means the table's natural column order.
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    pub selection: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub selection: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedStatement {
    Query(NormalizedQuery),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_labels() {
        let agg = AggregateRef {
            func: AggregateFn::Count,
            column: "*".into(),
            table: None,
            alias: None,
        };
        assert_eq!(agg.default_label(), "COUNT(*)");
        let avg = AggregateRef {
            func: AggregateFn::Avg,
            column: "score".into(),
            table: Some("Grades".into()),
            alias: Some("mean".into()),
        };
        assert_eq!(avg.default_label(), "AVG(Grades.score)");
        assert_eq!(avg.output_label(), "mean");
    }

    #[test]
    fn predicate_display_and_leaves() {
        let leaf = |col: &str, v: Value| {
            Predicate::Compare(FilterClause {
                left: FilterOperand::Column(ColumnRef::bare(col)),
                op: CompareOp::Gt,
                value: v,
            })
        };
        let p = Predicate::And(
            Box::new(leaf("a", 1.into())),
            Box::new(Predicate::Not(Box::new(leaf("b", "x".into())))),
        );
        assert_eq!(p.to_string(), "(a > 1 AND NOT b > 'x')");
        assert_eq!(p.clauses().len(), 2);
    }

    #[test]
    fn source_qualifier_prefers_alias() {
        let t = TableSource::Table { name: "Students".into(), alias: Some("s".into()) };
        assert_eq!(t.qualifier(), "s");
        assert_eq!(t.display_name(), "Students");
    }
}

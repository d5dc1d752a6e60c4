//! Crate-owned statement tree produced right after parsing.
//! Nothing past the parser adapter sees sqlparser types.

use std::fmt;

use crate::models::{SetOpKind, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum StatementAst {
    Query(QueryAst),
    Insert(InsertAst),
    Update(UpdateAst),
    Delete(DeleteAst),
}

/// A SELECT with its WITH list and an optional trailing set operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAst {
    pub ctes: Vec<CteAst>,
    pub body: SelectAst,
    /// Chains nest to the right: `A UNION B EXCEPT C` is `A UNION (B EXCEPT C)`.
    pub set_op: Option<SetOpAst>,
}

impl QueryAst {
    pub fn simple(body: SelectAst) -> Self {
        Self { ctes: Vec::new(), body, set_op: None }
    }

    /// Attach `right` to the last query in this set-operation chain.
    pub(crate) fn append_set_op(&mut self, op: SetOpKind, all: bool, right: QueryAst) {
        match self.set_op {
            Some(ref mut existing) => existing.right.append_set_op(op, all, right),
            None => {
                self.set_op = Some(SetOpAst { op, all, right: Box::new(right) });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteAst {
    pub name: String,
    pub query: QueryAst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOpAst {
    pub op: SetOpKind,
    /// `UNION ALL` and friends, evaluated as the plain operator.
    pub all: bool,
    pub right: Box<QueryAst>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectAst {
    pub projection: Vec<SelectItemAst>,
    pub from: Option<TableRefAst>,
    pub joins: Vec<JoinAst>,
    pub selection: Option<ExprAst>,
    pub group_by: Vec<ExprAst>,
    pub having: Option<ExprAst>,
    pub order_by: Vec<OrderByExprAst>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItemAst {
    Expr { expr: ExprAst, alias: Option<String> },
    Wildcard,
    QualifiedWildcard(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRefAst {
    Named { name: String, alias: Option<String> },
    Derived { query: Box<QueryAst>, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinKindAst {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
    /// Any other dialect spelling (semi, anti, apply...).
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraintAst {
    On(ExprAst),
    Using(Vec<String>),
    Natural,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinAst {
    pub kind: JoinKindAst,
    pub relation: TableRefAst,
    pub constraint: JoinConstraintAst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExprAst {
    pub expr: ExprAst,
    pub asc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprAst {
    Column { table: Option<String>, name: String },
    Literal(Value),
    BinaryOp { left: Box<ExprAst>, op: String, right: Box<ExprAst> },
    Not(Box<ExprAst>),
    FuncCall { name: String, args: Vec<ExprAst>, distinct: bool },
    Star,
    Nested(Box<ExprAst>),
    // Anything the adapter does not model, kept as SQL text for error messages.
    Raw(String),
}

impl ExprAst {
    /// Strips redundant parentheses.
    pub fn unnested(&self) -> &ExprAst {
        match self {
            ExprAst::Nested(inner) => inner.unnested(),
            other => other,
        }
    }
}

impl fmt::Display for ExprAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprAst::Column { table: Some(t), name } => write!(f, "{}.{}", t, name),
            ExprAst::Column { table: None, name } => write!(f, "{}", name),
            ExprAst::Literal(Value::Text(s)) => write!(f, "'{}'", s),
            ExprAst::Literal(v) => write!(f, "{}", v),
            ExprAst::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            ExprAst::Not(inner) => write!(f, "NOT {}", inner),
            ExprAst::FuncCall { name, args, distinct } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                let prefix = if *distinct { "DISTINCT " } else { "" };
                write!(f, "{}({}{})", name, prefix, args.join(", "))
            }
            ExprAst::Star => write!(f, "*"),
            ExprAst::Nested(inner) => write!(f, "({})", inner),
            ExprAst::Raw(sql) => write!(f, "{}", sql),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSourceAst {
    Values(Vec<Vec<ExprAst>>),
    Query(Box<QueryAst>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertAst {
    pub table: String,
    pub columns: Vec<String>,
    pub source: InsertSourceAst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAst {
    pub table: String,
    pub assignments: Vec<(String, ExprAst)>,
    pub selection: Option<ExprAst>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteAst {
    pub table: String,
    pub selection: Option<ExprAst>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from(name: &str) -> QueryAst {
        QueryAst::simple(SelectAst {
            from: Some(TableRefAst::Named { name: name.into(), alias: None }),
            ..Default::default()
        })
    }

    #[test]
    fn set_ops_chain_to_the_right() {
        let mut q = from("a");
        q.append_set_op(SetOpKind::Union, false, from("b"));
        q.append_set_op(SetOpKind::Except, false, from("c"));
        let first = q.set_op.as_ref().unwrap();
        assert_eq!(first.op, SetOpKind::Union);
        let second = first.right.set_op.as_ref().unwrap();
        assert_eq!(second.op, SetOpKind::Except);
        assert!(second.right.set_op.is_none());
    }

    #[test]
    fn expressions_render_as_sql() {
        let e = ExprAst::BinaryOp {
            left: Box::new(ExprAst::FuncCall {
                name: "COUNT".into(),
                args: vec![ExprAst::Star],
                distinct: false,
            }),
            op: ">".into(),
            right: Box::new(ExprAst::Literal(Value::text("x"))),
        };
        assert_eq!(e.to_string(), "COUNT(*) > 'x'");
    }

    #[test]
    fn unnested_strips_all_parens() {
        let inner = ExprAst::Column { table: None, name: "x".into() };
        let e = ExprAst::Nested(Box::new(ExprAst::Nested(Box::new(inner.clone()))));
        assert_eq!(e.unnested(), &inner);
    }
}

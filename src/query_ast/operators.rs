//! Pure relational operators over [`TableData`].
//!
//! Every operator returns freshly built rows; inputs are never modified.
//! Column lookups go through [`resolve_column_key`], which is case-insensitive
//! and walks the column list in order, so the first match wins.

use std::collections::{HashMap, HashSet};

use super::logical::{
    AggregateRef, ColumnRef, FilterOperand, JoinCondition, OrderByClause, Predicate, SelectItem,
};
use crate::models::{
    AggregateFn, CompareOp, JoinPair, JoinType, Row, RowState, SetOpKind, SortDirection, TableData,
    Value,
};

/// Identity of a value inside group and set keys; NULLs form their own key.
type KeyPart = Option<String>;

fn key_part(value: &Value) -> KeyPart {
    match value {
        Value::Null => None,
        other => Some(other.canonical()),
    }
}

/// Column label with a leading `table.` removed, if it has one.
fn base_name(column: &str) -> &str {
    match column.split_once('.') {
        Some((prefix, rest))
            if !prefix.is_empty()
                && !rest.is_empty()
                && prefix.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            rest
        }
        _ => column,
    }
}

/// Prefixes every column with `qualifier`.
///
/// A relation that is already qualified (CTE or subquery output) first drops
/// its old prefix where the remaining name stays unique.
pub fn qualify(table: &TableData, qualifier: &str) -> TableData {
    let mut base_counts: HashMap<String, usize> = HashMap::new();
    for column in &table.columns {
        *base_counts.entry(base_name(column).to_ascii_lowercase()).or_default() += 1;
    }
    let renamed: Vec<(String, String)> = table
        .columns
        .iter()
        .map(|column| {
            let base = base_name(column);
            let local = if base_counts.get(&base.to_ascii_lowercase()) == Some(&1) {
                base
            } else {
                column.as_str()
            };
            (column.clone(), format!("{}.{}", qualifier, local))
        })
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            renamed
                .iter()
                .filter_map(|(old, new)| row.get(old).map(|v| (new.clone(), v.clone())))
                .collect::<Row>()
        })
        .collect();
    TableData::new(renamed.into_iter().map(|(_, new)| new).collect(), rows)
}

/// Finds the column a reference binds to: `table.column` first, then the bare
/// name, then any `*.column` suffix.
pub fn resolve_column_key<'a>(columns: &'a [String], column: &ColumnRef) -> Option<&'a str> {
    if let Some(table) = &column.table {
        let qualified = format!("{}.{}", table, column.column);
        if let Some(found) = columns.iter().find(|c| c.eq_ignore_ascii_case(&qualified)) {
            return Some(found);
        }
    }
    if let Some(found) = columns.iter().find(|c| c.eq_ignore_ascii_case(&column.column)) {
        return Some(found);
    }
    let suffix = format!(".{}", column.column.to_ascii_lowercase());
    columns.iter().find(|c| c.to_ascii_lowercase().ends_with(&suffix)).map(String::as_str)
}

// Like resolve_column_key but a qualified reference must match its own table.
fn resolves_strictly(columns: &[String], column: &ColumnRef) -> bool {
    match &column.table {
        Some(table) => {
            let qualified = format!("{}.{}", table, column.column);
            columns.iter().any(|c| c.eq_ignore_ascii_case(&qualified))
        }
        None => resolve_column_key(columns, column).is_some(),
    }
}

fn column_value(table: &TableData, row: &Row, column: &ColumnRef) -> Value {
    resolve_column_key(&table.columns, column)
        .and_then(|key| row.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Swaps the sides of `ON b.x = a.y` so `left` refers to the left relation.
pub fn orient_condition(
    left: &TableData,
    right: &TableData,
    condition: &JoinCondition,
) -> JoinCondition {
    let as_written = resolves_strictly(&left.columns, &condition.left)
        && resolves_strictly(&right.columns, &condition.right);
    let swapped = resolves_strictly(&left.columns, &condition.right)
        && resolves_strictly(&right.columns, &condition.left);
    if !as_written && swapped {
        JoinCondition {
            left: condition.right.clone(),
            right: condition.left.clone(),
        }
    } else {
        condition.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub table: TableData,
    /// `matched` / `unmatched`, parallel to `table.rows`.
    pub row_states: Vec<RowState>,
    pub left_matched: Vec<bool>,
    pub right_matched: Vec<bool>,
}

/// Equality join of two qualified relations. Without a condition every pair
/// of rows is produced. Missing sides are filled with `placeholder`.
pub fn join(
    left: &TableData,
    right: &TableData,
    join_type: JoinType,
    on: Option<&JoinCondition>,
    placeholder: &Value,
) -> JoinOutcome {
    let mut columns = left.columns.clone();
    columns.extend(right.columns.iter().cloned());
    let mut rows = Vec::new();
    let mut row_states = Vec::new();
    let mut left_matched = vec![false; left.rows.len()];
    let mut right_matched = vec![false; right.rows.len()];

    let merge = |l: &Row, r: &Row| -> Row {
        let mut merged = l.clone();
        merged.extend(r.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    };
    let filler = |cols: &[String]| -> Row {
        cols.iter()
            .map(|c| (c.clone(), placeholder.clone()))
            .collect()
    };

    let condition = match on {
        Some(c) if join_type != JoinType::Cross => Some(orient_condition(left, right, c)),
        _ => None,
    };

    for (li, left_row) in left.rows.iter().enumerate() {
        for (ri, right_row) in right.rows.iter().enumerate() {
            let matches = match &condition {
                Some(c) => column_value(left, left_row, &c.left)
                    .loose_eq(&column_value(right, right_row, &c.right)),
                None => true,
            };
            if matches {
                rows.push(merge(left_row, right_row));
                row_states.push(RowState::Matched);
                left_matched[li] = true;
                right_matched[ri] = true;
            }
        }
        if !left_matched[li] && join_type.keeps_left() {
            rows.push(merge(left_row, &filler(&right.columns)));
            row_states.push(RowState::Unmatched);
        }
    }

    if join_type.keeps_right() {
        for (ri, right_row) in right.rows.iter().enumerate() {
            if !right_matched[ri] {
                rows.push(merge(&filler(&left.columns), right_row));
                row_states.push(RowState::Unmatched);
            }
        }
    }

    JoinOutcome {
        table: TableData::new(columns, rows),
        row_states,
        left_matched,
        right_matched,
    }
}

/// Human-readable match candidates for the join animator: the first match of
/// each left row, then unmatched right rows for RIGHT/FULL. A CROSS JOIN is
/// described by its first `cross_preview` pairs.
pub fn join_pairs(
    left: &TableData,
    right: &TableData,
    join_type: JoinType,
    condition: Option<&JoinCondition>,
    left_name: &str,
    right_name: &str,
    cross_preview: usize,
) -> Vec<JoinPair> {
    let condition = match condition {
        Some(c) if join_type != JoinType::Cross => c,
        _ => {
            return (0..left.rows.len().min(cross_preview))
                .map(|index| {
                    let right_index = if right.rows.is_empty() {
                        0
                    } else {
                        index % right.rows.len()
                    };
                    JoinPair {
                        id: format!("pair-{}", index),
                        left: format!("{} row {}", left_name, index + 1),
                        right: if right.rows.is_empty() {
                            "No rows".to_string()
                        } else {
                            format!("{} row {}", right_name, right_index + 1)
                        },
                        matched: true,
                        left_row_index: Some(index),
                        right_row_index: Some(right_index),
                        explanation: Some(format!(
                            "CROSS JOIN pairs every row of {} with every row of {}",
                            left_name, right_name
                        )),
                    }
                })
                .collect();
        }
    };

    let mut pairs = Vec::new();
    let mut right_seen = vec![false; right.rows.len()];
    let lcol = &condition.left.column;
    let rcol = &condition.right.column;

    for (index, left_row) in left.rows.iter().enumerate() {
        let left_value = column_value(left, left_row, &condition.left);
        let found = right
            .rows
            .iter()
            .position(|r| column_value(right, r, &condition.right).loose_eq(&left_value));
        match found {
            Some(ri) => {
                right_seen[ri] = true;
                let right_value = column_value(right, &right.rows[ri], &condition.right);
                pairs.push(JoinPair {
                    id: format!("pair-{}", index),
                    left: format!("{}.{} = {}", left_name, lcol, left_value),
                    right: format!("{}.{} = {}", right_name, rcol, right_value),
                    matched: true,
                    left_row_index: Some(index),
                    right_row_index: Some(ri),
                    explanation: Some(format!(
                        "Row {} of {} ({}={}) matches row {} of {} ({}={})",
                        index + 1,
                        left_name,
                        lcol,
                        left_value,
                        ri + 1,
                        right_name,
                        rcol,
                        right_value
                    )),
                });
            }
            None => {
                let dropped = if join_type == JoinType::Inner {
                    ", so it is dropped from the result"
                } else {
                    ""
                };
                pairs.push(JoinPair {
                    id: format!("pair-{}", index),
                    left: format!("{}.{} = {}", left_name, lcol, left_value),
                    right: "No match".to_string(),
                    matched: false,
                    left_row_index: Some(index),
                    right_row_index: None,
                    explanation: Some(format!(
                        "Row {} of {} ({}={}) has no match in {}{}",
                        index + 1,
                        left_name,
                        lcol,
                        left_value,
                        right_name,
                        dropped
                    )),
                });
            }
        }
    }

    if join_type.keeps_right() {
        for (index, right_row) in right.rows.iter().enumerate() {
            if right_seen[index] {
                continue;
            }
            // matched, just not as any left row's first match
            let right_value = column_value(right, right_row, &condition.right);
            let left_value_match = left
                .rows
                .iter()
                .any(|l| column_value(left, l, &condition.left).loose_eq(&right_value));
            if left_value_match {
                continue;
            }
            pairs.push(JoinPair {
                id: format!("pair-right-{}", index),
                left: "No match".to_string(),
                right: format!("{}.{} = {}", right_name, rcol, right_value),
                matched: false,
                left_row_index: None,
                right_row_index: Some(index),
                explanation: Some(format!(
                    "Row {} of {} ({}={}) has no match in {}",
                    index + 1,
                    right_name,
                    rcol,
                    right_value,
                    left_name
                )),
            });
        }
    }
    pairs
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> Option<bool> {
    let ordering = left.loose_cmp(right)?;
    Some(match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::NotEq => ordering.is_ne(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::GtEq => ordering.is_ge(),
        CompareOp::LtEq => ordering.is_le(),
    })
}

fn operand_value(table: &TableData, row: &Row, operand: &FilterOperand) -> Value {
    match operand {
        FilterOperand::Column(c) => column_value(table, row, c),
        FilterOperand::Aggregate(agg) => {
            column_value(table, row, &ColumnRef::bare(agg.output_label()))
        }
    }
}

// Three-valued: None is SQL UNKNOWN.
fn eval_predicate(table: &TableData, row: &Row, predicate: &Predicate) -> Option<bool> {
    match predicate {
        Predicate::Compare(clause) => compare(
            &operand_value(table, row, &clause.left),
            clause.op,
            &clause.value,
        ),
        Predicate::And(a, b) => {
            match (eval_predicate(table, row, a), eval_predicate(table, row, b)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }
        }
        Predicate::Or(a, b) => {
            match (eval_predicate(table, row, a), eval_predicate(table, row, b)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }
        }
        Predicate::Not(p) => eval_predicate(table, row, p).map(|b| !b),
    }
}

/// True when the row satisfies the predicate; UNKNOWN counts as false.
pub fn row_matches(table: &TableData, row: &Row, predicate: &Predicate) -> bool {
    eval_predicate(table, row, predicate) == Some(true)
}

pub fn filter(table: &TableData, predicate: &Predicate) -> TableData {
    table.with_rows(
        table
            .rows
            .iter()
            .filter(|row| row_matches(table, row, predicate))
            .cloned()
            .collect(),
    )
}

/// `kept` / `filtered` for every input row; nothing is removed.
pub fn filter_states(table: &TableData, predicate: &Predicate) -> Vec<RowState> {
    table
        .rows
        .iter()
        .map(|row| {
            if row_matches(table, row, predicate) {
                RowState::Kept
            } else {
                RowState::Filtered
            }
        })
        .collect()
}

/// What GROUP BY computes: grouping keys, the select list, and aggregates only
/// HAVING needs.
#[derive(Debug, Clone, Copy)]
pub struct AggregationPlan<'a> {
    pub group_by: &'a [ColumnRef],
    pub select: &'a [SelectItem],
    pub hidden: &'a [AggregateRef],
}

fn compute_aggregate(
    agg: &AggregateRef,
    input: &TableData,
    rows: &[&Row],
    missing: &Value,
) -> Value {
    if agg.is_star() {
        return Value::from(rows.len() as i64);
    }
    let column = agg.column_ref();
    let values: Vec<Value> = rows
        .iter()
        .map(|row| column_value(input, row, &column))
        .filter(|v| !v.is_null() && v != missing)
        .collect();
    let numbers: Vec<f64> = values.iter().filter_map(Value::as_number).collect();
    match agg.func {
        AggregateFn::Count => Value::from(values.len() as i64),
        _ if numbers.is_empty() => Value::from(0),
        AggregateFn::Sum => Value::Number(numbers.iter().sum()),
        AggregateFn::Avg => Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64),
        AggregateFn::Min => Value::Number(numbers.iter().copied().fold(f64::INFINITY, f64::min)),
        AggregateFn::Max => {
            Value::Number(numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
    }
}

/// Groups rows by the canonical tuple of their group-column values, in order
/// of first appearance. With no GROUP BY the whole input is one group, and an
/// empty input still yields a single row of zeroed aggregates.
///
/// Plain columns keep their input label and the group's first value.
/// `missing` values (the outer-join placeholder) are skipped like NULLs.
pub fn aggregate(input: &TableData, plan: AggregationPlan<'_>, missing: &Value) -> TableData {
    let mut columns: Vec<String> = Vec::new();
    let mut plain: Vec<String> = Vec::new();
    let push_unique = |columns: &mut Vec<String>, label: String| {
        if !columns.iter().any(|c| c == &label) {
            columns.push(label);
        }
    };

    let input_key = |column: &ColumnRef| {
        resolve_column_key(&input.columns, column)
            .map(str::to_string)
            .unwrap_or_else(|| column.label())
    };
    let group_keys: Vec<String> = plan.group_by.iter().map(&input_key).collect();

    let mut aggregates: Vec<&AggregateRef> = Vec::new();
    for item in plan.select {
        match item {
            SelectItem::Column { column, .. } => {
                let key = input_key(column);
                push_unique(&mut plain, key.clone());
                push_unique(&mut columns, key);
            }
            SelectItem::Aggregate(agg) => {
                aggregates.push(agg);
                push_unique(&mut columns, agg.output_label());
            }
            SelectItem::Wildcard { .. } => {}
        }
    }
    for key in &group_keys {
        push_unique(&mut plain, key.clone());
        push_unique(&mut columns, key.clone());
    }
    for agg in plan.hidden {
        if !columns.contains(&agg.output_label()) {
            aggregates.push(agg);
            columns.push(agg.output_label());
        }
    }

    let mut order: Vec<Vec<KeyPart>> = Vec::new();
    let mut groups: HashMap<Vec<KeyPart>, Vec<&Row>> = HashMap::new();
    for row in &input.rows {
        let key: Vec<KeyPart> = group_keys
            .iter()
            .map(|k| key_part(row.get(k).unwrap_or(&Value::Null)))
            .collect();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    let mut rows: Vec<Row> = order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|members| {
            let mut out = Row::new();
            for key in &plain {
                let first = members
                    .first()
                    .and_then(|r| r.get(key))
                    .cloned()
                    .unwrap_or(Value::Null);
                out.insert(key.clone(), first);
            }
            for agg in &aggregates {
                out.insert(agg.output_label(), compute_aggregate(agg, input, members, missing));
            }
            out
        })
        .collect();

    if rows.is_empty() && plan.group_by.is_empty() {
        let mut out = Row::new();
        for key in &plain {
            out.insert(key.clone(), Value::Null);
        }
        for agg in &aggregates {
            out.insert(agg.output_label(), Value::from(0));
        }
        rows.push(out);
    }
    TableData::new(columns, rows)
}

/// Stable sort on one key; ties keep their input order, NULLs sort first.
pub fn order(table: &TableData, clause: &OrderByClause) -> TableData {
    let Some(key) = resolve_column_key(&table.columns, &clause.column) else {
        log::debug!("ORDER BY {} does not resolve, leaving rows unsorted", clause.column);
        return table.clone();
    };
    let mut rows = table.rows.clone();
    rows.sort_by(|a, b| {
        let va = a.get(key).unwrap_or(&Value::Null);
        let vb = b.get(key).unwrap_or(&Value::Null);
        match clause.direction {
            SortDirection::Asc => va.sort_cmp(vb),
            SortDirection::Desc => vb.sort_cmp(va),
        }
    });
    table.with_rows(rows)
}

pub fn limit(table: &TableData, n: u64) -> TableData {
    let n = usize::try_from(n).unwrap_or(usize::MAX);
    table.with_rows(table.rows.iter().take(n).cloned().collect())
}

/// `kept` for the first `n` rows, `filtered` after.
pub fn limit_states(len: usize, n: u64) -> Vec<RowState> {
    (0..len)
        .map(|i| {
            if (i as u64) < n {
                RowState::Kept
            } else {
                RowState::Filtered
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub table: TableData,
    /// Input columns feeding the output, for highlighting.
    pub source_columns: Vec<String>,
}

/// Builds the select list's output relation.
///
/// Column items are labelled by alias, else by bare name unless two items
/// share it. With `single_source`, `*` strips that source's qualifier so a
/// plain `SELECT *` returns the table's own column names.
pub fn project(
    input: &TableData,
    select: &[SelectItem],
    single_source: Option<&str>,
) -> Projection {
    let mut bare_counts: HashMap<String, usize> = HashMap::new();
    for item in select {
        if let SelectItem::Column { column, alias: None } = item {
            *bare_counts.entry(column.column.to_ascii_lowercase()).or_default() += 1;
        }
    }

    // (output label, input key)
    let mut mapping: Vec<(String, Option<String>)> = Vec::new();
    for item in select {
        match item {
            SelectItem::Wildcard { table } => {
                let prefix = table.as_ref().map(|t| format!("{}.", t.to_ascii_lowercase()));
                let source_prefix = single_source.map(|s| format!("{}.", s.to_ascii_lowercase()));
                for column in &input.columns {
                    let lower = column.to_ascii_lowercase();
                    let label = match (&prefix, &source_prefix) {
                        (Some(p), _) if lower.starts_with(p) => column[p.len()..].to_string(),
                        (Some(_), _) => continue,
                        (None, Some(p)) if lower.starts_with(p) => column[p.len()..].to_string(),
                        (None, _) => column.clone(),
                    };
                    mapping.push((label, Some(column.clone())));
                }
            }
            SelectItem::Column { column, alias } => {
                let key = resolve_column_key(&input.columns, column).map(str::to_string);
                let label = match alias {
                    Some(a) => a.clone(),
                    None if bare_counts.get(&column.column.to_ascii_lowercase()) == Some(&1) => {
                        column.column.clone()
                    }
                    None => key.clone().unwrap_or_else(|| column.label()),
                };
                mapping.push((label, key));
            }
            SelectItem::Aggregate(agg) => {
                let key = resolve_column_key(&input.columns, &ColumnRef::bare(agg.output_label()))
                    .map(str::to_string);
                mapping.push((agg.output_label(), key));
            }
        }
    }

    let mut columns: Vec<String> = Vec::new();
    for (label, _) in &mapping {
        if !columns.contains(label) {
            columns.push(label.clone());
        }
    }
    let rows = input
        .rows
        .iter()
        .map(|row| {
            mapping
                .iter()
                .map(|(label, key)| {
                    let value = key
                        .as_ref()
                        .and_then(|k| row.get(k))
                        .cloned()
                        .unwrap_or(Value::Null);
                    (label.clone(), value)
                })
                .collect::<Row>()
        })
        .collect();

    let mut source_columns: Vec<String> = Vec::new();
    for key in mapping.into_iter().filter_map(|(_, key)| key) {
        if !source_columns.contains(&key) {
            source_columns.push(key);
        }
    }
    Projection {
        table: TableData::new(columns, rows),
        source_columns,
    }
}

/// UNION / INTERSECT / EXCEPT with set semantics.
///
/// Right rows are realigned onto the left's columns by position. Rows are
/// identified by their canonical value tuple; the left copy wins on collision.
pub fn set_operation(left: &TableData, right: &TableData, kind: SetOpKind) -> TableData {
    let tuple = |row: &Row, columns: &[String]| -> Vec<Value> {
        columns.iter().map(|c| row.get(c).cloned().unwrap_or(Value::Null)).collect()
    };
    let key = |values: &[Value]| -> Vec<KeyPart> { values.iter().map(key_part).collect() };
    let to_row = |values: Vec<Value>| -> Row { left.columns.iter().cloned().zip(values).collect() };

    let right_tuples: Vec<Vec<Value>> = right
        .rows
        .iter()
        .map(|row| {
            let mut values = tuple(row, &right.columns);
            values.resize(left.columns.len(), Value::Null);
            values
        })
        .collect();
    let right_keys: HashSet<Vec<KeyPart>> = right_tuples.iter().map(|t| key(t)).collect();

    let mut seen: HashSet<Vec<KeyPart>> = HashSet::new();
    let mut rows = Vec::new();
    for row in &left.rows {
        let values = tuple(row, &left.columns);
        let k = key(&values);
        if seen.contains(&k) {
            continue;
        }
        let keep = match kind {
            SetOpKind::Union => true,
            SetOpKind::Intersect => right_keys.contains(&k),
            SetOpKind::Except => !right_keys.contains(&k),
        };
        seen.insert(k);
        if keep {
            rows.push(to_row(values));
        }
    }
    if kind == SetOpKind::Union {
        for values in right_tuples {
            if seen.insert(key(&values)) {
                rows.push(to_row(values));
            }
        }
    }
    TableData::new(left.columns.clone(), rows)
}

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::models::enums::{AnimationStyle, JoinType, NodeKind, RowState};

/// A scalar cell value.
///
/// Comparisons between a number and a numeric-looking string are numeric; see
/// [`Value::loose_cmp`]. Grouping and set operations key rows by
/// [`Value::canonical`], so `1` and `"1"` collapse into one key.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric reading of the value; text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// String form used as the identity of a value in group and set keys.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }

    /// SQL-ish comparison. `None` when either side is NULL.
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Number(_), Value::Text(_)) | (Value::Text(_), Value::Number(_)) => {
                match (self.as_number(), other.as_number()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => Some(self.canonical().cmp(&other.canonical())),
                }
            }
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        self.loose_cmp(other) == Some(Ordering::Equal)
    }

    /// Total order for sorting: NULL first, then [`Value::loose_cmp`].
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => self.loose_cmp(other).unwrap_or(Ordering::Equal),
        }
    }
}

fn format_number(n: f64) -> String {
    if n == 0.0 {
        // avoids "-0"
        return "0".to_string();
    }
    format!("{}", n)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

/// One row keyed by column name (qualified or bare).
pub type Row = BTreeMap<String, Value>;

/// An in-memory relation. Every row's keys are a subset of `columns`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Builds a relation from positional tuples, one value per column.
    pub fn from_tuples(columns: &[&str], tuples: Vec<Vec<Value>>) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = tuples
            .into_iter()
            .map(|tuple| columns.iter().cloned().zip(tuple).collect::<Row>())
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same columns, different rows.
    pub fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self { columns: self.columns.clone(), rows }
    }

    /// Value of `column` in row `index`, NULL when absent.
    pub fn value(&self, index: usize, column: &str) -> Value {
        self.rows
            .get(index)
            .and_then(|row| row.get(column))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(flatten)]
    pub table: TableData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_states: Option<Vec<RowState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_columns: Option<Vec<String>>,
}

impl NodeData {
    pub fn plain(table: TableData) -> Self {
        Self { table, row_states: None, highlight_columns: None }
    }

    pub fn with_states(table: TableData, row_states: Vec<RowState>) -> Self {
        debug_assert_eq!(table.rows.len(), row_states.len());
        Self { table, row_states: Some(row_states), highlight_columns: None }
    }
}

/// Human-readable description of one candidate join match.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPair {
    pub id: String,
    pub left: String,
    pub right: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSourceSummary {
    pub table_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub matched_row_indices: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,
}

/// Extra context for the join animator.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDetail {
    pub join_type: JoinType,
    pub join_condition: String,
    pub left_source: JoinSourceSummary,
    pub right_source: JoinSourceSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairs: Option<Vec<JoinPair>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinDetail>,
}

impl VisualizationNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            data: None,
            detail: None,
            pairs: None,
            notes: None,
            join: None,
        }
    }

    pub fn with_table(mut self, table: TableData) -> Self {
        self.data = Some(NodeData::plain(table));
        self
    }

    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn table(&self) -> Option<&TableData> {
        self.data.as_ref().map(|d| &d.table)
    }

    pub fn row_states(&self) -> Option<&[RowState]> {
        self.data.as_ref().and_then(|d| d.row_states.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationStep {
    pub id: String,
    pub label: String,
    pub style: AnimationStyle,
    pub duration_ms: u64,
    pub target_node_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GlossaryHint {
    pub term: String,
    pub definition: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LearningPrompt {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// One titled, renderable snapshot of evaluation progress.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStep {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub narration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub glossary: Vec<GlossaryHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<LearningPrompt>,
    pub nodes: Vec<VisualizationNode>,
    pub animations: Vec<AnimationStep>,
}

impl QueryStep {
    pub fn node(&self, id: &str) -> Option<&VisualizationNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_compares_as_number() {
        assert!(Value::from(10).loose_eq(&Value::from("10")));
        assert_eq!(Value::from(9).loose_cmp(&Value::from("10")), Some(Ordering::Less));
        assert_eq!(Value::from("b").loose_cmp(&Value::from("a")), Some(Ordering::Greater));
    }

    #[test]
    fn null_never_compares() {
        assert_eq!(Value::Null.loose_cmp(&Value::Null), None);
        assert!(!Value::Null.loose_eq(&Value::from(1)));
        assert_eq!(Value::Null.sort_cmp(&Value::from(1)), Ordering::Less);
    }

    #[test]
    fn canonical_form_drops_trailing_zero() {
        assert_eq!(Value::from(3).canonical(), "3");
        assert_eq!(Value::from(2.5).canonical(), "2.5");
        assert_eq!(Value::Number(-0.0).canonical(), "0");
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        let values = vec![Value::from(2), Value::from(2.5), Value::Null];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, "[2,2.5,null]");
    }

    #[test]
    fn node_data_flattens_table() {
        let table = TableData::from_tuples(&["id"], vec![vec![Value::from(1)]]);
        let data = NodeData::with_states(table, vec![RowState::Kept]);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["columns"][0], "id");
        assert_eq!(json["rowStates"][0], "kept");
        assert!(json.get("highlightColumns").is_none());
    }
}

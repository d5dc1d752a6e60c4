//! Turns executor traces into numbered, renderable [`QueryStep`]s.

use super::executor::{FilterTrace, JoinTrace, MutationKind, MutationPreview, QueryTrace};
use super::logical::NormalizedQuery;
use super::operators;
use crate::config::VisualizerConfig;
use crate::models::{
    AnimationStep, GlossaryHint, JoinDetail, JoinSourceSummary, JoinType, LearningPrompt, NodeData,
    NodeKind, QueryStep, RowState, SetOpKind, SortDirection, TableData, VisualizationNode,
};
use crate::query_tools::CoverageGap;

const GLOSSARY: &[(&str, &str)] = &[
    ("SELECT", "Chooses which columns or expressions appear in the final result."),
    ("FROM", "Defines the source tables or subqueries used by the query."),
    ("WHERE", "Filters rows before grouping or projection."),
    ("INNER JOIN", "Keeps only rows where the join condition matches."),
    ("LEFT JOIN", "Keeps all rows from the left table and matching rows from the right table."),
    ("RIGHT JOIN", "Keeps all rows from the right table and matching rows from the left table."),
    ("FULL JOIN", "Keeps rows from both tables, matching when possible."),
    ("CROSS JOIN", "Pairs every row from the left with every row from the right."),
    ("ON", "Specifies the join condition that matches rows between tables."),
    ("GROUP BY", "Groups rows so aggregates can be computed per group."),
    ("HAVING", "Filters groups after aggregation."),
    ("ORDER BY", "Sorts the result set by one or more columns."),
    ("LIMIT", "Restricts the number of rows returned."),
    ("UNION", "Combines results and removes duplicates."),
    ("INTERSECT", "Keeps only rows that appear in both result sets."),
    ("EXCEPT", "Keeps rows from the left result that are not in the right result."),
    ("CTE", "Common Table Expression; a named subquery defined with WITH."),
    ("SUBQUERY", "A nested query used as a data source."),
    ("INSERT", "Adds new rows to a table."),
    ("UPDATE", "Modifies existing rows in a table."),
    ("DELETE", "Removes rows from a table."),
    ("AGGREGATE", "Calculations like COUNT, SUM, or AVG over groups of rows."),
];

pub fn glossary_definition(term: &str) -> Option<&'static str> {
    GLOSSARY.iter().find(|(t, _)| t.eq_ignore_ascii_case(term)).map(|(_, d)| *d)
}

/// Narration extras attached to a step.
#[derive(Default)]
struct StepAids {
    narration: Option<String>,
    caption: Option<String>,
    glossary: Vec<String>,
    quiz: Option<LearningPrompt>,
}

impl StepAids {
    fn new(narration: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            narration: Some(narration.into()),
            caption: Some(caption.into()),
            ..Default::default()
        }
    }

    fn glossary(mut self, terms: &[&str]) -> Self {
        self.glossary = terms.iter().map(|t| t.to_string()).collect();
        self
    }

    fn quiz(
        mut self,
        id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        hint: &str,
    ) -> Self {
        self.quiz = Some(LearningPrompt {
            id: id.into(),
            question: question.into(),
            answer: answer.into(),
            hint: Some(hint.to_string()),
        });
        self
    }
}

pub struct StepBuilder<'c> {
    config: &'c VisualizerConfig,
    steps: Vec<QueryStep>,
}

impl<'c> StepBuilder<'c> {
    pub fn new(config: &'c VisualizerConfig) -> Self {
        Self { config, steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn finish(self) -> Vec<QueryStep> {
        self.steps
    }

    fn push(
        &mut self,
        id: String,
        title: &str,
        summary: String,
        nodes: Vec<VisualizationNode>,
        animation: &str,
        targets: Vec<String>,
        aids: StepAids,
    ) {
        let (glossary, quiz) = if self.config.learning_aids {
            let mut hints: Vec<GlossaryHint> = Vec::new();
            for term in &aids.glossary {
                if hints.iter().any(|h| &h.term == term) {
                    continue;
                }
                if let Some(definition) = glossary_definition(term) {
                    hints.push(GlossaryHint {
                        term: term.clone(),
                        definition: definition.to_string(),
                    });
                }
            }
            (hints, aids.quiz)
        } else {
            (Vec::new(), None)
        };

        let step = QueryStep {
            title: format!("{}. {}", self.steps.len() + 1, title),
            narration: aids.narration.unwrap_or_else(|| summary.clone()),
            summary,
            caption: aids.caption,
            glossary,
            quiz,
            nodes,
            animations: vec![AnimationStep {
                id: format!("{}-animation", id),
                label: animation.to_string(),
                style: self.config.animation_style,
                duration_ms: self.config.animation_duration_ms,
                target_node_ids: targets,
            }],
            id,
        };
        self.steps.push(step);
    }

    /// Steps for a SELECT-shaped query, in narrative order.
    pub fn query_steps(&mut self, query: &NormalizedQuery, trace: &QueryTrace) {
        for cte in &trace.ctes {
            self.cte_step(&cte.name, &cte.table);
        }
        if !trace.subqueries.is_empty() {
            self.subquery_step(trace);
        }
        self.sources_step(trace);
        for (index, join) in trace.joins.iter().enumerate() {
            self.join_step(index, join);
        }
        if let (Some(predicate), Some(filter)) = (&query.where_clause, &trace.filter) {
            self.filter_step(&predicate.to_string(), filter);
        }
        if let Some(grouped) = &trace.grouped {
            let keys: Vec<String> = query.group_by.iter().map(|c| c.label()).collect();
            self.group_step(&keys, grouped);
            if let (Some(predicate), Some(having)) = (&query.having, &trace.having) {
                self.having_step(&predicate.to_string(), having);
            }
        }
        if let (Some(clause), Some(sorted)) = (&query.order_by, &trace.sorted) {
            let direction = match clause.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            let summary = format!("Sort by {} ({}).", clause.column.label(), direction);
            let before = VisualizationNode::new("before-sort", "Before sort", NodeKind::Sort)
                .with_table(sorted.input.clone());
            let after = VisualizationNode::new("after-sort", "After sort", NodeKind::Sort)
                .with_table(sorted.output.clone());
            self.push(
                "step-order".into(),
                "Apply ORDER BY",
                summary,
                vec![before, after],
                "Highlight sorted rows",
                vec!["after-sort".into()],
                StepAids::new(
                    "ORDER BY arranges the rows so the final result appears in a consistent \
                     sequence.",
                    "Sort rows using the ORDER BY clause.",
                )
                .glossary(&["ORDER BY"])
                .quiz(
                    "quiz-order",
                    "Does ORDER BY change which rows appear in the result?",
                    "No, it only changes the order of the rows that are already selected.",
                    "Sorting does not filter.",
                ),
            );
        }
        if let (Some(n), Some(limited)) = (query.limit, &trace.limited) {
            self.limit_step(n, limited);
        }
        self.projection_step(trace);
        if let Some(set) = &trace.set_operation {
            self.set_step(set.kind, &set.left, &set.right, &set.output);
        }
    }

    fn cte_step(&mut self, name: &str, table: &TableData) {
        let node =
            VisualizationNode::new(format!("cte-{}", name), format!("CTE {}", name), NodeKind::Cte)
                .with_table(table.clone());
        let target = node.id.clone();
        self.push(
            format!("step-cte-{}", name),
            "Build CTE",
            format!("Generate {} for reuse in the main query.", name),
            vec![node],
            "Highlight CTE output",
            vec![target],
            StepAids::new(
                format!(
                    "We compute {} once and store it as a named result set for later steps.",
                    name
                ),
                "Build the CTE before running the main query.",
            )
            .glossary(&["CTE", "SELECT"])
            .quiz(
                format!("quiz-cte-{}", name),
                "Why use a CTE in a query?",
                "It creates a named, reusable subquery that can simplify complex SQL.",
                "CTEs act like temporary named tables.",
            ),
        );
    }

    fn subquery_step(&mut self, trace: &QueryTrace) {
        let nodes: Vec<VisualizationNode> = trace
            .subqueries
            .iter()
            .map(|s| {
                VisualizationNode::new(
                    format!("subquery-{}", s.name),
                    format!("Subquery {}", s.name),
                    NodeKind::Subquery,
                )
                .with_table(s.table.clone())
            })
            .collect();
        let names: Vec<&str> = trace.subqueries.iter().map(|s| s.name.as_str()).collect();
        let first = names.first().copied().unwrap_or_default();
        let targets = nodes.iter().map(|n| n.id.clone()).collect();
        self.push(
            "step-subquery".into(),
            "Resolve subquery",
            format!("Evaluate the nested SELECT to produce {}.", names.join(" and ")),
            nodes,
            "Highlight subquery output",
            targets,
            StepAids::new(
                format!(
                    "We run the nested query first so its output can act like a temporary \
                     table named {}.",
                    first
                ),
                "Resolve the nested SELECT before the outer query.",
            )
            .glossary(&["SUBQUERY", "SELECT"])
            .quiz(
                format!("quiz-subquery-{}", first),
                "Why does the subquery run before the outer query?",
                "The outer query needs the subquery's result set as its data source.",
                "Subqueries behave like temporary tables.",
            ),
        );
    }

    fn sources_step(&mut self, trace: &QueryTrace) {
        let mut nodes: Vec<VisualizationNode> = Vec::with_capacity(trace.sources.len());
        for source in &trace.sources {
            let mut id = format!("source-{}", source.name);
            let mut suffix = 2;
            while nodes.iter().any(|n| n.id == id) {
                id = format!("source-{}-{}", source.name, suffix);
                suffix += 1;
            }
            nodes.push(
                VisualizationNode::new(id, source.name.clone(), NodeKind::Table)
                    .with_table(source.table.clone()),
            );
        }
        let labels: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
        let summary = format!("Load the tables {}.", labels.join(" and "));
        let targets = nodes.iter().map(|n| n.id.clone()).collect();
        self.push(
            "step-sources".into(),
            "Load source tables",
            summary,
            nodes,
            "Highlight input tables",
            targets,
            StepAids::new(
                "We bring the required tables into the workspace so each later step can refer \
                 to their rows.",
                "Load the tables referenced in FROM and JOIN.",
            )
            .glossary(&["FROM"]),
        );
    }

    fn join_step(&mut self, index: usize, join: &JoinTrace) {
        let join_type = join.clause.join_type;
        let right_name = join.clause.table();
        let is_cross = join_type == JoinType::Cross;

        let left_table = &join.left_source;
        let left_states = matched_states(&join.outcome.left_matched);
        let right_states = matched_states(&join.outcome.right_matched);

        let left_node = VisualizationNode::new(
            format!("join-left-{}", index),
            join.left_name.clone(),
            NodeKind::Table,
        )
        .with_data(NodeData::with_states(left_table.clone(), left_states));
        let right_node =
            VisualizationNode::new(format!("join-right-{}", index), right_name, NodeKind::Table)
                .with_data(NodeData::with_states(join.right_source.clone(), right_states));

        let pairs = operators::join_pairs(
            &join.left,
            &join.right,
            join_type,
            join.condition.as_ref(),
            &join.left_name,
            right_name,
            self.config.cross_join_pair_preview,
        );
        let condition_text = match (&join.condition, is_cross) {
            (Some(c), false) => c.to_string(),
            _ => "CROSS JOIN: every row pairs with every row".to_string(),
        };
        let detail = if is_cross {
            "Cartesian product of both tables."
        } else {
            "Rows matched by the join condition"
        };

        let mut output = VisualizationNode::new(
            format!("join-output-{}", index),
            format!("Join result {}", index + 1),
            NodeKind::Join,
        )
        .with_data(NodeData::with_states(
            join.outcome.table.clone(),
            join.outcome.row_states.clone(),
        ))
        .with_detail(detail);
        output.pairs = Some(pairs);
        output.join = Some(JoinDetail {
            join_type,
            join_condition: condition_text.clone(),
            left_source: JoinSourceSummary {
                table_name: join.left_name.clone(),
                columns: left_table.columns.clone(),
                rows: left_table.rows.clone(),
                matched_row_indices: matched_indices(&join.outcome.left_matched),
                join_column: join.condition.as_ref().map(|c| c.left.column.clone()),
            },
            right_source: JoinSourceSummary {
                table_name: right_name.to_string(),
                columns: join.right_source.columns.clone(),
                rows: join.right_source.rows.clone(),
                matched_row_indices: matched_indices(&join.outcome.right_matched),
                join_column: join.condition.as_ref().map(|c| c.right.column.clone()),
            },
        });

        let keyword = format!("{} JOIN", join_type.keyword());
        let (summary, narration, caption, question, answer) = if is_cross {
            (
                "Pair every row from each table.".to_string(),
                "CROSS JOIN pairs every row from the left table with every row from the right \
                 table."
                    .to_string(),
                "Build every combination of rows.",
                "How many row combinations does a CROSS JOIN produce?",
                "It produces every possible pairing of left and right rows.",
            )
        } else {
            let answer = match join_type {
                JoinType::Left | JoinType::Full => {
                    "Unmatched left rows still appear with empty values."
                }
                JoinType::Right => "Unmatched right rows still appear with empty values.",
                _ => "Unmatched rows are not included in the result.",
            };
            (
                format!("Match rows on {}.", condition_text),
                format!(
                    "We compare join keys to combine rows from {} and {}.",
                    join.left_name, right_name
                ),
                "Join rows using the join condition.",
                "What happens to rows that don't satisfy the join condition?",
                answer,
            )
        };
        let terms: Vec<&str> = if is_cross {
            vec![keyword.as_str()]
        } else {
            vec![keyword.as_str(), "ON"]
        };
        let target = output.id.clone();

        self.push(
            format!("step-join-{}", index + 1),
            &format!("Match rows ({})", keyword),
            summary,
            vec![left_node, right_node, output],
            "Animate join pairing",
            vec![target],
            StepAids::new(narration, caption).glossary(&terms).quiz(
                format!("quiz-join-{}", index + 1),
                question,
                answer,
                "Think about how the join type handles unmatched rows.",
            ),
        );
    }

    fn filter_step(&mut self, predicate: &str, filter: &FilterTrace) {
        let before = VisualizationNode::new("before-filter", "Before filter", NodeKind::Filter)
            .with_data(NodeData::with_states(filter.input.clone(), filter.states.clone()));
        let after = VisualizationNode::new("after-filter", "After filter", NodeKind::Filter)
            .with_table(filter.output.clone());
        self.push(
            "step-filter".into(),
            "Apply WHERE",
            format!("Keep rows where {}.", predicate),
            vec![before, after],
            "Highlight kept rows",
            vec!["before-filter".into(), "after-filter".into()],
            StepAids::new(
                "The WHERE clause checks each row against the condition and keeps only the rows \
                 that satisfy it.",
                "Filter rows before grouping or projection.",
            )
            .glossary(&["WHERE"])
            .quiz(
                "quiz-where",
                "At what point does the WHERE clause filter rows?",
                "It filters rows before grouping, ordering, or projection steps run.",
                "WHERE happens early in the query pipeline.",
            ),
        );
    }

    fn group_step(&mut self, keys: &[String], grouped: &TableData) {
        let node = VisualizationNode::new("grouped-rows", "Grouped rows", NodeKind::Aggregation)
            .with_table(grouped.clone());
        let aids = if keys.is_empty() {
            StepAids::new(
                "Aggregate functions summarize all rows into a single group of totals.",
                "Group rows to compute aggregates.",
            )
            .glossary(&["AGGREGATE"])
            .quiz(
                "quiz-group",
                "What does an aggregate summarize without GROUP BY?",
                "It summarizes the entire result set as one group.",
                "Look at the columns listed in GROUP BY.",
            )
        } else {
            StepAids::new(
                "GROUP BY collects rows with matching keys so aggregates can be computed per \
                 group.",
                "Group rows to compute aggregates.",
            )
            .glossary(&["GROUP BY", "AGGREGATE"])
            .quiz(
                "quiz-group",
                "What determines which rows end up in the same group?",
                "Rows that share the same GROUP BY key values are grouped together.",
                "Look at the columns listed in GROUP BY.",
            )
        };
        let summary = if keys.is_empty() {
            "Aggregate rows into summary values.".to_string()
        } else {
            format!("Group rows by {}.", keys.join(", "))
        };
        self.push(
            "step-group".into(),
            "Apply GROUP BY",
            summary,
            vec![node],
            "Highlight grouped rows",
            vec!["grouped-rows".into()],
            aids,
        );
    }

    fn having_step(&mut self, predicate: &str, having: &FilterTrace) {
        let node = VisualizationNode::new("having-rows", "HAVING filter", NodeKind::Filter)
            .with_data(NodeData::with_states(having.input.clone(), having.states.clone()));
        self.push(
            "step-having".into(),
            "Apply HAVING",
            format!("Keep groups where {}.", predicate),
            vec![node],
            "Highlight matching groups",
            vec!["having-rows".into()],
            StepAids::new(
                "HAVING filters the grouped results after aggregation has run.",
                "Filter groups after aggregation.",
            )
            .glossary(&["HAVING"])
            .quiz(
                "quiz-having",
                "How is HAVING different from WHERE?",
                "HAVING filters grouped results, while WHERE filters individual rows first.",
                "HAVING comes after GROUP BY.",
            ),
        );
    }

    fn limit_step(&mut self, n: u64, limited: &FilterTrace) {
        let before = VisualizationNode::new("before-limit", "Before limit", NodeKind::Limit)
            .with_data(NodeData::with_states(limited.input.clone(), limited.states.clone()));
        let after = VisualizationNode::new("after-limit", "After limit", NodeKind::Limit)
            .with_table(limited.output.clone());
        self.push(
            "step-limit".into(),
            "Apply LIMIT",
            format!("Keep the first {} row(s).", n),
            vec![before, after],
            "Highlight limited rows",
            vec!["before-limit".into(), "after-limit".into()],
            StepAids::new(
                "LIMIT caps the result set to the first N rows after sorting.",
                "Restrict the output to a fixed number of rows.",
            )
            .glossary(&["LIMIT"])
            .quiz(
                "quiz-limit",
                "When does LIMIT usually apply in the query flow?",
                "After other steps like filtering and ordering are complete.",
                "LIMIT typically comes at the end of the pipeline.",
            ),
        );
    }

    fn projection_step(&mut self, trace: &QueryTrace) {
        let source =
            VisualizationNode::new("projection-source", "Before projection", NodeKind::Projection)
                .with_data(NodeData {
                    table: trace.projection_input.clone(),
                    row_states: None,
                    highlight_columns: Some(trace.projection.source_columns.clone()),
                });
        let output =
            VisualizationNode::new("projection-output", "Final result", NodeKind::Projection)
                .with_table(trace.projection.table.clone());
        self.push(
            "step-projection".into(),
            "Project columns",
            "Choose the output columns for the final result set.".into(),
            vec![source, output],
            "Reveal projected columns",
            vec!["projection-source".into(), "projection-output".into()],
            StepAids::new(
                "Projection picks which columns to keep so the result matches the SELECT list.",
                "Keep only the requested columns.",
            )
            .glossary(&["SELECT"]),
        );
    }

    fn set_step(
        &mut self,
        kind: SetOpKind,
        left: &TableData,
        right: &TableData,
        output: &TableData,
    ) {
        let keyword = kind.keyword();
        let nodes = vec![
            VisualizationNode::new("set-left", "Left result", NodeKind::Set)
                .with_table(left.clone()),
            VisualizationNode::new("set-right", "Right result", NodeKind::Set)
                .with_table(right.clone()),
            VisualizationNode::new("set-output", format!("{} output", keyword), NodeKind::Set)
                .with_table(output.clone()),
        ];
        let answer = match kind {
            SetOpKind::Union => "It combines both results and removes duplicates.",
            SetOpKind::Intersect => "It keeps only rows that appear in both results.",
            SetOpKind::Except => {
                "It keeps rows from the left result that are not in the right result."
            }
        };
        self.push(
            "step-set".into(),
            &format!("Combine results ({})", keyword),
            format!("Merge the two result sets using {}.", keyword),
            nodes,
            "Highlight set operation output",
            vec!["set-output".into()],
            StepAids::new(
                "Set operations compare two result sets to combine or filter rows.",
                format!("Apply {} to both result sets.", keyword),
            )
            .glossary(&[keyword])
            .quiz(
                "quiz-set",
                format!("What does {} do to the two result sets?", keyword),
                answer,
                "Each set operator compares rows across both result sets.",
            ),
        );
    }

    /// The single step of an INSERT, UPDATE or DELETE.
    pub fn mutation_step(&mut self, preview: &MutationPreview) {
        let table = &preview.table;
        match preview.kind {
            MutationKind::Insert => {
                let states = preview
                    .after_states
                    .clone()
                    .unwrap_or_else(|| vec![RowState::Default; preview.after.len()]);
                let node =
                    VisualizationNode::new("insert-preview", "Insert preview", NodeKind::Mutation)
                        .with_data(NodeData::with_states(preview.after.clone(), states));
                self.push(
                    "step-insert".into(),
                    "Insert rows",
                    format!("Add {} row(s) to {}.", preview.affected, table),
                    vec![node],
                    "Highlight inserted rows",
                    vec!["insert-preview".into()],
                    StepAids::new(
                        "INSERT adds new rows to the table based on the provided values.",
                        "Add new rows to the target table.",
                    )
                    .glossary(&["INSERT"])
                    .quiz(
                        "quiz-insert",
                        "What does an INSERT statement change?",
                        "It adds new rows to a table.",
                        "Think of adding data.",
                    ),
                );
            }
            MutationKind::Update => {
                let before =
                    VisualizationNode::new("update-before", "Rows to update", NodeKind::Mutation)
                        .with_data(before_data(preview));
                let after_states = preview
                    .after_states
                    .clone()
                    .unwrap_or_else(|| preview.before_states.clone());
                let after =
                    VisualizationNode::new("update-after", "Updated rows", NodeKind::Mutation)
                        .with_data(NodeData::with_states(preview.after.clone(), after_states));
                self.push(
                    "step-update".into(),
                    "Update rows",
                    format!("Modify matching rows in {}.", table),
                    vec![before, after],
                    "Highlight updated rows",
                    vec!["update-before".into(), "update-after".into()],
                    StepAids::new(
                        "UPDATE changes the values of matching rows while keeping the row count \
                         the same.",
                        "Modify existing rows that match the condition.",
                    )
                    .glossary(&["UPDATE", "WHERE"])
                    .quiz(
                        "quiz-update",
                        "Does UPDATE add or remove rows?",
                        "No, it edits values in existing rows.",
                        "UPDATE modifies data in place.",
                    ),
                );
            }
            MutationKind::Delete => {
                let before =
                    VisualizationNode::new("delete-before", "Rows to delete", NodeKind::Mutation)
                        .with_data(before_data(preview));
                let after =
                    VisualizationNode::new("delete-after", "Remaining rows", NodeKind::Mutation)
                        .with_table(preview.after.clone());
                self.push(
                    "step-delete".into(),
                    "Delete rows",
                    format!("Remove matching rows from {}.", table),
                    vec![before, after],
                    "Highlight deleted rows",
                    vec!["delete-before".into(), "delete-after".into()],
                    StepAids::new(
                        "DELETE removes rows that meet the condition from the table.",
                        "Remove rows that match the delete condition.",
                    )
                    .glossary(&["DELETE", "WHERE"])
                    .quiz(
                        "quiz-delete",
                        "What happens to rows that match the DELETE condition?",
                        "They are removed from the table.",
                        "DELETE reduces the number of rows.",
                    ),
                );
            }
        }
    }

    /// Appends `step-coverage` when there is anything to report.
    pub fn coverage_step(&mut self, gaps: &[CoverageGap], notes: &[String]) {
        if gaps.is_empty() && notes.is_empty() {
            return;
        }
        let mut lines: Vec<String> = gaps.iter().map(CoverageGap::note).collect();
        lines.extend(notes.iter().cloned());
        let mut node = VisualizationNode::new(
            "keyword-coverage",
            "Keyword coverage gaps",
            NodeKind::Placeholder,
        )
        .with_detail(
            "These SQL keywords are recognized, but their visuals are currently placeholders.",
        );
        node.notes = Some(lines);
        self.push(
            "step-coverage".into(),
            "Coverage check",
            "Flag keywords that still use placeholder visuals.".into(),
            vec![node],
            "Highlight keyword gaps",
            vec!["keyword-coverage".into()],
            StepAids::new(
                "We scan the query for keywords that are not fully visualized yet and flag them \
                 for follow-up.",
                "Placeholder visuals are used for the keywords listed here.",
            ),
        );
    }
}

fn before_data(preview: &MutationPreview) -> NodeData {
    NodeData::with_states(preview.before.clone(), preview.before_states.clone())
}

fn matched_states(matched: &[bool]) -> Vec<RowState> {
    matched
        .iter()
        .map(|m| if *m { RowState::Matched } else { RowState::Default })
        .collect()
}

fn matched_indices(matched: &[bool]) -> Vec<usize> {
    matched.iter().enumerate().filter(|(_, m)| **m).map(|(i, _)| i).collect()
}

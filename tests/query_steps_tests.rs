use querylens::config::VisualizerConfig;
use querylens::models::{NodeKind, QueryStep, RowState, TableData, Value};
use querylens::query_ast::QueryAstError;
use querylens::schema::{MockSchema, SchemaProvider};
use querylens::{generate_steps_from_sql, StepGenerator};

fn steps(sql: &str) -> Vec<QueryStep> {
    querylens::init_logging();
    generate_steps_from_sql(sql).expect("ok")
}

fn step<'a>(steps: &'a [QueryStep], id: &str) -> &'a QueryStep {
    steps.iter().find(|s| s.id == id).unwrap_or_else(|| panic!("missing step {}", id))
}

fn final_result(steps: &[QueryStep]) -> TableData {
    let projection = step(steps, "step-projection");
    projection
        .node("projection-output")
        .and_then(|n| n.table())
        .cloned()
        .expect("projection output")
}

fn set_output(steps: &[QueryStep]) -> TableData {
    step(steps, "step-set").node("set-output").and_then(|n| n.table()).cloned().expect("set output")
}

#[test]
fn inner_join_projects_matched_students() {
    let steps = steps(
        "SELECT Students.name, Enrollments.course FROM Students \
         INNER JOIN Enrollments ON Students.id = Enrollments.student_id",
    );
    let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["step-sources", "step-join-1", "step-projection"]);

    let join = step(&steps, "step-join-1");
    assert_eq!(join.title, "2. Match rows (INNER JOIN)");
    let output = join.node("join-output-0").expect("join output");
    assert_eq!(output.kind, NodeKind::Join);
    assert_eq!(output.row_states(), Some(&[RowState::Matched, RowState::Matched][..]));
    let detail = output.join.as_ref().expect("join detail");
    assert_eq!(detail.join_condition, "Students.id = Enrollments.student_id");
    assert_eq!(detail.left_source.matched_row_indices, vec![0, 1]);
    assert_eq!(detail.right_source.matched_row_indices, vec![0, 1]);

    let result = final_result(&steps);
    assert_eq!(result.columns, vec!["name", "course"]);
    assert_eq!(result.len(), 2);
    assert_eq!(result.value(0, "name"), Value::from("Ada"));
    assert_eq!(result.value(0, "course"), Value::from("SQL 101"));
    assert_eq!(result.value(1, "name"), Value::from("Linus"));
    assert_eq!(result.value(1, "course"), Value::from("Databases"));
}

#[test]
fn grouped_query_emits_each_stage_in_order() {
    let steps = steps(
        "SELECT Students.cohort, COUNT(*) FROM Students GROUP BY Students.cohort \
         HAVING COUNT(*) > 1 ORDER BY Students.cohort LIMIT 2",
    );
    let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "step-sources",
            "step-group",
            "step-having",
            "step-order",
            "step-limit",
            "step-projection"
        ]
    );
    for (index, step) in steps.iter().enumerate() {
        assert!(step.title.starts_with(&format!("{}. ", index + 1)), "{}", step.title);
    }

    let having = step(&steps, "step-having").node("having-rows").expect("having node");
    assert_eq!(having.row_states(), Some(&[RowState::Kept, RowState::Filtered][..]));

    let result = final_result(&steps);
    assert_eq!(result.len(), 1);
    assert_eq!(result.value(0, "cohort"), Value::from(2023));
    assert_eq!(result.value(0, "COUNT(*)"), Value::from(2));
}

#[test]
fn distinct_is_reported_as_a_coverage_gap() {
    let steps = steps("SELECT DISTINCT name FROM Students");
    let last = steps.last().expect("steps");
    assert_eq!(last.id, "step-coverage");
    assert_eq!(last.nodes.len(), 1);
    let node = &last.nodes[0];
    assert_eq!(node.kind, NodeKind::Placeholder);
    let notes = node.notes.as_ref().expect("notes");
    assert!(notes.iter().any(|n| n.contains("DISTINCT")));
}

#[test]
fn insert_produces_a_single_mutation_step() {
    let steps = steps("INSERT INTO Students (id, name, cohort) VALUES (4, 'Edsger', 2025)");
    assert_eq!(steps.len(), 1);
    let step = &steps[0];
    assert_eq!(step.id, "step-insert");
    assert_eq!(step.nodes.len(), 1);
    let node = &step.nodes[0];
    assert_eq!(node.kind, NodeKind::Mutation);

    let original = MockSchema::sample().get_table("Students").expect("students");
    let preview = node.table().expect("preview");
    assert_eq!(preview.len(), original.len() + 1);
    assert_eq!(&preview.rows[..original.len()], &original.rows[..]);
    assert_eq!(preview.value(3, "name"), Value::from("Edsger"));
    assert_eq!(
        node.row_states(),
        Some(&[RowState::Default, RowState::Default, RowState::Default, RowState::Inserted][..])
    );
}

#[test]
fn inner_join_row_count_matches_key_pairs() {
    let steps = steps("SELECT * FROM Students JOIN Grades ON Students.id = Grades.student_id");
    let joined = step(&steps, "step-join-1")
        .node("join-output-0")
        .and_then(|n| n.table())
        .cloned()
        .expect("join");
    // Ada 2, Linus 1, Grace 2.
    assert_eq!(joined.len(), 5);
}

#[test]
fn left_join_keeps_every_left_row() {
    let steps = steps(
        "SELECT Students.name, Enrollments.course FROM Students \
         LEFT JOIN Enrollments ON Students.id = Enrollments.student_id",
    );
    let join = step(&steps, "step-join-1").node("join-output-0").expect("join");
    assert_eq!(
        join.row_states(),
        Some(&[RowState::Matched, RowState::Matched, RowState::Unmatched][..])
    );
    let result = final_result(&steps);
    assert_eq!(result.len(), 3);
    assert_eq!(result.value(2, "name"), Value::from("Grace"));
    assert_eq!(result.value(2, "course"), Value::from("∅"));
}

#[test]
fn full_join_appends_unmatched_right_rows() {
    let steps = steps(
        "SELECT * FROM Students FULL JOIN Enrollments ON Students.id = Enrollments.student_id",
    );
    let join = step(&steps, "step-join-1").node("join-output-0").expect("join");
    let states = join.row_states().expect("states");
    assert_eq!(states.len(), 4);
    assert_eq!(states[3], RowState::Unmatched);
    let pairs = join.pairs.as_ref().expect("pairs");
    assert!(pairs.iter().any(|p| !p.matched && p.left_row_index.is_none()));
}

#[test]
fn cross_join_pairs_every_row() {
    let steps = steps("SELECT * FROM Students CROSS JOIN Courses");
    let join = step(&steps, "step-join-1");
    assert_eq!(join.title, "2. Match rows (CROSS JOIN)");
    let output = join.node("join-output-0").expect("join");
    assert_eq!(output.table().map(|t| t.len()), Some(12));
    assert_eq!(output.pairs.as_ref().map(|p| p.len()), Some(3));
    assert_eq!(join.glossary.len(), 1);
}

#[test]
fn union_output_has_no_duplicate_rows() {
    let steps = steps("SELECT student_id FROM Grades UNION SELECT student_id FROM Enrollments");
    let output = set_output(&steps);
    let mut keys: Vec<String> = output.rows.iter().map(|r| r["student_id"].canonical()).collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total);
    assert_eq!(total, 4);
    assert_eq!(steps.last().map(|s| s.id.as_str()), Some("step-set"));
}

#[test]
fn intersect_and_except_compare_positionally() {
    let both =
        set_output(&steps("SELECT id FROM Students INTERSECT SELECT student_id FROM Enrollments"));
    assert_eq!(both.len(), 2);
    let left_only =
        set_output(&steps("SELECT id FROM Students EXCEPT SELECT student_id FROM Enrollments"));
    assert_eq!(left_only.len(), 1);
    assert_eq!(left_only.value(0, "id"), Value::from(3));
}

#[test]
fn chained_set_operations_nest_to_the_right() {
    // Students UNION (Grades EXCEPT Enrollments): {1, 2, 3} UNION {3}.
    let output = set_output(&steps(
        "SELECT id FROM Students UNION SELECT student_id FROM Grades \
         EXCEPT SELECT student_id FROM Enrollments",
    ));
    assert_eq!(output.len(), 3);
    assert_eq!(output.columns, vec!["id"]);
}

#[test]
fn aggregate_without_group_by_yields_one_row() {
    let steps = steps("SELECT COUNT(*), AVG(score) FROM Grades WHERE score > 1000");
    let result = final_result(&steps);
    assert_eq!(result.len(), 1);
    assert_eq!(result.value(0, "COUNT(*)"), Value::from(0));
}

#[test]
fn limit_keeps_a_prefix_of_its_input() {
    let steps = steps("SELECT name FROM Students ORDER BY name DESC LIMIT 2");
    let limit = step(&steps, "step-limit");
    let before = limit.node("before-limit").and_then(|n| n.table()).cloned().expect("before");
    let after = limit.node("after-limit").and_then(|n| n.table()).cloned().expect("after");
    assert_eq!(after.rows[..], before.rows[..2]);
    assert_eq!(after.value(0, "name"), Value::from("Linus"));
}

#[test]
fn select_star_returns_the_table_unchanged() {
    let steps = steps("SELECT * FROM Courses");
    let courses = MockSchema::sample().get_table("Courses").expect("courses");
    assert_eq!(final_result(&steps), courses);
}

#[test]
fn where_marks_kept_and_filtered_rows() {
    let steps = steps("SELECT name FROM Students WHERE cohort = 2023 AND NOT id = 2");
    let filter = step(&steps, "step-filter");
    let before = filter.node("before-filter").expect("before");
    assert_eq!(
        before.row_states(),
        Some(&[RowState::Kept, RowState::Filtered, RowState::Filtered][..])
    );
    assert_eq!(filter.quiz.as_ref().map(|q| q.id.as_str()), Some("quiz-where"));
}

#[test]
fn cte_and_subquery_steps_come_first() {
    let steps = steps(
        "WITH top_scores AS (SELECT student_id, score FROM Grades WHERE score >= 90) \
         SELECT s.name, t.score FROM (SELECT id, name FROM Students) s \
         JOIN top_scores t ON s.id = t.student_id",
    );
    let ids: Vec<&str> = steps.iter().take(3).map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["step-cte-top_scores", "step-subquery", "step-sources"]);
    let result = final_result(&steps);
    assert_eq!(result.columns, vec!["name", "score"]);
    assert_eq!(result.len(), 2);
}

#[test]
fn every_animation_targets_its_own_nodes() {
    let steps = steps(
        "SELECT Students.name, COUNT(*) AS n FROM Students \
         JOIN Grades ON Students.id = Grades.student_id \
         WHERE Grades.score > 50 GROUP BY Students.name HAVING n > 0 ORDER BY n DESC LIMIT 5",
    );
    for step in &steps {
        assert_eq!(step.animations.len(), 1, "{}", step.id);
        for target in &step.animations[0].target_node_ids {
            assert!(step.node(target).is_some(), "{} -> {}", step.id, target);
        }
    }
}

#[test]
fn repeated_calls_are_identical() {
    let sql = "SELECT cohort, COUNT(*) FROM Students GROUP BY cohort ORDER BY cohort";
    assert_eq!(steps(sql), steps(sql));
}

#[test]
fn concurrent_calls_share_no_state() {
    let sql =
        "SELECT Students.name FROM Students LEFT JOIN Grades ON Students.id = Grades.student_id";
    let expected = steps(sql);
    let handles: Vec<_> = (0..4)
        .map(|_| std::thread::spawn(move || generate_steps_from_sql(sql).expect("ok")))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), expected);
    }
}

#[test]
fn unknown_relation_aborts_the_call() {
    let err = generate_steps_from_sql("SELECT * FROM Teachers").unwrap_err();
    assert_eq!(err, QueryAstError::UnknownRelation("Teachers".into()));
}

#[test]
fn unparseable_sql_is_a_parse_error() {
    let err = generate_steps_from_sql("SELEC name FORM Students").unwrap_err();
    assert!(matches!(err, QueryAstError::Parse(_)));
}

#[test]
fn injected_schema_and_config_are_used() {
    let table = TableData::from_tuples(
        &["sku", "qty"],
        vec![vec!["a".into(), 2.into()], vec!["b".into(), 5.into()]],
    );
    let schema = MockSchema::new().with_table("Stock", table);
    let config = VisualizerConfig {
        animation_duration_ms: 250,
        learning_aids: false,
        ..Default::default()
    };
    let generator = StepGenerator::new(&schema, config);
    let steps = generator.generate("SELECT sku FROM Stock WHERE qty > 3").expect("ok");
    assert!(steps.iter().all(|s| s.animations[0].duration_ms == 250));
    assert!(steps.iter().all(|s| s.quiz.is_none() && s.glossary.is_empty()));
    let result = final_result(&steps);
    assert_eq!(result.len(), 1);
    assert_eq!(result.value(0, "sku"), Value::from("b"));
}

#[test]
fn normalizer_notes_surface_in_coverage() {
    let steps = steps("SELECT name FROM Students ORDER BY cohort, name");
    let notes = step(&steps, "step-coverage").nodes[0].notes.clone().expect("notes");
    assert!(notes.iter().any(|n| n.starts_with("ORDER BY")));
}

fn coverage_notes(steps: &[QueryStep]) -> Vec<String> {
    let last = steps.last().expect("steps");
    assert_eq!(last.id, "step-coverage");
    last.nodes[0].notes.clone().expect("notes")
}

#[test]
fn like_condition_degrades_to_a_coverage_note() {
    let steps = steps("SELECT name FROM Students WHERE name LIKE 'A%'");
    let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["step-sources", "step-projection", "step-coverage"]);
    assert_eq!(final_result(&steps).len(), 3);

    let notes = coverage_notes(&steps);
    assert!(notes.iter().any(|n| n.starts_with("LIKE:")));
    assert!(notes.iter().any(|n| n.starts_with("WHERE:") && n.contains("LIKE")));
}

#[test]
fn in_list_keeps_the_rest_of_the_where_clause() {
    let steps = steps("SELECT name FROM Students WHERE id IN (1, 2) AND cohort = 2024");
    let filter = step(&steps, "step-filter").node("before-filter").expect("before");
    assert_eq!(
        filter.row_states(),
        Some(&[RowState::Filtered, RowState::Filtered, RowState::Kept][..])
    );
    assert_eq!(final_result(&steps).len(), 1);

    let notes = coverage_notes(&steps);
    assert!(notes.iter().any(|n| n.starts_with("IN:")));
}

#[test]
fn coalesce_item_is_left_out_of_the_projection() {
    let steps = steps("SELECT name, COALESCE(cohort, 0) FROM Students");
    assert_eq!(final_result(&steps).columns, vec!["name"]);

    let notes = coverage_notes(&steps);
    assert!(notes.iter().any(|n| n.starts_with("COALESCE:")));
    assert!(notes.iter().any(|n| n.starts_with("SELECT:") && n.contains("COALESCE(cohort, 0)")));
}

#[test]
fn between_and_is_null_still_produce_steps() {
    for sql in [
        "SELECT name FROM Students WHERE id BETWEEN 1 AND 2",
        "SELECT name FROM Students WHERE cohort IS NULL",
        "SELECT name FROM Students WHERE EXISTS (SELECT 1 FROM Grades)",
    ] {
        let steps = steps(sql);
        assert!(steps.iter().any(|s| s.id == "step-projection"), "{}", sql);
        assert!(!coverage_notes(&steps).is_empty(), "{}", sql);
    }
}

#[test]
fn coverage_can_be_disabled() {
    let config = VisualizerConfig { coverage_checks: false, ..Default::default() };
    let steps = StepGenerator::new(MockSchema::global(), config)
        .generate("SELECT DISTINCT name FROM Students")
        .expect("ok");
    assert!(steps.iter().all(|s| s.id != "step-coverage"));
}

#[test]
fn steps_serialize_to_camel_case_json() {
    let steps = steps("SELECT name FROM Students LIMIT 1");
    let json = serde_json::to_value(&steps).expect("json");
    let limit = &json[1];
    assert_eq!(limit["id"], "step-limit");
    assert_eq!(limit["animations"][0]["durationMs"], 700);
    assert_eq!(limit["animations"][0]["targetNodeIds"][0], "before-limit");
    assert_eq!(limit["nodes"][0]["data"]["rowStates"][0], "kept");
    assert_eq!(limit["nodes"][0]["kind"], "limit");
    let projection = &json[2];
    assert_eq!(projection["nodes"][0]["data"]["highlightColumns"][0], "Students.name");
}

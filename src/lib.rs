pub mod config;
pub mod models;
pub mod query_ast;
pub mod query_tools;
pub mod schema;

use config::VisualizerConfig;
use models::QueryStep;
use query_ast::executor::{CteRegistry, QueryExecutor};
use query_ast::logical::NormalizedStatement;
use query_ast::normalize::normalize_statement;
use query_ast::parser::parse_sql;
use query_ast::steps::StepBuilder;
use query_ast::QueryAstError;
use schema::{MockSchema, SchemaProvider};

/// Installs `env_logger` for this crate. Safe to call more than once.
pub fn init_logging() {
    dotenv::dotenv().ok();
    let _ = env_logger::Builder::from_default_env()
        .filter_module("querylens", log::LevelFilter::Debug)
        .is_test(false)
        .try_init();
}

/// Steps for `sql` over the built-in sample schema with default settings.
pub fn generate_steps_from_sql(sql: &str) -> Result<Vec<QueryStep>, QueryAstError> {
    let config = VisualizerConfig::default();
    StepGenerator::new(MockSchema::global(), config).generate(sql)
}

/// Parses, evaluates and narrates SQL against an injected schema.
pub struct StepGenerator<'a> {
    schema: &'a dyn SchemaProvider,
    config: VisualizerConfig,
}

impl<'a> StepGenerator<'a> {
    pub fn new(schema: &'a dyn SchemaProvider, config: VisualizerConfig) -> Self {
        Self { schema, config }
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn generate(&self, sql: &str) -> Result<Vec<QueryStep>, QueryAstError> {
        let ast = parse_sql(sql)?;
        let normalized = normalize_statement(&ast)?;
        let executor = QueryExecutor::new(self.schema, &self.config);
        let mut builder = StepBuilder::new(&self.config);

        match &normalized.statement {
            NormalizedStatement::Query(query) => {
                let trace = executor.trace(query, &CteRegistry::new())?;
                builder.query_steps(query, &trace);
                if self.config.coverage_checks {
                    let gaps = query_tools::find_coverage_gaps(sql);
                    builder.coverage_step(&gaps, &normalized.notes);
                }
            }
            mutation => {
                let preview = executor.preview_mutation(mutation)?;
                builder.mutation_step(&preview);
            }
        }

        let steps = builder.finish();
        log::debug!("generated {} step(s)", steps.len());
        Ok(steps)
    }
}

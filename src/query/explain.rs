use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};

use super::exec::{Execution, execute};
use super::plan::Plan;
use super::types::{Filter, FindOptions};
use crate::collection::Collection;

/// Plan report in the shape of a server `explain("executionStats")` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explain {
    pub query_planner: QueryPlanner,
    pub execution_stats: ExecutionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlanner {
    pub namespace: String,
    pub parsed_query: BsonDocument,
    pub winning_plan: PlanStage,
}

/// One stage of the winning plan. An index plan is a `FETCH` over an `IXSCAN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStage {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pattern: Option<BsonDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_stage: Option<Box<PlanStage>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub n_returned: usize,
    pub total_keys_examined: usize,
    pub total_docs_examined: usize,
    pub execution_time_millis: u64,
}

impl PlanStage {
    fn from_plan(plan: &Plan) -> Self {
        match plan {
            Plan::CollScan => {
                Self { stage: "COLLSCAN".into(), index_name: None, key_pattern: None, input_stage: None }
            }
            Plan::IndexScan { index, key_pattern, .. } => Self {
                stage: "FETCH".into(),
                index_name: None,
                key_pattern: None,
                input_stage: Some(Box::new(Self {
                    stage: "IXSCAN".into(),
                    index_name: Some(index.clone()),
                    key_pattern: Some(key_pattern.clone()),
                    input_stage: None,
                })),
            },
        }
    }

    /// The innermost stage, i.e. the access path.
    #[must_use]
    pub fn leaf(&self) -> &Self {
        self.input_stage.as_deref().map_or(self, Self::leaf)
    }
}

impl Explain {
    #[must_use]
    pub fn used_index(&self) -> Option<&str> {
        self.query_planner.winning_plan.leaf().index_name.as_deref()
    }

    #[must_use]
    pub fn is_collection_scan(&self) -> bool {
        self.query_planner.winning_plan.leaf().stage == "COLLSCAN"
    }
}

/// Runs the query and reports how it was answered instead of the rows.
#[must_use]
pub fn explain_find(
    col: &Collection,
    namespace: &str,
    parsed_query: &BsonDocument,
    filter: &Filter,
) -> Explain {
    let Execution { docs, plan, keys_examined, docs_examined, elapsed } =
        execute(col, filter, &FindOptions::default());
    Explain {
        query_planner: QueryPlanner {
            namespace: namespace.to_string(),
            parsed_query: parsed_query.clone(),
            winning_plan: PlanStage::from_plan(&plan),
        },
        execution_stats: ExecutionStats {
            n_returned: docs.len(),
            total_keys_examined: keys_examined,
            total_docs_examined: docs_examined,
            execution_time_millis: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        },
    }
}

// Telemetry is a submodule of query
pub mod telemetry;

mod cursor;
mod eval;
mod exec;
mod explain;
mod parse;
mod plan;
mod types;

pub use cursor::Cursor;
pub use eval::{
    bson_as_f64, bson_as_i64, bson_equal, compare_bson, compare_docs, compare_for_sort,
    eval_filter, get_path, project_fields,
};
pub use exec::{Execution, apply_update, count_docs, delete_one, execute, find_docs, update_one};
pub use explain::{ExecutionStats, Explain, PlanStage, QueryPlanner, explain_find};
pub use parse::{parse_filter_json, parse_pipeline_json, parse_sort, parse_sort_list, parse_update_json};
pub use plan::{Plan, plan_query};
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, MAX_LIMIT, Order, Projection, SortSpec, UpdateDoc,
    UpdateReport,
};

use serde::Serialize;
use serde_json::{Value, json};

use super::store::BookStore;
use crate::errors::DbError;
use crate::query::Order;

/// Output of one statement of the script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub task: u8,
    pub name: &'static str,
    pub result: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptReport {
    pub steps: Vec<Step>,
}

impl ScriptReport {
    fn push(&mut self, task: u8, name: &'static str, result: impl Serialize) -> Result<(), DbError> {
        log::debug!("task {task}: {name}");
        self.steps.push(Step { task, name, result: serde_json::to_value(result)? });
        Ok(())
    }

    #[must_use]
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Replays every bookstore statement in order against `store`:
/// setup, CRUD, advanced queries, aggregation, indexing.
///
/// # Errors
/// Stops at the first failing statement and returns its error.
pub fn run_script(store: &BookStore) -> Result<ScriptReport, DbError> {
    let mut r = ScriptReport::default();

    let col = store.provision();
    r.push(1, "create_collection", json!({ "ok": 1, "collection": col.name_str() }))?;

    let ids = store.seed()?;
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    r.push(2, "insert_many", json!({ "insertedCount": ids.len(), "insertedIds": ids }))?;
    r.push(2, "find_genre_fiction", store.find_by_genre("Fiction")?)?;
    r.push(2, "find_published_after_2010", store.published_after(2010)?)?;
    r.push(2, "find_author_orwell", store.find_by_author("George Orwell")?)?;
    r.push(2, "update_price_gatsby", store.update_price("The Great Gatsby", 13.49)?)?;
    r.push(2, "delete_1984", store.delete_by_title("1984")?)?;

    r.push(3, "in_stock_after_2010", store.in_stock_published_after(2010)?)?;
    r.push(3, "projection_title_author_price", store.priced_titles()?)?;
    r.push(3, "sort_price_asc", store.sorted_by_price(Order::Asc)?)?;
    r.push(3, "sort_price_desc", store.sorted_by_price(Order::Desc)?)?;
    r.push(3, "page_1", store.page(1)?)?;
    r.push(3, "page_2", store.page(2)?)?;

    r.push(4, "average_price_by_genre", store.average_price_by_genre()?)?;
    r.push(4, "most_prolific_author", store.most_prolific_author()?)?;
    r.push(4, "count_by_decade", store.count_by_decade()?)?;

    r.push(5, "create_indexes", store.create_indexes()?)?;
    r.push(5, "explain_title", store.explain_title("The Hobbit")?)?;
    r.push(5, "explain_author_year", store.explain_author_year("Harper Lee", 1960)?)?;

    log::info!("script finished with {} steps", r.steps.len());
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_runs_every_step() {
        let report = run_script(&BookStore::in_memory()).unwrap();
        assert_eq!(report.steps.len(), 19);
        assert_eq!(report.step("delete_1984").unwrap().result, json!({ "deleted": 1 }));
        let plan = &report.step("explain_title").unwrap().result;
        assert_eq!(plan["queryPlanner"]["winningPlan"]["inputStage"]["indexName"], "title_1");
    }
}

//! Tools backed by the upstream statistical data API.
//!
//! Upstream routes used:
//! - `GET /search?q=&limit=`
//! - `GET /datasets?topic=&lang=`
//! - `GET /datasets/{id}?lang=`
//! - `GET /years/{id}?lang=`
//! - `GET /datasets/{id}/observations?region=&sex=&years=&from=&to=&format=&lang=`

mod client;

use std::sync::Arc;

use serde_json::{Map, Value};
use statbridge_core::error::ToolError;
use statbridge_core::schema::{ArgumentSchema, FieldKind};

use crate::registry::{RegistryError, StaticRegistry, ToolDefinition};
use crate::util::{optional_i64, optional_str, required_i64, required_str, scalar_to_string};

pub use client::{ClientError, StatsClient, StatsClientConfig};

pub const INSTRUCTIONS: &str = "Find datasets with search or list_datasets, inspect dimensions with get_dataset, then fetch values with query_observations. get_year returns headline indicators for one reference year.";

const LANGUAGES: [&str; 3] = ["en", "de", "fr"];
const SEXES: [&str; 3] = ["female", "male", "total"];
const FORMATS: [&str; 2] = ["json", "csv"];

const MIN_YEAR: i64 = 1800;
const MAX_YEAR: i64 = 2100;

/// Registry exposing every statistical data tool, in catalogue order.
pub fn registry(client: StatsClient) -> Result<StaticRegistry, RegistryError> {
    let client = Arc::new(client);
    StaticRegistry::new(vec![
        search_tool(client.clone()),
        list_datasets_tool(client.clone()),
        get_dataset_tool(client.clone()),
        get_year_tool(client.clone()),
        query_observations_tool(client),
    ])
}

fn language() -> FieldKind {
    FieldKind::enumeration(LANGUAGES)
}

fn search_tool(client: Arc<StatsClient>) -> ToolDefinition {
    ToolDefinition::from_fn(
        "search",
        "Full-text search across dataset titles, descriptions and indicator names.",
        ArgumentSchema::new()
            .required("query", FieldKind::String, "Search terms, e.g. 'unemployment rate'")
            .optional(
                "limit",
                FieldKind::integer_range(1, 100),
                "Maximum number of hits (default 20)",
            ),
        move |args| {
            let client = client.clone();
            async move {
                let mut query = vec![("q".to_string(), required_str(&args, "query")?.to_string())];
                if let Some(limit) = optional_i64(&args, "limit") {
                    query.push(("limit".to_string(), limit.to_string()));
                }
                client.get(&["search"], &query).await
            }
        },
    )
}

fn list_datasets_tool(client: Arc<StatsClient>) -> ToolDefinition {
    ToolDefinition::from_fn(
        "list_datasets",
        "List published datasets, optionally restricted to one topic.",
        ArgumentSchema::new()
            .optional("topic", FieldKind::String, "Topic code, e.g. 'labour' or 'population'")
            .optional("lang", language(), "Language of titles and labels"),
        move |args| {
            let client = client.clone();
            async move {
                let mut query = Vec::new();
                push_optional(&mut query, &args, "topic");
                push_optional(&mut query, &args, "lang");
                client.get(&["datasets"], &query).await
            }
        },
    )
}

fn get_dataset_tool(client: Arc<StatsClient>) -> ToolDefinition {
    ToolDefinition::from_fn(
        "get_dataset",
        "Metadata for one dataset: dimensions, units, coverage and update schedule.",
        ArgumentSchema::new()
            .required("id", FieldKind::String, "Dataset identifier from search or list_datasets")
            .optional("lang", language(), "Language of titles and labels"),
        move |args| {
            let client = client.clone();
            async move {
                let id = required_str(&args, "id")?;
                let mut query = Vec::new();
                push_optional(&mut query, &args, "lang");
                client.get(&["datasets", id], &query).await
            }
        },
    )
}

fn get_year_tool(client: Arc<StatsClient>) -> ToolDefinition {
    ToolDefinition::from_fn(
        "get_year",
        "Headline indicators published for one reference year.",
        ArgumentSchema::new()
            .required(
                "id",
                FieldKind::integer_range(MIN_YEAR, MAX_YEAR),
                "Reference year, e.g. 2023",
            )
            .optional("lang", language(), "Language of titles and labels"),
        move |args| {
            let client = client.clone();
            async move {
                let year = required_i64(&args, "id")?.to_string();
                let mut query = Vec::new();
                push_optional(&mut query, &args, "lang");
                client.get(&["years", &year], &query).await
            }
        },
    )
}

fn query_observations_tool(client: Arc<StatsClient>) -> ToolDefinition {
    let filters = ArgumentSchema::new()
        .optional(
            "region",
            FieldKind::union(vec![FieldKind::String, FieldKind::integer()]),
            "Region code (e.g. 'BE10') or numeric region id",
        )
        .optional("sex", FieldKind::enumeration(SEXES), "Sex breakdown");

    ToolDefinition::from_fn(
        "query_observations",
        "Fetch observation values from a dataset, filtered by dimension and period.",
        ArgumentSchema::new()
            .required("dataset", FieldKind::String, "Dataset identifier")
            .optional("filters", FieldKind::object(filters), "Dimension filters")
            .optional(
                "years",
                FieldKind::array(FieldKind::integer_range(MIN_YEAR, MAX_YEAR)),
                "Reference years to include",
            )
            .optional("from", FieldKind::Date, "Earliest observation date (YYYY-MM-DD)")
            .optional("to", FieldKind::Date, "Latest observation date (YYYY-MM-DD)")
            .optional("format", FieldKind::enumeration(FORMATS), "Response format (default json)")
            .optional("lang", language(), "Language of labels"),
        move |args| {
            let client = client.clone();
            async move {
                let dataset = required_str(&args, "dataset")?;
                let query = observation_query(&args)?;
                client
                    .get(&["datasets", dataset, "observations"], &query)
                    .await
            }
        },
    )
}

fn observation_query(args: &Map<String, Value>) -> Result<Vec<(String, String)>, ToolError> {
    let mut query = Vec::new();
    if let Some(filters) = args.get("filters").and_then(Value::as_object) {
        for key in ["region", "sex"] {
            if let Some(value) = filters.get(key) {
                query.push((key.to_string(), scalar_to_string(value, &format!("filters.{key}"))?));
            }
        }
    }
    if let Some(years) = args.get("years").and_then(Value::as_array) {
        if !years.is_empty() {
            let joined = years
                .iter()
                .map(|year| scalar_to_string(year, "years"))
                .collect::<Result<Vec<_>, _>>()?
                .join(",");
            query.push(("years".to_string(), joined));
        }
    }
    for key in ["from", "to", "format", "lang"] {
        push_optional(&mut query, args, key);
    }
    Ok(query)
}

fn push_optional(query: &mut Vec<(String, String)>, args: &Map<String, Value>, key: &str) {
    if let Some(value) = optional_str(args, key) {
        query.push((key.to_string(), value.to_string()));
    }
}

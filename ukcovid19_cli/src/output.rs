//! Output rendering for fetched data sets.

use anyhow::Result;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use ukcovid19_api::JsonResponse;

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn print_json(resp: &JsonResponse<Value>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(resp)?);
    Ok(())
}

pub fn print_table(resp: &JsonResponse<Value>) {
    println!("{}", build_table(resp));
    println!("{} rows over {} pages", resp.length, resp.total_pages);
    if let Some(stamp) = &resp.last_update {
        println!("last updated {}", stamp);
    }
}

/// Renders the records as a table with one column per structure field.
/// Columns follow the field order of the first record that carries them.
fn build_table(resp: &JsonResponse<Value>) -> String {
    let mut columns: Vec<String> = Vec::new();
    for row in &resp.data {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.clone());
    for row in &resp.data {
        builder.push_record(columns.iter().map(|column| cell_text(row.get(column))));
    }

    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

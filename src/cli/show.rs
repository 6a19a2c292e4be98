//! `quire show`: a plain-text outline of a worksheet.

use std::error::Error;

use crate::api::{ApiError, WorksheetApi};
use crate::core::worksheet::{Block, Worksheet};

const PREVIEW_WIDTH: usize = 72;

pub async fn print_outline(api: &dyn WorksheetApi, worksheet: &str) -> Result<(), Box<dyn Error>> {
    let payload = match api.fetch_worksheet(worksheet, false).await {
        Ok(payload) => payload,
        Err(ApiError::NotFound) => return Err(format!("Worksheet not found: {worksheet}").into()),
        Err(err) => return Err(err.user_message().into()),
    };
    for line in outline_lines(&Worksheet::from_payload(payload)) {
        println!("{line}");
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let first = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    let mut shown: String = first.trim().chars().take(PREVIEW_WIDTH).collect();
    if first.trim().chars().count() > PREVIEW_WIDTH {
        shown.push('…');
    }
    shown
}

pub fn outline_lines(worksheet: &Worksheet) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", worksheet.display_title(), worksheet.uuid)];
    if let Some(owner) = &worksheet.owner_name {
        lines.push(format!("owner: {owner}"));
    }
    if !worksheet.tags.is_empty() {
        lines.push(format!("tags: {}", worksheet.tags.join(", ")));
    }
    for (index, block) in worksheet.blocks.iter().enumerate() {
        match block {
            Block::Markup(markup) => lines.push(format!("[{index}] text: {}", preview(&markup.text))),
            Block::BundleTable(table) => {
                lines.push(format!("[{index}] table: {} bundle(s)", table.rows.len()));
                for row in &table.rows {
                    lines.push(format!("    {}  {}  {}", row.uuid, row.name, row.state.as_str()));
                }
            }
            Block::Subworksheets(list) => {
                lines.push(format!("[{index}] worksheets: {}", list.items.len()));
                for item in &list.items {
                    let title = item.title.as_deref().unwrap_or(&item.name);
                    lines.push(format!("    -> {title} ({})", item.uuid));
                }
            }
            Block::Schema(schema) => lines.push(format!(
                "[{index}] schema {}: {} field(s)",
                schema.schema_name,
                schema.columns.len()
            )),
            Block::SearchDirective(search) => {
                lines.push(format!("[{index}] search: {}", search.keywords.join(" ")))
            }
            other => lines.push(format!("[{index}] {}", other.mode())),
        }
    }
    lines
}

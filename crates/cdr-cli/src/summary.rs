use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use cdr_core::{ExecutionPlan, RenderedRule, RunReport};
use cdr_model::{RuleDescriptor, RuleStatus};

/// Print the run summary; failing queries are cut at `query_preview_chars`.
pub fn print_report(report: &RunReport, query_preview_chars: usize) {
    println!("Project: {}", report.project_id);
    println!("Dataset: {}", report.dataset_id);
    println!("Sandbox: {}", report.sandbox_dataset_id);
    println!("Tier: {}", report.tier);

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Rule"),
        header_cell("Status"),
        header_cell("Queries"),
        header_cell("Duration (ms)"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Center);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for (index, outcome) in report.outcomes.iter().enumerate() {
        table.add_row(vec![
            dim_cell(index + 1),
            Cell::new(&outcome.rule_id),
            status_cell(outcome.status),
            count_cell(outcome.queries_executed),
            dim_cell(outcome.duration_ms),
        ]);
    }
    table.add_row(vec![
        dim_cell("-"),
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell(format!(
            "{}/{} completed",
            report.count(RuleStatus::Completed),
            report.outcomes.len()
        )),
        Cell::new(report.total_queries()).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");
    if let Some(failures) = failure_table(report, query_preview_chars) {
        println!();
        println!("Failures:");
        println!("{failures}");
    }
}

fn failure_table(report: &RunReport, query_preview_chars: usize) -> Option<Table> {
    let failing: Vec<_> = report
        .outcomes
        .iter()
        .filter(|outcome| outcome.error.is_some())
        .collect();
    if failing.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rule"),
        header_cell("Status"),
        header_cell("Job"),
        header_cell("Error"),
        header_cell("Query"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for outcome in failing {
        let Some(error) = &outcome.error else {
            continue;
        };
        table.add_row(vec![
            Cell::new(&outcome.rule_id)
                .fg(Color::Red)
                .add_attribute(Attribute::Bold),
            status_cell(outcome.status),
            optional_cell(error.job_id()),
            Cell::new(error),
            optional_cell(error.query_preview(query_preview_chars).as_deref()),
        ]);
    }
    Some(table)
}

pub fn print_plan(plan: &ExecutionPlan, rendered: Option<&[RenderedRule]>) {
    println!("Tier: {}", plan.tier());
    if plan.is_empty() {
        println!("No rules are registered for this tier.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Rule"),
        header_cell("Depends on"),
        header_cell("Tables"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (index, descriptor) in plan.rules().iter().enumerate() {
        table.add_row(vec![
            dim_cell(index + 1),
            rule_cell(descriptor),
            list_cell(descriptor.depends_on.iter().map(ToString::to_string)),
            list_cell(descriptor.affected_tables.iter().cloned()),
            Cell::new(&descriptor.description),
        ]);
    }
    println!("{table}");

    for rule in rendered.unwrap_or_default() {
        println!();
        println!("-- {} ({} queries)", rule.rule_id, rule.queries.len());
        for (index, query) in rule.queries.iter().enumerate() {
            let destination = match query.destination_table() {
                Some(table) => format!(
                    " -> {}.{table} ({})",
                    query.destination_dataset().unwrap_or("<dataset>"),
                    query.write_disposition()
                ),
                None => String::new(),
            };
            println!("-- query {index}{destination}");
            println!("{};", query.query_text().trim_end());
        }
    }
}

pub fn print_rules(descriptors: &[&RuleDescriptor]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rule"),
        header_cell("Tiers"),
        header_cell("Depends on"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    for descriptor in descriptors {
        table.add_row(vec![
            rule_cell(descriptor),
            list_cell(descriptor.affected_tiers.iter().map(ToString::to_string)),
            list_cell(descriptor.depends_on.iter().map(ToString::to_string)),
            Cell::new(&descriptor.description),
        ]);
    }
    println!("{table}");
}

fn rule_cell(descriptor: &RuleDescriptor) -> Cell {
    Cell::new(&descriptor.rule_id)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn status_cell(status: RuleStatus) -> Cell {
    match status {
        RuleStatus::Completed => Cell::new("✓ completed").fg(Color::Green),
        RuleStatus::Failed => Cell::new("FAILED")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        RuleStatus::ValidationFailed => Cell::new("validation failed").fg(Color::Yellow),
        RuleStatus::Skipped => dim_cell("skipped"),
    }
}

fn count_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count)
    } else {
        dim_cell(count)
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn list_cell(items: impl Iterator<Item = String>) -> Cell {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        dim_cell("-")
    } else {
        Cell::new(items.join(", "))
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
    if table.column_count() >= 5 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(5)),
            ColumnConstraint::UpperBoundary(Width::Percentage(50)),
            ColumnConstraint::LowerBoundary(Width::Fixed(12)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::LowerBoundary(Width::Fixed(15)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

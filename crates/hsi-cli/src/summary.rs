use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use hsi_model::{PipelineRun, RunStatus, SourceFileCatalogEntry};
use hsi_observe::{FileChange, RunSummary};

use crate::types::BatchResult;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn print_batch(result: &BatchResult) {
    println!("Batch run: {}", result.batch.run_id);
    if result.dry_run {
        println!("Output: (dry run, nothing written)");
    } else {
        println!("Output: {}", result.clean_dir.display());
    }
    println!("{}", batch_table(result));
    println!(
        "Status: {} | files: {} | loaded: {} | rejected: {}",
        result.batch.status,
        result.files.len(),
        result.batch.counts.loaded,
        result.batch.counts.rejected
    );
    if let Some(message) = &result.batch.error_message {
        println!("Error: {message}");
    }
}

pub fn batch_table(result: &BatchResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Sheet"),
        header_cell("Outcome"),
        header_cell("Input"),
        header_cell("Loaded"),
        header_cell("Rejected"),
        header_cell("Quality"),
        header_cell("Detail"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 3..=6 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for file in &result.files {
        if file.sheets.is_empty() {
            table.add_row(vec![
                Cell::new(&file.file_name),
                dim_cell("-"),
                status_cell(file.status),
                Cell::new(file.counts.input),
                Cell::new(file.counts.loaded),
                count_cell(file.counts.rejected),
                dim_cell("-"),
                Cell::new(file.error.as_deref().unwrap_or("")),
            ]);
            continue;
        }
        for sheet in &file.sheets {
            table.add_row(vec![
                Cell::new(&file.file_name),
                Cell::new(&sheet.sheet),
                outcome_cell(sheet.outcome),
                Cell::new(sheet.counts.input),
                Cell::new(sheet.counts.loaded),
                count_cell(sheet.counts.rejected),
                score_cell(sheet.quality_score),
                Cell::new(detail_text(sheet.detail.as_deref(), file.change)),
            ]);
        }
    }
    table
}

fn detail_text(detail: Option<&str>, change: Option<FileChange>) -> String {
    match (detail, change) {
        (Some(detail), _) => detail.to_string(),
        (None, Some(FileChange::Changed)) => "source changed".to_string(),
        (None, Some(FileChange::New)) => "new source".to_string(),
        _ => String::new(),
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    let run = &summary.run;
    println!("Run: {}", run.run_id);
    println!(
        "Pipeline: {} / {} | status: {}",
        run.pipeline_name, run.pipeline_stage, run.status
    );
    if let Some(source) = &run.source_file {
        println!("Source: {source}");
    }
    println!(
        "Records: input {} | processed {} | loaded {} | rejected {}",
        run.counts.input, run.counts.processed, run.counts.loaded, run.counts.rejected
    );
    if let Some(duration) = run.duration_seconds {
        println!("Duration: {duration:.2}s");
    }
    match summary.quality_score {
        Some(score) => println!("Quality score: {score:.1}/100"),
        None => println!("Quality score: -"),
    }
    println!("Lineage facts: {}", summary.lineage_count);
    if let Some(message) = &run.error_message {
        println!("Error: {message}");
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Category"),
        header_cell("Checks"),
        header_cell("Passed"),
        header_cell("Failed"),
    ]);
    apply_table_style(&mut table);
    for index in 1..=3 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for (category, tally) in &summary.categories {
        table.add_row(vec![
            Cell::new(category),
            Cell::new(tally.total),
            Cell::new(tally.passed),
            count_cell(tally.failed() as u64),
        ]);
    }
    println!("{table}");

    if summary.failed_checks.is_empty() {
        return;
    }
    let mut failed = Table::new();
    failed.set_header(vec![
        header_cell("Failed check"),
        header_cell("Column"),
        header_cell("Metric"),
        header_cell("Threshold"),
    ]);
    apply_table_style(&mut failed);
    for record in &summary.failed_checks {
        let check = &record.check;
        failed.add_row(vec![
            Cell::new(&check.check_name).fg(Color::Red),
            Cell::new(check.column_name.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.3}", check.metric_value())),
            Cell::new(format!(
                "{} {:.3}",
                check.comparator().as_str(),
                check.threshold_value()
            )),
        ]);
    }
    println!("{failed}");
}

pub fn print_runs(runs: &[PipelineRun]) {
    println!("{}", runs_table(runs));
}

pub fn runs_table(runs: &[PipelineRun]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Run"),
        header_cell("Stage"),
        header_cell("Status"),
        header_cell("Started"),
        header_cell("Source"),
        header_cell("Loaded"),
        header_cell("Rejected"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 5, CellAlignment::Right);
    align_column(&mut table, 6, CellAlignment::Right);
    for run in runs {
        table.add_row(vec![
            Cell::new(run.run_id),
            Cell::new(&run.pipeline_stage),
            status_cell(run.status),
            Cell::new(run.started_at.format(TIMESTAMP_FORMAT)),
            Cell::new(run.source_file.as_deref().unwrap_or("-")),
            Cell::new(run.counts.loaded),
            count_cell(run.counts.rejected),
        ]);
    }
    table
}

pub fn print_catalog(files: &[SourceFileCatalogEntry]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("File"),
        header_cell("Fingerprint"),
        header_cell("Bytes"),
        header_cell("Rows"),
        header_cell("Seen"),
        header_cell("Last processed"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);
    for entry in files {
        let fingerprint: String = entry.file.fingerprint.chars().take(12).collect();
        table.add_row(vec![
            Cell::new(entry.file_id),
            Cell::new(&entry.file.file_name),
            dim_cell(fingerprint),
            Cell::new(entry.file.file_size_bytes),
            optional_cell(entry.file.row_count),
            Cell::new(entry.processing_count),
            Cell::new(entry.last_processed.format(TIMESTAMP_FORMAT)),
            Cell::new(entry.file.status.as_str()),
        ]);
    }
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
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
        .set_width(140);
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

fn status_cell(status: RunStatus) -> Cell {
    let color = match status {
        RunStatus::Success => Color::Green,
        RunStatus::Skipped => Color::Yellow,
        RunStatus::Failed => Color::Red,
        RunStatus::Running => Color::Blue,
    };
    Cell::new(status).fg(color)
}

fn outcome_cell(outcome: &str) -> Cell {
    let color = match outcome {
        "loaded" => Color::Green,
        "gated" | "empty" => Color::Yellow,
        _ => Color::Red,
    };
    Cell::new(outcome).fg(color)
}

fn score_cell(score: Option<f64>) -> Cell {
    match score {
        Some(score) if score >= 100.0 => Cell::new(format!("{score:.1}")),
        Some(score) => Cell::new(format!("{score:.1}")).fg(Color::Yellow),
        None => dim_cell("-"),
    }
}

fn count_cell(count: u64) -> Cell {
    if count > 0 {
        Cell::new(count)
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn optional_cell(value: Option<u64>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).add_attribute(Attribute::Dim)
}

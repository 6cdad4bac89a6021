// src/orchestrator/table.rs

//! Plain-text rendering of `herd status`.

use chrono::Local;

use crate::types::ServiceStatus;

const HEADERS: [&str; 7] = ["Name", "Status", "PID", "Ports", "Stdout", "Stderr", "Start Time"];

/// Render `rows` as an aligned table. With `show_config`, a trailing Config
/// column names the file each service came from.
pub fn render_status(rows: &[ServiceStatus], show_config: bool) -> String {
    if rows.is_empty() {
        return "No services found\n".to_string();
    }

    let mut header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    if show_config {
        header.push("Config".to_string());
    }
    let mut table = vec![header];
    table.extend(rows.iter().map(|row| cells(row, show_config)));

    let widths: Vec<usize> = (0..table[0].len())
        .map(|col| table.iter().map(|r| r[col].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in table.iter() {
        let line: Vec<String> = row
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn cells(row: &ServiceStatus, show_config: bool) -> Vec<String> {
    let mut cells = vec![
        row.name.clone(),
        row.status.to_string(),
        row.pid.map(|p| p.to_string()).unwrap_or_default(),
        row.ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        row.pid
            .map(|_| format!("{} lines", row.stdout_lines))
            .unwrap_or_default(),
        row.pid
            .map(|_| format!("{} lines", row.stderr_lines))
            .unwrap_or_default(),
        row.start_time
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    ];
    if show_config {
        cells.push(row.config_file.display().to_string());
    }
    cells
}

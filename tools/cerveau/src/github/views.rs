use super::RepoSummary;

const HEADERS: [&str; 5] = ["Name", "Private", "Stars", "Updated", "Default branch"];

pub fn render_repo_table(repos: &[RepoSummary]) -> String {
    let rows = repos
        .iter()
        .map(|repo| {
            [
                repo.full_name.clone(),
                repo.private.to_string(),
                repo.stargazers_count.to_string(),
                repo.updated_at
                    .as_deref()
                    .unwrap_or_default()
                    .chars()
                    .take(19)
                    .collect(),
                repo.default_branch.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(col, (cell, width))| {
                // Stars are right-aligned.
                if col == 2 {
                    format!("{cell:>width$}")
                } else {
                    format!("{cell:<width$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header = HEADERS.map(str::to_string);
    let mut lines = vec![format!("GitHub Repos ({})", rows.len()), format_row(&header)];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| format_row(row)));
    lines.join("\n")
}

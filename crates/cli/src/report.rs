use archmap_model::{C4Model, DescriptionSource};
use archmap_pipeline::PipelineOutput;

/// Markdown overview of one recovery run
pub fn render_summary(out: &PipelineOutput) -> String {
    let model = &out.model;

    let mut md = String::new();
    md.push_str(&format!("# Architecture summary: {}\n\n", model.name));
    md.push_str(&format!("- People: `{}`\n", model.people.len()));
    md.push_str(&format!("- Systems: `{}`\n", model.systems.len()));
    md.push_str(&format!("- Containers: `{}`\n", model.containers.len()));
    md.push_str(&format!("- Components: `{}`\n", model.components.len()));
    md.push_str(&format!("- Relationships: `{}`\n", model.relationships.len()));
    md.push_str(&format!(
        "- Fallback descriptions: `{}`\n\n",
        fallback_count(model)
    ));

    md.push_str("## Most critical nodes\n\n");
    md.push_str("| node | score |\n");
    md.push_str("|---|---:|\n");
    let mut scores: Vec<(&String, &f64)> = out.metrics.component_criticality.iter().collect();
    scores.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (id, score) in scores.into_iter().take(10) {
        md.push_str(&format!("| `{}` | `{:.4}` |\n", escape_cell(id), score));
    }
    md.push('\n');

    md.push_str("## Entry points\n\n");
    if out.metrics.entry_points.is_empty() {
        md.push_str("_none_\n");
    }
    for id in &out.metrics.entry_points {
        md.push_str(&format!("- `{id}`\n"));
    }
    md.push('\n');

    md.push_str("## Subsystems\n\n");
    for (i, members) in out.metrics.subsystems.iter().enumerate() {
        md.push_str(&format!(
            "{}. {}\n",
            i + 1,
            truncate_one_line(&members.join(", "), 160)
        ));
    }

    if !out.warnings.is_empty() {
        md.push_str("\n## Warnings\n\n");
        for warning in &out.warnings {
            md.push_str(&format!("- {}\n", truncate_one_line(&warning.to_string(), 200)));
        }
    }

    md
}

fn fallback_count(model: &C4Model) -> usize {
    let is_fallback = |source: &DescriptionSource| *source == DescriptionSource::Fallback;
    model
        .containers
        .iter()
        .filter(|c| is_fallback(&c.description_source))
        .count()
        + model
            .components
            .iter()
            .filter(|c| is_fallback(&c.description_source))
            .count()
        + model
            .systems
            .iter()
            .filter(|s| is_fallback(&s.description_source))
            .count()
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= max_chars {
        return one_line;
    }
    let mut out: String = one_line.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

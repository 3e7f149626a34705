use crate::{
    storage::entities::Ledger,
    utils::time::{DayKey, format_ms},
};

/// Renders a day as Markdown, using the same ordering as the task list.
pub fn ledger_to_markdown(day: DayKey, ledger: &Ledger) -> String {
    let mut lines = vec![format!("# Tasks for {day}"), String::new()];

    if ledger.is_empty() {
        lines.push("- No tasks tracked for this date.".to_string());
        return lines.join("\n");
    }

    for (name, entry) in ledger.sorted() {
        lines.push(format!("- **{name}** — {}", format_ms(entry.time)));
        for note in &entry.notes {
            let meta = [Some(note.timestamp.as_str()), note.duration.as_deref()]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if meta.is_empty() {
                lines.push(format!("  - {}", note.text));
            } else {
                lines.push(format!("  - ({meta}) {}", note.text));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

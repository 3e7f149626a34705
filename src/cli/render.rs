use chrono::{DateTime, Local, Utc};

use crate::{
    storage::entities::{Ledger, Note, RunningSession},
    tracker::{Outcome, Stopped, summary::DayTotal},
    utils::time::{DayKey, format_ms},
};

pub fn print_ledger(
    day: DayKey,
    ledger: &Ledger,
    running: Option<&RunningSession>,
    now: DateTime<Utc>,
) {
    println!("{day}\ttotal {}", format_ms(ledger.total()));
    if ledger.is_empty() {
        println!("No tasks tracked for this date.");
    }

    for (name, entry) in ledger.sorted() {
        println!("{}\t{name}", format_ms(entry.time));
        for (index, note) in entry.notes.iter().enumerate() {
            println!("\t  {}. {}", index + 1, note_line(note));
        }
    }

    if let Some(session) = running.filter(|session| session.owner_day == day) {
        println!();
        print_session(session, now);
    }
}

fn note_line(note: &Note) -> String {
    let meta = [Some(note.timestamp.as_str()), note.duration.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if meta.is_empty() {
        note.text.clone()
    } else {
        format!("[{meta}] {}", note.text)
    }
}

pub fn print_session(session: &RunningSession, now: DateTime<Utc>) {
    println!(
        "Running {:?} for {} (since {}, {})",
        session.task_name,
        format_ms(session.elapsed_ms(now)),
        session.started_at.with_timezone(&Local).format("%H:%M:%S"),
        session.owner_day
    );
    if !session.draft_notes.trim().is_empty() {
        println!("Draft note: {}", session.draft_notes.trim());
    }
}

pub fn print_stale_session(session: &RunningSession) {
    eprintln!(
        "Unfinished task {:?} from {} is waiting. Use `resume` to continue or `discard` to drop it",
        session.task_name, session.owner_day
    );
}

pub fn print_replaced_session(session: &RunningSession) {
    eprintln!(
        "Unfinished task {:?} from {} was dropped without recording its time",
        session.task_name, session.owner_day
    );
}

pub fn print_stopped(stopped: &Stopped) {
    let task = &stopped.task;
    match stopped.outcome {
        Outcome::Applied => println!(
            "Stopped {:?} after {}",
            task.task_name,
            format_ms(task.elapsed_ms)
        ),
        _ => eprintln!(
            "Stopped {:?} after {} but couldn't save its time. Run `stop` again later",
            task.task_name,
            format_ms(task.elapsed_ms)
        ),
    }
}

pub fn print_summary(totals: &[DayTotal]) {
    let mut total = 0;
    for day in totals.iter().filter(|day| day.tasks > 0) {
        println!(
            "{}\t{}\t{} task{}",
            day.day,
            format_ms(day.total_ms),
            day.tasks,
            if day.tasks == 1 { "" } else { "s" }
        );
        total += day.total_ms;
    }
    println!("total\t{}", format_ms(total));
}

pub fn report(outcome: Outcome, applied: &str) {
    match outcome {
        Outcome::Applied => println!("{applied}"),
        Outcome::Missing => println!("Nothing changed, the task isn't tracked on that day"),
        Outcome::StorageUnavailable => {
            eprintln!("Storage is unavailable, nothing was saved. See logs for details")
        }
    }
}

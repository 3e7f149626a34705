use std::io::Write;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    storage::kv_storage::KeyValueStorage,
    tracker::{Tracker, error::TrackerError},
    utils::time::format_ms,
};

use super::{render, shutdown::detect_shutdown};

/// Shows the running task with a live timer until the user interrupts, then stops and commits it.
/// Lines typed meanwhile build up the draft note.
pub async fn run_foreground<S: KeyValueStorage>(tracker: &mut Tracker<S>) -> Result<()> {
    let Some(session) = tracker.running_session() else {
        return Err(TrackerError::NoRunningTask.into());
    };
    let name = session.task_name.clone();
    let mut draft = session.draft_notes.clone();
    println!("Tracking {name:?}. Type to add to the note, Ctrl+C to stop.");

    let shutdown = CancellationToken::new();
    tokio::spawn(detect_shutdown(shutdown.clone()));
    let mut ticks = tracker.ticks();
    let mut lines = spawn_stdin_lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = ticks.changed() => {
                if changed.is_err() {
                    break;
                }
                let elapsed = *ticks.borrow_and_update();
                print!("\r{name} {}", format_ms(elapsed));
                std::io::stdout().flush()?;
            }
            line = lines.recv(), if stdin_open => {
                match line {
                    Some(line) if !line.trim().is_empty() => {
                        if !draft.is_empty() {
                            draft.push('\n');
                        }
                        draft.push_str(line.trim());
                        tracker.record_draft_note(&draft).await?;
                    }
                    Some(_) => {}
                    None => {
                        debug!("Stdin closed");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    println!();
    if let Some(stopped) = tracker.stop().await {
        render::print_stopped(&stopped);
    }
    shutdown.cancel();
    Ok(())
}

/// Reading stdin blocks, so it happens on a plain thread that doesn't hold up runtime shutdown.
fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

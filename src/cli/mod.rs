pub mod day;
pub mod foreground;
pub mod render;
pub mod shutdown;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use day::DayArgs;
use tracing::{info, level_filters::LevelFilter, warn};

use crate::{
    storage::{
        entities::RunningSession,
        kv_storage::{FileStorage, KeyValueStorage, MemoryStorage},
        preferences::Theme,
    },
    tracker::{Outcome, Tracker, error::TrackerError},
    utils::{
        clock::{Clock, DefaultClock},
        dir::AppDirs,
        logging::{CLI_PREFIX, LogConfig, enable_logging},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Tasktally", version, long_about = None)]
#[command(about = "Personal task timer keeping a ledger per day", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. Defaults to $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[command(flatten)]
    day: DayArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start timing a task. A task that is already running is stopped first")]
    Start {
        #[arg(required = true, num_args = 1.., help = "Name of the task")]
        name: Vec<String>,
    },
    #[command(about = "Stop the running task and add its time to its day")]
    Stop,
    #[command(about = "Show the running task")]
    Status,
    #[command(about = "Replace the note of the running task. It's saved when the task stops")]
    Note {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    #[command(about = "Show the tasks tracked on the selected day")]
    Show,
    #[command(about = "Rename a task. Renaming into an existing task merges both")]
    Rename { old: String, new: String },
    #[command(about = "Overwrite the time of a task")]
    Adjust {
        task: String,
        #[arg(help = "New time in HH:MM:SS")]
        duration: String,
    },
    #[command(about = "Edit notes of a tracked task")]
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
    #[command(about = "Export the selected day as markdown")]
    Export {
        #[arg(long, short, help = "Write into a file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Show totals per day. Defaults to the week ending on the selected day")]
    Summary {
        #[arg(long, help = "First day, inclusive")]
        from: Option<String>,
        #[arg(long, help = "Last day, inclusive")]
        to: Option<String>,
    },
    #[command(about = "Continue an unfinished task in the foreground, even from another day")]
    Resume,
    #[command(about = "Drop an unfinished task without recording its time")]
    Discard,
    #[command(about = "Start a task and keep tracking it in the foreground until Ctrl+C")]
    Run {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    #[command(about = "Show or change the preferred theme")]
    Theme { choice: Option<ThemeChoice> },
}

#[derive(Subcommand, Debug)]
enum NotesCommand {
    #[command(about = "Add a note to a tracked task")]
    Add {
        task: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    #[command(about = "Remove a note from a tracked task")]
    Remove {
        task: String,
        #[arg(
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Number of the note as listed by `show`"
        )]
        number: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeChoice {
    Dark,
    Light,
    Toggle,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dirs = AppDirs::resolve(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(LogConfig {
        prefix: CLI_PREFIX,
        dir: &dirs.logs,
        level: logging_level,
        echo: args.log,
    })?;

    let storage: Box<dyn KeyValueStorage> = match FileStorage::new(dirs.data.clone()) {
        Ok(storage) => Box::new(storage),
        Err(e) => {
            warn!("Falling back to memory storage {e:?}");
            eprintln!("Storage is unavailable, nothing will be saved: {e}");
            Box::new(MemoryStorage::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let mut tracker = Tracker::new(storage, clock.clone());
    args.day.select(&mut tracker, clock.now())?;
    info!("Running {:?} for {}", args.commands, tracker.selected_day());

    process_command(args.commands, &args.day, &mut tracker, clock.as_ref()).await
}

async fn process_command<S: KeyValueStorage>(
    command: Commands,
    day_args: &DayArgs,
    tracker: &mut Tracker<S>,
    clock: &dyn Clock,
) -> Result<()> {
    match command {
        Commands::Start { name } => start(tracker, &name).await?,
        Commands::Stop => {
            let stale = pick_up_session(tracker).await?;
            match tracker.stop().await {
                Some(stopped) => render::print_stopped(&stopped),
                None => println!("No task is running"),
            }
            if let Some(stale) = stale {
                render::print_stale_session(&stale);
            }
        }
        Commands::Status => {
            let stale = pick_up_session(tracker).await?;
            match tracker.running_session() {
                Some(session) => render::print_session(session, clock.now().with_timezone(&Utc)),
                None => println!("No task is running"),
            }
            if let Some(stale) = stale {
                render::print_stale_session(&stale);
            }
        }
        Commands::Note { text } => {
            pick_up_session(tracker).await?;
            tracker.record_draft_note(&text.join(" ")).await?;
            println!("Note saved, it's recorded when the task stops");
        }
        Commands::Show => {
            pick_up_session(tracker).await?;
            let day = tracker.selected_day();
            let ledger = tracker.ledger(day).await;
            let now = clock.now().with_timezone(&Utc);
            render::print_ledger(day, &ledger, tracker.running_session(), now);
        }
        Commands::Rename { old, new } => {
            pick_up_session(tracker).await?;
            let outcome = tracker.rename(&old, &new, None).await?;
            render::report(outcome, &format!("Renamed {old:?} to {:?}", new.trim()));
        }
        Commands::Adjust { task, duration } => {
            let outcome = tracker.adjust_time(&task, &duration).await?;
            render::report(outcome, &format!("Set {task:?} to {duration}"));
        }
        Commands::Notes { command } => match command {
            NotesCommand::Add { task, text } => {
                let outcome = tracker.add_note(&task, &text.join(" ")).await?;
                render::report(outcome, &format!("Added a note to {task:?}"));
            }
            NotesCommand::Remove { task, number } => {
                let outcome = tracker.remove_note(&task, (number - 1) as usize).await?;
                render::report(outcome, &format!("Removed note {number} from {task:?}"));
            }
        },
        Commands::Export { output } => {
            let markdown = tracker.to_markdown(tracker.selected_day()).await;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, markdown).await?;
                    println!("Exported into {}", path.display());
                }
                None => print!("{markdown}"),
            }
        }
        Commands::Summary { from, to } => {
            let to = match to {
                Some(to) => day_args.parse(&to, clock.now())?,
                None => tracker.selected_day(),
            };
            let from = match from {
                Some(from) => day_args.parse(&from, clock.now())?,
                None => to.offset(-6).unwrap_or(to),
            };
            render::print_summary(&tracker.summary(from, to).await);
        }
        Commands::Resume => {
            let Some(session) = tracker.pending_session().await else {
                println!("There is no unfinished task");
                return Ok(());
            };
            tracker.select_day(session.owner_day);
            tracker.resume(session)?;
            foreground::run_foreground(tracker).await?;
        }
        Commands::Discard => match tracker.discard().await {
            Some(session) => println!(
                "Discarded {:?} from {}",
                session.task_name, session.owner_day
            ),
            None => println!("There is no unfinished task"),
        },
        Commands::Run { name } => {
            start(tracker, &name).await?;
            foreground::run_foreground(tracker).await?;
        }
        Commands::Theme { choice } => {
            let theme = match choice {
                None => tracker.theme().await,
                Some(ThemeChoice::Toggle) => tracker.toggle_theme().await,
                Some(ThemeChoice::Dark) => set_theme(tracker, Theme::Dark).await,
                Some(ThemeChoice::Light) => set_theme(tracker, Theme::Light).await,
            };
            println!("Theme is {theme}");
        }
    }
    Ok(())
}

/// Continues the persisted session when it belongs to the selected day. A session left on
/// another day stays untouched and is returned so the caller can point it out.
async fn pick_up_session<S: KeyValueStorage>(
    tracker: &mut Tracker<S>,
) -> Result<Option<RunningSession>> {
    if let Some(session) = tracker.try_resume().await {
        tracker.resume(session)?;
        return Ok(None);
    }
    Ok(tracker.pending_session().await)
}

/// Joins the words of a task name given on the command line.
fn task_name(words: &[String]) -> Result<String, TrackerError> {
    let name = words.join(" ");
    if name.trim().is_empty() {
        return Err(TrackerError::EmptyTaskName);
    }
    Ok(name)
}

/// The name is checked before the running task is touched, so a rejected start leaves it alone.
async fn start<S: KeyValueStorage>(tracker: &mut Tracker<S>, words: &[String]) -> Result<()> {
    let name = task_name(words)?;
    let stale = pick_up_session(tracker).await?;

    if let Some(previous) = tracker.start(&name).await? {
        render::print_stopped(&previous);
    }
    if let Some(stale) = stale {
        render::print_replaced_session(&stale);
    }
    if let Some(session) = tracker.running_session() {
        println!("Started {:?} on {}", session.task_name, session.owner_day);
    }
    Ok(())
}

async fn set_theme<S: KeyValueStorage>(tracker: &mut Tracker<S>, theme: Theme) -> Theme {
    if tracker.set_theme(theme).await == Outcome::StorageUnavailable {
        render::report(Outcome::StorageUnavailable, "");
    }
    theme
}

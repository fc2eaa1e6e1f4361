use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use tasksync_client::{Client, ClientConfig, SyncOutcome};
use tasksync_core::{Regularity, Section, Task, TaskDraft, TaskId, TaskPatch, Urgency, Weekday};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Offline-first task list client", long_about = None)]
struct Cli {
    /// Task server base URL (overrides TASKSYNC_SERVER_URL)
    #[arg(short, long)]
    server_url: Option<String>,

    /// SQLite database URL (overrides TASKSYNC_DATABASE_URL)
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a section in display order
    List {
        #[arg(default_value = "active")]
        section: Section,
    },
    /// Create a task
    Add {
        title: String,
        why: String,
        #[arg(short, long, default_value = "low")]
        urgency: Urgency,
        #[arg(long, default_value = "active")]
        section: Section,
        /// Planned date, YYYY-MM-DD
        #[arg(long)]
        planned: Option<NaiveDate>,
        /// Weekly recurrence, e.g. MO,WE,FR
        #[arg(long, value_delimiter = ',', conflicts_with = "every_days")]
        weekly: Vec<Weekday>,
        /// Recur every N days
        #[arg(long)]
        every_days: Option<u32>,
    },
    /// Change fields of a task
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        why: Option<String>,
        #[arg(short, long)]
        urgency: Option<Urgency>,
    },
    /// Move a task to done
    Complete { id: String },
    /// Move a task back to active
    Activate { id: String },
    /// Delete a task
    Delete { id: String },
    /// Probe the server and replay pending changes
    Sync,
    /// Show connectivity and pending changes
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.server_url {
        config = config.with_server_url(url);
    }
    if let Some(url) = cli.database {
        config = config.with_database_url(url);
    }

    let client = Client::new(config).await?;

    // A one-shot command gets one chance to flush work left by earlier runs.
    if client.pending_count().await > 0 {
        client.sync_now().await;
    }

    match cli.command {
        Command::List { section } => {
            let tasks = client.list_sorted(section).await;
            println!("{} ({})", section.to_string().bold().cyan(), tasks.len());
            for task in &tasks {
                print_task(task);
            }
        }
        Command::Add {
            title,
            why,
            urgency,
            section,
            planned,
            weekly,
            every_days,
        } => {
            let mut draft = TaskDraft::new(title, why)
                .with_urgency(urgency)
                .in_section(section);
            if let Some(date) = planned {
                draft = draft.planned_for(date.and_time(chrono::NaiveTime::MIN).and_utc());
            }
            if !weekly.is_empty() {
                draft = draft.with_regularity(Regularity::weekly(weekly)?);
            } else if let Some(n) = every_days {
                draft = draft.with_regularity(Regularity::every_n_days(n)?);
            }
            let task = client.create(draft).await?;
            println!("{} {}", "Created".green(), task.id);
        }
        Command::Update {
            id,
            title,
            why,
            urgency,
        } => {
            let patch = TaskPatch {
                title,
                why,
                urgency,
                ..TaskPatch::default()
            };
            if patch.is_empty() {
                println!("{}", "Nothing to update".yellow());
            } else {
                let task = client.update(&TaskId::new(id), patch).await?;
                println!("{}", "Updated".green());
                print_task(&task);
            }
        }
        Command::Complete { id } => {
            let task = client.complete(&TaskId::new(id)).await?;
            println!("{}", "Completed".green());
            print_task(&task);
        }
        Command::Activate { id } => {
            let task = client.activate(&TaskId::new(id)).await?;
            println!("{}", "Activated".green());
            print_task(&task);
        }
        Command::Delete { id } => {
            client.delete(&TaskId::new(id)).await;
            println!("{}", "Deleted".green());
        }
        Command::Sync => match client.sync_now().await {
            SyncOutcome::AlreadyOnline => println!("{}", "Already in sync".green()),
            SyncOutcome::Reconciled { replayed } => {
                println!("{} {} change(s)", "Synced".green(), replayed)
            }
            SyncOutcome::ProbeFailed => println!("{}", "Server unreachable".red()),
            SyncOutcome::ReconcileFailed { remaining } => {
                println!("{} {} change(s) still pending", "Sync failed:".red(), remaining)
            }
            SyncOutcome::Busy => println!("{}", "Sync already running".yellow()),
        },
        Command::Status => {}
    }

    print_status(&client).await;
    Ok(())
}

fn print_task(task: &Task) {
    let urgency = match task.urgency {
        Urgency::Critical => task.urgency.to_string().red().bold(),
        Urgency::High => task.urgency.to_string().red(),
        Urgency::Medium => task.urgency.to_string().yellow(),
        Urgency::Low => task.urgency.to_string().normal(),
    };

    let mut details = Vec::new();
    if let Some(date) = task.planned_date.filter(|_| task.section == Section::Future) {
        let days = (date.date_naive() - Utc::now().date_naive()).num_days();
        details.push(format!("planned {} ({:+}d)", date.format("%Y-%m-%d"), days));
    }
    if let Some(regularity) = task.regularity.as_ref().filter(|_| task.section == Section::Active) {
        details.push(match regularity {
            Regularity::Weekly { days, .. } => format!(
                "weekly {}",
                days.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")
            ),
            Regularity::EveryNDays { n, .. } => format!("every {} days", n),
        });
        if regularity.is_due_on(Utc::now().date_naive()) {
            details.push("due today".to_string());
        }
    }
    if let Some(done) = task.completed_at.filter(|_| task.section == Section::Done) {
        details.push(format!("done {}", done.format("%Y-%m-%d %H:%M")));
    }

    println!(
        "  {} [{}] {} {}",
        task.id.to_string().dimmed(),
        urgency,
        task.title.bold(),
        details.join(", ").dimmed()
    );
    println!("      {}", task.why.italic());
}

async fn print_status(client: &Client) {
    let pending = client.pending_count().await;
    if client.is_offline() {
        println!(
            "{} {} change(s) pending",
            "● offline".red().bold(),
            pending
        );
    } else if pending > 0 {
        println!("{} {} change(s) pending", "● online".yellow(), pending);
    } else {
        println!("{}", "● online".green());
    }
}

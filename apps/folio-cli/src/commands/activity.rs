// activity.rs — Activity subcommands: start, list, show, published, complete, abandon, clobber.

use clap::Subcommand;
use folio_activity::{task, Engine, WorkingState};

use super::short;

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Start an activity for a task, or rejoin it if it exists.
    Start {
        /// What the task is (e.g., "Update clinic hours").
        description: String,
        /// Who the work is for.
        #[arg(long, default_value = "")]
        beneficiary: String,
    },
    /// List activities in progress.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show an activity's state and history.
    Show {
        /// Activity branch name.
        branch: String,
    },
    /// List published activities.
    Published,
    /// Merge an endorsed activity into the default branch.
    Complete {
        /// Activity branch name.
        branch: String,
    },
    /// Abandon an activity.
    Abandon {
        /// Activity branch name.
        branch: String,
    },
    /// Replace the default branch's content with an activity's.
    Clobber {
        /// Activity branch name.
        branch: String,
    },
}

pub fn execute(cmd: &ActivityCommands, engine: &mut Engine) -> anyhow::Result<()> {
    match cmd {
        ActivityCommands::Start {
            description,
            beneficiary,
        } => start_activity(engine, description, beneficiary),
        ActivityCommands::List { json } => list_activities(engine, *json),
        ActivityCommands::Show { branch } => show_activity(engine, branch),
        ActivityCommands::Published => list_published(engine),
        ActivityCommands::Complete { branch } => {
            let commit = engine.complete(branch)?;
            println!("Published {} as {}", branch, short(&commit.sha));
            Ok(())
        }
        ActivityCommands::Abandon { branch } => {
            engine.abandon(branch)?;
            println!("Abandoned {}", branch);
            Ok(())
        }
        ActivityCommands::Clobber { branch } => {
            let commit = engine.clobber(branch)?;
            println!(
                "Replaced {} with {} ({})",
                engine.config().default_branch,
                branch,
                short(&commit.sha)
            );
            Ok(())
        }
    }
}

fn start_activity(engine: &Engine, description: &str, beneficiary: &str) -> anyhow::Result<()> {
    if description.trim().is_empty() {
        anyhow::bail!("an activity needs a description");
    }
    let branch = engine.start_activity(description.trim(), beneficiary.trim())?;
    println!("Activity started: {}", branch.name);
    println!("  Task: {}", description.trim());
    println!("  Tip:  {}", short(&branch.sha));
    Ok(())
}

fn list_activities(engine: &mut Engine, json: bool) -> anyhow::Result<()> {
    let activities = engine.list_activities()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&activities)?);
        return Ok(());
    }
    if activities.is_empty() {
        println!("No activities in progress.");
        return Ok(());
    }

    println!(
        "{:<9} {:<17} {:<20} {:>5} {:>6}  {}",
        "BRANCH", "TASK", "STATE", "AHEAD", "BEHIND", "LAST EDITOR"
    );
    for activity in &activities {
        let description = activity.metadata.description().unwrap_or_default();
        println!(
            "{:<9} {:<17} {:<20} {:>5} {:>6}  {}",
            activity.name,
            task::shorten_description(description),
            activity.review.state.to_string(),
            activity.ahead.len(),
            activity.behind.len(),
            activity.last_editor.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn show_activity(engine: &mut Engine, branch: &str) -> anyhow::Result<()> {
    let working = engine.working_state(branch)?;
    println!("Activity: {}", branch);
    println!("  Status: {}", working);
    if working == WorkingState::Deleted {
        return Ok(());
    }

    let review = engine.review_state(branch)?;
    println!("  Review: {}", review.state);
    if let Some(author) = &review.ineligible_reviewer {
        println!("  Needs review by someone other than {}", author);
    }
    for feedback in &review.feedback {
        println!("  Feedback from {}: {}", feedback.author_email, feedback.message);
    }

    if working != WorkingState::Active {
        return Ok(());
    }
    println!();
    for entry in engine.history(branch)? {
        println!(
            "{}  {}  {:<16} {}",
            short(&entry.sha),
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.author_email,
            entry.summary
        );
    }
    Ok(())
}

fn list_published(engine: &Engine) -> anyhow::Result<()> {
    let published = engine.published_activities()?;
    if published.is_empty() {
        println!("No published activities.");
        return Ok(());
    }
    for activity in &published {
        println!(
            "{}  {}  {}",
            activity.name,
            short(&activity.sha),
            activity.metadata.description().unwrap_or_default()
        );
    }
    Ok(())
}

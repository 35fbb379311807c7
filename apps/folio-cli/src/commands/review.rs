// review.rs — Review subcommands: status, approve, feedback, request.

use clap::Subcommand;
use folio_activity::Engine;

use super::short;

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Show where an activity stands in review.
    Status {
        /// Activity branch name.
        branch: String,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Approve the activity's current edits.
    Approve {
        /// Activity branch name.
        branch: String,
    },
    /// Leave feedback, sending the edits back to their author.
    Feedback {
        /// Activity branch name.
        branch: String,
        /// The feedback.
        message: String,
    },
    /// Ask a peer to review the activity.
    Request {
        /// Activity branch name.
        branch: String,
        /// Optional note for the reviewer.
        #[arg(default_value = "")]
        message: String,
    },
}

pub fn execute(cmd: &ReviewCommands, engine: &mut Engine) -> anyhow::Result<()> {
    match cmd {
        ReviewCommands::Status { branch, json } => {
            let status = engine.review_state(branch)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}: {}", branch, status.state);
                if status.needs_review {
                    let email = &engine.identity().email;
                    if status.can_review(email) {
                        println!("  You can review these edits.");
                    } else {
                        println!("  Waiting for a reviewer other than you.");
                    }
                }
            }
            Ok(())
        }
        ReviewCommands::Approve { branch } => {
            let commit = engine.approve(branch)?;
            println!("Approved {} ({})", branch, short(&commit.sha));
            Ok(())
        }
        ReviewCommands::Feedback { branch, message } => {
            if message.trim().is_empty() {
                anyhow::bail!("feedback cannot be empty");
            }
            let commit = engine.provide_feedback(branch, message)?;
            println!("Feedback recorded on {} ({})", branch, short(&commit.sha));
            Ok(())
        }
        ReviewCommands::Request { branch, message } => {
            let commit = engine.request_feedback(branch, message)?;
            println!("Review requested on {} ({})", branch, short(&commit.sha));
            Ok(())
        }
    }
}

//! Interactive approval of sub-queries on the terminal.

use async_trait::async_trait;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use paperscout_core::workflow::{ApprovalDecision, ApprovalHandler};

/// Presents sub-queries with `dialoguer` and collects one decision:
/// approve as-is, approve after editing each query, or reject.
pub struct TerminalApprovalHandler;

#[async_trait]
impl ApprovalHandler for TerminalApprovalHandler {
    async fn review(&self, sub_queries: &[String]) -> ApprovalDecision {
        let queries = sub_queries.to_vec();
        // dialoguer blocks on stdin; keep it off the async runtime.
        tokio::task::spawn_blocking(move || prompt_for_decision(&queries))
            .await
            .unwrap_or(ApprovalDecision::Reject)
    }
}

fn prompt_for_decision(sub_queries: &[String]) -> ApprovalDecision {
    println!("\nSub-queries for approval:");
    println!("{}", "=".repeat(60));
    for (i, query) in sub_queries.iter().enumerate() {
        println!("{}. {}", i + 1, query);
    }
    println!("{}", "=".repeat(60));

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Review the sub-queries above")
        .items(&["Approve and continue", "Edit queries", "Reject and abort"])
        .default(0)
        .interact();

    match choice {
        Ok(0) => ApprovalDecision::Approve,
        Ok(1) => {
            let mut edited = Vec::with_capacity(sub_queries.len());
            for (i, query) in sub_queries.iter().enumerate() {
                let new_query: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("Query {} (edit or keep)", i + 1))
                    .default(query.clone())
                    .interact_text()
                    .unwrap_or_else(|_| query.clone());
                edited.push(new_query);
            }
            ApprovalDecision::ApproveWithEdits(edited)
        }
        // Explicit reject, or the prompt failed (e.g. no TTY).
        _ => ApprovalDecision::Reject,
    }
}

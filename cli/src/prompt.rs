//! Interactive decisions for attended runs.
//!
//! Answers given on the command line always win. Prompts are only shown when
//! stdin is a terminal; otherwise the configured defaults apply.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use depot_core::api::{
    CliError, DeletionPolicy, FixedDecider, LocalAsset, ReconcileOutcome, RemoteAssetRecord,
    RunDecider,
};

pub fn stdin_is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Print `question` to stderr and read one trimmed line from stdin.
/// Returns `None` on EOF or read failure.
pub fn ask_line(question: &str) -> Option<String> {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{question}");
    let _ = stderr.flush();

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

async fn ask_line_async(question: String) -> Option<String> {
    tokio::task::spawn_blocking(move || ask_line(&question))
        .await
        .ok()
        .flatten()
}

pub fn parse_policy_answer(answer: &str) -> Option<DeletionPolicy> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "1" | "d" | "delete" | "all" => Some(DeletionPolicy::DeleteAll),
        "2" | "s" | "skip" => Some(DeletionPolicy::SkipDeletion),
        "3" | "a" | "abort" => Some(DeletionPolicy::Abort),
        _ => None,
    }
}

pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a numbered selection like `1,3,5-7` or `all` into zero-based indexes,
/// sorted and without duplicates.
pub fn parse_selection(input: &str, total: usize) -> Result<Vec<usize>, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") || input == "*" {
        return Ok((0..total).collect());
    }

    let mut picked = std::collections::BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, total)?, parse_index(b, total)?),
            None => {
                let i = parse_index(part, total)?;
                (i, i)
            }
        };
        if start > end {
            return Err(format!("range '{part}' is reversed"));
        }
        picked.extend(start..=end);
    }

    if picked.is_empty() {
        return Err("nothing selected".to_string());
    }
    Ok(picked.into_iter().collect())
}

fn parse_index(raw: &str, total: usize) -> Result<usize, String> {
    let n: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw.trim()))?;
    if n == 0 || n > total {
        return Err(format!("{n} is out of range 1-{total}"));
    }
    Ok(n - 1)
}

/// Keep only the assets named in `only`, in scan order. Unknown names are an error.
pub fn select_by_names(assets: Vec<LocalAsset>, only: &[String]) -> Result<Vec<LocalAsset>, CliError> {
    if only.is_empty() {
        return Ok(assets);
    }
    let missing: Vec<&str> = only
        .iter()
        .map(String::as_str)
        .filter(|name| !assets.iter().any(|a| a.name == *name))
        .collect();
    if !missing.is_empty() {
        return Err(CliError::Command(format!(
            "not found in source directory: {}",
            missing.join(", ")
        )));
    }
    Ok(assets
        .into_iter()
        .filter(|a| only.iter().any(|name| *name == a.name))
        .collect())
}

/// Show a numbered list on stderr and let the user pick from it.
pub fn select_interactively(assets: Vec<LocalAsset>) -> Result<Vec<LocalAsset>, CliError> {
    eprintln!("Files available for upload:");
    for (i, asset) in assets.iter().enumerate() {
        eprintln!("  {:>3}. {} ({} bytes)", i + 1, asset.name, asset.byte_size);
    }

    loop {
        let answer = ask_line("Select files (e.g. 1,3,5-7 or all): ")
            .ok_or_else(|| CliError::Command("selection cancelled".to_string()))?;
        match parse_selection(&answer, assets.len()) {
            Ok(indexes) => {
                return Ok(assets
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| indexes.binary_search(i).is_ok())
                    .map(|(_, a)| a)
                    .collect());
            }
            Err(reason) => eprintln!("Invalid selection: {reason}"),
        }
    }
}

/// `select_interactively` on the blocking pool.
pub async fn select_interactively_async(assets: Vec<LocalAsset>) -> Result<Vec<LocalAsset>, CliError> {
    tokio::task::spawn_blocking(move || select_interactively(assets))
        .await
        .map_err(|e| CliError::Command(format!("selection prompt failed: {e}")))?
}

/// Ask a yes/no question until answered. EOF counts as no.
pub fn confirm(question: &str) -> bool {
    confirm_with(question, ask_line)
}

/// `confirm` on the blocking pool, for use inside command handlers.
pub async fn confirm_async(question: String) -> bool {
    tokio::task::spawn_blocking(move || confirm(&question))
        .await
        .unwrap_or(false)
}

fn confirm_with(question: &str, mut ask: impl FnMut(&str) -> Option<String>) -> bool {
    loop {
        let Some(answer) = ask(&format!("{question} [y/N]: ")) else {
            return false;
        };
        if answer.is_empty() {
            return false;
        }
        if let Some(yes) = parse_yes_no(&answer) {
            return yes;
        }
    }
}

/// Answers from flags first, then a prompt when interactive, then `fallback`.
pub struct PromptDecider {
    policy: Option<DeletionPolicy>,
    continue_on_failure: Option<bool>,
    interactive: bool,
    fallback: FixedDecider,
}

impl PromptDecider {
    pub fn new(
        policy: Option<DeletionPolicy>,
        continue_on_failure: Option<bool>,
        interactive: bool,
        fallback: FixedDecider,
    ) -> Self {
        Self {
            policy,
            continue_on_failure,
            interactive,
            fallback,
        }
    }
}

#[async_trait]
impl RunDecider for PromptDecider {
    async fn deletion_policy(&self, existing: &[RemoteAssetRecord]) -> DeletionPolicy {
        if let Some(policy) = self.policy {
            return policy;
        }
        if !self.interactive {
            return self.fallback.deletion_policy(existing).await;
        }

        eprintln!("The remote workspace already lists {} file(s):", existing.len());
        for record in existing {
            eprintln!(
                "  - {} ({}, uploaded {})",
                record.display_name, record.size_label, record.uploaded_timestamp
            );
        }
        loop {
            let question =
                "What should happen to them? [1] delete all  [2] skip deletion  [3] abort: "
                    .to_string();
            let Some(answer) = ask_line_async(question).await else {
                return DeletionPolicy::Abort;
            };
            if let Some(policy) = parse_policy_answer(&answer) {
                return policy;
            }
        }
    }

    async fn continue_after_failed_deletions(&self, outcome: &ReconcileOutcome) -> bool {
        if let Some(cont) = self.continue_on_failure {
            return cont;
        }
        if !self.interactive {
            return self.fallback.continue_after_failed_deletions(outcome).await;
        }

        eprintln!(
            "{} deletion(s) failed: {}",
            outcome.failed.len(),
            outcome.failed.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        loop {
            let Some(answer) = ask_line_async("Continue with the upload anyway? [y/n]: ".to_string()).await
            else {
                return false;
            };
            if let Some(yes) = parse_yes_no(&answer) {
                return yes;
            }
        }
    }
}

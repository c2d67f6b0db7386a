use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One prompt/output exchange with either the local (worker) or remote
/// (supervisor) model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TranscriptEntry {
    pub fn local<P: Into<String>, O: Into<String>>(prompt: P, output: O) -> Self {
        TranscriptEntry {
            user: "local".to_string(),
            prompt: Some(prompt.into()),
            output: Some(output.into()),
        }
    }

    pub fn remote<P: Into<String>, O: Into<String>>(prompt: P, output: O) -> Self {
        TranscriptEntry {
            user: "remote".to_string(),
            prompt: Some(prompt.into()),
            output: Some(output.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct Transcript<'a> {
    task: &'a str,
    context: &'a str,
    conversation: &'a [TranscriptEntry],
    #[serde(rename = "generatedFinalAnswer")]
    generated_final_answer: &'a str,
}

/// Write the conversation log for one run. The filename comes from the
/// provided logging id when there is one, otherwise from a timestamp plus a
/// slug of the task.
pub fn write(
    dir: &Path,
    logging_id: Option<&str>,
    task: &str,
    context: &str,
    conversation: &[TranscriptEntry],
    final_answer: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let file_name = match logging_id {
        Some(id) if !id.trim().is_empty() => format!("{}.json", slugify(id)),
        _ => format!("{}_{}.json", timestamp(), slugify(task)),
    };
    let path = dir.join(file_name);

    let transcript = Transcript {
        task,
        context,
        conversation,
        generated_final_answer: final_answer,
    };
    let json = serde_json::to_string_pretty(&transcript)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() { "run".to_string() } else { slug }
}

/// Compact UTC timestamp for filenames, derived directly from the epoch.
/// Date conversion via: https://howardhinnant.github.io/date_algorithms.html
fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let days_since_epoch = (secs / 86400) as i64;
    let z = days_since_epoch + 719468;
    let era = (if z >= 0 { z } else { z - 146096 }) / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };

    let seconds_today = secs % 86400;
    let hour = seconds_today / 3600;
    let minute = (seconds_today % 3600) / 60;
    let second = seconds_today % 60;

    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        year, m, d, hour, minute, second
    )
}

use std::path::PathBuf;

use rusqlite::{params, Connection};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct RunEntry {
    pub id: i64,
    pub task: String,
    pub final_answer: String,
    #[allow(dead_code)]
    pub created_at: i64,
}

fn db_path() -> PathBuf {
    Config::get_config_dir().join("runs.sqlite")
}

fn ensure_dir() -> std::io::Result<()> {
    let dir = Config::get_config_dir();
    std::fs::create_dir_all(dir)
}

pub fn init() -> anyhow::Result<()> {
    ensure_dir()?;
    let conn = Connection::open(db_path())?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task TEXT NOT NULL,
            final_answer TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub fn add_run(task: &str, final_answer: &str) -> anyhow::Result<()> {
    ensure_dir()?;
    let conn = Connection::open(db_path())?;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    conn.execute(
        "INSERT INTO runs (task, final_answer, created_at) VALUES (?1, ?2, ?3)",
        params![task, final_answer, now],
    )?;
    Ok(())
}

pub fn list_runs(limit: usize) -> anyhow::Result<Vec<RunEntry>> {
    ensure_dir()?;
    let conn = Connection::open(db_path())?;
    let mut stmt = conn.prepare(
        "SELECT id, task, final_answer, created_at
         FROM runs
         ORDER BY created_at DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok(RunEntry {
            id: row.get(0)?,
            task: row.get(1)?,
            final_answer: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut entries = Vec::new();
    for r in rows {
        if let Ok(e) = r { entries.push(e); }
    }
    Ok(entries)
}

#[allow(dead_code)]
pub fn delete_run(id: i64) -> anyhow::Result<()> {
    ensure_dir()?;
    let conn = Connection::open(db_path())?;
    conn.execute("DELETE FROM runs WHERE id = ?1", params![id])?;
    Ok(())
}

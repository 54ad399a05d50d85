use anyhow::Context;
use feedhead_core::{Config, Paths, Payload, PayloadWithId, StreamStructure};
use feedhead_session::{FeedUpdate, SessionManager, UpdateOutcome, UpdateSummary};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::open_store;

/// One import line: a stream structure with an optional inline payload.
///
/// ```json
/// {"operation":"UPDATE_OR_APPEND","contentId":"a","parentContentId":"root","payload":"hello"}
/// ```
pub fn parse_import(content: &str) -> anyhow::Result<(Vec<StreamStructure>, Vec<PayloadWithId>)> {
    let mut structures = Vec::new();
    let mut payloads = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut value: Value = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid JSON", index + 1))?;
        let payload = value
            .as_object_mut()
            .and_then(|obj| obj.remove("payload"));
        let structure: StreamStructure = serde_json::from_value(value)
            .with_context(|| format!("line {}: invalid stream structure", index + 1))?;

        if let Some(payload) = payload {
            let Some(content_id) = structure.content_id() else {
                anyhow::bail!("line {}: payload on an operation without content", index + 1);
            };
            let bytes = match payload {
                Value::String(s) => s.into_bytes(),
                other => serde_json::to_vec(&other)?,
            };
            payloads.push(PayloadWithId::new(content_id, Payload::new(bytes)));
        }
        structures.push(structure);
    }

    Ok((structures, payloads))
}

/// Import files waiting in the imports directory, in name order.
fn pending_imports(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map(|ext| ext == "jsonl").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

pub async fn run(
    paths: &Paths,
    file: Option<PathBuf>,
    clear_head: bool,
    schema_version: i32,
) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;

    let files = match file {
        Some(path) => vec![path],
        None => pending_imports(&paths.imports_dir())?,
    };
    if files.is_empty() {
        println!("No import files found in {}", paths.imports_dir().display());
        return Ok(());
    }

    let mut updates = Vec::with_capacity(files.len());
    for (index, path) in files.into_iter().enumerate() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (structures, payloads) =
            parse_import(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        let update = FeedUpdate {
            // only the first file resets HEAD
            clear_head: clear_head && index == 0,
            structures,
            payloads,
            schema_version,
            mutation_context: None,
        };
        updates.push((path, update));
    }

    let store = open_store(paths, &config)?;
    let feed_config = config.feed.clone();
    let (results, ephemeral) = tokio::task::spawn_blocking(
        move || -> anyhow::Result<(Vec<(PathBuf, UpdateSummary)>, bool)> {
            let mut manager = SessionManager::new(store, &feed_config);
            manager.initialize()?;
            let mut results = Vec::with_capacity(updates.len());
            for (path, update) in updates {
                let summary = manager.apply_update(&update)?;
                results.push((path, summary));
            }
            Ok((results, manager.is_ephemeral_mode()))
        },
    )
    .await??;

    for (path, summary) in &results {
        match &summary.outcome {
            UpdateOutcome::Applied => println!(
                "✓ {}: {} added, {} updated, {} removed, {} required{}",
                path.display(),
                summary.added,
                summary.updated,
                summary.removed,
                summary.required,
                if summary.cleared { " (cleared)" } else { "" }
            ),
            UpdateOutcome::Discarded(reason) => {
                println!("✗ {}: discarded ({:?})", path.display(), reason)
            }
            UpdateOutcome::Queued => println!("… {}: queued", path.display()),
        }
    }
    if ephemeral {
        println!();
        println!("⚠ Storage failed during import; changes were kept in memory only.");
    }
    Ok(())
}

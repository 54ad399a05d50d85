use feedhead_core::{Config, Operation, Paths, StreamStructure, HEAD_SESSION_ID};
use feedhead_storage::Store;
use std::collections::HashMap;

use super::open_store;

const OPERATIONS: [Operation; 4] = [
    Operation::UpdateOrAppend,
    Operation::Remove,
    Operation::ClearAll,
    Operation::RequiredContent,
];

/// Per-operation counts for one journal, e.g. `3 UPDATE_OR_APPEND, 1 REMOVE`.
fn operation_breakdown(structures: &[StreamStructure]) -> String {
    let mut counts: HashMap<Operation, usize> = HashMap::new();
    for structure in structures {
        *counts.entry(structure.operation()).or_default() += 1;
    }
    OPERATIONS
        .iter()
        .filter_map(|op| counts.get(op).map(|n| format!("{} {}", n, op)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn run(paths: &Paths) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let db_path = paths.database_file(&config.storage.database);
    let store = open_store(paths, &config)?;

    println!("feedhead stats");
    println!("==============");
    println!();
    println!("Database:  {}", db_path.display());
    println!("Content:   {} payloads", store.content_count()?);
    println!();

    let session_ids = store.session_ids()?;
    if session_ids.is_empty() {
        println!("No journals yet. Run `feedhead import` to load HEAD.");
        return Ok(());
    }

    println!("Journals:");
    for session_id in &session_ids {
        let structures = store.stream_structures(session_id)?;
        let label = if session_id == HEAD_SESSION_ID {
            " (HEAD)"
        } else {
            ""
        };
        println!("  {:<40} {:>6} ops{}", session_id, structures.len(), label);
        if !structures.is_empty() {
            println!("    {}", operation_breakdown(&structures));
        }
    }
    Ok(())
}

use feedhead_core::{Config, Paths};
use feedhead_session::{Binding, HeadAsStructure, HeadTree};
use std::collections::HashSet;

use super::open_store;

/// Indented dump of every node reachable from the root, bound or not.
fn render_all(tree: &HeadTree) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(root) = tree.root_id() else {
        return lines;
    };

    let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
    let mut seen = HashSet::new();
    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let marker = match tree.get(id).map(|node| node.binding()) {
            Some(Binding::Bound(payload)) => format!("{} bytes", payload.len()),
            Some(Binding::Unbound) => "unbound".to_string(),
            None => "missing".to_string(),
        };
        lines.push(format!("{}{} ({})", "  ".repeat(depth), id, marker));
        for child in tree.children(id).iter().rev() {
            stack.push((child.as_str(), depth + 1));
        }
    }
    lines
}

pub async fn run(paths: &Paths, all: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let store = open_store(paths, &config)?;

    let (lines, total) = tokio::task::spawn_blocking(move || -> anyhow::Result<(Vec<String>, usize)> {
        let head = HeadAsStructure::new(store);
        head.initialize()?;
        let total = head.tree().map(HeadTree::len).unwrap_or(0);
        let lines = if all {
            head.tree().map(render_all).unwrap_or_default()
        } else {
            head.filter(|node| {
                node.payload()
                    .map(|payload| format!("{} ({} bytes)", node.content_id(), payload.len()))
            })?
        };
        Ok((lines, total))
    })
    .await??;

    for line in &lines {
        println!("{}", line);
    }
    println!();
    println!("{} of {} nodes shown", lines.len(), total);
    Ok(())
}

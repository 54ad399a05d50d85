use feedhead_core::{Config, Paths};
use serde_json::Value;

/// Show the current configuration as pretty-printed JSON.
pub async fn show(paths: &Paths) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    println!("File: {}", paths.config_file().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Get a config value by dot-separated key path.
pub async fn get(paths: &Paths, key: &str) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let json = serde_json::to_value(&config)?;

    match resolve_json_path(&json, key) {
        Some(Value::String(s)) => println!("{}", s),
        Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        None => anyhow::bail!("Key '{}' not found in config", key),
    }
    Ok(())
}

/// Set a config value by dot-separated key path.
pub async fn set(paths: &Paths, key: &str, value: &str) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let mut json = serde_json::to_value(&config)?;

    // Try to parse value as JSON, fall back to string
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    set_json_path(&mut json, key, parsed.clone());

    let new_config: Config = serde_json::from_value(json)?;
    new_config.save(&paths.config_file())?;
    println!("✓ Set {} = {}", key, parsed);
    Ok(())
}

/// Navigate a JSON value by dot-separated path.
fn resolve_json_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}

fn set_json_path(json: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            if let Some(obj) = current.as_object_mut() {
                obj.insert(part.to_string(), value);
            }
            return;
        }
        if !current.get(*part).map(Value::is_object).unwrap_or(false) {
            if let Some(obj) = current.as_object_mut() {
                obj.insert(part.to_string(), Value::Object(Default::default()));
            }
        }
        match current.get_mut(*part) {
            Some(next) => current = next,
            None => return,
        }
    }
}

use feedhead_core::{Config, Paths};

pub async fn run(paths: &Paths, force: bool) -> anyhow::Result<()> {
    let config_path = paths.config_file();

    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&paths.base)?;
    std::fs::create_dir_all(paths.data_dir())?;
    std::fs::create_dir_all(paths.imports_dir())?;

    let config = Config::default();
    config.save(&config_path)?;

    println!("✓ Created config: {}", config_path.display());
    println!("✓ Data directory: {}", paths.data_dir().display());
    println!("✓ Imports directory: {}", paths.imports_dir().display());
    Ok(())
}

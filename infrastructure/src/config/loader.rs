//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "kb-chat";
const PROJECT_FILES: [&str; 2] = ["kb-chat.toml", ".kb-chat.toml"];
const ENV_PREFIX: &str = "KBCHAT_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `KBCHAT_`-prefixed environment variables (`KBCHAT_CHAIN__TOP_K=5`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./kb-chat.toml` or `./.kb-chat.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/kb-chat/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(
            Self::global_config_path().as_deref(),
            Path::new("."),
            config_path.map(PathBuf::as_path),
        )
        .extract()
        .map_err(Box::new)
    }

    /// Build the merged figment. Split out from [`load`](Self::load) so the
    /// lookup locations can be pointed elsewhere.
    pub fn figment(global: Option<&Path>, project_dir: &Path, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        if let Some(project_path) = Self::find_project_config(project_dir) {
            figment = figment.merge(Toml::file(project_path));
        }

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        Self::find_project_config(Path::new("."))
    }

    fn find_project_config(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources() {
        println!("Configuration sources (in priority order):");
        println!("  [ env ] {}* variables", ENV_PREFIX);

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./{} or ./{}", PROJECT_FILES[0], PROJECT_FILES[1]);
        }

        if let Some(path) = Self::global_config_path() {
            let mark = if path.exists() { "FOUND" } else { "     " };
            println!("  [{}] Global:  {}", mark, path.display());
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.chain.model, "gpt-3.5-turbo");
        assert_eq!(config.chain.top_k, 3);
        assert!(!config.chain.grounded);
    }

    #[test]
    fn test_global_config_path_names_app_dir() {
        if let Some(path) = ConfigLoader::global_config_path() {
            assert!(path.to_string_lossy().contains("kb-chat"));
        }
    }

    #[test]
    fn test_sources_merge_in_priority_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "global.toml",
                r#"
                [chain]
                model = "chatglm_turbo"
                top_k = 7
                temperature = 0.5
                "#,
            )?;
            jail.create_file(
                "kb-chat.toml",
                r#"
                [chain]
                top_k = 4
                "#,
            )?;
            jail.create_file(
                "explicit.toml",
                r#"
                [chain]
                temperature = 0.2
                "#,
            )?;
            jail.set_env("KBCHAT_CHAIN__GROUNDED", "true");

            let config: FileConfig = ConfigLoader::figment(
                Some(Path::new("global.toml")),
                Path::new("."),
                Some(Path::new("explicit.toml")),
            )
            .extract()?;

            assert_eq!(config.chain.model, "chatglm_turbo");
            assert_eq!(config.chain.top_k, 4);
            assert_eq!(config.chain.temperature, 0.2);
            assert!(config.chain.grounded);
            // Untouched values keep their defaults.
            assert_eq!(config.chain.embedding, "text-embedding-ada-002");
            Ok(())
        });
    }

    #[test]
    fn test_hidden_project_file_is_found() {
        Jail::expect_with(|jail| {
            jail.create_file(
                ".kb-chat.toml",
                r#"
                [knowledge]
                chunk_size = 250
                "#,
            )?;
            let config: FileConfig = ConfigLoader::figment(None, Path::new("."), None).extract()?;
            assert_eq!(config.knowledge.chunk_size, 250);
            Ok(())
        });
    }

    #[test]
    fn test_missing_global_file_is_ignored() {
        Jail::expect_with(|_jail| {
            let config: FileConfig =
                ConfigLoader::figment(Some(Path::new("nowhere.toml")), Path::new("."), None)
                    .extract()?;
            assert_eq!(config, FileConfig::default());
            Ok(())
        });
    }
}

use std::path::PathBuf;

use directories::ProjectDirs;

pub const QUALIFIER: &str = "com";
pub const ORGANIZATION: &str = "example";
pub const APPLICATION: &str = "novel-reader";

pub const STATE_FILE: &str = "state.json";
pub const CONFIG_FILE: &str = "config.toml";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

pub fn config_root() -> Option<PathBuf> {
    project_dirs().map(|p| p.config_dir().to_path_buf())
}

pub fn state_path() -> Option<PathBuf> {
    config_root().map(|dir| dir.join(STATE_FILE))
}

pub fn config_path() -> Option<PathBuf> {
    config_root().map(|dir| dir.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_config_root() {
        let (Some(root), Some(state), Some(config)) = (config_root(), state_path(), config_path())
        else {
            // No home directory in this environment.
            return;
        };
        assert_eq!(state, root.join(STATE_FILE));
        assert_eq!(config, root.join(CONFIG_FILE));
    }
}

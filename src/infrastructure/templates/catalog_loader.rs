//! Quest catalog loader from YAML files

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::quest::QuestCatalog;

/// Catalog compiled into the binary, used when no override path is configured.
const DEFAULT_CATALOG: &str = include_str!("../../../catalog/quests.yaml");

/// Parse the built-in catalog.
pub fn default_catalog() -> DomainResult<Arc<QuestCatalog>> {
    QuestCatalog::from_yaml_str(DEFAULT_CATALOG).map(Arc::new)
}

/// Loader for the quest definition table
pub struct CatalogLoader;

impl CatalogLoader {
    /// Load a catalog from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<QuestCatalog> {
        let path = path.as_ref();
        debug!("Loading quest catalog from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read catalog file: {}", path.display()))?;

        Self::load_from_yaml(&content)
            .context(format!("Invalid catalog file: {}", path.display()))
    }

    /// Load a catalog from YAML string
    pub fn load_from_yaml(yaml: &str) -> Result<QuestCatalog> {
        let catalog = QuestCatalog::from_yaml_str(yaml)?;
        info!(
            quests = catalog.quests.len(),
            oss_repo = %catalog.oss_repo,
            "Loaded quest catalog"
        );
        Ok(catalog)
    }

    /// Resolve the catalog for this process: the configured file when given,
    /// the built-in catalog otherwise.
    pub fn resolve(path: Option<&str>) -> Result<Arc<QuestCatalog>> {
        let catalog = match path {
            Some(path) if !path.is_empty() => Self::load_from_file(path)?,
            _ => Self::load_from_yaml(DEFAULT_CATALOG).context("Built-in catalog is invalid")?,
        };
        Ok(Arc::new(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::quest::{QuestId, TaskCheck, TaskId};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_catalog_shape() {
        let catalog = default_catalog().unwrap();
        let lens: Vec<usize> = catalog.quests.iter().map(|q| q.tasks.len()).collect();
        assert_eq!(lens, vec![5, 4, 3]);
        assert_eq!(catalog.successor(&QuestId::from("Q1")), Some(&QuestId::from("Q2")));
        assert_eq!(catalog.successor(&QuestId::from("Q2")), Some(&QuestId::from("Q3")));
        assert_eq!(catalog.successor(&QuestId::from("Q3")), None);
        assert_eq!(
            catalog.task(&QuestId::from("Q1"), &TaskId::from("T3")).unwrap().check,
            TaskCheck::ContainsText {
                answer: "c".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_without_path_uses_builtin() {
        let catalog = CatalogLoader::resolve(None).unwrap();
        assert!(catalog.exists(&QuestId::from("Q3")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
oss_repo: acme/sandbox
map_base_url: https://maps.example
messages:
  welcome: hi
  new_user: hi
  already_registered: hi
  unknown_command: hi
  not_provisioned: hi
  reset: hi
  default_readme: hi
  readme_intro: hi
  all_complete: hi
  internal_error: hi
quests:
  - id: Q1
    title: Only quest
    tasks:
      - id: T1
        title: Say yes
        points: 1
        xp: 1
        check:
          kind: contains_text
          answer: "yes"
        prompt: Say yes
        success: good
        failure: bad
"#
        )
        .unwrap();
        file.flush().unwrap();

        let catalog = CatalogLoader::resolve(file.path().to_str()).unwrap();
        assert_eq!(catalog.oss_repo, "acme/sandbox");
        assert_eq!(catalog.quests.len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(CatalogLoader::load_from_file("/nonexistent/quests.yaml").is_err());
    }
}

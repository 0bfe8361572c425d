//! JSON bodies of the backend's HTTP endpoints

use serde::{Deserialize, Serialize};

/// File or directory kind in the explorer tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
}

/// One node of `GET /api/files/tree`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
    #[serde(
        default,
        rename = "isExpanded",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_expanded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl FileNode {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Depth-first walk yielding each node with its depth.
    pub fn walk(&self) -> Vec<(usize, &FileNode)> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            if let Some(children) = &node.children {
                for child in children.iter().rev() {
                    stack.push((depth + 1, child));
                }
            }
        }
        out
    }
}

/// A project the user may bind the agent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default, rename = "creatorName", skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(default, rename = "createTime", skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, rename = "projectRole", skip_serializing_if = "Option::is_none")]
    pub project_role: Option<i64>,
}

/// Body of `GET /api/projects`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Agent configuration (`GET /api/config`)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub welcome_message: String,
    pub module: String,
    pub root_agent: String,
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            name: "Agent".into(),
            description: "AI Assistant".into(),
            welcome_message: "Hello! How can I help you today?".into(),
            module: "agent".into(),
            root_agent: "root_agent".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiFeatures {
    pub show_file_explorer: bool,
    pub show_session_list: bool,
}

impl Default for UiFeatures {
    fn default() -> Self {
        Self {
            show_file_explorer: true,
            show_session_list: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub title: String,
    pub theme: Option<String>,
    pub features: UiFeatures,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            title: "Agent Assistant".into(),
            theme: Some("light".into()),
            features: UiFeatures::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSettings {
    pub output_directory: Option<String>,
    pub watch_directories: Vec<String>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            output_directory: None,
            watch_directories: vec!["./output".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub host: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8000,
            host: vec!["localhost".into(), "127.0.0.1".into()],
        }
    }
}

/// Agent configuration; every missing section or field takes its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentInfo,
    pub ui: UiSettings,
    pub files: FileSettings,
    pub server: ServerSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_config_fills_missing_fields_from_defaults() {
        let json = r#"{"agent":{"name":"Materials Agent"},"ui":{"features":{"showSessionList":false}}}"#;
        let config: AgentConfig = serde_json::from_str(json).expect("parse partial config");

        assert_eq!(config.agent.name, "Materials Agent");
        assert_eq!(config.agent.root_agent, "root_agent");
        assert_eq!(config.ui.title, "Agent Assistant");
        assert!(config.ui.features.show_file_explorer);
        assert!(!config.ui.features.show_session_list);
        assert_eq!(config.files.watch_directories, vec!["./output"]);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn file_tree_walks_depth_first() {
        let json = r#"[{"name":"workspace","path":"/w","type":"directory","isExpanded":true,
            "children":[
              {"name":"a","path":"/w/a","type":"directory","children":[
                {"name":"x.json","path":"/w/a/x.json","type":"file","size":12}]},
              {"name":"b.csv","path":"/w/b.csv","type":"file","size":3}
            ]}]"#;
        let tree: Vec<FileNode> = serde_json::from_str(json).expect("parse tree");
        let names: Vec<(usize, &str)> = tree[0]
            .walk()
            .into_iter()
            .map(|(depth, node)| (depth, node.name.as_str()))
            .collect();

        assert_eq!(
            names,
            vec![(0, "workspace"), (1, "a"), (2, "x.json"), (1, "b.csv")]
        );
        assert!(tree[0].is_dir());
        assert_eq!(tree[0].is_expanded, Some(true));
    }

    #[test]
    fn project_list_error_body() {
        let json = r#"{"success":false,"error":"AccessKey not found","projects":[]}"#;
        let list: ProjectList = serde_json::from_str(json).expect("parse project list");
        assert!(!list.success);
        assert_eq!(list.error.as_deref(), Some("AccessKey not found"));
        assert!(list.projects.is_empty());
    }
}

//! Projects and the workspace holding them
//!
//! A project owns one schema (or none yet), its chat transcript, the last
//! DDL text and its own undo/redo history. Exactly one project is active.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::history::History;
use crate::core::schema::Schema;

pub type ProjectId = Uuid;

pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Project not found: {0}")]
pub struct ProjectNotFound(pub ProjectId);

// ============================================================================
// Chat Transcript
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[display("user")]
    User,
    #[display("assistant")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub last_ddl: String,
    #[serde(default)]
    pub history: History,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            schema: None,
            messages: Vec::new(),
            last_ddl: String::new(),
            history: History::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn push_message(&mut self, sender: Sender, text: impl Into<String>) {
        self.messages.push(Message {
            sender,
            text: text.into(),
        });
        self.touch();
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_NAME)
    }
}

// ============================================================================
// Workspace
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    projects: Vec<Project>,
    active: ProjectId,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::from_project(Project::default())
    }
}

impl Workspace {
    fn from_project(project: Project) -> Self {
        Self {
            active: project.id,
            projects: vec![project],
        }
    }

    /// Rebuilds a workspace from persisted parts
    ///
    /// No projects gives a fresh default project; an unknown or missing
    /// active id falls back to the most recently modified project.
    pub fn from_parts(projects: Vec<Project>, active: Option<ProjectId>) -> Self {
        if projects.is_empty() {
            return Self::default();
        }
        let mut workspace = Self {
            active: projects[0].id,
            projects,
        };
        match active.filter(|id| workspace.project(*id).is_some()) {
            Some(id) => workspace.active = id,
            None => workspace.activate_most_recent(),
        }
        workspace
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn projects_mut(&mut self) -> impl Iterator<Item = &mut Project> {
        self.projects.iter_mut()
    }

    pub fn active_id(&self) -> ProjectId {
        self.active
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: ProjectId) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn active(&self) -> &Project {
        // The active id always names a held project
        let index = self
            .projects
            .iter()
            .position(|p| p.id == self.active)
            .unwrap_or(0);
        &self.projects[index]
    }

    pub fn active_mut(&mut self) -> &mut Project {
        let index = self
            .projects
            .iter()
            .position(|p| p.id == self.active)
            .unwrap_or(0);
        &mut self.projects[index]
    }

    /// Creates a project and makes it active
    pub fn create(&mut self, name: impl Into<String>) -> ProjectId {
        let project = Project::new(name);
        let id = project.id;
        tracing::info!("Created project '{}' ({})", project.name, id);
        self.projects.push(project);
        self.active = id;
        id
    }

    pub fn rename(&mut self, id: ProjectId, name: impl Into<String>) -> Result<(), ProjectNotFound> {
        let project = self.project_mut(id).ok_or(ProjectNotFound(id))?;
        project.name = name.into();
        project.touch();
        Ok(())
    }

    pub fn switch(&mut self, id: ProjectId) -> Result<(), ProjectNotFound> {
        if self.project(id).is_none() {
            return Err(ProjectNotFound(id));
        }
        self.active = id;
        tracing::info!("Switched to project {}", id);
        Ok(())
    }

    /// Deletes a project
    ///
    /// Deleting the last project leaves a fresh default one; deleting the
    /// active project activates the most recently modified remaining one.
    pub fn delete(&mut self, id: ProjectId) -> Result<Project, ProjectNotFound> {
        let index = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or(ProjectNotFound(id))?;
        let removed = self.projects.remove(index);
        tracing::info!("Deleted project '{}' ({})", removed.name, id);

        if self.projects.is_empty() {
            *self = Self::default();
        } else if self.active == id {
            self.activate_most_recent();
        }
        Ok(removed)
    }

    fn activate_most_recent(&mut self) {
        if let Some(project) = self.projects.iter().max_by_key(|p| p.updated_at) {
            self.active = project.id;
        }
    }
}

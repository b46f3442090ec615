//! Data models for trackrig entities.
//!
//! This module defines the core data structures:
//! - `Project` - An ftrack project the user has work in
//! - `Task` - A task assigned to the user, flattened for display
//! - `TrackerState` - The fetched project/task lists and their selection

use serde::{Deserialize, Serialize};

/// A project derived from the tasks assigned to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// ftrack project id
    pub id: String,

    /// Short project name
    pub name: String,

    /// Full display name (falls back to `name`)
    pub full_name: String,
}

/// A task assigned to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// ftrack task id
    pub id: String,

    /// Task name
    pub name: String,

    /// Workflow status name (e.g., "In Progress")
    #[serde(default)]
    pub status_name: String,

    /// Owning project id
    #[serde(default)]
    pub project_id: String,

    /// Owning project name
    #[serde(default)]
    pub project_name: String,

    /// Name of the parent entity (shot, asset build, ...)
    #[serde(default)]
    pub parent_name: String,

    /// Raw end date as returned by the API
    #[serde(default)]
    pub end_date: String,

    /// Link to the task in the ftrack web UI (empty if ids are missing)
    #[serde(default)]
    pub detail_url: String,
}

/// Project and task lists as last fetched, with the current selection.
///
/// This is owned by whoever drives the UI and passed explicitly to the
/// fetch commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerState {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub selected_project: Option<usize>,
    pub selected_task: Option<usize>,
}

impl TrackerState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop both lists and their selections.
    pub fn clear(&mut self) {
        self.clear_tasks();
        self.projects.clear();
        self.selected_project = None;
    }

    /// Drop the task list and its selection.
    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
        self.selected_task = None;
    }

    /// Replace the project list, selecting the first entry if any.
    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.selected_project = if projects.is_empty() { None } else { Some(0) };
        self.projects = projects;
    }

    /// Replace the task list, selecting the first entry if any.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.selected_task = if tasks.is_empty() { None } else { Some(0) };
        self.tasks = tasks;
    }

    /// The selected project, if the selection is in range.
    pub fn selected_project(&self) -> Option<&Project> {
        self.selected_project.and_then(|i| self.projects.get(i))
    }

    /// The selected task, if the selection is in range.
    pub fn selected_task(&self) -> Option<&Task> {
        self.selected_task.and_then(|i| self.tasks.get(i))
    }
}

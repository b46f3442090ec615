//! ftrack-facing commands: projects, tasks, task URLs and uploads.

use std::path::Path;

use serde::Serialize;

use super::Output;
use crate::config::ResolvedSettings;
use crate::ftrack::FtrackClient;
use crate::ftrack::tasks::{detail_url, format_date};
use crate::ftrack::upload::{UploadSummary, Uploader};
use crate::http::Transport;
use crate::models::{Project, Task, TrackerState};
use crate::{Error, Result};

fn connect<T: Transport>(settings: &ResolvedSettings, transport: T) -> Result<FtrackClient<T>> {
    let credentials = settings.credentials()?;
    Ok(FtrackClient::new(
        credentials.server_url,
        credentials.username,
        credentials.api_key,
        transport,
    ))
}

// === Projects ===

#[derive(Serialize)]
pub struct ProjectsResult {
    pub projects: Vec<Project>,
    pub selected: Option<String>,
}

impl Output for ProjectsResult {
    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects found".to_string();
        }

        let mut lines = vec![format!("{} project(s):", self.projects.len())];
        for project in &self.projects {
            let marker = if self.selected.as_deref() == Some(project.id.as_str()) {
                "*"
            } else {
                " "
            };
            lines.push(format!(
                "{} {}  {}  [{}]",
                marker, project.name, project.full_name, project.id
            ));
        }
        lines.join("\n")
    }
}

/// Refresh the project list.
///
/// The state is cleared before credentials are checked, so a failed refresh
/// never leaves stale entries behind.
pub fn projects<T: Transport>(
    settings: &ResolvedSettings,
    transport: T,
    state: &mut TrackerState,
) -> Result<ProjectsResult> {
    state.clear();
    let client = connect(settings, transport)?;

    state.set_projects(client.get_projects());
    Ok(ProjectsResult {
        projects: state.projects.clone(),
        selected: state.selected_project().map(|p| p.id.clone()),
    })
}

// === Tasks ===

#[derive(Serialize)]
pub struct TasksResult {
    pub project_id: Option<String>,
    pub tasks: Vec<Task>,
    pub selected: Option<String>,
}

impl Output for TasksResult {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found".to_string();
        }

        let mut lines = vec![format!("{} task(s):", self.tasks.len())];
        for task in &self.tasks {
            let mut line = format!("  {}  [{}]", task.name, task.status_name);
            if !task.parent_name.is_empty() {
                line.push_str(&format!("  {}", task.parent_name));
            }
            if !task.project_name.is_empty() {
                line.push_str(&format!("  ({})", task.project_name));
            }
            let due = format_date(&task.end_date);
            if !due.is_empty() {
                line.push_str(&format!("  due {}", due));
            }
            line.push_str(&format!("  {}", task.id));
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Refresh the task list, for one project or for all active projects.
pub fn tasks<T: Transport>(
    settings: &ResolvedSettings,
    transport: T,
    state: &mut TrackerState,
    project_id: Option<&str>,
) -> Result<TasksResult> {
    state.clear_tasks();
    if project_id == Some("") {
        return Err(Error::InvalidInput("project id cannot be empty".to_string()));
    }
    let client = connect(settings, transport)?;

    state.set_tasks(client.get_tasks(project_id));
    Ok(TasksResult {
        project_id: project_id.map(str::to_string),
        tasks: state.tasks.clone(),
        selected: state.selected_task().map(|t| t.id.clone()),
    })
}

// === Task URL ===

#[derive(Serialize)]
pub struct TaskUrlResult {
    pub task_id: String,
    pub project_id: String,
    pub url: String,
}

impl Output for TaskUrlResult {
    fn to_human(&self) -> String {
        self.url.clone()
    }
}

/// Web URL of a task. Only the server URL needs to be configured.
pub fn task_url(settings: &ResolvedSettings, task_id: &str, project_id: &str) -> Result<TaskUrlResult> {
    let server = settings
        .server_url
        .as_ref()
        .ok_or_else(|| Error::MissingCredentials(vec!["server-url"]))?;
    if task_id.is_empty() || project_id.is_empty() {
        return Err(Error::InvalidInput(
            "task and project ids are required".to_string(),
        ));
    }

    Ok(TaskUrlResult {
        task_id: task_id.to_string(),
        project_id: project_id.to_string(),
        url: detail_url(&server.value, task_id, project_id),
    })
}

// === Upload ===

#[derive(Serialize)]
pub struct UploadResult {
    #[serde(flatten)]
    pub summary: UploadSummary,
}

impl Output for UploadResult {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![
            format!(
                "Uploaded {} as {} v{} on {} ({})",
                s.component_name, s.asset_name, s.asset_version_number, s.task_name, s.project_name
            ),
            format!("  version:   {}", s.asset_version_id),
            format!("  component: {}", s.component_id),
        ];
        if !s.transferred {
            lines.push("  warning: file was not transferred to server storage".to_string());
        }
        match s.encode_job_id {
            Some(ref id) => lines.push(format!("  encode job: {}", id)),
            None => lines.push("  warning: no encode job was started".to_string()),
        }
        lines.join("\n")
    }
}

/// Upload a file as the next version on a task and request a transcode.
pub fn upload<T: Transport>(
    settings: &ResolvedSettings,
    transport: T,
    task_id: &str,
    file: &Path,
    asset_name: Option<&str>,
) -> Result<UploadResult> {
    let client = connect(settings, transport)?;
    let summary = Uploader::new(&client).upload_and_encode(task_id, file, asset_name)?;
    Ok(UploadResult { summary })
}

//! Project and task listing for the current user.
//!
//! Both queries read tasks assigned to the user. Projects are not queried
//! separately; they are folded out of the `project` relation of each task.
//! Any failure or unexpected response shape is logged and yields an empty
//! list, which callers treat the same as "nothing assigned".

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::{FtrackClient, quote, str_field};
use crate::http::Transport;
use crate::models::{Project, Task};

/// Placeholder for projects the API returns without a name
const UNNAMED: &str = "Unnamed";

/// Query for the user's tasks in active projects, with project fields.
pub fn projects_expression(username: &str) -> String {
    format!(
        "select id, name, project.id, project.name, project.full_name \
         from Task \
         where assignments any (resource.username is \"{}\") \
         and project.status is \"active\"",
        quote(username)
    )
}

/// Query for the user's tasks, limited to one project or to active projects.
pub fn tasks_expression(username: &str, project_id: Option<&str>) -> String {
    let mut expression = format!(
        "select id, name, type.name, status.name, \
         project.id, project.name, \
         parent.name, start_date, end_date \
         from Task \
         where assignments any (resource.username is \"{}\") ",
        quote(username)
    );

    match project_id {
        Some(id) => expression.push_str(&format!("and project.id is \"{}\" ", quote(id))),
        None => expression.push_str("and project.status is \"active\" "),
    }

    expression.push_str("order by name ascending");
    expression
}

impl<T: Transport> FtrackClient<T> {
    /// Active projects in which the user has at least one assigned task.
    pub fn get_projects(&self) -> Vec<Project> {
        let tasks = match self.query(projects_expression(self.username())) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch projects");
                return Vec::new();
            }
        };

        tracing::debug!(count = tasks.len(), "tasks returned for project listing");
        let projects = projects_from_tasks(&tasks);
        tracing::info!(count = projects.len(), "unique projects extracted");
        projects
    }

    /// Tasks assigned to the user, ordered by name.
    ///
    /// With `project_id` only that project's tasks are returned; otherwise
    /// tasks from all active projects.
    pub fn get_tasks(&self, project_id: Option<&str>) -> Vec<Task> {
        let expression = tasks_expression(self.username(), project_id);
        match self.query(expression) {
            Ok(tasks) => {
                tracing::info!(
                    count = tasks.len(),
                    project = project_id.unwrap_or("all"),
                    "tasks fetched"
                );
                tasks
                    .iter()
                    .map(|task| task_from_entity(self.server_url(), task))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch tasks");
                Vec::new()
            }
        }
    }
}

/// Fold the `project` relation of each task into unique projects.
///
/// Order and field values follow the first task seen for each project id.
/// Tasks without a project object or project id are skipped.
pub fn projects_from_tasks(tasks: &[Value]) -> Vec<Project> {
    let mut seen = HashSet::new();
    let mut projects = Vec::new();

    for task in tasks {
        let Some(project) = task.get("project").filter(|p| p.is_object()) else {
            tracing::debug!(task = str_field(task, "id"), "task has no project");
            continue;
        };

        let id = str_field(project, "id");
        if id.is_empty() {
            tracing::debug!(task = str_field(task, "id"), "task project has no id");
            continue;
        }

        if !seen.insert(id.to_string()) {
            continue;
        }

        let name = project
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNNAMED)
            .to_string();
        let full_name = project
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());

        projects.push(Project {
            id: id.to_string(),
            name,
            full_name,
        });
    }

    projects
}

/// Flatten a raw Task entity into a [`Task`].
pub fn task_from_entity(server_url: &str, entity: &Value) -> Task {
    let id = str_field(entity, "id").to_string();
    let project = entity.get("project").filter(|p| p.is_object());
    let project_id = project.map(|p| str_field(p, "id")).unwrap_or("").to_string();

    let end_date = match entity.get("end_date") {
        Some(Value::String(s)) => s.clone(),
        Some(obj @ Value::Object(_)) => str_field(obj, "value").to_string(),
        _ => String::new(),
    };

    let detail_url = if id.is_empty() || project_id.is_empty() {
        String::new()
    } else {
        detail_url(server_url, &id, &project_id)
    };

    Task {
        name: str_field(entity, "name").to_string(),
        status_name: nested_name(entity, "status"),
        project_name: project.map(|p| str_field(p, "name")).unwrap_or("").to_string(),
        parent_name: nested_name(entity, "parent"),
        end_date,
        detail_url,
        id,
        project_id,
    }
}

fn nested_name(entity: &Value, relation: &str) -> String {
    entity
        .get(relation)
        .filter(|r| r.is_object())
        .map(|r| str_field(r, "name"))
        .unwrap_or("")
        .to_string()
}

/// Link to a task in the ftrack web UI.
pub fn detail_url(server_url: &str, task_id: &str, project_id: &str) -> String {
    format!(
        "{}/#slideEntityId={}&slideEntityType=task&view=tasks&itemId=projects&entityId={}&entityType=show",
        server_url.trim_end_matches('/'),
        task_id,
        project_id
    )
}

/// Format an ISO 8601 date as `dd/mm`.
///
/// Empty input stays empty; anything unparseable is returned unchanged.
pub fn format_date(date: &str) -> String {
    if date.is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return dt.format("%d/%m").to_string();
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date, pattern) {
            return dt.format("%d/%m").to_string();
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return d.format("%d/%m").to_string();
    }

    date.to_string()
}

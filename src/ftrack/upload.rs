//! Upload a local file to ftrack as a new asset version and request a
//! transcode.
//!
//! Once the version exists, the remaining steps are best-effort: renaming the
//! component, transferring it to server storage and starting the encode job
//! log their failures instead of returning them. The encode gets one retry
//! without the version id. Nothing is rolled back.

use std::fs::File;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{Batch, FtrackClient, Operation, quote, str_field};
use crate::http::Transport;
use crate::{Error, Result};

/// Location that holds components uploaded to the ftrack server
pub const SERVER_LOCATION: &str = "ftrack.server";

/// Location describing files on the uploading machine
pub const ORIGIN_LOCATION: &str = "ftrack.origin";

/// Asset type used for uploaded renders
pub const UPLOAD_ASSET_TYPE: &str = "Upload";

/// Component name before the file name is applied
const DEFAULT_COMPONENT_NAME: &str = "main";

/// Outcome of [`Uploader::upload_and_encode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSummary {
    pub task_name: String,
    pub project_name: String,
    pub asset_name: String,
    pub asset_version_number: u64,
    pub asset_version_id: String,
    pub component_id: String,
    pub component_name: String,
    /// Whether the file reached the server location
    pub transferred: bool,
    pub encode_job_id: Option<String>,
    pub encode_job_data: Option<String>,
}

/// A transcode job accepted by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub id: String,
    pub data: Value,
}

/// Render uploader bound to a client.
pub struct Uploader<'a, T: Transport> {
    client: &'a FtrackClient<T>,
}

impl<'a, T: Transport> Uploader<'a, T> {
    pub fn new(client: &'a FtrackClient<T>) -> Self {
        Self { client }
    }

    /// Look up a location by name.
    pub fn get_location(&self, name: &str) -> Result<Value> {
        self.client
            .query_first(format!(
                "select id, name from Location where name is \"{}\"",
                quote(name)
            ))?
            .ok_or_else(|| Error::NotFound(format!("location '{}'", name)))
    }

    /// Return the asset named `name` under `project`, or queue its creation.
    ///
    /// Two concurrent callers can both miss the lookup and create duplicates.
    pub fn get_or_create_asset(
        &self,
        batch: &mut Batch,
        name: &str,
        project: &Value,
        asset_type: &Value,
    ) -> Result<Value> {
        let existing = self.client.query_first(format!(
            "select id, name from Asset where name is \"{}\" and type.name is \"{}\" and parent.id is \"{}\"",
            quote(name),
            quote(str_field(asset_type, "name")),
            quote(str_field(project, "id"))
        ))?;

        if let Some(asset) = existing {
            tracing::info!(asset = name, "asset already exists, reusing it");
            return Ok(asset);
        }

        let mut data = Map::new();
        data.insert("name".to_string(), json!(name));
        data.insert("type_id".to_string(), json!(str_field(asset_type, "id")));
        data.insert("context_id".to_string(), json!(str_field(project, "id")));
        Ok(batch.create("Asset", data))
    }

    /// Upload `file_path` as the next version of an asset on the task's
    /// project and request a transcode.
    ///
    /// Fails immediately, without any request, if the file does not exist.
    pub fn upload_and_encode(
        &self,
        task_id: &str,
        file_path: &Path,
        asset_name: Option<&str>,
    ) -> Result<UploadSummary> {
        if !file_path.is_file() {
            return Err(Error::NotFound(format!("file {}", file_path.display())));
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_stem = file_path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = file_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let file_size = std::fs::metadata(file_path)?.len();
        let asset_name = asset_name.unwrap_or(&file_stem).to_string();

        let server_location = self.get_location(SERVER_LOCATION)?;
        let origin_location = self.get_location(ORIGIN_LOCATION)?;

        let task = self
            .client
            .query_first(format!(
                "select id, name, project.id from Task where id is \"{}\"",
                quote(task_id)
            ))?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
        let project_id = task
            .pointer("/project/id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedResponse(format!("task {} has no project", task_id)))?;
        let project = self
            .client
            .query_first(format!(
                "select id, name from Project where id is \"{}\"",
                quote(project_id)
            ))?
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        let asset_type = self
            .client
            .query_first(format!(
                "select id, name from AssetType where name is \"{}\"",
                UPLOAD_ASSET_TYPE
            ))?
            .ok_or_else(|| Error::NotFound(format!("asset type '{}'", UPLOAD_ASSET_TYPE)))?;

        let mut batch = Batch::new();
        let asset = self.get_or_create_asset(&mut batch, &asset_name, &project, &asset_type)?;
        let asset_id = str_field(&asset, "id").to_string();

        // Not atomic: a concurrent upload can claim the same number.
        let version_count = self
            .client
            .query(format!(
                "select id from AssetVersion where asset.id is \"{}\"",
                quote(&asset_id)
            ))?
            .len() as u64;
        let next_version = version_count + 1;

        let mut version_data = Map::new();
        version_data.insert("asset_id".to_string(), json!(asset_id));
        version_data.insert("task_id".to_string(), json!(str_field(&task, "id")));
        version_data.insert("version".to_string(), json!(next_version));
        version_data.insert(
            "comment".to_string(),
            json!(format!("Upload of {}", file_name)),
        );
        let version = batch.create("AssetVersion", version_data);
        let version_id = str_field(&version, "id").to_string();

        let mut component_data = Map::new();
        component_data.insert("name".to_string(), json!(DEFAULT_COMPONENT_NAME));
        component_data.insert("file_type".to_string(), json!(file_type));
        component_data.insert("size".to_string(), json!(file_size));
        component_data.insert("version_id".to_string(), json!(version_id));
        let component = batch.create("FileComponent", component_data);
        let component_id = str_field(&component, "id").to_string();

        let absolute = std::path::absolute(file_path)?;
        let mut origin_data = Map::new();
        origin_data.insert("component_id".to_string(), json!(component_id));
        origin_data.insert(
            "location_id".to_string(),
            json!(str_field(&origin_location, "id")),
        );
        origin_data.insert(
            "resource_identifier".to_string(),
            json!(absolute.to_string_lossy()),
        );
        batch.create("ComponentLocation", origin_data);

        self.client.commit(batch)?;
        tracing::info!(version = next_version, %asset_name, "asset version created");

        let component_name = match self.rename_component(&component_id, &file_name) {
            Ok(()) => file_name.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to set component name");
                DEFAULT_COMPONENT_NAME.to_string()
            }
        };

        let transferred = match self.transfer_component(
            &component_id,
            file_path,
            &file_name,
            file_size,
            &server_location,
        ) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to transfer component to server");
                false
            }
        };

        let encode_job = self.try_encode(&component_id, &version_id);

        Ok(UploadSummary {
            task_name: str_field(&task, "name").to_string(),
            project_name: str_field(&project, "name").to_string(),
            asset_name: str_field(&asset, "name").to_string(),
            asset_version_number: next_version,
            asset_version_id: version_id,
            component_id,
            component_name,
            transferred,
            encode_job_id: encode_job.as_ref().map(|job| job.id.clone()),
            encode_job_data: encode_job.map(|job| job.data.to_string()),
        })
    }

    fn rename_component(&self, component_id: &str, name: &str) -> Result<()> {
        let mut batch = Batch::new();
        let mut data = Map::new();
        data.insert("name".to_string(), json!(name));
        batch.update("FileComponent", component_id, data);
        self.client.commit(batch)?;
        Ok(())
    }

    /// Push the file to the server location and register it there.
    fn transfer_component(
        &self,
        component_id: &str,
        file_path: &Path,
        file_name: &str,
        file_size: u64,
        server_location: &Value,
    ) -> Result<()> {
        let results = self.client.call(&[Operation::GetUploadMetadata {
            component_id: component_id.to_string(),
            file_name: file_name.to_string(),
            file_size,
            checksum: None,
        }])?;
        let metadata = results
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("no upload metadata".to_string()))?;

        let url = str_field(&metadata, "url");
        if url.is_empty() {
            return Err(Error::MalformedResponse(
                "upload metadata has no url".to_string(),
            ));
        }

        let headers: Vec<(String, String)> = metadata
            .get("headers")
            .and_then(Value::as_object)
            .map(|h| {
                h.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let mut file = File::open(file_path)?;
        self.client
            .transport()
            .put(url, &headers, &mut file, file_size)?;

        let mut batch = Batch::new();
        let mut data = Map::new();
        data.insert("component_id".to_string(), json!(component_id));
        data.insert(
            "location_id".to_string(),
            json!(str_field(server_location, "id")),
        );
        data.insert("resource_identifier".to_string(), json!(component_id));
        batch.create("ComponentLocation", data);
        self.client.commit(batch)?;

        tracing::info!(component = component_id, "component transferred to server");
        Ok(())
    }

    /// Request a transcode, retrying once without the version id.
    fn try_encode(&self, component_id: &str, version_id: &str) -> Option<EncodeJob> {
        match self.encode(component_id, Some(version_id)) {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(error = %e, "encode request failed, retrying without version");
                match self.encode(component_id, None) {
                    Ok(job) => Some(job),
                    Err(e) => {
                        tracing::warn!(error = %e, "encode fallback failed");
                        None
                    }
                }
            }
        }
    }

    fn encode(&self, component_id: &str, version_id: Option<&str>) -> Result<EncodeJob> {
        let results = self.client.call(&[Operation::EncodeMedia {
            component_id: component_id.to_string(),
            version_id: version_id.map(str::to_string),
            keep_original: true,
        }])?;
        let data = results
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("no encode result".to_string()))?;

        let id = data
            .get("job_id")
            .or_else(|| data.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedResponse("encode result has no job id".to_string()))?
            .to_string();

        Ok(EncodeJob { id, data })
    }
}

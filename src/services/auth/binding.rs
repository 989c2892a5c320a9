//! Project/service binding check.
//!
//! Per-project services are named `<prefix>-p-<project>-s-<service>`. A request
//! that names a project in its route must address a service carrying that same
//! project in its name; anything else is treated as cross-project smuggling.

const PROJECT_MARKER: &str = "-p-";
const SERVICE_MARKER: &str = "-s-";

/// Extract the project segment embedded in `service_id`.
///
/// Takes everything between the first `-p-` and the last following `-s-`;
/// the segment must be non-empty.
pub fn embedded_project(service_id: &str) -> Option<&str> {
    let start = service_id.find(PROJECT_MARKER)? + PROJECT_MARKER.len();
    let rest = &service_id[start..];
    let end = rest.rfind(SERVICE_MARKER)?;

    (end > 0).then(|| &rest[..end])
}

pub fn is_service_in_project(service_id: &str, project_id: &str) -> bool {
    embedded_project(service_id).is_some_and(|embedded| embedded == project_id)
}

//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the course-workflow API to disk, so clients can
//! be generated without starting the server or a database.
//!
//! Usage: `openapi [OUTPUT_PATH]` (defaults to `openapi.json`).

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn render() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    std::fs::write(&path, render()?)?;
    println!("OpenAPI document for {} paths written to {}", ApiDoc::openapi().paths.paths.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_workflow_and_course_routes() {
        let json: serde_json::Value = serde_json::from_str(&render().unwrap()).unwrap();
        let paths = json["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/v1/admin/workflow/start"));
        assert!(paths.contains_key("/api/v1/admin/workflow/{session_id}/questions/preview"));
        assert!(paths.contains_key("/api/v1/courses/{course_id}/lessons"));
        let presentation = &paths["/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}/presentation"];
        assert!(presentation.get("get").is_some() && presentation.get("post").is_some());
    }
}

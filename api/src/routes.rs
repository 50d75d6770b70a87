//! Static route table. The router and the `/apidocs.json` document are both
//! generated from `ROUTES`.

use crate::AppState;
use crate::handlers::{build, health, job, project};
use axum::Json;
use axum::Router;
use axum::routing::{MethodRouter, get};
use serde_json::{Map, Value, json};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    GetJob,
    JobLogs,
    GetBuild,
    BuildJobs,
    BuildLogs,
    ListProjects,
    GetProject,
    ProjectBuilds,
    ListProjectsWithLatestBuild,
    Health,
    ApiDocs,
}

impl Operation {
    fn method_router(self) -> MethodRouter<AppState> {
        match self {
            Operation::GetJob => get(job::get),
            Operation::JobLogs => get(job::logs),
            Operation::GetBuild => get(build::get),
            Operation::BuildJobs => get(build::jobs),
            Operation::BuildLogs => get(build::logs),
            Operation::ListProjects => get(project::list),
            Operation::GetProject => get(project::get),
            Operation::ProjectBuilds => get(project::builds),
            Operation::ListProjectsWithLatestBuild => get(project::list_with_latest_build),
            Operation::Health => get(health::check),
            Operation::ApiDocs => get(|| async { Json(api_docs()) }),
        }
    }

    pub fn operation_id(self) -> &'static str {
        match self {
            Operation::GetJob => "getJob",
            Operation::JobLogs => "getJobLogs",
            Operation::GetBuild => "getBuild",
            Operation::BuildJobs => "getBuildJobs",
            Operation::BuildLogs => "getBuildLogs",
            Operation::ListProjects => "listProjects",
            Operation::GetProject => "getProject",
            Operation::ProjectBuilds => "getProjectBuilds",
            Operation::ListProjectsWithLatestBuild => "listProjectsWithLatestBuild",
            Operation::Health => "healthz",
            Operation::ApiDocs => "apiDocs",
        }
    }
}

/// Shape of a successful response body.
#[derive(Clone, Copy, Debug)]
pub enum Returns {
    /// JSON object of the named definition
    Object(&'static str),
    /// JSON array of the named definition
    Array(&'static str),
    /// Raw log bytes
    Logs,
    Text,
    /// The API description itself
    Document,
}

#[derive(Clone, Copy, Debug)]
pub struct RouteDef {
    pub path: &'static str,
    pub operation: Operation,
    pub tag: &'static str,
    pub doc: &'static str,
    pub path_param: Option<&'static str>,
    pub returns: Returns,
    pub not_found: bool,
}

pub const ROUTES: &[RouteDef] = &[
    RouteDef {
        path: "/v1/job/{id}",
        operation: Operation::GetJob,
        tag: "job",
        doc: "get a job",
        path_param: Some("identifier of the job"),
        returns: Returns::Object("Job"),
        not_found: true,
    },
    RouteDef {
        path: "/v1/job/{id}/logs",
        operation: Operation::JobLogs,
        tag: "job",
        doc: "get the log output of a job",
        path_param: Some("identifier of the job"),
        returns: Returns::Logs,
        not_found: true,
    },
    RouteDef {
        path: "/v1/build/{id}",
        operation: Operation::GetBuild,
        tag: "build",
        doc: "get a build",
        path_param: Some("identifier of the build"),
        returns: Returns::Object("Build"),
        not_found: true,
    },
    RouteDef {
        path: "/v1/build/{id}/jobs",
        operation: Operation::BuildJobs,
        tag: "build",
        doc: "get the jobs of a build",
        path_param: Some("identifier of the build"),
        returns: Returns::Array("Job"),
        not_found: true,
    },
    RouteDef {
        path: "/v1/build/{id}/logs",
        operation: Operation::BuildLogs,
        tag: "build",
        doc: "get the log output of every job of a build",
        path_param: Some("identifier of the build"),
        returns: Returns::Logs,
        not_found: true,
    },
    RouteDef {
        path: "/v1/projects",
        operation: Operation::ListProjects,
        tag: "projects",
        doc: "get all projects",
        path_param: None,
        returns: Returns::Array("Project"),
        not_found: false,
    },
    RouteDef {
        path: "/v1/project/{id}",
        operation: Operation::GetProject,
        tag: "projects",
        doc: "get a project",
        path_param: Some("identifier of the project"),
        returns: Returns::Object("Project"),
        not_found: true,
    },
    RouteDef {
        path: "/v1/project/{id}/builds",
        operation: Operation::ProjectBuilds,
        tag: "projects",
        doc: "get the builds of a project, most recent first",
        path_param: Some("identifier of the project"),
        returns: Returns::Array("Build"),
        not_found: true,
    },
    RouteDef {
        path: "/v1/projects-build",
        operation: Operation::ListProjectsWithLatestBuild,
        tag: "projects",
        doc: "get all projects with their latest build",
        path_param: None,
        returns: Returns::Array("ProjectBuildSummary"),
        not_found: false,
    },
    RouteDef {
        path: "/healthz/",
        operation: Operation::Health,
        tag: "healthz",
        doc: "liveness check",
        path_param: None,
        returns: Returns::Text,
        not_found: false,
    },
    RouteDef {
        path: "/apidocs.json",
        operation: Operation::ApiDocs,
        tag: "apidocs",
        doc: "this document",
        path_param: None,
        returns: Returns::Document,
        not_found: false,
    },
];

pub fn register(router: Router<AppState>) -> Router<AppState> {
    ROUTES.iter().fold(router, |router, route| {
        router.route(route.path, route.operation.method_router())
    })
}

/// Swagger 2.0 description of every route in `ROUTES`.
pub fn api_docs() -> Value {
    let mut paths = Map::new();
    for route in ROUTES {
        paths.insert(route.path.to_string(), json!({ "get": operation_doc(route) }));
    }

    json!({
        "swagger": "2.0",
        "info": {
            "title": "Brigade API",
            "description": "Resources for Jobs, Projects, Builds",
            "license": {
                "name": "MIT",
                "url": "http://mit.org"
            },
            "version": "1.0.0"
        },
        "tags": [
            {"name": "brigade", "description": "Brigade API"}
        ],
        "paths": paths,
        "definitions": definitions()
    })
}

fn operation_doc(route: &RouteDef) -> Value {
    let (produces, schema) = match route.returns {
        Returns::Document => ("application/json", json!({"type": "object"})),
        Returns::Object(name) => ("application/json", schema_ref(name)),
        Returns::Array(name) => (
            "application/json",
            json!({"type": "array", "items": schema_ref(name)}),
        ),
        Returns::Logs | Returns::Text => ("text/plain", json!({"type": "string"})),
    };

    let mut responses = Map::new();
    responses.insert(
        "200".into(),
        json!({"description": "OK", "schema": schema}),
    );
    if route.not_found {
        responses.insert("404".into(), json!({"description": "Not Found"}));
    }
    if route.path_param.is_some() {
        responses.insert("400".into(), json!({"description": "Malformed identifier"}));
    }
    if route.path.starts_with("/v1/") {
        responses.insert(
            "503".into(),
            json!({"description": "Backend unavailable", "schema": schema_ref("Error")}),
        );
    }

    let parameters: Vec<Value> = route
        .path_param
        .map(|description| {
            json!({
                "name": "id",
                "in": "path",
                "required": true,
                "type": "string",
                "description": description
            })
        })
        .into_iter()
        .collect();

    json!({
        "tags": [route.tag],
        "summary": route.doc,
        "operationId": route.operation.operation_id(),
        "produces": [produces],
        "parameters": parameters,
        "responses": responses
    })
}

fn schema_ref(name: &str) -> Value {
    json!({"$ref": format!("#/definitions/{name}")})
}

fn definitions() -> Value {
    let status = || {
        json!({
            "type": "string",
            "enum": ["pending", "running", "succeeded", "failed", "unknown"]
        })
    };
    let timestamp = || json!({"type": "string", "format": "date-time"});

    json!({
        "Project": {
            "type": "object",
            "required": ["id", "name", "repo"],
            "properties": {
                "id": {"type": "string"},
                "name": {"type": "string"},
                "repo": {
                    "type": "object",
                    "required": ["name", "clone_url"],
                    "properties": {
                        "name": {"type": "string"},
                        "clone_url": {"type": "string"},
                        "ssh_key_ref": {"type": "string"}
                    }
                },
                "default_script": {"type": "string"},
                "secrets_ref": {"type": "string"},
                "namespace": {"type": "string"}
            }
        },
        "Build": {
            "type": "object",
            "required": ["id", "project_id", "created", "status", "job_ids"],
            "properties": {
                "id": {"type": "string"},
                "project_id": {"type": "string"},
                "event_type": {"type": "string"},
                "provider": {"type": "string"},
                "revision": {
                    "type": "object",
                    "properties": {
                        "commit": {"type": "string"},
                        "ref": {"type": "string"}
                    }
                },
                "created": timestamp(),
                "status": status(),
                "job_ids": {"type": "array", "items": {"type": "string"}},
                "worker": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "started": timestamp(),
                        "ended": timestamp(),
                        "exit_code": {"type": "integer"},
                        "status": status()
                    }
                }
            }
        },
        "Job": {
            "type": "object",
            "required": ["id", "build_id", "created", "status"],
            "properties": {
                "id": {"type": "string"},
                "name": {"type": "string"},
                "build_id": {"type": "string"},
                "image": {"type": "string"},
                "created": timestamp(),
                "started": timestamp(),
                "ended": timestamp(),
                "exit_code": {"type": "integer"},
                "status": status()
            }
        },
        "ProjectBuildSummary": {
            "type": "object",
            "required": ["project", "latest_build_state"],
            "properties": {
                "project": schema_ref("Project"),
                "latest_build_state": {
                    "type": "string",
                    "enum": ["found", "no_build", "lookup_failed"]
                },
                "last_build": schema_ref("Build"),
                "error": {"type": "string"}
            }
        },
        "Error": {
            "type": "object",
            "required": ["error_message"],
            "properties": {
                "error_message": {"type": "string"}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{build, get, job, project, test_router};
    use axum::http::StatusCode;
    use std::collections::HashSet;
    use std::sync::Arc;
    use storage::memory::MemoryReader;

    #[test]
    fn test_every_route_is_documented() {
        let docs = api_docs();
        let paths = docs["paths"].as_object().unwrap();
        assert_eq!(paths.len(), ROUTES.len());

        for route in ROUTES {
            let operation = &paths[route.path]["get"];
            assert_eq!(operation["operationId"], route.operation.operation_id());
            assert_eq!(operation["tags"][0], route.tag);
            assert_eq!(operation["responses"].get("404").is_some(), route.not_found);
        }

        assert_eq!(docs["info"]["title"], "Brigade API");
        assert_eq!(docs["info"]["license"]["url"], "http://mit.org");
        assert_eq!(docs["tags"][0]["name"], "brigade");
    }

    #[test]
    fn test_schema_refs_resolve() {
        let docs = api_docs();
        let definitions = docs["definitions"].as_object().unwrap();
        let rendered = docs.to_string();

        for name in ["Job", "Build", "Project", "ProjectBuildSummary", "Error"] {
            assert!(definitions.contains_key(name));
        }
        // Every `$ref` in the document names a definition
        for chunk in rendered.split("#/definitions/").skip(1) {
            let name = chunk.split('"').next().unwrap();
            assert!(definitions.contains_key(name), "dangling ref {name}");
        }
    }

    #[test]
    fn test_operation_ids_unique() {
        let ids: HashSet<_> = ROUTES.iter().map(|r| r.operation.operation_id()).collect();
        assert_eq!(ids.len(), ROUTES.len());
    }

    #[tokio::test]
    async fn test_router_dispatches_every_route() {
        let mut b1 = build("b1", "p1", 100);
        b1.job_ids = vec!["j1".into()];
        let reader = MemoryReader::new()
            .with_project(project("p1"))
            .with_build(b1)
            .with_job(job("j1", "b1", 100))
            .with_logs("j1", ["hello\n"]);
        let (router, sink) = test_router(Arc::new(reader));

        for route in ROUTES {
            let id = match route.tag {
                "job" => "j1",
                "build" => "b1",
                _ => "p1",
            };
            let uri = route.path.replace("{id}", id);
            let response = get(&router, &uri).await;
            assert_eq!(response.status, StatusCode::OK, "{uri}");
        }
        assert_eq!(sink.entries().len(), ROUTES.len());
    }

    #[tokio::test]
    async fn test_unmatched_path_is_filtered() {
        let (router, sink) = test_router(Arc::new(MemoryReader::new()));

        let response = get(&router, "/v2/nothing").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.entries()[0].status, 404);
    }
}

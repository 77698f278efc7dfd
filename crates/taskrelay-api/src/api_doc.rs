//! OpenAPI documentation, served at `/api/openapi.json` and rendered under `/docs`.

use utoipa::OpenApi;

use crate::handlers;
use taskrelay_core::{NewTask, Task};
use taskrelay_infra::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taskrelay API",
        version = "0.1.0",
        description = "Accepts task submissions and relays them over a message queue to a background consumer. The request's trace is carried to the consumer in message headers."
    ),
    paths(handlers::tasks::create_task),
    components(schemas(NewTask, Task, ErrorResponse)),
    tags(
        (name = "tasks", description = "Task submission")
    )
)]
pub struct ApiDoc;

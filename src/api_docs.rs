use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::leads::list_leads,
        api::leads::create_lead,
        api::campaigns::enroll,
        // Add other endpoints here as we document them
    ),
    tags(
        (name = "poolside", description = "Poolside lead management API")
    )
)]
pub struct ApiDoc;

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::EnrollmentRequest;
use crate::models::{
    ClassRecord, ClassUpdate, FeedbackEntry, NewClass, NewFeedback, Role, SignIn, SignUp, User,
};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::list_classes,
        crate::handlers::get_class,
        crate::handlers::refresh_classes,
        crate::handlers::enroll,
        crate::handlers::unenroll,
        crate::handlers::create_class,
        crate::handlers::update_class,
        crate::handlers::delete_class,
        crate::handlers::list_feedback,
        crate::handlers::add_feedback,
        crate::handlers::sign_up,
        crate::handlers::sign_in
    ),
    components(schemas(
        ClassRecord,
        NewClass,
        ClassUpdate,
        EnrollmentRequest,
        FeedbackEntry,
        NewFeedback,
        User,
        Role,
        SignUp,
        SignIn
    )),
    tags(
        (name = "index", description = "API overview"),
        (name = "classes", description = "Class listing and management"),
        (name = "enrollment", description = "Class enrollment"),
        (name = "feedback", description = "User feedback"),
        (name = "users", description = "Accounts on this device"),
        (name = "health", description = "Liveness and readiness")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_not_tagged_as_classes() {
        let doc = ApiDoc::openapi();
        let index = doc.paths.paths.get("/").unwrap();
        let tags = index.get.as_ref().unwrap().tags.clone().unwrap_or_default();
        assert_eq!(tags, vec!["index".to_string()]);
    }
}

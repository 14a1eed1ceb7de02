pub mod api_test;
pub mod helpers;
pub mod http_collaborators_test;
pub mod insight_test;
pub mod notification_test;
pub mod repository_test;
pub mod scheduler_test;

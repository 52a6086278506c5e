//! Request handlers.

pub mod health;
pub mod jobs;
pub mod media;
pub mod projects;
pub mod storage;
pub mod users;
pub mod videos;

use reelkit_models::{Project, ProjectId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Load a project or 404.
pub(crate) async fn require_project(state: &AppState, id: &str) -> ApiResult<Project> {
    state
        .projects
        .by_id(&ProjectId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {id}")))
}

/// Reject filenames that could escape the artifact directories.
pub(crate) fn validate_filename(name: &str) -> ApiResult<()> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ApiError::bad_request("invalid filename"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_traversal_is_rejected() {
        assert!(validate_filename("clip.mp4").is_ok());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("a/b.mp4").is_err());
        assert!(validate_filename("a\\b.mp4").is_err());
        assert!(validate_filename("").is_err());
    }
}

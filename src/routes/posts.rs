//! Post API endpoints.
//!
//! Every save records the content digest; every read re-checks it.

use super::{validate_id, POST_ID_LEN};
use crate::auth::middleware::{AppState, AuthSession};
use crate::error::AppError;
use crate::models::{
    IntegrityMetaResponse, IntegrityMetaUpdate, PostResponse, PostStatus, PostView,
    SavePostRequest, StoredPost,
};
use crate::storage::with_retry;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::time::Duration;

const MAX_TITLE_CHARS: usize = 200;

async fn load_post(state: &AppState, id: &str) -> Result<StoredPost, AppError> {
    validate_id(id, "post", POST_ID_LEN)?;
    with_retry(state.config.store_timeout(), || state.posts.get(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Unpublished posts are only visible to their author.
fn ensure_visible(post: &StoredPost, session: Option<&AuthSession>) -> Result<(), AppError> {
    let is_author = session.is_some_and(|s| s.user_id == post.author_id);
    if post.status != PostStatus::Publish && !is_author {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    Ok(())
}

fn ensure_author(post: &StoredPost, session: &AuthSession) -> Result<(), AppError> {
    if post.author_id != session.user_id {
        return Err(AppError::Forbidden("Not the author of this post".to_string()));
    }
    Ok(())
}

/// Attach the integrity state to a post.
async fn render(state: &AppState, post: StoredPost) -> Result<PostView, AppError> {
    let snapshot = state.integrity.snapshot(&post.id, &post.content).await?;

    Ok(PostView {
        id: post.id,
        title: post.title,
        content: post.content,
        status: post.status,
        author_id: post.author_id,
        updated_at: post.updated_at,
        sha256: snapshot.meta.sha256,
        keccak256: snapshot.keccak256,
        verified: snapshot.status.verified,
        on_chain: snapshot.status.on_chain,
        ipfs_cid: snapshot.meta.ipfs_cid,
        contract_tx: snapshot.meta.contract_tx,
    })
}

/// Seconds a save lock survives a crashed holder.
const SAVE_LOCK_TTL_SECS: u64 = 30;
const SAVE_LOCK_ATTEMPTS: u32 = 50;
const SAVE_LOCK_BACKOFF: Duration = Duration::from_millis(20);

/// Wait for the per-post save lock so the post and its digest are written
/// by one save at a time.
async fn acquire_save_lock(state: &AppState, id: &str) -> Result<String, AppError> {
    for _ in 0..SAVE_LOCK_ATTEMPTS {
        let token = with_retry(state.config.store_timeout(), || {
            state.posts.try_lock(id, SAVE_LOCK_TTL_SECS)
        })
        .await?;
        if let Some(token) = token {
            return Ok(token);
        }
        tokio::time::sleep(SAVE_LOCK_BACKOFF).await;
    }
    tracing::warn!(action = "save_lock_busy", post_id = %id, "Post save lock not acquired");
    Err(AppError::Unavailable(format!("post {} is locked by another save", id)))
}

/// Write the post, record its digest, and render it. Runs under the save lock.
async fn store_post(
    state: &AppState,
    session: &AuthSession,
    id: String,
    title: String,
    req: SavePostRequest,
) -> Result<(PostView, bool), AppError> {
    let now = state.clock.now_secs();
    let (post, created) = if req.id.is_some() {
        let existing = load_post(state, &id).await?;
        ensure_author(&existing, session)?;
        let post = StoredPost {
            title,
            content: req.content,
            status: req.status.unwrap_or(existing.status),
            updated_at: now,
            ..existing
        };
        (post, false)
    } else {
        let post = StoredPost {
            id,
            title,
            content: req.content,
            status: req.status.unwrap_or(PostStatus::Publish),
            author_id: session.user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        (post, true)
    };

    with_retry(state.config.store_timeout(), || state.posts.save(&post)).await?;
    state.integrity.on_save(&post.id, &post.content).await?;

    let action = if created {
        "post_created"
    } else {
        "post_updated"
    };
    tracing::info!(
        action = action,
        post_id = %post.id,
        user_id = %session.user_id,
        status = %post.status,
        "Post saved"
    );

    Ok((render(state, post).await?, created))
}

/// POST /posts — Create or update a post and record its digest
pub async fn save_post(
    session: AuthSession,
    State(state): State<AppState>,
    Json(req): Json<SavePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }

    let id = match req.id.as_deref() {
        Some(id) => {
            validate_id(id, "post", POST_ID_LEN)?;
            id.to_string()
        }
        None => nanoid::nanoid!(POST_ID_LEN),
    };

    let token = acquire_save_lock(&state, &id).await?;
    let result = store_post(&state, &session, id.clone(), title, req).await;
    if let Err(e) = state.posts.unlock(&id, &token).await {
        tracing::warn!(post_id = %id, error = %e, "Failed to release save lock");
    }
    let (view, created) = result?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(PostResponse {
            success: true,
            data: view,
        }),
    ))
}

/// GET /posts/{id} — Fetch a post with its integrity state
pub async fn get_post(
    session: Option<AuthSession>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, &id).await?;
    ensure_visible(&post, session.as_ref())?;

    let view = render(&state, post).await?;
    Ok(Json(PostResponse {
        success: true,
        data: view,
    }))
}

/// GET /posts/{id}/meta — Integrity metadata
pub async fn get_meta(
    session: Option<AuthSession>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, &id).await?;
    ensure_visible(&post, session.as_ref())?;

    let data = state.integrity.integrity_meta(&post.id).await?;
    Ok(Json(IntegrityMetaResponse {
        success: true,
        data,
    }))
}

/// POST /posts/{id}/meta — Record pinning/anchoring results (author only)
pub async fn update_meta(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<IntegrityMetaUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, &id).await?;
    ensure_author(&post, &session)?;

    let data = state
        .integrity
        .update_integrity_meta(&post.id, update)
        .await?;

    tracing::info!(
        action = "meta_updated",
        post_id = %post.id,
        user_id = %session.user_id,
        on_chain = data.verified,
        "Integrity metadata updated"
    );

    Ok(Json(IntegrityMetaResponse {
        success: true,
        data,
    }))
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::auth::{AuthUser, Authenticator, Claims};
use crate::elections::{FecClient, ResultsQuery};
use crate::error::{ApiError, AuthError};
use crate::ingest::types::NewsRecord;
use crate::store::{InsertOutcome, NewsStore, UserStore, VoteStore};
use crate::votes::{Party, VoteTally};

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<dyn NewsStore>,
    pub votes: Arc<dyn VoteStore>,
    pub users: Arc<dyn UserStore>,
    pub auth: Arc<Authenticator>,
    pub fec: Arc<FecClient>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/news", get(list_news))
        .route("/api/news", get(list_news))
        .route("/api/votes", get(list_votes))
        .route("/api/votes/{state}", get(state_votes))
        .route("/api/vote", post(cast_vote))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/user-profile", get(user_profile))
        .route("/api/election-results/{year}/{office}", get(election_results))
        .route(
            "/api/election-results/{year}/{office}/{state}",
            get(election_results),
        )
        .route(
            "/api/election-results/{year}/{office}/{state}/{district}",
            get(election_results),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn list_news(State(state): State<AppState>) -> Result<Json<Vec<NewsRecord>>, ApiError> {
    let records = state
        .news
        .list_latest()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch news", e))?;
    Ok(Json(records))
}

async fn list_votes(State(state): State<AppState>) -> Result<Json<Vec<VoteTally>>, ApiError> {
    let tallies = state
        .votes
        .all_tallies()
        .await
        .map_err(|e| ApiError::internal("Error fetching votes", e))?;
    Ok(Json(tallies))
}

async fn state_votes(
    State(state): State<AppState>,
    Path(us_state): Path<String>,
) -> Result<Json<VoteTally>, ApiError> {
    let tally = state
        .votes
        .tally_for(&us_state)
        .await
        .map_err(|e| ApiError::internal("Error fetching state votes", e))?;
    Ok(Json(tally.unwrap_or_else(|| VoteTally::empty(us_state))))
}

#[derive(Deserialize)]
struct VoteReq {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    party: Option<String>,
}

#[derive(Serialize)]
struct VoteResp {
    message: &'static str,
    vote: VoteTally,
}

async fn cast_vote(
    State(state): State<AppState>,
    Json(body): Json<VoteReq>,
) -> Result<Json<VoteResp>, ApiError> {
    let non_blank = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let (Some(us_state), Some(party)) = (non_blank(body.state), non_blank(body.party)) else {
        return Err(ApiError::bad_request("State and party are required"));
    };
    let party: Party = party
        .parse()
        .map_err(|e: crate::votes::UnknownParty| ApiError::bad_request(e.to_string()))?;

    let vote = state
        .votes
        .cast(&us_state, party)
        .await
        .map_err(|e| ApiError::internal("Error updating votes", e))?;

    tracing::debug!(state = %vote.state, %party, "vote counted");
    Ok(Json(VoteResp {
        message: "Vote counted!",
        vote,
    }))
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Credentials {
    /// Email is trimmed; the password is taken as sent.
    fn into_parts(self) -> Result<(String, String), AuthError> {
        let email = self.email.map(|e| e.trim().to_string()).unwrap_or_default();
        let password = self.password.unwrap_or_default();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::BadRequest("Email and password are required"));
        }
        Ok((email, password))
    }
}

#[derive(Serialize)]
struct MessageResp {
    message: &'static str,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<MessageResp>), AuthError> {
    let (email, password) = body.into_parts()?;
    if state.users.password_hash(&email).await?.is_some() {
        return Err(AuthError::BadRequest("User already exists"));
    }

    let hash = state.auth.hash_password(&password).await?;
    // A concurrent registration can still win between the check and the insert.
    match state.users.create_user(&email, &hash).await? {
        InsertOutcome::Inserted => {
            tracing::info!(%email, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(MessageResp {
                    message: "User registered successfully",
                }),
            ))
        }
        InsertOutcome::AlreadyPresent => Err(AuthError::BadRequest("User already exists")),
    }
}

#[derive(Serialize)]
struct UserView {
    email: String,
}

#[derive(Serialize)]
struct LoginResp {
    message: &'static str,
    token: String,
    user: UserView,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<LoginResp>, AuthError> {
    const REJECTED: AuthError = AuthError::Unauthorized("Invalid email or password");

    let (email, password) = body.into_parts()?;
    let Some(hash) = state.users.password_hash(&email).await? else {
        return Err(REJECTED);
    };
    if !state.auth.password_matches(&password, &hash).await? {
        tracing::debug!(%email, "password mismatch");
        return Err(REJECTED);
    }

    let token = state.auth.issue(&email)?;
    Ok(Json(LoginResp {
        message: "Login successful",
        token,
        user: UserView { email },
    }))
}

#[derive(Serialize)]
struct ProfileResp {
    message: &'static str,
    user: Claims,
}

async fn user_profile(AuthUser(claims): AuthUser) -> Json<ProfileResp> {
    Json(ProfileResp {
        message: "User Profile Data",
        user: claims,
    })
}

#[derive(Deserialize)]
struct ResultsPath {
    year: String,
    office: String,
    state: Option<String>,
    district: Option<String>,
}

async fn election_results(
    State(state): State<AppState>,
    Path(p): Path<ResultsPath>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let query = ResultsQuery::parse(&p.year, &p.office, p.state, p.district)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let body = state
        .fec
        .election_results(&query)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch election results.", e))?;
    Ok(Json(body))
}

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::{Duration, Local};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::auth::AuthRepository;
use crate::db::{models::Account, DB_DATETIME_FORMAT};

/// New accounts open with this demo balance.
const STARTING_BALANCE: i64 = 10_000;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    sub: i64, // user_id
    exp: i64, // expiration timestamp
    iat: i64, // issued at timestamp
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
    full_name: String,
    phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    access_token: String,
    refresh_token: String,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    refresh_token: String,
}

// Authentication service
pub struct AuthService {
    pub repo: AuthRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(repo: AuthRepository, jwt_secret: String) -> Self {
        Self { repo, jwt_secret }
    }

    pub async fn register(
        &self,
        req: RegisterRequest,
    ) -> Result<AuthResponse, Box<dyn std::error::Error>> {
        crate::routes::utils::check_username(&req.username)?;
        crate::routes::utils::check_password(&req.password)?;
        crate::routes::utils::check_phone(&req.phone)?;

        if self.repo.username_exists(&req.username).await? {
            return Err("Username already taken".into());
        }
        if self.repo.phone_exists(&req.phone).await? {
            return Err("Phone number already registered".into());
        }

        let password_hash = hash_password(&req.password)?;

        let account = self
            .repo
            .create_account(
                &req.username,
                &password_hash,
                &req.full_name,
                &req.phone,
                &generate_account_no(),
                Decimal::from(STARTING_BALANCE),
            )
            .await?;
        tracing::info!("account created for username: {}", account.username);

        self.issue_tokens(&account).await
    }

    pub async fn login(
        &self,
        req: LoginRequest,
    ) -> Result<AuthResponse, Box<dyn std::error::Error>> {
        tracing::info!("attempting to log in user: {}", req.username);

        let account = self
            .repo
            .find_account_by_username(&req.username)
            .await?
            .ok_or("Invalid credentials")?;

        let parsed_hash = PasswordHash::new(&account.password_hash)
            .map_err(|_err| "unable to parse stored password hash")?;
        if Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("invalid credentials for user: {}", req.username);
            return Err("Invalid credentials".into());
        }

        self.issue_tokens(&account).await
    }

    pub fn verify_token(&self, token: &str) -> Result<i64, Box<dyn std::error::Error>> {
        let mut validation = jsonwebtoken::Validation::default();

        validation.leeway = 10;
        validation.validate_exp = true;
        validation.algorithms = vec![jsonwebtoken::Algorithm::HS256];

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::error!("error decoding token: {:?}", err);
            "Invalid token"
        })?;

        Ok(token_data.claims.sub)
    }

    pub async fn refresh_token(
        &self,
        refresh_token: String,
    ) -> Result<AuthResponse, Box<dyn std::error::Error>> {
        let account = self
            .repo
            .verify_refresh_token(&refresh_token)
            .await?
            .ok_or("Invalid refresh token")?;

        self.issue_tokens(&account).await
    }

    /// Pre-load the demo account on a fresh database so the app is usable
    /// immediately after first start.
    pub async fn seed_demo_account(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.repo.account_count().await? > 0 {
            return Ok(());
        }
        let password_hash = hash_password("demo123")?;
        self.repo
            .create_account(
                "demo",
                &password_hash,
                "Demo User",
                "9999999999",
                "AC0059431234",
                Decimal::from(25_000),
            )
            .await?;
        tracing::info!("seeded demo account");
        Ok(())
    }

    async fn issue_tokens(
        &self,
        account: &Account,
    ) -> Result<AuthResponse, Box<dyn std::error::Error>> {
        let (access_token, refresh_token) = self.generate_tokens(account.id)?;

        // Refresh tokens live for an hour, stored in the sortable DB format.
        let expires_at = (Local::now() + Duration::hours(1))
            .format(DB_DATETIME_FORMAT)
            .to_string();
        self.repo
            .store_refresh_token(account.id, &refresh_token, &expires_at)
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user_id: account.id,
        })
    }

    fn generate_tokens(&self, user_id: i64) -> Result<(String, String), Box<dyn std::error::Error>> {
        let now = Local::now();

        // Access token (15 minutes)
        let access_claims = Claims {
            sub: user_id,
            exp: (now + Duration::minutes(15)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &access_claims,
            &jsonwebtoken::EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        // Refresh token
        let refresh_token = Uuid::new_v4().to_string();

        Ok((access_token, refresh_token))
    }
}

fn hash_password(password: &str) -> Result<String, Box<dyn std::error::Error>> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_err| "unable to hash password")?
        .to_string())
}

fn generate_account_no() -> String {
    // Format: AC + 10 random digits
    let num: u64 = rand::thread_rng().gen_range(1_000_000_000..10_000_000_000);
    format!("AC{num}")
}

// Route for handling new user registration
pub async fn register_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match service.register(req).await {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

// Route for handling user login
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match service.login(req).await {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => Err((StatusCode::UNAUTHORIZED, e.to_string())),
    }
}

// Route for handling token refresh
pub async fn refresh_token_handler(
    State(service): State<Arc<AuthService>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match service.refresh_token(req.refresh_token).await {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => Err((StatusCode::UNAUTHORIZED, e.to_string())),
    }
}

pub fn auth_routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/refresh", post(refresh_token_handler))
        .with_state(service)
}

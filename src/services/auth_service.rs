use bcrypt::DEFAULT_COST;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::storage::{UserStore, run_blocking};
use crate::utils::*;

/// 用户目录：注册、登录、刷新令牌
///
/// 抽奖服务只需要一个稳定的用户标识（用户名），由这里签发的 access token
/// 的 `sub` 携带。
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_service: JwtService,
    clock: Arc<dyn Clock>,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt_service: JwtService, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            jwt_service,
            clock,
            hash_cost: DEFAULT_COST,
        }
    }

    /// bcrypt 成本因子，测试中可调低
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        // 验证输入参数
        let username = request.username.trim().to_string();
        validate_username(&username)?;
        validate_password(&request.password)?;
        let email = request
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        let user = UserRecord {
            username,
            password_hash: String::new(),
            email,
            created_at: self.clock.now(),
        };

        let cost = self.hash_cost;
        let password = request.password;
        let user = run_blocking(self.users.clone(), move |store| {
            // 先查重，避免无谓的哈希计算；insert 内部会再次检查
            if store.find(&user.username)?.is_some() {
                return Err(AppError::Conflict(format!(
                    "username {} is already registered",
                    user.username
                )));
            }
            let user = UserRecord {
                password_hash: hash_password_with_cost(&password, cost)?,
                ..user
            };
            store.insert(&user)?;
            Ok(user)
        })
        .await?;

        log::info!("Registered user {}", user.username);
        self.issue_tokens(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let username = request.username.trim().to_string();
        let password = request.password;

        let user = run_blocking(self.users.clone(), move |store| {
            let Some(user) = store.find(&username)? else {
                return Ok(None);
            };
            Ok(verify_password(&password, &user.password_hash)?.then_some(user))
        })
        .await?;

        match user {
            Some(user) => self.issue_tokens(&user),
            None => Err(AppError::AuthError(
                "Invalid username or password".to_string(),
            )),
        }
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;

        let username = claims.sub;
        let user = run_blocking(self.users.clone(), move |store| store.find(&username))
            .await?
            .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

        self.issue_tokens(&user)
    }

    fn issue_tokens(&self, user: &UserRecord) -> AppResult<AuthResponse> {
        Ok(AuthResponse {
            access_token: self.jwt_service.generate_access_token(&user.username)?,
            refresh_token: self.jwt_service.generate_refresh_token(&user.username)?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
            user: UserResponse {
                username: user.username.clone(),
                email: user.email.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryUserStore;
    use chrono::NaiveDate;

    fn service() -> AuthService {
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        AuthService::new(
            Arc::new(MemoryUserStore::new()),
            JwtService::new("test-secret", 3600, 7200),
            Arc::new(FixedClock(now)),
        )
        .with_hash_cost(4)
    }

    fn register_request(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: password.into(),
            email: Some("  ".into()),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let registered = auth
            .register(register_request(" alice ", "password123"))
            .await
            .unwrap();
        assert_eq!(registered.user.username, "alice");
        assert_eq!(registered.user.email, None);

        let logged_in = auth
            .login(LoginRequest {
                username: "alice".into(),
                password: "password123".into(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.token_type, "Bearer");
        assert_eq!(logged_in.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_weak_passwords() {
        let auth = service();
        auth.register(register_request("alice", "password123"))
            .await
            .unwrap();

        assert!(matches!(
            auth.register(register_request("alice", "password456")).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            auth.register(register_request("bob", "short")).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            auth.register(register_request("b", "password123")).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_or_unknown_user() {
        let auth = service();
        auth.register(register_request("alice", "password123"))
            .await
            .unwrap();

        for (username, password) in [("alice", "wrong-pass1"), ("nobody", "password123")] {
            let result = auth
                .login(LoginRequest {
                    username: username.into(),
                    password: password.into(),
                })
                .await;
            assert!(matches!(result, Err(AppError::AuthError(_))));
        }
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let auth = service();
        let tokens = auth
            .register(register_request("alice", "password123"))
            .await
            .unwrap();

        let refreshed = auth.refresh_token(&tokens.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.username, "alice");
        assert!(auth.refresh_token(&tokens.access_token).await.is_err());
    }
}

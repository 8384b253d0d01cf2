use std::sync::Arc;

use domain::{
    validate_password, DomainError, Handle, InviteCode, PersonName, StoreError, StorePath, User,
    UserEmail, UserId,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    clock::Clock,
    error::ApplicationError,
    invites::InviteRegistry,
    password::PasswordHasher,
    store::CredentialStore,
    token::{IssuedToken, TokenService},
};

#[derive(Debug, Clone, Default)]
pub struct RegisterUserRequest {
    pub handle: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub invite_token: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 注册或登录成功后返回给客户端的凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user_id: UserId,
}

pub struct AuthServiceDependencies {
    pub store: Arc<dyn CredentialStore>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub token_service: Arc<dyn TokenService>,
    pub clock: Arc<dyn Clock>,
}

pub struct AuthService {
    deps: AuthServiceDependencies,
    invites: InviteRegistry,
    // 串行化 查重 -> 兑换 -> 写入，存储本身不保证唯一性
    registration_gate: Mutex<()>,
}

impl AuthService {
    pub fn new(deps: AuthServiceDependencies) -> Self {
        let invites = InviteRegistry::new(deps.store.clone());
        Self {
            deps,
            invites,
            registration_gate: Mutex::new(()),
        }
    }

    pub async fn register(
        &self,
        request: RegisterUserRequest,
    ) -> Result<AuthSession, ApplicationError> {
        // 姓名规则优先于其他所有校验
        PersonName::ensure_no_digits("firstName", &request.first_name)?;
        PersonName::ensure_no_digits("lastName", &request.last_name)?;

        let required = [
            ("handle", &request.handle),
            ("firstName", &request.first_name),
            ("lastName", &request.last_name),
            ("email", &request.email),
            ("password", &request.password),
            ("inviteToken", &request.invite_token),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(DomainError::MissingField { field }.into());
        }
        validate_password(&request.password)?;

        let handle = Handle::parse(request.handle)?;
        let first_name = PersonName::parse("firstName", request.first_name)?;
        let last_name = PersonName::parse("lastName", request.last_name)?;
        let email = UserEmail::parse(request.email)?;

        // 哈希在闸门外完成
        let password_hash = self.deps.password_hasher.hash(&request.password).await?;

        let _gate = self.registration_gate.lock().await;

        let users = self.load_users().await?;
        if users.iter().any(|user| user.handle == handle) {
            return Err(ApplicationError::DuplicateHandle);
        }
        if users.iter().any(|user| user.email == email) {
            return Err(ApplicationError::DuplicateEmail);
        }

        let code = self.resolve_invite(&request.invite_token)?;
        self.invites.redeem(&code).await?;

        let user_id = UserId::from(self.deps.store.append(&StorePath::users()).await?);
        let user = User::register(
            user_id,
            handle,
            first_name,
            last_name,
            email,
            password_hash,
            self.deps.clock.now(),
        );
        let record =
            serde_json::to_value(&user).map_err(|err| ApplicationError::internal(err.to_string()))?;
        if let Err(err) = self.deps.store.create(&StorePath::user(user_id), record).await {
            // 邀请码已被消耗，不回滚
            warn!(code = %code, error = %err, "用户写入失败，邀请码已作废");
            return Err(err.into());
        }
        self.invites.mark_owner(&code, user_id).await;

        let token = self.issue_session(user_id)?;
        info!(user_id = %user_id, "用户注册成功");
        Ok(AuthSession { token, user_id })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, ApplicationError> {
        if request.email.trim().is_empty() {
            return Err(DomainError::MissingField { field: "email" }.into());
        }
        if request.password.is_empty() {
            return Err(DomainError::MissingField { field: "password" }.into());
        }
        let email = UserEmail::parse(request.email)?;

        let user = self
            .load_users()
            .await?
            .into_iter()
            .find(|user| user.email == email)
            .ok_or(ApplicationError::NotFound)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password_hash)
            .await?;
        if !password_ok {
            warn!(user_id = %user.id, "登录密码错误");
            return Err(ApplicationError::InvalidCredentials);
        }

        let token = self.issue_session(user.id)?;
        info!(user_id = %user.id, "用户登录成功");
        Ok(AuthSession {
            token,
            user_id: user.id,
        })
    }

    /// 校验会话令牌，返回签名中的用户 id
    pub fn authenticate(&self, token: Option<&str>) -> Result<UserId, ApplicationError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApplicationError::Unauthenticated)?;
        self.deps
            .token_service
            .verify_session(token)
            .map_err(ApplicationError::InvalidToken)
    }

    /// 两阶段注册的第一步：确认邀请码可用但不消耗，签发短期邀请令牌
    pub async fn issue_invite_token(&self, code: &str) -> Result<IssuedToken, ApplicationError> {
        if code.trim().is_empty() {
            return Err(DomainError::MissingField { field: "code" }.into());
        }
        let code = InviteCode::parse(code)?;
        if !self.invites.is_unused(&code).await? {
            warn!(code = %code, "邀请码不可用");
            return Err(ApplicationError::InvalidCode);
        }
        self.deps
            .token_service
            .issue_invite(&code)
            .map_err(|err| ApplicationError::internal(err.to_string()))
    }

    fn resolve_invite(&self, invite_token: &str) -> Result<InviteCode, ApplicationError> {
        self.deps
            .token_service
            .verify_invite(invite_token.trim())
            .map_err(|err| {
                warn!(error = %err, "邀请令牌无效");
                ApplicationError::InvalidCode
            })
    }

    fn issue_session(&self, user_id: UserId) -> Result<String, ApplicationError> {
        self.deps
            .token_service
            .issue_session(user_id)
            .map(|issued| issued.token)
            .map_err(|err| ApplicationError::internal(err.to_string()))
    }

    async fn load_users(&self) -> Result<Vec<User>, ApplicationError> {
        let entries = self.deps.store.children(&StorePath::users()).await?;
        entries
            .into_iter()
            .map(|entry| {
                serde_json::from_value::<User>(entry.value).map_err(|err| {
                    ApplicationError::from(StoreError::corrupt(entry.path.as_str(), err.to_string()))
                })
            })
            .collect()
    }
}

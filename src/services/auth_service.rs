//! 认证服务：登录、登出、当前用户

use crate::{
    client::AdminClient,
    error::{ApiError, ErrorKind},
    graphql::{operations, GraphQLRequest, GraphQLResponse, HttpTransport},
    models::{
        auth::{LoginCredentials, LoginOutcome, LoginPayload},
        user::CurrentUser,
    },
    notify::Severity,
};
use tower::Service;
use validator::Validate;

pub struct AuthService<T = HttpTransport> {
    client: AdminClient<T>,
}

impl<T> AuthService<T>
where
    T: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
        + Clone
        + Send
        + Sync
        + 'static,
    T::Future: Send + 'static,
{
    pub fn new(client: AdminClient<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AdminClient<T> {
        &self.client
    }

    /// 用户登录
    ///
    /// 登录请求不经过刷新协调器：凭证错误返回的 401 不应触发刷新。
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginOutcome, ApiError> {
        // 本地表单校验，失败时不发请求
        credentials.validate()?;

        let payload: LoginPayload = match self
            .client
            .execute_unauthenticated(operations::login(credentials))
            .await
            .and_then(|response| response.field("login"))
        {
            Ok(payload) => payload,
            Err(e) => {
                if e.kind() == ErrorKind::Connectivity {
                    self.client
                        .notifier()
                        .notify(&e.user_message(), Severity::Error);
                }
                tracing::info!(error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        let session = self.client.session();
        session.store(&payload.token_pair())?;
        let resume_route = session.take_last_visited_route()?;

        tracing::info!(
            user_id = payload.user.as_ref().map(|u| u.id.as_str()).unwrap_or("unknown"),
            "Signed in"
        );
        self.client.notifier().notify("Signed in", Severity::Success);

        Ok(LoginOutcome {
            user: payload.user,
            resume_route,
        })
    }

    /// 登出：销毁本地会话，保留最近访问的路由
    pub fn logout(&self) -> Result<(), ApiError> {
        self.client.session().clear()?;
        tracing::info!("Signed out");
        self.client.notifier().notify("Signed out", Severity::Info);
        Ok(())
    }

    /// 当前登录用户
    pub async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        self.client.query(operations::me(), "me").await
    }

    /// 记录当前路由，会话结束后重新登录时恢复
    pub fn remember_route(&self, route: &str) -> Result<(), ApiError> {
        self.client.session().set_last_visited_route(route)
    }
}

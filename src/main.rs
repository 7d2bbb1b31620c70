//! cms-admin 命令行入口

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use cms_admin::{
    config::AdminConfig,
    graphql::GraphQLRequest,
    models::auth::LoginCredentials,
    notify::TracingNotifier,
    services::AuthService,
    storage::{FileStorage, MemoryStorage, Storage},
    telemetry, AdminClient,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cms-admin", version, about = "Blog CMS admin API client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 登录并保存会话
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CMS_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// 销毁本地会话
    Logout,
    /// 显示当前登录用户
    Whoami,
    /// 显示本地会话状态
    Session,
    /// 执行任意 GraphQL 操作
    Execute {
        /// 查询文本，或 @path 从文件读取
        #[arg(long)]
        query: String,
        /// JSON 格式的变量
        #[arg(long)]
        variables: Option<String>,
        #[arg(long)]
        operation_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(env) = std::env::var("CMS_ADMIN_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    let config = AdminConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config.logging);

    let storage: Arc<dyn Storage> = match config.session.storage.to_lowercase().as_str() {
        "memory" => Arc::new(MemoryStorage::new()),
        _ => Arc::new(FileStorage::new(&config.session.path)),
    };

    let client = AdminClient::from_config(&config, storage, Arc::new(TracingNotifier))?;
    let auth = AuthService::new(client.clone());

    match cli.command {
        Command::Login { email, password } => {
            let outcome = auth.login(&LoginCredentials { email, password }).await?;
            match outcome.user {
                Some(user) => println!("Signed in as {}", user.email),
                None => println!("Signed in"),
            }
            if let Some(route) = outcome.resume_route {
                println!("Resume at {}", route);
            }
        }
        Command::Logout => {
            auth.logout()?;
            println!("Signed out");
        }
        Command::Whoami => {
            let user = auth.current_user().await?;
            println!("{} <{}>", user.name.as_deref().unwrap_or(&user.id), user.email);
            if let Some(role) = user.role {
                println!("role: {}", role);
            }
        }
        Command::Session => print_session(&client)?,
        Command::Execute {
            query,
            variables,
            operation_name,
        } => {
            let query = match query.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read query file {}", path))?,
                None => query,
            };

            let mut request = GraphQLRequest::new(query);
            if let Some(variables) = variables {
                request = request.variables(
                    serde_json::from_str(&variables).context("--variables must be valid JSON")?,
                );
            }
            if let Some(name) = operation_name {
                request = request.operation(name);
            }

            let response = client.execute(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn print_session(client: &AdminClient) -> anyhow::Result<()> {
    match client.session().current()? {
        Some(session) => {
            println!("status: signed in");
            match session.claims() {
                Ok(claims) => {
                    println!("user: {}", claims.email.as_deref().unwrap_or(&claims.sub));
                    if let Some(expires_at) = claims.expires_at() {
                        let state = if claims.is_expired_at(Utc::now()) {
                            " (expired)"
                        } else {
                            ""
                        };
                        println!("access token expires: {}{}", expires_at.to_rfc3339(), state);
                    }
                }
                Err(e) => println!("access token: unreadable ({})", e),
            }
        }
        None => println!("status: signed out"),
    }

    if let Some(route) = client.session().last_visited_route()? {
        println!("last visited route: {}", route);
    }

    Ok(())
}

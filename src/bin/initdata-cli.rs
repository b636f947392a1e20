use clap::{Parser, Subcommand};
use serde_json::Value;

use miniapp_gateway::security::handshake::sign_init_data;

#[derive(Parser)]
#[command(name = "initdata-cli")]
#[command(about = "Developer tool for mini-app handshake payloads", long_about = None)]
struct Cli {
    /// Bot token used to sign payloads
    #[arg(short, long, env = "BOT_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a signed initData string for a user
    Sign {
        #[arg(long)]
        user_id: i64,
        #[arg(long, default_value = "Dev")]
        first_name: String,
        #[arg(long, default_value = "")]
        username: String,
    },
    /// Sign a payload and log in against a running gateway
    Login {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
        #[arg(long)]
        user_id: i64,
        #[arg(long, default_value = "Dev")]
        first_name: String,
    },
}

fn signed_payload(token: &str, user_id: i64, first_name: &str, username: &str) -> String {
    let user = serde_json::json!({
        "id": user_id,
        "first_name": first_name,
        "username": username,
    })
    .to_string();
    let auth_date = chrono::Utc::now().timestamp().to_string();
    sign_init_data(
        &[
            ("query_id", "cli"),
            ("user", &user),
            ("auth_date", &auth_date),
        ],
        token,
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sign {
            user_id,
            first_name,
            username,
        } => {
            println!("{}", signed_payload(&cli.token, user_id, &first_name, &username));
        }
        Commands::Login {
            url,
            user_id,
            first_name,
        } => {
            let init_data = signed_payload(&cli.token, user_id, &first_name, "");
            let res = reqwest::Client::new()
                .post(format!("{}/api/auth/telegram", url.trim_end_matches('/')))
                .json(&serde_json::json!({ "initData": init_data }))
                .send()
                .await?;

            let status = res.status();
            if let Some(cookie) = res.headers().get(reqwest::header::SET_COOKIE) {
                println!("Set-Cookie: {}", cookie.to_str().unwrap_or("<binary>"));
            }
            let body: Value = res.json().await?;
            println!("{} {}", status, serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
